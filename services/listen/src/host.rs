use crate::config::{Config, EVENT_CHANNEL_CAPACITY};
use crate::ingest::Ingest;
use crate::player::SimulatedPlayer;
use anyhow::Result;
use listen_core::{ListenSession, Mode, execute_command};
use listen_types::{BackendEvent, Command, ListenEvent, UnitId};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;

/// Gap between two recorded backend events, before speed scaling.
pub const STREAM_TICK_MS: u64 = 50;

/// Outcome of one replay.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReplaySummary {
    pub units: usize,
    pub played: Vec<UnitId>,
    pub final_mode: Mode,
    pub last_error: Option<String>,
}

/// Wires the ingest stage, the runtime session and the player together.
///
/// The host is the only writer of the session: backend events, player
/// feedback and its own resume policy all go through [`ReplayHost::dispatch`].
pub struct ReplayHost {
    config: Config,
    ingest: Ingest,
    session: ListenSession,
    player: SimulatedPlayer,
    started: bool,
    played: Vec<UnitId>,
}

impl ReplayHost {
    pub fn new(config: Config, feedback: mpsc::Sender<ListenEvent>) -> Self {
        Self {
            player: SimulatedPlayer::new(config.clone(), feedback),
            config,
            ingest: Ingest::new(),
            session: ListenSession::new(),
            started: false,
            played: Vec::new(),
        }
    }

    pub fn push(&mut self, event: BackendEvent) {
        self.ingest.push(event);
    }

    pub fn session(&self) -> &ListenSession {
        &self.session
    }

    /// Applies one runtime event and executes the commands it produced.
    pub async fn dispatch(&mut self, event: ListenEvent) {
        let mut events = VecDeque::from([event]);
        while let Some(event) = events.pop_front() {
            let opened = match &event {
                ListenEvent::InteractionOpened { block_id, .. } => Some(block_id.clone()),
                _ => None,
            };
            let commands = self.session.dispatch(event);
            if let Some(block_id) = opened {
                self.player.schedule_interaction_resolution(&block_id).await;
            }

            for command in &commands {
                match execute_command(&self.player, self.ingest.library(), command).await {
                    Ok(()) => {
                        // The start is applied before any later feedback so a pause can never precede it.
                        if let Command::PlayUnitAudio { unit_id, .. } = command {
                            self.played.push(unit_id.clone());
                            events.push_back(ListenEvent::UnitAudioStarted {
                                unit_id: unit_id.clone(),
                            });
                        }
                    }
                    Err(e) => {
                        tracing::error!("Command failed: {:#}", e);
                        // A unit that cannot start would otherwise hold the runtime in `playing`.
                        if let Command::PlayUnitAudio { unit_id, .. } = command {
                            events.push_back(ListenEvent::UnitAudioError {
                                unit_id: unit_id.clone(),
                                reason: Some(format!("{:#}", e)),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Processes every queued backend event the admission policy lets through.
    pub async fn pump(&mut self) {
        loop {
            self.apply_policies().await;
            let blocked = self.session.state().is_interaction_blocked();
            let Some(events) = self.ingest.next(blocked) else {
                break;
            };
            for event in events {
                self.dispatch(event).await;
            }
        }
    }

    /// Called once the script is exhausted and nothing is in flight.
    /// Returns `false` when there is nothing left to do.
    pub async fn settle(&mut self) -> bool {
        if let Some(events) = self.ingest.release_head() {
            for event in events {
                self.dispatch(event).await;
            }
            self.pump().await;
            return true;
        }
        if self.session.mode() == Mode::WaitingAudio && self.has_next_unit() {
            let active = self.session.state().active_unit_id.clone();
            tracing::warn!("No audio ever arrived for {:?}, skipping", active.map(|id| id.to_string()));
            self.skip_forward().await;
            return true;
        }
        false
    }

    pub fn summary(&self) -> ReplaySummary {
        let state = self.session.state();
        ReplaySummary {
            units: state.units_in_order.len(),
            played: self.played.clone(),
            final_mode: state.mode,
            last_error: state.last_error.clone(),
        }
    }

    async fn apply_policies(&mut self) {
        if self.config.auto_play && !self.started && !self.session.state().units_in_order.is_empty() {
            self.started = true;
            tracing::info!("First unit registered, starting playback");
            self.dispatch(ListenEvent::UserPlay).await;
        }
        match self.session.mode() {
            Mode::Ended if self.has_next_unit() => {
                tracing::info!("New units arrived after the end, resuming");
                self.skip_forward().await;
            }
            Mode::Error if self.has_next_unit() => {
                tracing::warn!(
                    "Skipping failed unit: {}",
                    self.session.state().last_error.as_deref().unwrap_or("unknown error")
                );
                self.skip_forward().await;
            }
            _ => {}
        }
    }

    async fn skip_forward(&mut self) {
        self.dispatch(ListenEvent::UserNext).await;
        self.dispatch(ListenEvent::UserPlay).await;
    }

    fn has_next_unit(&self) -> bool {
        let state = self.session.state();
        match &state.active_unit_id {
            Some(active) => state
                .units_in_order
                .iter()
                .position(|id| id == active)
                .is_some_and(|index| index + 1 < state.units_in_order.len()),
            None => !state.units_in_order.is_empty(),
        }
    }
}

/// Replays a recorded backend stream in real time (scaled by the configured
/// speed) and returns once playback can make no further progress.
pub async fn replay(config: Config, script: Vec<BackendEvent>) -> Result<ReplaySummary> {
    let (feedback_tx, mut feedback_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let mut tick = tokio::time::interval(config.scaled(STREAM_TICK_MS).max(Duration::from_millis(1)));
    let mut host = ReplayHost::new(config, feedback_tx);
    let mut script = script.into_iter();
    tracing::info!("Replaying {} backend events", script.len());

    loop {
        tokio::select! {
            biased;
            Some(event) = feedback_rx.recv() => {
                tracing::debug!("Player feedback: {}", event.kind());
                if host.player.accept_feedback(&event).await {
                    host.dispatch(event).await;
                }
            }
            _ = tick.tick() => {
                if let Some(event) = script.next() {
                    tracing::debug!("Backend event: {}", event.event_type);
                    host.push(event);
                }
            }
        }
        host.pump().await;

        let settled = script.len() == 0 && feedback_rx.is_empty() && host.player.is_idle().await;
        if settled && !host.settle().await {
            break;
        }
    }

    let summary = host.summary();
    tracing::info!(
        "Replay finished in mode {:?}: {} unit(s), {} play command(s)",
        summary.final_mode,
        summary.units,
        summary.played.len()
    );
    Ok(summary)
}
