use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use listen_core::CommandExecutor;
use listen_core::audio::ResolvedAudioTrack;
use listen_types::{ListenEvent, UnitId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Sample rate of streamed PCM16 mono speech, used to size segments without a duration.
pub const PCM16_SAMPLE_RATE: u64 = 24_000;

struct Playback {
    unit_id: UnitId,
    handle: JoinHandle<()>,
    /// Set by the timer right before it reports the end.
    finished: Arc<AtomicBool>,
}

/// Stand-in for a real audio/page surface.
///
/// Audio is "played" by waiting out the track duration (scaled by the
/// configured speed) and then reporting `UNIT_AUDIO_ENDED` on the feedback
/// channel. An end report only counts for the playback that produced it,
/// see [`SimulatedPlayer::accept_feedback`]. Interactions are answered after
/// a fixed delay.
pub struct SimulatedPlayer {
    config: Config,
    feedback: mpsc::Sender<ListenEvent>,
    current: Mutex<Option<Playback>>,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl SimulatedPlayer {
    pub fn new(config: Config, feedback: mpsc::Sender<ListenEvent>) -> Self {
        Self {
            config,
            feedback,
            current: Mutex::new(None),
            timers: Mutex::new(Vec::new()),
        }
    }

    /// True when no playback or interaction timer is still running.
    pub async fn is_idle(&self) -> bool {
        let current_done = self
            .current
            .lock()
            .await
            .as_ref()
            .is_none_or(|playback| playback.handle.is_finished());
        let mut timers = self.timers.lock().await;
        timers.retain(|timer| !timer.is_finished());
        current_done && timers.is_empty()
    }

    /// Answers an open interaction after the configured delay.
    pub async fn schedule_interaction_resolution(&self, block_id: &str) {
        let delay = self.config.scaled(self.config.interaction_resolve_ms);
        let feedback = self.feedback.clone();
        let block_id = block_id.to_string();
        tracing::info!("Interaction {} opened, answering in {:?}", block_id, delay);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::info!("Interaction {} answered", block_id);
            if let Err(e) = feedback.send(ListenEvent::InteractionResolved { block_id }).await {
                tracing::warn!("Failed to report interaction resolution: {:?}", e);
            }
        });
        self.timers.lock().await.push(handle);
    }

    /// Filters feedback before it reaches the session.
    ///
    /// `UNIT_AUDIO_ENDED` is accepted once, and only from the playback that is
    /// still current. Ends of paused or replaced playbacks that were already
    /// queued on the channel are dropped.
    pub async fn accept_feedback(&self, event: &ListenEvent) -> bool {
        let ListenEvent::UnitAudioEnded { unit_id } = event else {
            return true;
        };
        let mut current = self.current.lock().await;
        let is_current_end = current
            .as_ref()
            .is_some_and(|playback| &playback.unit_id == unit_id && playback.finished.load(Ordering::SeqCst));
        if is_current_end {
            current.take();
        } else {
            tracing::debug!("Dropping stale end of {}", unit_id);
        }
        is_current_end
    }

    async fn stop_current(&self) -> Option<UnitId> {
        let playback = self.current.lock().await.take()?;
        if playback.handle.is_finished() {
            return None;
        }
        playback.handle.abort();
        Some(playback.unit_id)
    }
}

/// Playback length of a track in milliseconds.
///
/// A known duration wins; otherwise decoded PCM16 segments are measured, and
/// `default_ms` covers tracks with neither. Fails when a segment is not valid base64.
pub fn track_duration_ms(track: &ResolvedAudioTrack, default_ms: u64) -> Result<u64> {
    let mut decoded_bytes = 0u64;
    for segment in track.audio_segments.iter().flatten() {
        let bytes = STANDARD
            .decode(segment.audio_data.as_bytes())
            .with_context(|| format!("Segment {} is not valid base64", segment.segment_index))?;
        decoded_bytes += bytes.len() as u64;
    }
    if let Some(ms) = track.effective_duration_ms().filter(|ms| *ms > 0) {
        return Ok(ms);
    }
    if decoded_bytes > 0 {
        return Ok(decoded_bytes * 1000 / 2 / PCM16_SAMPLE_RATE);
    }
    Ok(default_ms)
}

#[async_trait]
impl CommandExecutor for SimulatedPlayer {
    async fn show_page(&self, unit_id: &UnitId, page: u32) -> Result<()> {
        tracing::info!("Page {} shown for {}", page, unit_id);
        Ok(())
    }

    async fn play_unit_audio(&self, unit_id: &UnitId, track: &ResolvedAudioTrack) -> Result<()> {
        if let Some(previous) = self.stop_current().await {
            tracing::debug!("Cut off {} to play {}", previous, unit_id);
        }

        let duration_ms = track_duration_ms(track, self.config.default_segment_ms)
            .with_context(|| format!("Cannot play {}", unit_id))?;

        tracing::info!(
            "Playing {} ({} ms{}{})",
            unit_id,
            duration_ms,
            track
                .audio_url
                .as_deref()
                .map(|url| format!(", {url}"))
                .unwrap_or_default(),
            if track.is_audio_streaming { ", streaming" } else { "" }
        );

        let feedback = self.feedback.clone();
        let ended = unit_id.clone();
        let delay = self.config.scaled(duration_ms);
        let finished = Arc::new(AtomicBool::new(false));
        let done = finished.clone();
        let mut current = self.current.lock().await;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            done.store(true, Ordering::SeqCst);
            if let Err(e) = feedback.send(ListenEvent::audio_ended(&ended)).await {
                tracing::warn!("Failed to report end of {}: {:?}", ended, e);
            }
        });
        *current = Some(Playback {
            unit_id: unit_id.clone(),
            handle,
            finished,
        });
        Ok(())
    }

    async fn pause_audio(&self, unit_id: &UnitId) -> Result<()> {
        let mut current = self.current.lock().await;
        let is_current = current.as_ref().is_some_and(|playback| &playback.unit_id == unit_id);
        match current.take() {
            Some(playback) if is_current => {
                playback.handle.abort();
                tracing::info!("Paused {}", unit_id);
            }
            other => {
                *current = other;
                tracing::debug!("Pause for {} but it is not playing", unit_id);
            }
        }
        Ok(())
    }
}
