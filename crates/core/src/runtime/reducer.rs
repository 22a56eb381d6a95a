use super::state::{AudioStatus, BlockedInteraction, Mode, RuntimeState, Unit, VisualStatus};
use listen_types::{Command, ListenEvent, UnitId};

const DEFAULT_AUDIO_ERROR: &str = "audio playback failed";

/// The single transition function of the playback machine.
///
/// Total over its input: unknown units, stale completions and mismatched
/// interaction ids are absorbed as state, never as errors. Side effects are
/// only ever described by commands appended to `pending_commands`.
pub fn reduce(mut state: RuntimeState, event: &ListenEvent) -> RuntimeState {
    match event {
        ListenEvent::RegisterUnit {
            unit_id,
            block_id,
            position,
            page,
            has_audio,
        } => register_unit(&mut state, unit_id, block_id, *position, *page, has_audio.unwrap_or(false)),
        ListenEvent::UnitVisualReady { unit_id } => {
            if let Some(unit) = state.unit_mut(unit_id) {
                if unit.visual_status == VisualStatus::Pending {
                    unit.visual_status = VisualStatus::Ready;
                }
            } else {
                tracing::debug!("visual ready for unknown unit {}", unit_id);
            }
        }
        ListenEvent::UnitAudioReady { unit_id } => audio_ready(&mut state, unit_id),
        ListenEvent::UnitAudioStarted { unit_id } => audio_started(&mut state, unit_id),
        ListenEvent::UnitAudioEnded { unit_id } => audio_ended(&mut state, unit_id),
        ListenEvent::UnitAudioError { unit_id, reason } => audio_error(&mut state, unit_id, reason.as_deref()),
        ListenEvent::InteractionOpened { block_id, page } => interaction_opened(&mut state, block_id, *page),
        ListenEvent::InteractionResolved { block_id } => interaction_resolved(&mut state, block_id),
        ListenEvent::UserPlay => user_play(&mut state),
        ListenEvent::UserPause => user_pause(&mut state),
        ListenEvent::UserNext => navigate(&mut state, Direction::Next),
        ListenEvent::UserPrev => navigate(&mut state, Direction::Prev),
        ListenEvent::CommandsConsumed { count } => match count {
            Some(count) => {
                let count = (*count).min(state.pending_commands.len());
                state.pending_commands.drain(..count);
            }
            None => state.pending_commands.clear(),
        },
        ListenEvent::Reset => {
            // Ids keep counting across resets so a command id is never handed out twice.
            let next_command_id = state.next_command_id;
            state = RuntimeState::new();
            state.next_command_id = next_command_id;
        }
    }
    state
}

impl RuntimeState {
    /// Applies [`reduce`] in place.
    pub fn dispatch(&mut self, event: &ListenEvent) {
        let state = std::mem::take(self);
        *self = reduce(state, event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Prev,
}

fn register_unit(
    state: &mut RuntimeState,
    unit_id: &UnitId,
    block_id: &str,
    position: u32,
    page: u32,
    has_audio: bool,
) {
    if state.mode == Mode::Ended {
        state.mode = Mode::Idle;
    }

    if let Some(unit) = state.unit_mut(unit_id) {
        unit.page = page;
        if has_audio
            && matches!(
                unit.audio_status,
                AudioStatus::Missing | AudioStatus::Pending | AudioStatus::Error
            )
        {
            unit.audio_status = AudioStatus::Ready;
        }
        if state.is_active(unit_id) && state.mode == Mode::WaitingAudio {
            evaluate_playback(state, Mode::WaitingAudio);
        }
        return;
    }

    state.units_in_order.push(unit_id.clone());
    state.units.insert(
        unit_id.clone(),
        Unit {
            unit_id: unit_id.clone(),
            block_id: block_id.to_string(),
            position,
            page,
            visual_status: VisualStatus::Pending,
            audio_status: if has_audio {
                AudioStatus::Ready
            } else {
                AudioStatus::Pending
            },
        },
    );
}

fn audio_ready(state: &mut RuntimeState, unit_id: &UnitId) {
    let Some(unit) = state.unit_mut(unit_id) else {
        tracing::debug!("audio ready for unknown unit {}", unit_id);
        return;
    };
    // A started or finished track does not go back to ready.
    if !matches!(unit.audio_status, AudioStatus::Done | AudioStatus::Playing) {
        unit.audio_status = AudioStatus::Ready;
    }
    if state.is_active(unit_id) && matches!(state.mode, Mode::WaitingAudio | Mode::Playing) {
        evaluate_playback(state, Mode::WaitingAudio);
    }
}

fn audio_started(state: &mut RuntimeState, unit_id: &UnitId) {
    let Some(unit) = state.unit_mut(unit_id) else {
        tracing::debug!("audio started for unknown unit {}", unit_id);
        return;
    };
    unit.audio_status = AudioStatus::Playing;
    if state.is_active(unit_id) && !state.is_interaction_blocked() {
        state.mode = Mode::Playing;
    }
}

fn audio_ended(state: &mut RuntimeState, unit_id: &UnitId) {
    let Some(unit) = state.unit_mut(unit_id) else {
        tracing::debug!("audio ended for unknown unit {}", unit_id);
        return;
    };
    unit.audio_status = AudioStatus::Done;

    if !state.is_active(unit_id) {
        tracing::debug!("ignoring stale audio end for {}", unit_id);
        return;
    }
    if state.is_interaction_blocked() {
        return;
    }
    advance(state, Mode::WaitingAudio);
}

fn audio_error(state: &mut RuntimeState, unit_id: &UnitId, reason: Option<&str>) {
    let Some(unit) = state.unit_mut(unit_id) else {
        tracing::debug!("audio error for unknown unit {}", unit_id);
        return;
    };
    unit.audio_status = AudioStatus::Error;
    state.last_error = Some(reason.unwrap_or(DEFAULT_AUDIO_ERROR).to_string());
    if state.is_active(unit_id) && !state.is_interaction_blocked() {
        state.mode = Mode::Error;
    }
}

fn interaction_opened(state: &mut RuntimeState, block_id: &str, page: u32) {
    let mode_was_playing = state.mode == Mode::Playing;
    if let Some(active) = state.active_unit_id.clone() {
        pause_unit(state, &active, mode_was_playing);
    }
    state.blocked_interaction = Some(BlockedInteraction {
        block_id: block_id.to_string(),
        page,
    });
    state.mode = Mode::InteractionBlocked;
}

fn interaction_resolved(state: &mut RuntimeState, block_id: &str) {
    match &state.blocked_interaction {
        Some(blocked) if blocked.block_id == block_id => {}
        _ => {
            tracing::debug!("interaction {} is not the blocking one, ignoring", block_id);
            return;
        }
    }
    state.blocked_interaction = None;

    // Audio may have finished while the interaction was open.
    let active_done = state
        .active_unit()
        .is_some_and(|unit| unit.audio_status == AudioStatus::Done);
    if active_done {
        advance(state, Mode::Idle);
    } else {
        evaluate_playback(state, Mode::Idle);
    }
}

fn user_play(state: &mut RuntimeState) {
    if state.active_unit_id.is_none() {
        let Some(first) = state.units_in_order.first().cloned() else {
            if !state.is_interaction_blocked() {
                state.mode = Mode::Idle;
            }
            return;
        };
        activate(state, &first);
    }
    evaluate_playback(state, Mode::WaitingAudio);
}

fn user_pause(state: &mut RuntimeState) {
    let mode_was_playing = state.mode == Mode::Playing;
    if let Some(active) = state.active_unit_id.clone() {
        pause_unit(state, &active, mode_was_playing);
    }
    if !state.is_interaction_blocked() {
        state.mode = Mode::Paused;
    }
}

fn navigate(state: &mut RuntimeState, direction: Direction) {
    let target = match (state.active_index(), direction) {
        (Some(index), Direction::Next) => Some(index + 1),
        (Some(index), Direction::Prev) => index.checked_sub(1),
        (None, Direction::Next) => Some(0),
        (None, Direction::Prev) => None,
    };
    let Some(target_id) = target.and_then(|index| state.units_in_order.get(index).cloned()) else {
        return;
    };

    let previous_mode = state.mode;
    if let Some(current) = state.active_unit_id.clone() {
        pause_unit(state, &current, previous_mode == Mode::Playing);
    }
    activate(state, &target_id);

    if state.is_interaction_blocked() {
        state.mode = Mode::InteractionBlocked;
    } else if previous_mode == Mode::Playing {
        evaluate_playback(state, Mode::WaitingAudio);
    } else if previous_mode == Mode::Paused {
        state.mode = Mode::Paused;
    } else {
        state.mode = Mode::Idle;
    }
}

/// Moves to the unit after the active one, or ends when there is none.
fn advance(state: &mut RuntimeState, fallback: Mode) {
    let next = state
        .active_index()
        .and_then(|index| state.units_in_order.get(index + 1).cloned());
    match next {
        Some(next) => {
            activate(state, &next);
            evaluate_playback(state, fallback);
        }
        None => state.mode = Mode::Ended,
    }
}

/// Makes `unit_id` active and emits its SHOW_PAGE.
///
/// Always runs before `evaluate_playback` when both happen in one transition,
/// so the page command precedes any audio command for the same unit.
fn activate(state: &mut RuntimeState, unit_id: &UnitId) {
    let Some(unit) = state.unit_mut(unit_id) else {
        return;
    };
    unit.visual_status = VisualStatus::Displayed;
    let page = unit.page;
    state.active_unit_id = Some(unit_id.clone());
    let id = state.take_command_id();
    state.pending_commands.push(Command::ShowPage {
        id,
        unit_id: unit_id.clone(),
        page,
    });
}

fn evaluate_playback(state: &mut RuntimeState, fallback: Mode) {
    let Some(unit) = state.active_unit() else {
        state.mode = Mode::Idle;
        return;
    };
    if state.is_interaction_blocked() {
        state.mode = Mode::InteractionBlocked;
        return;
    }
    let status = unit.audio_status;
    let unit_id = unit.unit_id.clone();
    match status {
        AudioStatus::Ready => {
            let id = state.take_command_id();
            state.pending_commands.push(Command::PlayUnitAudio { id, unit_id });
            state.mode = Mode::Playing;
        }
        AudioStatus::Playing => state.mode = Mode::Playing,
        AudioStatus::Done => state.mode = Mode::Ended,
        AudioStatus::Missing | AudioStatus::Pending | AudioStatus::Error => state.mode = fallback,
    }
}

/// Emits PAUSE_AUDIO when the unit is audible and demotes it to `ready`,
/// so the next evaluation resumes it with a fresh PLAY_UNIT_AUDIO.
fn pause_unit(state: &mut RuntimeState, unit_id: &UnitId, mode_was_playing: bool) {
    let Some(unit) = state.unit_mut(unit_id) else {
        return;
    };
    let audible = unit.audio_status == AudioStatus::Playing;
    if audible {
        unit.audio_status = AudioStatus::Ready;
    }
    if audible || mode_was_playing {
        let id = state.take_command_id();
        state.pending_commands.push(Command::PauseAudio {
            id,
            unit_id: unit_id.clone(),
        });
    }
}
