use listen_types::{Command, UnitId};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Idle,
    WaitingAudio,
    Playing,
    Paused,
    InteractionBlocked,
    Ended,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualStatus {
    Pending,
    Ready,
    Displayed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioStatus {
    Missing,
    Pending,
    Ready,
    Playing,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Unit {
    pub unit_id: UnitId,
    pub block_id: String,
    pub position: u32,
    pub page: u32,
    pub visual_status: VisualStatus,
    pub audio_status: AudioStatus,
}

/// The interaction currently holding playback.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockedInteraction {
    pub block_id: String,
    pub page: u32,
}

/// Full state of the listen-mode playback machine.
///
/// Only [`super::reduce`] mutates it. `units_in_order` is append-only and
/// doubles as playback order; `active_unit_id` always names a key of `units`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RuntimeState {
    pub mode: Mode,
    pub units_in_order: Vec<UnitId>,
    pub units: HashMap<UnitId, Unit>,
    pub active_unit_id: Option<UnitId>,
    pub blocked_interaction: Option<BlockedInteraction>,
    pub pending_commands: Vec<Command>,
    pub last_error: Option<String>,
    pub(crate) next_command_id: u64,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeState {
    pub fn new() -> Self {
        Self {
            mode: Mode::Idle,
            units_in_order: Vec::new(),
            units: HashMap::new(),
            active_unit_id: None,
            blocked_interaction: None,
            pending_commands: Vec::new(),
            last_error: None,
            next_command_id: 1,
        }
    }

    pub fn unit(&self, unit_id: &UnitId) -> Option<&Unit> {
        self.units.get(unit_id)
    }

    pub fn active_unit(&self) -> Option<&Unit> {
        self.active_unit_id.as_ref().and_then(|id| self.units.get(id))
    }

    pub fn is_interaction_blocked(&self) -> bool {
        self.blocked_interaction.is_some()
    }

    pub(crate) fn index_of(&self, unit_id: &UnitId) -> Option<usize> {
        self.units_in_order.iter().position(|id| id == unit_id)
    }

    pub(crate) fn active_index(&self) -> Option<usize> {
        self.active_unit_id.as_ref().and_then(|id| self.index_of(id))
    }

    pub(crate) fn unit_mut(&mut self, unit_id: &UnitId) -> Option<&mut Unit> {
        self.units.get_mut(unit_id)
    }

    pub(crate) fn is_active(&self, unit_id: &UnitId) -> bool {
        self.active_unit_id.as_ref() == Some(unit_id)
    }

    pub(crate) fn take_command_id(&mut self) -> u64 {
        let id = self.next_command_id;
        self.next_command_id += 1;
        id
    }
}
