use crate::UnitId;

/// Domain events consumed by the playback runtime.
///
/// Async work (audio decode, learner input, network delivery) happens outside
/// the runtime and is fed back in through these variants.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ListenEvent {
    #[serde(rename = "REGISTER_UNIT")]
    RegisterUnit {
        #[serde(rename = "unitId")]
        unit_id: UnitId,
        #[serde(rename = "blockId")]
        block_id: String,
        position: u32,
        page: u32,
        #[serde(rename = "hasAudio", default, skip_serializing_if = "Option::is_none")]
        has_audio: Option<bool>,
    },
    #[serde(rename = "UNIT_VISUAL_READY")]
    UnitVisualReady {
        #[serde(rename = "unitId")]
        unit_id: UnitId,
    },
    #[serde(rename = "UNIT_AUDIO_READY")]
    UnitAudioReady {
        #[serde(rename = "unitId")]
        unit_id: UnitId,
    },
    #[serde(rename = "UNIT_AUDIO_STARTED")]
    UnitAudioStarted {
        #[serde(rename = "unitId")]
        unit_id: UnitId,
    },
    #[serde(rename = "UNIT_AUDIO_ENDED")]
    UnitAudioEnded {
        #[serde(rename = "unitId")]
        unit_id: UnitId,
    },
    #[serde(rename = "UNIT_AUDIO_ERROR")]
    UnitAudioError {
        #[serde(rename = "unitId")]
        unit_id: UnitId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    #[serde(rename = "INTERACTION_OPENED")]
    InteractionOpened {
        #[serde(rename = "blockId")]
        block_id: String,
        page: u32,
    },
    #[serde(rename = "INTERACTION_RESOLVED")]
    InteractionResolved {
        #[serde(rename = "blockId")]
        block_id: String,
    },
    #[serde(rename = "USER_PLAY")]
    UserPlay,
    #[serde(rename = "USER_PAUSE")]
    UserPause,
    #[serde(rename = "USER_NEXT")]
    UserNext,
    #[serde(rename = "USER_PREV")]
    UserPrev,
    #[serde(rename = "RESET")]
    Reset,
    #[serde(rename = "COMMANDS_CONSUMED")]
    CommandsConsumed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
    },
}

impl ListenEvent {
    pub fn register(unit_id: UnitId, block_id: &str, position: u32, page: u32) -> Self {
        Self::RegisterUnit {
            unit_id,
            block_id: block_id.to_string(),
            position,
            page,
            has_audio: None,
        }
    }

    /// Same as [`ListenEvent::register`] but declares the unit's audio ready.
    pub fn register_with_audio(unit_id: UnitId, block_id: &str, position: u32, page: u32) -> Self {
        Self::RegisterUnit {
            unit_id,
            block_id: block_id.to_string(),
            position,
            page,
            has_audio: Some(true),
        }
    }

    pub fn audio_ended(unit_id: &UnitId) -> Self {
        Self::UnitAudioEnded {
            unit_id: unit_id.clone(),
        }
    }

    /// Short name used in logs, matching the wire tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RegisterUnit { .. } => "REGISTER_UNIT",
            Self::UnitVisualReady { .. } => "UNIT_VISUAL_READY",
            Self::UnitAudioReady { .. } => "UNIT_AUDIO_READY",
            Self::UnitAudioStarted { .. } => "UNIT_AUDIO_STARTED",
            Self::UnitAudioEnded { .. } => "UNIT_AUDIO_ENDED",
            Self::UnitAudioError { .. } => "UNIT_AUDIO_ERROR",
            Self::InteractionOpened { .. } => "INTERACTION_OPENED",
            Self::InteractionResolved { .. } => "INTERACTION_RESOLVED",
            Self::UserPlay => "USER_PLAY",
            Self::UserPause => "USER_PAUSE",
            Self::UserNext => "USER_NEXT",
            Self::UserPrev => "USER_PREV",
            Self::Reset => "RESET",
            Self::CommandsConsumed { .. } => "COMMANDS_CONSUMED",
        }
    }
}
