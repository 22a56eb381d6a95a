use crate::UnitId;

/// Instructions the runtime hands to its caller.
///
/// `id` is assigned at emission and strictly increases.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "SHOW_PAGE")]
    ShowPage {
        id: u64,
        #[serde(rename = "unitId")]
        unit_id: UnitId,
        page: u32,
    },
    #[serde(rename = "PLAY_UNIT_AUDIO")]
    PlayUnitAudio {
        id: u64,
        #[serde(rename = "unitId")]
        unit_id: UnitId,
    },
    #[serde(rename = "PAUSE_AUDIO")]
    PauseAudio {
        id: u64,
        #[serde(rename = "unitId")]
        unit_id: UnitId,
    },
}

impl Command {
    pub fn id(&self) -> u64 {
        match self {
            Self::ShowPage { id, .. } | Self::PlayUnitAudio { id, .. } | Self::PauseAudio { id, .. } => *id,
        }
    }

    pub fn unit_id(&self) -> &UnitId {
        match self {
            Self::ShowPage { unit_id, .. }
            | Self::PlayUnitAudio { unit_id, .. }
            | Self::PauseAudio { unit_id, .. } => unit_id,
        }
    }
}
