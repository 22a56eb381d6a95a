use crate::identity::normalize_position;
use listen_types::{PersistedAudio, PersistedAudioRecord};
use std::collections::BTreeMap;

/// Persisted audio for one block, keyed by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedAudio {
    /// Sorted ascending by position.
    pub audios: Vec<PersistedAudio>,
    pub tracks_by_position: BTreeMap<u32, PersistedAudio>,
    pub slide_id_by_position: BTreeMap<u32, String>,
}

/// Sorts and indexes a block's stored audio records.
///
/// A record with no per-position list but a legacy `audioUrl` is treated as
/// a single track at position 0.
pub fn normalize_persisted_audio(record: &PersistedAudioRecord) -> NormalizedAudio {
    let mut audios: Vec<PersistedAudio> = record
        .audios
        .iter()
        .map(|raw| PersistedAudio {
            position: raw.position.map(normalize_position).unwrap_or(0),
            audio_url: raw.audio_url.clone().filter(|url| !url.trim().is_empty()),
            duration_ms: raw.duration_ms,
            audio_bid: raw.audio_bid.clone(),
            slide_id: raw.slide_id.clone(),
        })
        .collect();
    audios.sort_by_key(|audio| audio.position);

    if audios.is_empty() {
        if let Some(url) = record.audio_url.as_deref().filter(|url| !url.trim().is_empty()) {
            audios.push(PersistedAudio {
                position: 0,
                audio_url: Some(url.to_string()),
                duration_ms: record.audio_duration_ms,
                audio_bid: None,
                slide_id: None,
            });
        }
    }

    let mut normalized = NormalizedAudio::default();
    for audio in &audios {
        normalized.tracks_by_position.insert(audio.position, audio.clone());
        if let Some(slide_id) = &audio.slide_id {
            normalized.slide_id_by_position.insert(audio.position, slide_id.clone());
        }
    }
    normalized.audios = audios;
    normalized
}
