use super::payload::{AudioPayloadKind, ListenAudioPayload};
use super::persisted::normalize_persisted_audio;
use crate::segment::{Segment, speakable_text};
use listen_types::{AudioSegment, PersistedAudio, PersistedAudioRecord};
use std::collections::BTreeMap;

/// Live audio for one position while TTS is still being delivered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamingAudioTrack {
    pub audio_url: Option<String>,
    pub audio_segments: Vec<AudioSegment>,
    pub is_audio_streaming: bool,
    pub audio_duration_ms: Option<u64>,
    pub audio_bid: Option<String>,
}

/// Every representation of audio known for one block.
///
/// The legacy single-track fields only ever describe position 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListenAudioSource {
    pub audio_url: Option<String>,
    pub audio_segments: Option<Vec<AudioSegment>>,
    pub is_audio_streaming: bool,
    pub audio_duration_ms: Option<u64>,
    pub audio_tracks: Vec<PersistedAudio>,
    pub audio_tracks_by_position: BTreeMap<u32, StreamingAudioTrack>,
}

/// The one effective track for a position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedAudioTrack {
    pub audio_url: Option<String>,
    pub audio_segments: Option<Vec<AudioSegment>>,
    pub is_audio_streaming: bool,
    pub audio_duration_ms: Option<u64>,
}

impl ResolvedAudioTrack {
    /// Known duration, else the sum of segment durations when all are known.
    pub fn effective_duration_ms(&self) -> Option<u64> {
        if self.audio_duration_ms.is_some() {
            return self.audio_duration_ms;
        }
        let segments = self.audio_segments.as_ref()?;
        segments.iter().map(|segment| segment.duration_ms).sum()
    }
}

/// Speakable-structure contract that accompanies a content block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListenContentContract {
    pub speakable_segments: Vec<String>,
}

impl ListenContentContract {
    pub fn from_segments(segments: &[Segment]) -> Self {
        Self {
            speakable_segments: speakable_text(segments),
        }
    }
}

impl ListenAudioSource {
    pub fn from_persisted(record: &PersistedAudioRecord) -> Self {
        let normalized = normalize_persisted_audio(record);
        Self {
            audio_url: record.audio_url.clone(),
            audio_duration_ms: record.audio_duration_ms,
            audio_tracks: normalized.audios,
            ..Default::default()
        }
    }

    /// Folds an adapted backend payload into the streaming map.
    ///
    /// Returns `true` when the position had no playable audio before and has
    /// some now, which is when the unit becomes audio-ready.
    pub fn apply_payload(&mut self, payload: &ListenAudioPayload) -> bool {
        let had_audio = has_any_audio_payload(&resolve_listen_audio_track(self, payload.position), None);
        let track = self.audio_tracks_by_position.entry(payload.position).or_default();
        if payload.audio_bid.is_some() {
            track.audio_bid = payload.audio_bid.clone();
        }

        match payload.kind {
            AudioPayloadKind::Segment => {
                if let Some(audio_data) = &payload.audio_data {
                    let index = payload.segment_index.unwrap_or(track.audio_segments.len() as u32);
                    let segment = AudioSegment {
                        segment_index: index,
                        audio_data: audio_data.clone(),
                        duration_ms: payload.duration_ms,
                        is_final: payload.is_final,
                    };
                    match track
                        .audio_segments
                        .binary_search_by_key(&index, |existing| existing.segment_index)
                    {
                        Ok(at) => track.audio_segments[at] = segment,
                        Err(at) => track.audio_segments.insert(at, segment),
                    }
                }
                track.is_audio_streaming = !payload.is_final;
            }
            AudioPayloadKind::Complete => {
                if payload.audio_url.is_some() {
                    track.audio_url = payload.audio_url.clone();
                }
                if payload.duration_ms.is_some() {
                    track.audio_duration_ms = payload.duration_ms;
                }
                track.is_audio_streaming = false;
            }
        }

        let has_audio = has_any_audio_payload(&resolve_listen_audio_track(self, payload.position), None);
        !had_audio && has_audio
    }
}

/// Picks the single authoritative track for `position`.
///
/// Per field: the live streaming entry wins, then the persisted record for the
/// position, then (position 0 only) the legacy single-track fields. Segments
/// come from the streaming entry whenever one exists, even an empty one.
pub fn resolve_listen_audio_track(source: &ListenAudioSource, position: u32) -> ResolvedAudioTrack {
    let streaming = source.audio_tracks_by_position.get(&position);
    let persisted = source.audio_tracks.iter().find(|audio| audio.position == position);
    let legacy = position == 0;

    let audio_url = streaming
        .and_then(|track| non_empty(track.audio_url.as_deref()))
        .or_else(|| persisted.and_then(|audio| non_empty(audio.audio_url.as_deref())))
        .or_else(|| legacy.then(|| non_empty(source.audio_url.as_deref())).flatten())
        .map(str::to_string);

    let audio_segments = match streaming {
        Some(track) => Some(track.audio_segments.clone()),
        None => legacy.then(|| source.audio_segments.clone()).flatten(),
    }
    .filter(|segments| !segments.is_empty());

    let is_audio_streaming = streaming.is_some_and(|track| track.is_audio_streaming)
        || (legacy && source.is_audio_streaming);

    let audio_duration_ms = streaming
        .and_then(|track| track.audio_duration_ms)
        .or_else(|| persisted.and_then(|audio| audio.duration_ms))
        .or_else(|| legacy.then_some(source.audio_duration_ms).flatten());

    ResolvedAudioTrack {
        audio_url,
        audio_segments,
        is_audio_streaming,
        audio_duration_ms,
    }
}

/// Whether any evidence of audio exists for a track.
///
/// A non-empty speakable list in the content contract counts too: TTS will be
/// produced for it even though nothing has resolved yet.
pub fn has_any_audio_payload(track: &ResolvedAudioTrack, contract: Option<&ListenContentContract>) -> bool {
    track.audio_url.is_some()
        || track.audio_segments.as_ref().is_some_and(|segments| !segments.is_empty())
        || track.is_audio_streaming
        || contract.is_some_and(|contract| !contract.speakable_segments.is_empty())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(index: u32, duration_ms: Option<u64>) -> AudioSegment {
        AudioSegment {
            segment_index: index,
            audio_data: "AAAA".to_string(),
            duration_ms,
            is_final: false,
        }
    }

    fn source() -> ListenAudioSource {
        ListenAudioSource {
            audio_url: Some("legacy.mp3".to_string()),
            audio_segments: Some(vec![segment(0, Some(10))]),
            is_audio_streaming: true,
            audio_duration_ms: Some(900),
            audio_tracks: vec![
                PersistedAudio {
                    position: 0,
                    audio_url: Some("persisted-0.mp3".to_string()),
                    duration_ms: Some(1200),
                    audio_bid: None,
                    slide_id: None,
                },
                PersistedAudio {
                    position: 1,
                    audio_url: Some("persisted-1.mp3".to_string()),
                    duration_ms: None,
                    audio_bid: None,
                    slide_id: None,
                },
            ],
            audio_tracks_by_position: BTreeMap::new(),
        }
    }

    #[test]
    fn test_streaming_entry_beats_persisted_and_legacy() {
        let mut source = source();
        source.audio_tracks_by_position.insert(
            0,
            StreamingAudioTrack {
                audio_url: Some("live.mp3".to_string()),
                audio_segments: vec![segment(0, Some(5)), segment(1, Some(6))],
                is_audio_streaming: false,
                audio_duration_ms: Some(11),
                audio_bid: None,
            },
        );
        let track = resolve_listen_audio_track(&source, 0);
        assert_eq!(track.audio_url.as_deref(), Some("live.mp3"));
        assert_eq!(track.audio_segments.as_ref().map(Vec::len), Some(2));
        assert_eq!(track.audio_duration_ms, Some(11));
        // Legacy still reports streaming for position 0.
        assert!(track.is_audio_streaming);
    }

    #[test]
    fn test_empty_streaming_entry_hides_legacy_segments() {
        let mut source = source();
        source.audio_tracks_by_position.insert(
            0,
            StreamingAudioTrack {
                audio_url: Some("live.mp3".to_string()),
                ..Default::default()
            },
        );
        let track = resolve_listen_audio_track(&source, 0);
        assert_eq!(track.audio_url.as_deref(), Some("live.mp3"));
        assert_eq!(track.audio_segments, None);
        // The persisted duration still fills the gap.
        assert_eq!(track.audio_duration_ms, Some(1200));
    }

    #[test]
    fn test_persisted_beats_legacy() {
        let track = resolve_listen_audio_track(&source(), 0);
        assert_eq!(track.audio_url.as_deref(), Some("persisted-0.mp3"));
        assert_eq!(track.audio_duration_ms, Some(1200));
        // Segments only exist in the legacy fields.
        assert_eq!(track.audio_segments.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_legacy_applies_only_at_position_zero() {
        let mut source = source();
        source.audio_tracks.clear();
        let zero = resolve_listen_audio_track(&source, 0);
        assert_eq!(zero.audio_url.as_deref(), Some("legacy.mp3"));
        assert_eq!(zero.audio_duration_ms, Some(900));

        let two = resolve_listen_audio_track(&source, 2);
        assert_eq!(two, ResolvedAudioTrack::default());
        assert!(!has_any_audio_payload(&two, None));
    }

    #[test]
    fn test_contract_counts_as_audio_evidence() {
        let empty = ResolvedAudioTrack::default();
        let contract = ListenContentContract {
            speakable_segments: vec!["Hello".to_string()],
        };
        assert!(has_any_audio_payload(&empty, Some(&contract)));
        assert!(!has_any_audio_payload(&empty, Some(&ListenContentContract::default())));
    }

    #[test]
    fn test_apply_payload_reports_first_audio_and_orders_segments() {
        let mut source = ListenAudioSource::default();
        let mut payload = ListenAudioPayload {
            kind: AudioPayloadKind::Segment,
            block_bid: "blk".to_string(),
            position: 1,
            segment_index: Some(1),
            audio_data: Some("BBBB".to_string()),
            audio_url: None,
            audio_bid: None,
            duration_ms: Some(200),
            slide_id: None,
            is_final: false,
        };
        assert!(source.apply_payload(&payload));

        payload.segment_index = Some(0);
        payload.audio_data = Some("AAAA".to_string());
        assert!(!source.apply_payload(&payload));

        let track = resolve_listen_audio_track(&source, 1);
        let indexes: Vec<u32> = track
            .audio_segments
            .as_ref()
            .map(|segments| segments.iter().map(|s| s.segment_index).collect())
            .unwrap_or_default();
        assert_eq!(indexes, vec![0, 1]);
        assert!(track.is_audio_streaming);
        assert_eq!(track.effective_duration_ms(), Some(400));

        let complete = ListenAudioPayload {
            kind: AudioPayloadKind::Complete,
            audio_url: Some("final.mp3".to_string()),
            duration_ms: Some(450),
            segment_index: None,
            audio_data: None,
            ..payload
        };
        assert!(!source.apply_payload(&complete));
        let track = resolve_listen_audio_track(&source, 1);
        assert_eq!(track.audio_url.as_deref(), Some("final.mp3"));
        assert!(!track.is_audio_streaming);
        assert_eq!(track.effective_duration_ms(), Some(450));
    }

    #[test]
    fn test_from_persisted_record() {
        let record = PersistedAudioRecord {
            audio_url: Some("legacy.mp3".to_string()),
            audio_duration_ms: None,
            audios: vec![],
        };
        let source = ListenAudioSource::from_persisted(&record);
        assert_eq!(source.audio_tracks.len(), 1);
        assert_eq!(
            resolve_listen_audio_track(&source, 0).audio_url.as_deref(),
            Some("legacy.mp3")
        );
    }
}
