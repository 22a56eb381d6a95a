use crate::identity::normalize_position_value;
use listen_types::BackendEvent;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioPayloadKind {
    Segment,
    Complete,
}

/// An `audio_segment` / `audio_complete` backend event, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenAudioPayload {
    pub kind: AudioPayloadKind,
    pub block_bid: String,
    pub position: u32,
    pub segment_index: Option<u32>,
    pub audio_data: Option<String>,
    pub audio_url: Option<String>,
    pub audio_bid: Option<String>,
    pub duration_ms: Option<u64>,
    pub slide_id: Option<String>,
    pub is_final: bool,
}

/// Adapts a backend event into an audio payload.
///
/// Returns `None` for non-audio event types and when neither the event nor
/// `fallback_block_bid` names a block. Never fails otherwise: missing fields
/// stay `None` and the position defaults to 0.
pub fn audio_payload_from_backend(
    event: &BackendEvent,
    fallback_block_bid: Option<&str>,
) -> Option<ListenAudioPayload> {
    let kind = match event.event_type.as_str() {
        "audio_segment" => AudioPayloadKind::Segment,
        "audio_complete" => AudioPayloadKind::Complete,
        _ => return None,
    };
    let block_bid = event
        .block_bid()
        .or_else(|| fallback_block_bid.map(str::trim).filter(|bid| !bid.is_empty()))?
        .to_string();

    let content = &event.content;
    Some(ListenAudioPayload {
        kind,
        block_bid,
        position: normalize_position_value(content.get("position")),
        segment_index: content
            .get("segment_index")
            .and_then(Value::as_u64)
            .and_then(|index| u32::try_from(index).ok()),
        audio_data: non_empty_str(content, "audio_data"),
        audio_url: non_empty_str(content, "audio_url"),
        audio_bid: non_empty_str(content, "audio_bid"),
        duration_ms: content
            .get("duration_ms")
            .and_then(Value::as_f64)
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms.round() as u64),
        slide_id: non_empty_str(content, "slide_id"),
        is_final: content.get("is_final").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn non_empty_str(content: &Value, key: &str) -> Option<String> {
    content
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
