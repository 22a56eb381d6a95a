use serde_json::Value;

/// Envelope of one event streamed by the tutoring backend.
///
/// `content` stays untyped: its shape depends on `event_type` and is only
/// interpreted by the adapters in `listen-core`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BackendEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_block_bid: Option<String>,
    #[serde(default)]
    pub content: Value,
}

impl BackendEvent {
    pub fn new(event_type: &str, generated_block_bid: Option<&str>, content: Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            generated_block_bid: generated_block_bid.map(str::to_string),
            content,
        }
    }

    /// Block id with surrounding whitespace removed, if non-empty.
    pub fn block_bid(&self) -> Option<&str> {
        self.generated_block_bid
            .as_deref()
            .map(str::trim)
            .filter(|bid| !bid.is_empty())
    }

    /// Text carried by a `content` event, either a bare string or `{ "text": ... }`.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Value::String(text) => Some(text.as_str()),
            Value::Object(map) => map.get("text").and_then(Value::as_str),
            _ => None,
        }
    }
}
