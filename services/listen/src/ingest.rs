//! Inbound stage of the replay host.
//!
//! Owns the FIFO of backend events, the audio library and the per-block
//! segmentation progress. Each admitted event is turned into the runtime
//! events it implies; the runtime itself is driven by the caller.

use listen_core::audio::{ListenContentContract, audio_payload_from_backend, has_any_audio_payload};
use listen_core::identity::unit_id;
use listen_core::queue::{ListenQueueKind, ListenQueueItem, pick_next_listen_queue_index};
use listen_core::segment::{SegmentKind, segment_content, split_settled};
use listen_core::AudioLibrary;
use listen_types::{BackendEvent, ListenEvent, PersistedAudioRecord, UnitId};
use std::collections::{HashMap, HashSet};

/// Streaming progress of one content block.
#[derive(Debug, Default)]
struct BlockProgress {
    text: String,
    registered: u32,
    visuals: usize,
}

#[derive(Debug, Default)]
pub struct Ingest {
    queue: Vec<BackendEvent>,
    library: AudioLibrary,
    blocks: HashMap<String, BlockProgress>,
    /// Blocks in first-seen order, so `done` can settle the last open one.
    block_order: Vec<String>,
    registered: HashSet<UnitId>,
    completed: HashSet<UnitId>,
    page: u32,
}

impl Ingest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: BackendEvent) {
        self.queue.push(event);
    }

    pub fn library(&self) -> &AudioLibrary {
        &self.library
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Registered units that still expect an `audio_complete`.
    pub fn pending_audio_count(&self) -> usize {
        self.registered
            .iter()
            .filter(|id| !self.completed.contains(*id))
            .filter(|id| self.expects_audio(id))
            .count()
    }

    /// Dequeues the next admissible event and returns the runtime events it
    /// implies. `None` means nothing may be processed right now.
    pub fn next(&mut self, is_interaction_blocked: bool) -> Option<Vec<ListenEvent>> {
        let index = pick_next_listen_queue_index(&self.queue, self.pending_audio_count(), is_interaction_blocked)?;
        let event = self.queue.remove(index);
        Some(self.handle(event))
    }

    /// Forces the head out when the stream has ended but the admission policy
    /// still gates it on audio that will never arrive.
    pub fn release_head(&mut self) -> Option<Vec<ListenEvent>> {
        if self.queue.is_empty() {
            return None;
        }
        let event = self.queue.remove(0);
        tracing::warn!(
            "Releasing gated '{}' event with {} unit(s) still missing audio",
            event.event_type,
            self.pending_audio_count()
        );
        Some(self.handle(event))
    }

    fn handle(&mut self, event: BackendEvent) -> Vec<ListenEvent> {
        match event.queue_kind() {
            ListenQueueKind::Audio => self.handle_audio(&event),
            ListenQueueKind::Visual if event.event_type == "content" => self.handle_content(&event, false),
            ListenQueueKind::Visual => self.handle_done(&event),
            ListenQueueKind::Other => self.handle_other(&event),
        }
    }

    fn handle_audio(&mut self, event: &BackendEvent) -> Vec<ListenEvent> {
        let fallback = self.block_order.last().cloned();
        let Some(payload) = audio_payload_from_backend(event, fallback.as_deref()) else {
            tracing::warn!("Dropping '{}' event without a block id", event.event_type);
            return vec![];
        };
        let id = unit_id(&payload.block_bid, payload.position);
        if event.event_type == "audio_complete" {
            self.completed.insert(id.clone());
        }
        if self.library.apply_payload(&payload) {
            tracing::debug!("First audio for {}", id);
            vec![ListenEvent::UnitAudioReady { unit_id: id }]
        } else {
            vec![]
        }
    }

    /// Appends a content delta to its block and registers every speakable
    /// segment of the settled prefix that was not registered yet.
    fn handle_content(&mut self, event: &BackendEvent, flush: bool) -> Vec<ListenEvent> {
        let Some(block_id) = event.block_bid().map(str::to_string) else {
            tracing::warn!("Dropping content event without a block id");
            return vec![];
        };
        if !self.blocks.contains_key(&block_id) {
            self.block_order.push(block_id.clone());
        }
        let progress = self.blocks.entry(block_id.clone()).or_default();
        progress.text.push_str(event.text().unwrap_or_default());

        let (settled, tail) = split_settled(&progress.text);
        let source = if flush { progress.text.as_str() } else { settled };
        if !flush && !tail.is_empty() {
            tracing::trace!("{} has an unclosed visual, holding {} bytes", block_id, tail.len());
        }
        let segments = segment_content(source);

        let mut out = Vec::new();
        let mut position = 0u32;
        let mut visuals = 0usize;
        for segment in &segments {
            if segment.kind != SegmentKind::Text {
                visuals += 1;
                if visuals > progress.visuals {
                    progress.visuals = visuals;
                    self.page += 1;
                    tracing::info!("{} visual on page {}: {:?}", block_id, self.page, segment.kind);
                }
                continue;
            }
            if position >= progress.registered {
                let id = unit_id(&block_id, position);
                let has_audio = self.library.resolve_unit(&id).is_ok();
                let register = if has_audio {
                    ListenEvent::register_with_audio(id.clone(), &block_id, position, self.page)
                } else {
                    ListenEvent::register(id.clone(), &block_id, position, self.page)
                };
                out.push(register);
                out.push(ListenEvent::UnitVisualReady { unit_id: id.clone() });
                self.registered.insert(id);
                progress.registered = position + 1;
            }
            position += 1;
        }
        self.library
            .set_contract(&block_id, ListenContentContract::from_segments(&segments));
        out
    }

    /// `done` closes the current block: anything still held back is segmented as is.
    fn handle_done(&mut self, event: &BackendEvent) -> Vec<ListenEvent> {
        let Some(block_id) = event.block_bid().map(str::to_string).or_else(|| self.block_order.last().cloned()) else {
            return vec![];
        };
        let flush = BackendEvent::new("content", Some(&block_id), serde_json::Value::String(String::new()));
        self.handle_content(&flush, true)
    }

    fn handle_other(&mut self, event: &BackendEvent) -> Vec<ListenEvent> {
        match event.event_type.as_str() {
            "interaction" => {
                let Some(block_id) = event.block_bid() else {
                    tracing::warn!("Dropping interaction without a block id");
                    return vec![];
                };
                self.page += 1;
                vec![ListenEvent::InteractionOpened {
                    block_id: block_id.to_string(),
                    page: self.page,
                }]
            }
            "audio_record" => {
                let Some(block_id) = event.block_bid() else {
                    return vec![];
                };
                match serde_json::from_value::<PersistedAudioRecord>(event.content.clone()) {
                    Ok(record) => {
                        self.library.insert_persisted(block_id, &record);
                        self.announce_persisted(block_id)
                    }
                    Err(e) => {
                        tracing::warn!("Ignoring malformed audio record for {}: {}", block_id, e);
                        vec![]
                    }
                }
            }
            other => {
                tracing::debug!("Ignoring '{}' event", other);
                vec![]
            }
        }
    }

    /// Persisted tracks count as completed audio for already registered units.
    fn announce_persisted(&mut self, block_id: &str) -> Vec<ListenEvent> {
        let ids: Vec<UnitId> = self
            .registered
            .iter()
            .filter(|id| self.library.resolve_unit(id).is_ok())
            .filter(|id| id.as_str().starts_with(&format!("{block_id}:")))
            .cloned()
            .collect();
        let mut out = Vec::new();
        for id in ids {
            if self.completed.insert(id.clone()) {
                out.push(ListenEvent::UnitAudioReady { unit_id: id });
            }
        }
        out
    }

    fn expects_audio(&self, id: &UnitId) -> bool {
        let Ok((block_id, position)) = listen_core::identity::parse_unit_id(id.as_str()) else {
            return false;
        };
        let track = self.library.resolve(&block_id, position).unwrap_or_default();
        let contract = self
            .library
            .contract(&block_id)
            .filter(|contract| (position as usize) < contract.speakable_segments.len());
        has_any_audio_payload(&track, contract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(block: &str, text: &str) -> BackendEvent {
        BackendEvent::new("content", Some(block), json!(text))
    }

    fn complete(block: &str, position: u32) -> BackendEvent {
        BackendEvent::new(
            "audio_complete",
            Some(block),
            json!({"position": position, "audio_url": format!("{block}-{position}.mp3")}),
        )
    }

    fn drain(ingest: &mut Ingest) -> Vec<ListenEvent> {
        let mut out = vec![];
        while let Some(events) = ingest.next(false) {
            out.extend(events);
        }
        out
    }

    fn registered(events: &[ListenEvent]) -> Vec<(String, u32, Option<bool>)> {
        events
            .iter()
            .filter_map(|event| match event {
                ListenEvent::RegisterUnit {
                    unit_id, page, has_audio, ..
                } => Some((unit_id.to_string(), *page, *has_audio)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_content_registers_speakable_units_with_pages() {
        let mut ingest = Ingest::new();
        ingest.push(content("b1", "Look at this.<img src=\"a.png\"/>Then this."));
        let events = drain(&mut ingest);
        assert_eq!(
            registered(&events),
            vec![("b1:0".to_string(), 0, None), ("b1:1".to_string(), 1, None)]
        );
        assert_eq!(ingest.pending_audio_count(), 2);
    }

    #[test]
    fn test_deltas_hold_unclosed_visuals() {
        let mut ingest = Ingest::new();
        ingest.push(content("b1", "Intro. <video src=\"v.mp4\">"));
        let first = drain(&mut ingest);
        assert_eq!(registered(&first).len(), 1);

        // Audio for b1:0 unblocks the next delta.
        ingest.push(complete("b1", 0));
        ingest.push(content("b1", "</video> Outro."));
        let second = drain(&mut ingest);
        assert_eq!(registered(&second), vec![("b1:1".to_string(), 1, None)]);
    }

    #[test]
    fn test_marker_delta_waits_for_the_visual_it_introduces() {
        let mut ingest = Ingest::new();
        ingest.push(content("b1", "===\n"));
        assert!(registered(&drain(&mut ingest)).is_empty());

        ingest.push(complete("b1", 0));
        ingest.push(content("b1", "<svg></svg>Real prose."));
        let events = drain(&mut ingest);
        assert_eq!(registered(&events), vec![("b1:0".to_string(), 1, Some(true))]);
    }

    #[test]
    fn test_audio_before_content_marks_unit_ready() {
        let mut ingest = Ingest::new();
        ingest.push(complete("b1", 0));
        ingest.push(content("b1", "Already voiced."));
        let events = drain(&mut ingest);
        assert!(matches!(events[0], ListenEvent::UnitAudioReady { .. }));
        assert_eq!(registered(&events), vec![("b1:0".to_string(), 0, Some(true))]);
        assert_eq!(ingest.pending_audio_count(), 0);
    }

    #[test]
    fn test_gated_head_can_be_released() {
        let mut ingest = Ingest::new();
        ingest.push(content("b1", "Needs audio."));
        ingest.push(content("b2", "Waits."));
        drain(&mut ingest);
        assert_eq!(ingest.queued(), 1);
        assert!(ingest.next(false).is_none());

        let released = ingest.release_head().unwrap_or_default();
        assert_eq!(registered(&released).len(), 1);
        assert!(ingest.is_empty());
    }

    #[test]
    fn test_interaction_opens_on_its_own_page() {
        let mut ingest = Ingest::new();
        ingest.push(BackendEvent::new("interaction", Some("q1"), json!({"text": "?"})));
        let events = drain(&mut ingest);
        assert_eq!(
            events,
            vec![ListenEvent::InteractionOpened {
                block_id: "q1".to_string(),
                page: 1
            }]
        );
        // Blocked queues admit nothing.
        ingest.push(complete("b1", 0));
        assert!(ingest.next(true).is_none());
    }

    #[test]
    fn test_persisted_record_satisfies_registered_units() {
        let mut ingest = Ingest::new();
        ingest.push(content("b1", "Stored audio."));
        drain(&mut ingest);
        assert_eq!(ingest.pending_audio_count(), 1);

        ingest.push(BackendEvent::new(
            "audio_record",
            Some("b1"),
            json!({"audioUrl": "stored.mp3", "audioDurationMs": 900}),
        ));
        let events = drain(&mut ingest);
        assert!(matches!(&events[..], [ListenEvent::UnitAudioReady { unit_id }] if unit_id.as_str() == "b1:0"));
        assert_eq!(ingest.pending_audio_count(), 0);
    }
}
