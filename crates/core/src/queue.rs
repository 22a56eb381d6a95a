//! Admission policy for the inbound listen queue.
//!
//! Backend events arrive as one FIFO mixing audio and visual payloads. The
//! policy picks which index may be processed next so that a visual never
//! outruns audio that is still on its way, while visuals keep FIFO order once
//! nothing is outstanding.

use listen_types::BackendEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenQueueKind {
    Audio,
    Visual,
    Other,
}

/// Classifies a backend event type tag.
pub fn classify_listen_event_type(event_type: &str) -> ListenQueueKind {
    match event_type {
        "audio_segment" | "audio_complete" => ListenQueueKind::Audio,
        "content" | "done" => ListenQueueKind::Visual,
        _ => ListenQueueKind::Other,
    }
}

pub trait ListenQueueItem {
    fn queue_kind(&self) -> ListenQueueKind;
}

impl ListenQueueItem for BackendEvent {
    fn queue_kind(&self) -> ListenQueueKind {
        classify_listen_event_type(&self.event_type)
    }
}

impl ListenQueueItem for ListenQueueKind {
    fn queue_kind(&self) -> ListenQueueKind {
        *self
    }
}

impl ListenQueueItem for &str {
    fn queue_kind(&self) -> ListenQueueKind {
        classify_listen_event_type(self)
    }
}

/// Returns the queue index eligible for processing now, or `None` to wait.
///
/// An open interaction halts everything. A visual head waits while audio is
/// pending, letting a queued audio item jump ahead of it. Otherwise any queued
/// audio item goes first and the head proceeds when there is none.
pub fn pick_next_listen_queue_index<T: ListenQueueItem>(
    queue: &[T],
    pending_audio_count: usize,
    is_interaction_blocked: bool,
) -> Option<usize> {
    if is_interaction_blocked {
        return None;
    }
    let head = queue.first()?;
    let first_audio = queue
        .iter()
        .position(|item| item.queue_kind() == ListenQueueKind::Audio);

    if head.queue_kind() == ListenQueueKind::Visual && pending_audio_count > 0 {
        return first_audio;
    }
    first_audio.or(Some(0))
}
