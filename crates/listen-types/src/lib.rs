//! Wire shapes shared by the listen-mode runtime and its hosts.
//!
//! Nothing in this crate makes decisions; the logic lives in `listen-core`.
pub mod audio;
pub mod backend;
pub mod command;
pub mod event;
pub mod unit;

//re-export types for easier access
pub use audio::{AudioSegment, Base64EncodedAudioBytes, PersistedAudio, PersistedAudioRecord, RawPersistedAudio};
pub use backend::BackendEvent;
pub use command::Command;
pub use event::ListenEvent;
pub use unit::UnitId;
