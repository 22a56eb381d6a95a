//! Audio for listen units: inbound payload adaptation, persisted records,
//! and resolution of the single effective track for a position.
mod payload;
mod persisted;
mod track;

pub use payload::{AudioPayloadKind, ListenAudioPayload, audio_payload_from_backend};
pub use persisted::{NormalizedAudio, normalize_persisted_audio};
pub use track::{
    ListenAudioSource, ListenContentContract, ResolvedAudioTrack, StreamingAudioTrack, has_any_audio_payload,
    resolve_listen_audio_track,
};
