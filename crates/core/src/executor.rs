use crate::audio::{
    ListenAudioPayload, ListenAudioSource, ListenContentContract, ResolvedAudioTrack, has_any_audio_payload,
    resolve_listen_audio_track,
};
use crate::identity::parse_unit_id;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use listen_types::{Command, PersistedAudioRecord, UnitId};
#[cfg(test)]
use mockall::automock;
use std::collections::HashMap;

// The `CommandExecutor` trait is the seam between the playback runtime and
// whatever actually shows pages and plays audio. The runtime only ever emits
// `Command` values; an executor turns them into side effects.
//
// `#[cfg_attr(test, automock)]` generates `MockCommandExecutor` for tests.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait CommandExecutor {
    async fn show_page(&self, unit_id: &UnitId, page: u32) -> Result<()>;

    async fn play_unit_audio(&self, unit_id: &UnitId, track: &ResolvedAudioTrack) -> Result<()>;

    async fn pause_audio(&self, unit_id: &UnitId) -> Result<()>;
}

/// Audio known per content block, keyed by block id.
#[derive(Debug, Clone, Default)]
pub struct AudioLibrary {
    sources: HashMap<String, ListenAudioSource>,
    contracts: HashMap<String, ListenContentContract>,
}

impl AudioLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self, block_id: &str) -> Option<&ListenAudioSource> {
        self.sources.get(block_id)
    }

    pub fn contract(&self, block_id: &str) -> Option<&ListenContentContract> {
        self.contracts.get(block_id)
    }

    pub fn set_contract(&mut self, block_id: &str, contract: ListenContentContract) {
        self.contracts.insert(block_id.to_string(), contract);
    }

    /// Replaces the persisted tracks of a block, keeping any live streaming entries.
    pub fn insert_persisted(&mut self, block_id: &str, record: &PersistedAudioRecord) {
        let persisted = ListenAudioSource::from_persisted(record);
        let source = self.sources.entry(block_id.to_string()).or_default();
        source.audio_url = persisted.audio_url;
        source.audio_duration_ms = persisted.audio_duration_ms;
        source.audio_tracks = persisted.audio_tracks;
    }

    /// Folds a backend audio payload into its block's source.
    /// Returns `true` when the payload gave its position its first playable audio.
    pub fn apply_payload(&mut self, payload: &ListenAudioPayload) -> bool {
        self.sources
            .entry(payload.block_bid.clone())
            .or_default()
            .apply_payload(payload)
    }

    pub fn resolve(&self, block_id: &str, position: u32) -> Option<ResolvedAudioTrack> {
        self.sources
            .get(block_id)
            .map(|source| resolve_listen_audio_track(source, position))
    }

    /// Resolves the track a unit id points at. Fails for malformed ids and
    /// for units without any audio evidence.
    pub fn resolve_unit(&self, unit_id: &UnitId) -> Result<ResolvedAudioTrack> {
        let (block_id, position) = parse_unit_id(unit_id.as_str())?;
        let track = self.resolve(&block_id, position).unwrap_or_default();
        if !has_any_audio_payload(&track, None) {
            bail!("No audio available for unit {}", unit_id);
        }
        Ok(track)
    }
}

/// Executes one runtime command against `executor`.
pub async fn execute_command<E>(executor: &E, library: &AudioLibrary, command: &Command) -> Result<()>
where
    E: CommandExecutor + Send + Sync + ?Sized,
{
    match command {
        Command::ShowPage { id, unit_id, page } => executor
            .show_page(unit_id, *page)
            .await
            .with_context(|| format!("SHOW_PAGE #{} for {} failed", id, unit_id)),
        Command::PlayUnitAudio { id, unit_id } => {
            let track = library
                .resolve_unit(unit_id)
                .with_context(|| format!("PLAY_UNIT_AUDIO #{} could not resolve a track", id))?;
            executor
                .play_unit_audio(unit_id, &track)
                .await
                .with_context(|| format!("PLAY_UNIT_AUDIO #{} for {} failed", id, unit_id))
        }
        Command::PauseAudio { id, unit_id } => executor
            .pause_audio(unit_id)
            .await
            .with_context(|| format!("PAUSE_AUDIO #{} for {} failed", id, unit_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioPayloadKind;
    use crate::identity::unit_id;
    use mockall::predicate::eq;

    fn complete_payload(block: &str, position: u32, url: &str) -> ListenAudioPayload {
        ListenAudioPayload {
            kind: AudioPayloadKind::Complete,
            block_bid: block.to_string(),
            position,
            segment_index: None,
            audio_data: None,
            audio_url: Some(url.to_string()),
            audio_bid: None,
            duration_ms: Some(1000),
            slide_id: None,
            is_final: true,
        }
    }

    #[tokio::test]
    async fn test_play_resolves_track_for_unit_position() {
        // --- 1. Arrange ---
        let mut library = AudioLibrary::new();
        assert!(library.apply_payload(&complete_payload("blk", 1, "one.mp3")));

        let mut executor = MockCommandExecutor::new();
        executor
            .expect_play_unit_audio()
            .withf(|unit, track| unit.as_str() == "blk:1" && track.audio_url.as_deref() == Some("one.mp3"))
            .returning(|_, _| Box::pin(async { Ok(()) }))
            .once();

        // --- 2. Act ---
        let command = Command::PlayUnitAudio {
            id: 7,
            unit_id: unit_id("blk", 1),
        };
        let result = execute_command(&executor, &library, &command).await;

        // --- 3. Assert ---
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_play_without_audio_is_an_error() {
        let library = AudioLibrary::new();
        let mut executor = MockCommandExecutor::new();
        executor.expect_play_unit_audio().never();

        let command = Command::PlayUnitAudio {
            id: 1,
            unit_id: unit_id("missing", 0),
        };
        let err = execute_command(&executor, &library, &command).await.unwrap_err();
        assert!(format!("{:#}", err).contains("No audio available"));
    }

    #[tokio::test]
    async fn test_show_page_and_pause_are_forwarded() {
        let library = AudioLibrary::new();
        let id = unit_id("blk", 0);
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_show_page()
            .with(eq(id.clone()), eq(3))
            .returning(|_, _| Box::pin(async { Ok(()) }))
            .once();
        executor
            .expect_pause_audio()
            .with(eq(id.clone()))
            .returning(|_| Box::pin(async { Err(anyhow::anyhow!("device gone")) }))
            .once();

        let show = Command::ShowPage {
            id: 1,
            unit_id: id.clone(),
            page: 3,
        };
        execute_command(&executor, &library, &show).await.unwrap();

        let pause = Command::PauseAudio { id: 2, unit_id: id };
        let err = execute_command(&executor, &library, &pause).await.unwrap_err();
        assert!(err.to_string().contains("PAUSE_AUDIO #2"));
    }

    #[test]
    fn test_persisted_records_keep_live_entries() {
        let mut library = AudioLibrary::new();
        library.apply_payload(&complete_payload("blk", 0, "live.mp3"));
        let record = PersistedAudioRecord {
            audio_url: Some("stored.mp3".to_string()),
            audio_duration_ms: Some(10),
            audios: vec![],
        };
        library.insert_persisted("blk", &record);

        let track = library.resolve_unit(&unit_id("blk", 0)).unwrap();
        assert_eq!(track.audio_url.as_deref(), Some("live.mp3"));
        assert_eq!(library.resolve("blk", 0).and_then(|t| t.audio_duration_ms), Some(1000));
    }
}
