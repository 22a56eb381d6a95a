use crate::runtime::{Mode, RuntimeState, reduce};
use anyhow::{Context, Result};
use listen_types::{Command, ListenEvent};
use tokio::sync::mpsc;

/// Single-writer host around one [`RuntimeState`].
///
/// Every event goes through [`ListenSession::dispatch`], which runs the
/// reducer and hands back the commands it produced. The commands are
/// acknowledged with `COMMANDS_CONSUMED` before the next event is applied.
#[derive(Debug, Default)]
pub struct ListenSession {
    state: RuntimeState,
}

impl ListenSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    /// Applies one event and drains the commands it produced, in emission order.
    pub fn dispatch(&mut self, event: ListenEvent) -> Vec<Command> {
        tracing::trace!("dispatching {}", event.kind());
        self.state = reduce(std::mem::take(&mut self.state), &event);

        let commands = self.state.pending_commands.clone();
        if !commands.is_empty() {
            let consumed = ListenEvent::CommandsConsumed {
                count: Some(commands.len()),
            };
            self.state = reduce(std::mem::take(&mut self.state), &consumed);
        }
        commands
    }

    /// Actor loop: applies events from `events` one at a time and forwards the
    /// resulting commands to `commands`. Returns when the mailbox closes.
    pub async fn run(&mut self, mut events: mpsc::Receiver<ListenEvent>, commands: mpsc::Sender<Command>) -> Result<()> {
        while let Some(event) = events.recv().await {
            let kind = event.kind();
            for command in self.dispatch(event) {
                tracing::debug!("{} -> {:?}", kind, command);
                commands
                    .send(command)
                    .await
                    .with_context(|| format!("Command receiver dropped while handling {}", kind))?;
            }
        }
        tracing::info!("Listen session mailbox closed in mode {:?}", self.state.mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::unit_id;

    #[test]
    fn test_dispatch_drains_commands() {
        let mut session = ListenSession::new();
        session.dispatch(ListenEvent::register_with_audio(unit_id("b", 0), "b", 0, 1));

        let commands = session.dispatch(ListenEvent::UserPlay);
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], Command::ShowPage { id: 1, page: 1, .. }));
        assert!(matches!(commands[1], Command::PlayUnitAudio { id: 2, .. }));
        assert!(session.state().pending_commands.is_empty());
        assert_eq!(session.mode(), Mode::Playing);
    }

    #[tokio::test]
    async fn test_run_forwards_commands_in_order() {
        // --- 1. Arrange ---
        let (event_tx, event_rx) = mpsc::channel(8);
        let (command_tx, mut command_rx) = mpsc::channel(8);
        let first = unit_id("blk", 0);
        let second = unit_id("blk", 1);

        event_tx
            .send(ListenEvent::register_with_audio(first.clone(), "blk", 0, 0))
            .await
            .unwrap();
        event_tx
            .send(ListenEvent::register_with_audio(second.clone(), "blk", 1, 0))
            .await
            .unwrap();
        event_tx.send(ListenEvent::UserPlay).await.unwrap();
        event_tx.send(ListenEvent::audio_ended(&first)).await.unwrap();
        drop(event_tx);

        // --- 2. Act ---
        let mut session = ListenSession::new();
        session.run(event_rx, command_tx).await.unwrap();

        // --- 3. Assert ---
        let mut received = vec![];
        while let Ok(command) = command_rx.try_recv() {
            received.push(command);
        }
        let ids: Vec<u64> = received.iter().map(Command::id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(received[2].unit_id(), &second);
        assert!(matches!(received[3], Command::PlayUnitAudio { .. }));
    }

    #[tokio::test]
    async fn test_run_fails_when_command_receiver_is_gone() {
        let (event_tx, event_rx) = mpsc::channel(4);
        let (command_tx, command_rx) = mpsc::channel(4);
        drop(command_rx);

        event_tx
            .send(ListenEvent::register_with_audio(unit_id("b", 0), "b", 0, 0))
            .await
            .unwrap();
        event_tx.send(ListenEvent::UserPlay).await.unwrap();
        drop(event_tx);

        let result = ListenSession::new().run(event_rx, command_tx).await;
        assert!(result.is_err());
    }
}
