//! Listen-mode playback machine.
//!
//! `RuntimeState::new()` builds the initial state and [`reduce`] is the only
//! way to move it forward. The caller drains `pending_commands`, performs the
//! side effects, and acknowledges them with `COMMANDS_CONSUMED`.
mod reducer;
mod state;

pub use reducer::reduce;
pub use state::{AudioStatus, BlockedInteraction, Mode, RuntimeState, Unit, VisualStatus};
