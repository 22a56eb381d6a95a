pub mod audio;
pub mod executor;
pub mod identity;
pub mod queue;
pub mod runtime;
pub mod segment;
pub mod session;

pub use executor::{AudioLibrary, CommandExecutor, execute_command};
pub use runtime::{Mode, RuntimeState, reduce};
pub use session::ListenSession;

pub use listen_types as types;
pub use listen_types::{Command, ListenEvent, UnitId};
