pub mod config;
pub mod host;
pub mod ingest;
pub mod player;
pub mod script_loader;

pub use host::{ReplayHost, ReplaySummary, replay};
