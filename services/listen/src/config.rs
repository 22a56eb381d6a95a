//! Application Configuration Module
//!
//! Loads the replay service settings from environment variables into a
//! single struct that is passed to the ingest stage and the player.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Capacity of the player feedback channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: Level,
    pub default_segment_ms: u64,
    pub playback_speed: f64,
    pub interaction_resolve_ms: u64,
    pub auto_play: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            default_segment_ms: 1500,
            playback_speed: 1.0,
            interaction_resolve_ms: 2000,
            auto_play: true,
        }
    }
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
    #[error("Playback speed must be greater than zero, got {0}")]
    InvalidSpeed(f64),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    // *   `LISTEN_DEFAULT_SEGMENT_MS`: (Optional) Simulated length of audio without a known duration. Defaults to 1500.
    // *   `LISTEN_PLAYBACK_SPEED`: (Optional) Divides every simulated duration. Defaults to 1.0.
    // *   `LISTEN_INTERACTION_RESOLVE_MS`: (Optional) Delay before an interaction is answered. Defaults to 2000.
    // *   `LISTEN_AUTO_PLAY`: (Optional) Start playback once the first unit exists. Defaults to true.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds a config from any variable lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            log_level: parse_var(&lookup, "RUST_LOG", defaults.log_level)?,
            default_segment_ms: parse_var(&lookup, "LISTEN_DEFAULT_SEGMENT_MS", defaults.default_segment_ms)?,
            playback_speed: parse_var(&lookup, "LISTEN_PLAYBACK_SPEED", defaults.playback_speed)?,
            interaction_resolve_ms: parse_var(
                &lookup,
                "LISTEN_INTERACTION_RESOLVE_MS",
                defaults.interaction_resolve_ms,
            )?,
            auto_play: parse_var(&lookup, "LISTEN_AUTO_PLAY", defaults.auto_play)?,
        };
        let speed = config.playback_speed;
        config.with_speed(speed)
    }

    /// Overrides the playback speed, rejecting non-positive values.
    pub fn with_speed(mut self, speed: f64) -> Result<Self, ConfigError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ConfigError::InvalidSpeed(speed));
        }
        self.playback_speed = speed;
        Ok(self)
    }

    /// Wall-clock time for `ms` of audio at the configured speed.
    pub fn scaled(&self, ms: u64) -> Duration {
        Duration::from_secs_f64(ms as f64 / 1000.0 / self.playback_speed)
    }
}

fn parse_var<F, T>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value,
        }),
    }
}
