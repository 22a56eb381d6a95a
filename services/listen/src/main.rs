use anyhow::{Context, Result};
use clap::Parser;
use listen_service::config::Config;
use listen_service::{replay, script_loader};
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Replays a recorded lesson stream through the listen-mode runtime")]
struct Cli {
    /// A JSON-lines file of backend events, or a directory of `*.jsonl` files
    script: PathBuf,

    /// Playback speed multiplier, overrides LISTEN_PLAYBACK_SPEED
    #[arg(long)]
    speed: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let args = Cli::parse();
    let mut config = Config::from_env().context("Failed to load application configuration")?;
    if let Some(speed) = args.speed {
        config = config.with_speed(speed).context("Invalid --speed")?;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    tracing::info!("Configuration loaded successfully. Starting listen service...");
    tracing::debug!("{:?}", config);

    // --- 3. Load the recorded stream ---
    let script = script_loader::load_script(&args.script)
        .with_context(|| format!("Failed to load script {}", args.script.display()))?;
    tracing::info!("Loaded {} backend events.", script.len());

    // --- 4. Replay until playback settles or Ctrl-C ---
    tokio::select! {
        summary = replay(config, script) => {
            let summary = summary?;
            if let Some(error) = &summary.last_error {
                tracing::warn!("Last playback error: {}", error);
            }
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, shutting down...");
        }
    }
    tracing::info!("Shutting down...");
    Ok(())
}
