//! Summary Player
//!
//! Plays a base64 PCM payload once through the configured output device and
//! optionally exports it as a WAV file.
//!
//! Usage: summary-player <payload.b64> [summary text] [--export]
//!        summary-player <history.json> [--export]
//!
//! A `.json` input is read as the history store's list and its most recent
//! entry is loaded instead.

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spoken_summary::{
    audio::{list_output_devices, AudioEngine},
    config::AppConfig,
    session::{HistoryItem, SessionOrchestrator},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut export = false;
    let mut positional = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--export" {
            export = true;
        } else {
            positional.push(arg);
        }
    }
    let Some(payload_path) = positional.first() else {
        bail!("usage: summary-player <payload.b64 | history.json> [summary text] [--export]");
    };
    let summary = positional.get(1).cloned().unwrap_or_default();

    let config = AppConfig::load().context("Failed to load configuration")?;

    println!("\n=== Available Output Devices ===");
    for device in list_output_devices() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {}{}:", device.name, default_marker);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Channels: {:?}", device.channels);
    }
    println!();

    let mut playback = config.playback.clamped();
    let (engine, has_output) = match AudioEngine::open(&config.audio) {
        Ok(engine) => {
            tracing::info!("Audio output: {}", engine.output_name());
            (engine, true)
        }
        Err(e) => {
            tracing::warn!("No audio output ({}), running headless", e);
            (AudioEngine::headless(), false)
        }
    };
    if !has_output {
        playback.auto_play = false;
    }

    let mut session = SessionOrchestrator::with_settings(engine, &playback);

    let input = std::fs::read_to_string(payload_path)
        .with_context(|| format!("Failed to read {}", payload_path))?;
    let from_history = payload_path.ends_with(".json");
    let loaded = if from_history {
        let history: Vec<HistoryItem> =
            serde_json::from_str(&input).context("Invalid history file")?;
        let Some(item) = history.first() else {
            bail!("History file is empty");
        };
        tracing::info!("Loading history entry {}: {}", item.id, item.title);
        // History entries are replayed on request only
        session.select_history_item(item).await
    } else {
        session.on_generation_complete(summary, input).await
    };
    if let Err(e) = loaded {
        bail!("{}", e.user_message());
    }

    let duration = session
        .ready()
        .map(|ready| ready.audio.duration())
        .unwrap_or_default();
    tracing::info!("Payload ready: {:.1}s of audio", duration.as_secs_f32());

    let started = if !has_output {
        Ok(false)
    } else if from_history {
        session.play().map(|id| id.is_some())
    } else {
        session.auto_play_once()
    };

    match started {
        Ok(true) => {
            let rate = session.controller().playback_rate() as f64;
            let expected = Duration::from_secs_f64(duration.as_secs_f64() / rate);
            let finished = session
                .controller_mut()
                .wait_for_completion(expected + Duration::from_secs(2));
            if !finished {
                tracing::warn!("Playback did not report completion, stopping");
                session.pause();
            }
        }
        Ok(false) if has_output => tracing::info!("Auto-play disabled"),
        Ok(false) => {}
        Err(e) => tracing::warn!("{}", e.user_message()),
    }

    while let Some(e) = session.controller().engine().check_errors() {
        tracing::warn!("Output reported: {}", e);
    }

    if export {
        let dir = config.export.resolve_output_dir();
        match session.export_wav(&dir)? {
            Some(path) => println!("Saved {}", path.display()),
            None => tracing::warn!("Nothing to export"),
        }
    }

    Ok(())
}
