//! novactl: stdin NDJSON events in, approved intent NDJSON out.
//!
//! External producers (gesture/gaze classifiers, voice transcriber, keyboard
//! hook) write one wire event per line to stdin; the action dispatcher reads
//! one approved intent per line from stdout. Logs go to stderr.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use novactl::bus::{Event, EventBus};
use novactl::config::AppConfig;
use novactl::error::CoreError;
use novactl::kernel::intent::Intent;
use novactl::runtime::{ActionDispatcher, ControlLoop};

/// Writes approved intents as NDJSON on stdout.
struct StdoutDispatcher;

impl ActionDispatcher for StdoutDispatcher {
    fn dispatch(&mut self, intent: &Intent) -> Result<(), CoreError> {
        let line = intent.to_wire().to_string();
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}").map_err(|_| CoreError::ChannelClosed)?;
        stdout.flush().map_err(|_| CoreError::ChannelClosed)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => AppConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::default(),
    };

    info!(tick_hz = config.tick_hz, "novactl core booting");

    let bus = EventBus::new(&config);
    let shutdown = CancellationToken::new();

    // Producer boundary: one wire event per stdin line. Malformed lines are
    // logged and skipped, never fatal.
    let producer_bus = bus.clone();
    let producer_shutdown = shutdown.clone();
    let producer = tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                _ = producer_shutdown.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Event>(&line) {
                            Ok(event) => producer_bus.publish(event),
                            Err(err) => warn!(error = %err, "skipping malformed event"),
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed, shutting down");
                        producer_shutdown.cancel();
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "stdin read failed");
                        producer_shutdown.cancel();
                        break;
                    }
                },
            }
        }
    });

    let ctrlc_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            ctrlc_shutdown.cancel();
        }
    });

    let control = ControlLoop::new(config, bus, StdoutDispatcher, shutdown.clone());
    control.run().await;

    producer.await.ok();
    Ok(())
}
