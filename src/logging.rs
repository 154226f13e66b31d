use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber, appending timestamped records
/// to the given log file. `ARCHUSB_LOG` overrides the default `info` filter.
pub fn init(log_path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let filter = EnvFilter::try_from_env("ARCHUSB_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    tracing::info!(log = %log_path.display(), pid = std::process::id(), "logging initialized");
    Ok(())
}
