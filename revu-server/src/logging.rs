//! Tracing setup for the server binary

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Install the global subscriber
///
/// Console output honours `RUST_LOG` (default `info`, `debug` when verbose).
/// Every error-level record is also appended to `error_log`.
pub fn init(verbose: bool, error_log: &Path) -> anyhow::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    if let Some(parent) = error_log.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(error_log)
        .with_context(|| format!("Failed to open error log {}", error_log.display()))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(LevelFilter::ERROR),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
