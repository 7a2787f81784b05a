//! Console and per-run file logging

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub fn log_file_name(started: &str) -> String {
    format!("scrape_log_{}.txt", started)
}

/// Install the global subscriber: console output plus a log file in `log_dir`.
///
/// The returned guard flushes the file writer on drop and must outlive the run.
pub fn init_logging(log_dir: &Path) -> Result<(WorkerGuard, PathBuf)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let name = log_file_name(&Local::now().format("%Y%m%d_%H%M%S").to_string());
    let (file_writer, guard) = non_blocking(rolling::never(log_dir, &name));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false).with_target(false);
    let console_layer = fmt::layer().with_target(false);

    Registry::default()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok((guard, log_dir.join(name)))
}
