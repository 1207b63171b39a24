//! Global tracing subscriber for the command line front end.

use anyhow::{Context, Result};
use leafcast_core::LogConfig;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Flushes the file writer on drop; hold it until `main` returns
pub struct LogGuard {
    _writer: Option<WorkerGuard>,
}

/// Configured level, overridden by `RUST_LOG`
fn level_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy()
}

/// Prune old logs, then open today's file for appending
fn open_log_file(config: &LogConfig) -> Result<(PathBuf, File, io::Result<usize>)> {
    config
        .ensure_log_directory()
        .with_context(|| format!("Failed to create log directory {:?}", config.log_dir))?;
    let pruned = config.cleanup_old_logs();

    let path = config.current_log_path();
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {:?}", path))?;
    Ok((path, file, pruned))
}

pub fn init(config: &LogConfig) -> Result<LogGuard> {
    let sink = config
        .file_output
        .then(|| open_log_file(config))
        .transpose()?;

    let (file_layer, writer_guard, file_info) = match sink {
        Some((path, file, pruned)) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(level_filter(config));
            (Some(layer), Some(guard), Some((path, pruned)))
        }
        None => (None, None, None),
    };

    // stdout carries command output, logs go to stderr
    let console_layer = config.console_output.then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_filter(level_filter(config))
    });

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    match file_info {
        Some((path, pruned)) => {
            match pruned {
                Ok(0) => {}
                Ok(n) => tracing::debug!(removed = n, "Pruned old log files"),
                Err(e) => tracing::warn!("Failed to prune old log files: {}", e),
            }
            tracing::info!(level = %config.level, file = ?path, "Logging initialized");
        }
        None => tracing::info!(level = %config.level, "Logging initialized (console only)"),
    }

    Ok(LogGuard {
        _writer: writer_guard,
    })
}
