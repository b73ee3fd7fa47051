//! Logging initialization for the CLI.
//!
//! File-only subscriber so log lines never interleave with command output:
//! `EnvFilter` from `AMUX_LOG` (falling back to the configured filter)
//! writing to a rolling file under `${AMUX_HOME}/logs/`. Library crates
//! never install subscribers.

use amux_core::config::{self, Config};
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber. The returned guard flushes buffered
/// log lines when dropped.
pub fn init(config: &Config) -> Result<WorkerGuard> {
    let log_dir = config::paths::logs_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("create log directory {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(&log_dir, "amux.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env("AMUX_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .with(filter)
        .try_init()
        .context("set global tracing subscriber")?;

    Ok(guard)
}
