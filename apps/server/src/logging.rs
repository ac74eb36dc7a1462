//! Logging setup: console output plus an optional rolling log file

use crate::config::LoggingConfig;
use anyhow::Context;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Keeps the non-blocking file writer alive. Dropping it flushes pending lines.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `logging.level`.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.json {
        layers.push(fmt::layer().json().with_target(true).boxed());
    } else {
        layers.push(fmt::layer().with_target(true).boxed());
    }

    let file_guard = if config.file_enabled {
        let appender = rolling::Builder::new()
            .rotation(parse_rotation(&config.file_rotation)?)
            .filename_prefix(&config.file_prefix)
            .filename_suffix("log")
            .build(&config.file_directory)
            .with_context(|| {
                format!("Failed to open log directory '{}'", config.file_directory)
            })?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn parse_rotation(value: &str) -> anyhow::Result<rolling::Rotation> {
    match value.to_ascii_lowercase().as_str() {
        "minutely" => Ok(rolling::Rotation::MINUTELY),
        "hourly" => Ok(rolling::Rotation::HOURLY),
        "daily" => Ok(rolling::Rotation::DAILY),
        "never" => Ok(rolling::Rotation::NEVER),
        other => anyhow::bail!(
            "Unknown logging.file_rotation '{other}' (expected minutely, hourly, daily or never)"
        ),
    }
}
