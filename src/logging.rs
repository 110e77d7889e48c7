//! Logging setup for Gator.
//!
//! Everything goes through one `tracing` subscriber. Console output is always
//! on; a configured log file receives the same lines without ANSI colours.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// Parse log level string to tracing Level.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Where log lines are written.
struct LogTarget {
    writer: BoxMakeWriter,
    ansi: bool,
}

impl LogTarget {
    fn console() -> Self {
        Self {
            writer: BoxMakeWriter::new(std::io::stdout),
            ansi: true,
        }
    }

    /// Stdout plus the file at `path`, opened for appending.
    fn console_and_file(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        let file: Arc<File> = Arc::new(file);

        Ok(Self {
            writer: BoxMakeWriter::new(std::io::stdout.and(file)),
            ansi: false,
        })
    }

    fn for_config(config: &LoggingConfig) -> Result<Self> {
        match config.file.as_deref() {
            Some(path) => Self::console_and_file(path),
            None => Ok(Self::console()),
        }
    }
}

fn install(level: &str, target: LogTarget) {
    let filter = EnvFilter::from_default_env().add_directive(parse_level(level).into());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(target.writer)
                .with_ansi(target.ansi)
                .with_target(false),
        )
        .with(filter)
        .init();
}

/// Initialize logging from the `[logging]` section.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let target = LogTarget::for_config(config)?;
    install(&config.level, target);
    Ok(())
}

/// Initialize console-only logging.
pub fn init_console_only(level: &str) {
    install(level, LogTarget::console());
}
