//! Logging setup
//!
//! `RUST_LOG` takes precedence; otherwise the configured level applies.

use crate::config::DebugConfig;
use crate::error::{EmulatorError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
pub fn init(config: &DebugConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));

    let file_layer = if config.log_to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_path)?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| EmulatorError::Config(format!("Failed to install logger: {}", e)))?;

    if config.log_to_file {
        tracing::info!("Logging to {}", config.log_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_init_opens_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = DebugConfig {
            log_level: LogLevel::Debug,
            log_to_file: true,
            log_path: dir.path().join("ds-anywhere.log"),
        };

        // A second install fails, but the file is opened before that
        if init(&config).is_ok() {
            assert!(init(&config).is_err());
        }
        assert!(config.log_path.exists());
    }
}
