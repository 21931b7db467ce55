//! # Logging Bootstrap
//!
//! Installs the process-wide `tracing` subscriber. Only the binary calls
//! this; library crates just emit events. Output goes to stderr because
//! stdout carries responses.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::container::{ConfigError, LoggingConfig};

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter =
        EnvFilter::try_new(&config.level).map_err(|e| ConfigError::Logging(e.to_string()))?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.map_err(|e| ConfigError::Logging(e.to_string()))
}
