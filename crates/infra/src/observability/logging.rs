//! Tracing subscriber setup
//!
//! stdout carries the native-messaging channel, so every layer writes to
//! stderr.

use mindhit_domain::{LoggingConfig, MindhitError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Build the filter: `RUST_LOG` wins, then the configured level.
///
/// # Errors
/// Returns `MindhitError::Config` if the configured directive is invalid.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            MindhitError::Config(format!("Invalid log level '{}': {e}", config.level))
        }),
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
/// Returns `MindhitError::Config` for an invalid level and
/// `MindhitError::Internal` if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = Registry::default().with(filter);

    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_target(true).with_writer(std::io::stderr))
            .try_init()
    };

    installed
        .map_err(|e| MindhitError::Internal(format!("Failed to install tracing subscriber: {e}")))
}
