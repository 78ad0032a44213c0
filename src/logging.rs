//! Tracing subscriber setup for applications embedding the engine.

use tracing_subscriber::{EnvFilter, fmt};

use crate::{ProcwatchError, Result, config::LoggingConfig};

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level)).map_err(|e| ProcwatchError::Config(format!("invalid log level {}: {}", config.level, e)))?;

    fmt().with_env_filter(filter).with_target(true).try_init().map_err(|e| ProcwatchError::Config(format!("failed to install subscriber: {}", e)))?;

    tracing::debug!(level = %config.level, "logging initialized");
    Ok(())
}

/// Logs to the test harness output; safe to call from every test.
pub fn init_test() {
    let _ = fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
}
