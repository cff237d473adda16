//! Structured logging setup
//!
//! Installs a `tracing-subscriber` formatter driven by [`LoggingConfig`].
//! `RUST_LOG` takes precedence over the configured level when set.

use crate::config::LoggingConfig;
use crate::error::{Result, SessionError};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Calling this more than once, or after another subscriber has been
/// installed, is a no-op.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.log_level.as_str().to_lowercase())
            .map_err(|e| SessionError::ConfigError(format!("Invalid log filter: {e}")))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.show_target);

    // An already installed subscriber is not an error
    let _ = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    Ok(())
}
