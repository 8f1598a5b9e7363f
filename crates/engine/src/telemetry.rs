use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::EngineError;

/// Install the global fmt subscriber. `RUST_LOG` takes precedence over the
/// configured level. Returns `Ok(false)` if a subscriber was already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| EngineError::Config(format!("invalid log level {:?}: {e}", config.level)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };
    Ok(installed)
}
