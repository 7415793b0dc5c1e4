//! Tracing subscriber setup
//!
//! The cache crates only emit `tracing` events; the owning process installs
//! a subscriber once at startup.

use crate::errors::RecipeCacheError;
use config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// The level comes from `logging.level`; `RUST_LOG`, when set, wins.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), RecipeCacheError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| RecipeCacheError::Telemetry(e.to_string()))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| RecipeCacheError::Telemetry(e.to_string()))
}
