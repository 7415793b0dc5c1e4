//! Error types for the recipe-cache crate
//!
//! This module contains the error types returned while bootstrapping the
//! cache layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecipeCacheError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache_system::CacheError),

    #[error("Tracing setup error: {0}")]
    Telemetry(String),
}
