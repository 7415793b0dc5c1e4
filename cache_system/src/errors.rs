//! Error types for cache operations
//!
//! This module defines all error types that can occur
//! during cache operations and Redis interactions.

use crate::validation::ValidationError;
use std::time::Duration;
use thiserror::Error;

/// Cache system errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache is not connected")]
    NotConnected,

    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cache data for {key}: {source}")]
    Validation {
        key: String,
        #[source]
        source: ValidationError,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Invalid cache configuration: {0}")]
    Config(String),
}

/// Failures reported by a backing store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Socket refused, reset or not open
    #[error("connection failure: {0}")]
    Connection(String),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered with an error reply
    #[error("command failed: {0}")]
    Command(String),
}

impl BackendError {
    /// Whether the connection itself is unusable, as opposed to one bad command
    pub fn is_connection(&self) -> bool {
        matches!(self, BackendError::Connection(_))
    }
}

impl From<redis::RedisError> for BackendError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(Duration::ZERO)
        } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal()
        {
            BackendError::Connection(err.to_string())
        } else {
            BackendError::Command(err.to_string())
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
pub type BackendResult<T> = Result<T, BackendError>;
