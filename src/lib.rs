//! # recipe-cache
//!
//! Cache management layer for the recipe application: a Redis client
//! wrapper with per-category TTL policies, validation of every value read
//! back from the store, scan-based bulk operations, metrics and a
//! supervised connection that emits lifecycle signals.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use recipe_cache::prelude::*;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Recipe {
//!     id: u64,
//!     title: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     init_tracing(&config.logging)?;
//!
//!     let runtime = CacheRuntime::start(config).await?;
//!     let cache = runtime.cache().clone();
//!
//!     let key = keys::recipe_detail(42);
//!     let soup = Recipe { id: 42, title: "Soup".to_string() };
//!     cache.set_for(TtlPolicy::RecipeDetail, &key, &soup).await?;
//!
//!     let cached: Option<Recipe> = cache.get(&key).await?;
//!     println!("cached: {:?}", cached);
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod errors;
pub mod prelude;
pub mod runtime;
pub mod telemetry;

// Re-export the main public types for convenience
pub use errors::RecipeCacheError;
pub use runtime::CacheRuntime;
pub use telemetry::init_tracing;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, Environment, LoggingConfig};

// Re-export internal crates used by the public API
pub use cache_system;
pub use signal_system;

// Re-export external dependencies used in public API
pub use async_trait;
