//! Convenience re-exports for common recipe-cache usage
//!
//! This prelude module re-exports the most commonly used items from the
//! cache crates, so one `use` statement covers typical callers.
//!
//! # Example
//!
//! ```rust
//! use recipe_cache::prelude::*;
//!
//! let policy = TtlPolicy::RecipeDetail;
//! assert_eq!(policy.seconds(), 3600);
//! ```

// Core runtime components
pub use crate::errors::RecipeCacheError;
pub use crate::runtime::CacheRuntime;
pub use crate::telemetry::init_tracing;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, Environment, LoggingConfig};

// Re-export signal system for lifecycle handling
pub use signal_system::prelude::*;

// Re-export cache system
pub use cache_system::prelude::*;

// Common external dependencies
pub use anyhow;
pub use async_trait;
pub use tokio;
