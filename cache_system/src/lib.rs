//! Cache system for Redis-based caching
//!
//! This crate provides the recipe application's cache manager: TTL
//! policies per data category, validation of every value read back from
//! the store, scan-based bulk operations, metrics and a supervised
//! connection with lifecycle signals.

pub mod backend;
pub mod connection;
pub mod errors;
pub mod keys;
pub mod manager;
pub mod metrics;
pub mod policy;
pub mod prelude;
pub mod validation;

// Re-export centralized config
pub use config::{CacheConfig, Environment};

pub use backend::{CacheBackend, MemoryBackend, RedisBackend};
pub use connection::{ConnectionState, ConnectionSupervisor};
pub use errors::{BackendError, BackendResult, CacheError, CacheResult};
pub use manager::CacheManager;
pub use metrics::{CacheMetrics, CacheStats, HealthReport, MetricsSnapshot};
pub use policy::TtlPolicy;
pub use validation::{FieldKind, NamespaceValidator, ValidationError, ValidatorRegistry};
