//! Convenience re-exports for common cache-system usage

// Core cache system components
pub use crate::backend::{CacheBackend, MemoryBackend, RedisBackend};
pub use crate::connection::ConnectionState;
pub use crate::errors::{CacheError, CacheResult};
pub use crate::keys;
pub use crate::manager::CacheManager;
pub use crate::metrics::{CacheStats, HealthReport, MetricsSnapshot};
pub use crate::policy::TtlPolicy;
pub use crate::validation::{FieldKind, NamespaceValidator, ValidationError, ValidatorRegistry};

// Re-export centralized config
pub use config::{CacheConfig, Environment};

// Common external dependencies
pub use async_trait::async_trait;
pub use redis;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;
