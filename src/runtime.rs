//! Cache bootstrap
//!
//! This module wires configuration, logging of lifecycle signals and the
//! cache manager together for the owning process.

use cache_system::{CacheBackend, CacheManager, HealthReport};
use config::AppConfig;
use signal_system::{EventType, LifecycleEvent};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::RecipeCacheError;

/// Process-owned cache runtime.
///
/// Built once at startup; hand out clones of [`CacheRuntime::cache`] to the
/// code that needs caching and call [`CacheRuntime::shutdown`] on exit.
#[derive(Debug)]
pub struct CacheRuntime {
    config: AppConfig,
    cache: CacheManager,
}

impl CacheRuntime {
    /// Build a Redis-backed runtime and connect.
    ///
    /// A connection failure is returned; the caller decides whether the
    /// process may start without its cache.
    pub async fn start(config: AppConfig) -> Result<Self, RecipeCacheError> {
        let cache = CacheManager::new(config.cache.clone(), config.environment)?;
        Self::start_with(config, cache).await
    }

    /// Same as [`start`](Self::start) over a caller-provided backend
    pub async fn start_with_backend(
        config: AppConfig,
        backend: Arc<dyn CacheBackend>,
    ) -> Result<Self, RecipeCacheError> {
        let cache =
            CacheManager::with_backend(config.cache.clone(), config.environment, backend);
        Self::start_with(config, cache).await
    }

    async fn start_with(config: AppConfig, cache: CacheManager) -> Result<Self, RecipeCacheError> {
        cache.signals().add_callback(log_lifecycle_event);
        debug_log!(config = ?config.cache, environment = %config.environment, "starting cache runtime");

        cache.connect().await?;
        info!(
            environment = %config.environment,
            key_prefix = %config.cache.key_prefix,
            "Cache runtime started"
        );

        Ok(Self { config, cache })
    }

    /// Shared cache handle
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn health(&self) -> HealthReport {
        self.cache.health_check().await
    }

    /// Close the connection; the final stats are logged
    pub async fn shutdown(self) {
        let stats = self.cache.stats();
        info!(
            hits = stats.metrics.hits,
            misses = stats.metrics.misses,
            errors = stats.metrics.errors,
            hit_rate = stats.hit_rate,
            "Shutting down cache runtime"
        );
        self.cache.disconnect().await;
    }
}

fn log_lifecycle_event(event: &LifecycleEvent) {
    trace_log!(event = %event.event_type, at = %event.timestamp, "lifecycle event");
    if event.is(EventType::Error) {
        warn!(
            error = event.message.as_deref().unwrap_or("unknown"),
            "Cache lifecycle error signal"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_system::MemoryBackend;
    use config::Environment;

    #[tokio::test]
    async fn start_connects_and_registers_logger() {
        let runtime = CacheRuntime::start_with_backend(
            AppConfig::default(),
            Arc::new(MemoryBackend::new()),
        )
        .await
        .unwrap();

        assert!(runtime.cache().is_connected());
        assert_eq!(runtime.cache().signals().callback_count(), 1);
        assert!(runtime.health().await.healthy);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn start_fails_when_store_unreachable() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_available(false);
        let config = AppConfig {
            environment: Environment::Production,
            ..AppConfig::default()
        };

        let err = CacheRuntime::start_with_backend(config, backend)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RecipeCacheError::Cache(cache_system::CacheError::Connection(_))
        ));
    }
}
