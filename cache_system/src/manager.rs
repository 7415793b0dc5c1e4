//! Cache manager implementation
//!
//! This module provides the main CacheManager struct for cache operations,
//! connection supervision, validation of read values and metrics.
//!
//! Failure policy: `connect()` surfaces connection failures; `get`, `set`
//! and `del` return `CacheError::NotConnected` while the link is down; every
//! other failure is logged, counted and turned into a safe default so a
//! cache outage never aborts the caller's request.

use crate::backend::{CacheBackend, RedisBackend};
use crate::connection::{ConnectionState, ConnectionSupervisor};
use crate::errors::{BackendError, BackendResult, CacheError, CacheResult};
use crate::metrics::{CacheMetrics, CacheStats, HealthReport, MetricsSnapshot};
use crate::policy::TtlPolicy;
use crate::validation::ValidatorRegistry;
use config::{CacheConfig, Environment};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use signal_system::{LifecycleEvent, SignalManager};
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = BackendResult<T>> + Send + 'a>>;

/// Cache manager handle.
///
/// Cloning is cheap and every clone shares the same connection, state and
/// metrics, so one manager is built at startup and passed to consumers.
#[derive(Clone)]
pub struct CacheManager {
    backend: Arc<dyn CacheBackend>,
    config: Arc<CacheConfig>,
    environment: Environment,
    connection: Arc<ConnectionSupervisor>,
    metrics: Arc<CacheMetrics>,
    validators: Arc<ValidatorRegistry>,
}

impl Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("environment", &self.environment)
            .field("state", &self.connection.state())
            .finish()
    }
}

impl CacheManager {
    /// Create a Redis-backed cache manager; call `connect()` before use
    pub fn new(config: CacheConfig, environment: Environment) -> Result<Self, CacheError> {
        let backend = RedisBackend::new(&config)?;
        Ok(Self::with_backend(config, environment, Arc::new(backend)))
    }

    /// Create a cache manager over any backend
    pub fn with_backend(
        config: CacheConfig,
        environment: Environment,
        backend: Arc<dyn CacheBackend>,
    ) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            environment,
            connection: Arc::new(ConnectionSupervisor::new(Arc::new(SignalManager::new()))),
            metrics: Arc::new(CacheMetrics::new()),
            validators: Arc::new(ValidatorRegistry::standard()),
        }
    }

    /// Replace the validator registry; only valid before the handle is shared
    pub fn with_validators(mut self, validators: ValidatorRegistry) -> Self {
        self.validators = Arc::new(validators);
        self
    }

    // ---- connection -------------------------------------------------------

    /// Open the connection to the backing store.
    ///
    /// Idempotent: while connected this only logs a warning. A failure here
    /// is returned to the caller, which decides whether startup continues.
    pub async fn connect(&self) -> CacheResult<()> {
        if self.connection.is_connected() {
            warn!("Cache already connected, ignoring connect()");
            return Ok(());
        }

        self.connection.begin_connect();
        debug!(
            backend = self.backend.name(),
            host = %self.config.host,
            port = self.config.port,
            db = self.config.db,
            "Connecting to cache"
        );

        match self.backend.open().await {
            Ok(()) => {
                if self.connection.mark_connected() {
                    Ok(())
                } else {
                    Err(CacheError::Connection(
                        "connection dropped during handshake".to_string(),
                    ))
                }
            }
            Err(err) => {
                self.connection.handle(LifecycleEvent::error(err.to_string()));
                Err(CacheError::Connection(err.to_string()))
            }
        }
    }

    /// Close the connection for graceful shutdown and stop reconnecting
    pub async fn disconnect(&self) {
        if self.connection.state() == ConnectionState::Closed {
            return;
        }
        self.connection.handle(LifecycleEvent::close());
        self.backend.close().await;
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Lifecycle signal hub; attach callbacks or subscribe for events
    pub fn signals(&self) -> &Arc<SignalManager> {
        self.connection.signals()
    }

    /// Get current configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    // ---- keys -------------------------------------------------------------

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, self.logical_key(key))
    }

    /// Key with the store-wide prefix removed
    fn logical_key<'k>(&self, key: &'k str) -> &'k str {
        if self.config.key_prefix.is_empty() {
            return key;
        }
        key.strip_prefix(self.config.key_prefix.as_str())
            .unwrap_or(key)
    }

    fn strip_prefixes(&self, keys: Vec<String>) -> Vec<String> {
        keys.into_iter()
            .map(|key| self.logical_key(&key).to_string())
            .collect()
    }

    // ---- command execution ------------------------------------------------

    /// Run one backend command with timeout, retries and metering.
    ///
    /// Connection-class failures mark the link down, start the reconnect
    /// supervisor and are retried up to `max_retries_per_request` times.
    async fn execute<'a, T, F>(&'a self, operation: &'static str, mut command: F) -> BackendResult<T>
    where
        F: FnMut() -> BackendFuture<'a, T>,
    {
        let started = Instant::now();
        let timeout = self.config.command_timeout();
        let mut retries: u32 = 0;

        let result = loop {
            let outcome = match tokio::time::timeout(timeout, command()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(BackendError::Timeout(timeout)),
            };

            match outcome {
                Err(err) if err.is_connection() => {
                    self.connection_lost(&err);
                    if retries >= self.config.max_retries_per_request {
                        break Err(err);
                    }
                    retries += 1;
                    tokio::time::sleep(self.config.retry_delay(retries)).await;
                }
                other => break other,
            }
        };

        let elapsed = started.elapsed();
        self.metrics.record_command(elapsed);
        if let Err(err) = &result {
            self.metrics.record_error();
            error!(operation, error = %err, "Cache command failed");
        }

        #[cfg(feature = "debug-logging")]
        tracing::trace!(
            operation,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            ok = result.is_ok(),
            "cache command"
        );

        result
    }

    fn connection_lost(&self, err: &BackendError) {
        if self.connection.is_connected() {
            self.connection.handle(LifecycleEvent::error(err.to_string()));
        }
        if self.connection.state() != ConnectionState::Closed {
            self.connection
                .spawn_reconnect(Arc::clone(&self.backend), Arc::clone(&self.config));
        }
    }

    fn ensure_connected(&self, operation: &'static str) -> CacheResult<()> {
        if self.connection.is_connected() {
            Ok(())
        } else {
            warn!(operation, "Cache operation attempted while disconnected");
            Err(CacheError::NotConnected)
        }
    }

    // ---- reads ------------------------------------------------------------

    /// Read and deserialize a value.
    ///
    /// Misses and backend failures yield `Ok(None)`. Values that fail to
    /// parse, fail namespace validation or do not fit `T` are deleted from
    /// the store and also yield `Ok(None)`.
    pub async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let Some(raw) = self.fetch(key).await? else {
            return Ok(None);
        };

        match self.decode(key, &raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key, error = %err, "Invalid cache data, evicting entry");
                self.evict(key).await;
                Ok(None)
            }
        }
    }

    /// Read a value as the stored string, without parsing or validation
    pub async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        self.fetch(key).await
    }

    async fn fetch(&self, key: &str) -> CacheResult<Option<String>> {
        self.ensure_connected("get")?;
        let full_key = self.full_key(key);

        match self.execute("get", || self.backend.get(&full_key)).await {
            Ok(Some(raw)) => {
                self.metrics.record_hit();
                debug!(key, "Cache HIT");
                Ok(Some(raw))
            }
            Ok(None) => {
                self.metrics.record_miss();
                debug!(key, "Cache MISS");
                Ok(None)
            }
            Err(_) => Ok(None),
        }
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, raw: &str) -> CacheResult<T> {
        let value: Value = serde_json::from_str(raw)?;
        self.validators
            .validate(self.logical_key(key), &value)
            .map_err(|source| CacheError::Validation {
                key: key.to_string(),
                source,
            })?;
        Ok(serde_json::from_value(value)?)
    }

    async fn evict(&self, key: &str) {
        let full_key = [self.full_key(key)];
        // Eviction failures are already logged and metered by execute()
        let _ = self.execute("del", || self.backend.del(&full_key)).await;
    }

    // ---- writes -----------------------------------------------------------

    /// Serialize and write a value. `ttl_seconds == 0` writes without expiry.
    ///
    /// Returns `Ok(false)` when the write fails; the cache is best-effort.
    pub async fn set<T>(&self, key: &str, value: &T, ttl_seconds: u64) -> CacheResult<bool>
    where
        T: Serialize + ?Sized,
    {
        self.ensure_connected("set")?;
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                error!(key, error = %err, "Failed to serialize cache value");
                self.metrics.record_error();
                return Ok(false);
            }
        };
        self.write(key, &payload, ttl_seconds).await
    }

    /// Write with the TTL of the key's namespace, or the configured default
    /// TTL for keys outside the known namespaces
    pub async fn set_default<T>(&self, key: &str, value: &T) -> CacheResult<bool>
    where
        T: Serialize + ?Sized,
    {
        let ttl = TtlPolicy::for_key(self.logical_key(key))
            .map(|policy| policy.seconds())
            .unwrap_or(self.config.default_ttl_seconds);
        self.set(key, value, ttl).await
    }

    /// Write with the TTL of a data category
    pub async fn set_for<T>(&self, policy: TtlPolicy, key: &str, value: &T) -> CacheResult<bool>
    where
        T: Serialize + ?Sized,
    {
        self.set(key, value, policy.seconds()).await
    }

    /// Write a string as-is, without JSON encoding
    pub async fn set_raw(&self, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<bool> {
        self.ensure_connected("set")?;
        self.write(key, value, ttl_seconds).await
    }

    async fn write(&self, key: &str, payload: &str, ttl_seconds: u64) -> CacheResult<bool> {
        let full_key = self.full_key(key);
        let ttl = (ttl_seconds > 0).then_some(ttl_seconds);

        match self
            .execute("set", || self.backend.set(&full_key, payload, ttl))
            .await
        {
            Ok(()) => {
                debug!(key, ttl_seconds, "Cache SET");
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Delete one or many keys, returning how many existed
    pub async fn del<I, K>(&self, keys: I) -> CacheResult<u64>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.ensure_connected("del")?;
        let full_keys: Vec<String> = keys
            .into_iter()
            .map(|key| self.full_key(key.as_ref()))
            .collect();
        if full_keys.is_empty() {
            return Ok(0);
        }

        match self.execute("del", || self.backend.del(&full_keys)).await {
            Ok(deleted) => {
                debug!(requested = full_keys.len(), deleted, "Cache DEL");
                Ok(deleted)
            }
            Err(_) => Ok(0),
        }
    }

    // ---- auxiliary, fail closed -------------------------------------------

    /// Whether a key exists; `false` when disconnected or on error
    pub async fn exists(&self, key: &str) -> bool {
        if !self.connection.is_connected() {
            return false;
        }
        let full_key = self.full_key(key);
        self.execute("exists", || self.backend.exists(&full_key))
            .await
            .unwrap_or(false)
    }

    /// Remaining TTL in seconds; -1 without expiry, -2 when missing,
    /// disconnected or on error
    pub async fn ttl(&self, key: &str) -> i64 {
        if !self.connection.is_connected() {
            return -2;
        }
        let full_key = self.full_key(key);
        self.execute("ttl", || self.backend.ttl(&full_key))
            .await
            .unwrap_or(-2)
    }

    /// Set a new TTL on an existing key
    pub async fn expire(&self, key: &str, ttl_seconds: u64) -> bool {
        if !self.connection.is_connected() {
            return false;
        }
        let full_key = self.full_key(key);
        self.execute("expire", || self.backend.expire(&full_key, ttl_seconds))
            .await
            .unwrap_or(false)
    }

    // ---- enumeration ------------------------------------------------------

    /// Blocking key listing. Prefer [`scan`](Self::scan) on live systems;
    /// in production every call is logged with a backtrace.
    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        if self.environment.is_production() {
            let backtrace = std::backtrace::Backtrace::force_capture();
            warn!(
                pattern,
                backtrace = %backtrace,
                "KEYS blocks the store; use scan() instead"
            );
        }
        if !self.connection.is_connected() {
            return Vec::new();
        }

        let full_pattern = self.full_key(pattern);
        match self.execute("keys", || self.backend.keys(&full_pattern)).await {
            Ok(keys) => self.strip_prefixes(keys),
            Err(_) => Vec::new(),
        }
    }

    /// Cursor-based key listing using the configured batch size
    pub async fn scan(&self, pattern: &str) -> Vec<String> {
        self.scan_with_batch(pattern, self.config.scan_batch_size)
            .await
    }

    /// Cursor-based key listing; walks pages until the cursor returns to 0.
    /// Returns keys without the store prefix, empty when disconnected or on
    /// error.
    pub async fn scan_with_batch(&self, pattern: &str, batch_size: usize) -> Vec<String> {
        if !self.connection.is_connected() {
            return Vec::new();
        }

        let full_pattern = self.full_key(pattern);
        let batch_size = batch_size.max(1);
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let page = self
                .execute("scan", || {
                    self.backend.scan(cursor, &full_pattern, batch_size)
                })
                .await;
            match page {
                Ok((next, keys)) => {
                    found.extend(keys);
                    cursor = next;
                    if cursor == 0 {
                        break;
                    }
                }
                Err(_) => return Vec::new(),
            }
        }

        // SCAN may report a key more than once
        found.sort();
        found.dedup();
        self.strip_prefixes(found)
    }

    /// Delete every key matching `pattern`, found via `scan`
    pub async fn delete_by_pattern(&self, pattern: &str) -> u64 {
        let keys = self.scan(pattern).await;
        if keys.is_empty() {
            return 0;
        }

        match self.del(&keys).await {
            Ok(deleted) => {
                debug!(pattern, deleted, "Cache pattern DEL");
                deleted
            }
            Err(_) => 0,
        }
    }

    /// Clear the whole database. Always refused in production.
    pub async fn flushdb(&self) -> bool {
        if self.environment.is_production() {
            warn!("Refusing FLUSHDB in production");
            return false;
        }
        if !self.connection.is_connected() {
            return false;
        }

        match self.execute("flushdb", || self.backend.flushdb()).await {
            Ok(()) => {
                warn!("Cache database flushed");
                true
            }
            Err(_) => false,
        }
    }

    // ---- metrics & health -------------------------------------------------

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Counters, hit and error rates, TTL policy table and a timestamp
    pub fn stats(&self) -> CacheStats {
        let metrics = self.metrics.snapshot();
        let state = self.connection.state();
        CacheStats {
            connected: state.is_connected(),
            state,
            hit_rate: metrics.hit_rate(),
            error_rate: metrics.error_rate(),
            metrics,
            ttl_policies: TtlPolicy::table(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Ping the store. Never fails; problems are reported in the result.
    pub async fn health_check(&self) -> HealthReport {
        if !self.connection.is_connected() {
            return HealthReport {
                healthy: false,
                latency_ms: None,
                connected: false,
                error: Some(CacheError::NotConnected.to_string()),
                stats: Some(self.stats()),
            };
        }

        let started = Instant::now();
        let probe = self.execute("ping", || self.backend.ping()).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match probe {
            Ok(reply) => HealthReport {
                healthy: reply == "PONG",
                latency_ms: Some(latency_ms),
                connected: self.connection.is_connected(),
                error: None,
                stats: Some(self.stats()),
            },
            Err(err) => HealthReport {
                healthy: false,
                latency_ms: Some(latency_ms),
                connected: false,
                error: Some(err.to_string()),
                stats: Some(self.stats()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    fn test_config() -> CacheConfig {
        CacheConfig {
            command_timeout_ms: 200,
            max_retries_per_request: 1,
            retry_step_ms: 5,
            retry_max_delay_ms: 10,
            ..CacheConfig::default()
        }
    }

    async fn connected(backend: Arc<MemoryBackend>) -> CacheManager {
        let manager = CacheManager::with_backend(test_config(), Environment::Test, backend);
        manager.connect().await.unwrap();
        manager
    }

    /// Delegates to a memory store but stalls every GET
    struct StallingBackend {
        inner: MemoryBackend,
        stall: Duration,
    }

    #[async_trait]
    impl CacheBackend for StallingBackend {
        fn name(&self) -> &'static str {
            "stalling"
        }
        async fn open(&self) -> BackendResult<()> {
            self.inner.open().await
        }
        async fn close(&self) {
            self.inner.close().await
        }
        async fn get(&self, key: &str) -> BackendResult<Option<String>> {
            tokio::time::sleep(self.stall).await;
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> BackendResult<()> {
            self.inner.set(key, value, ttl).await
        }
        async fn del(&self, keys: &[String]) -> BackendResult<u64> {
            self.inner.del(keys).await
        }
        async fn exists(&self, key: &str) -> BackendResult<bool> {
            self.inner.exists(key).await
        }
        async fn ttl(&self, key: &str) -> BackendResult<i64> {
            self.inner.ttl(key).await
        }
        async fn expire(&self, key: &str, ttl: u64) -> BackendResult<bool> {
            self.inner.expire(key, ttl).await
        }
        async fn keys(&self, pattern: &str) -> BackendResult<Vec<String>> {
            self.inner.keys(pattern).await
        }
        async fn scan(
            &self,
            cursor: u64,
            pattern: &str,
            count: usize,
        ) -> BackendResult<(u64, Vec<String>)> {
            self.inner.scan(cursor, pattern, count).await
        }
        async fn flushdb(&self) -> BackendResult<()> {
            self.inner.flushdb().await
        }
        async fn ping(&self) -> BackendResult<String> {
            self.inner.ping().await
        }
    }

    #[tokio::test]
    async fn keys_are_stored_under_the_store_prefix() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = connected(backend.clone()).await;

        assert!(manager.set("api:/v1/recipes", &json!({"ok": true}), 60).await.unwrap());
        assert!(backend.contains("recipe_app:api:/v1/recipes"));
        assert!(!backend.contains("api:/v1/recipes"));

        // An already-prefixed key is not prefixed twice
        let value: Option<Value> = manager.get("recipe_app:api:/v1/recipes").await.unwrap();
        assert_eq!(value, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn scan_returns_logical_keys() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = connected(backend.clone()).await;
        backend.insert_raw("recipe_app:search:a", "{}");
        backend.insert_raw("recipe_app:search:b", "{}");
        backend.insert_raw("other_app:search:c", "{}");

        let keys = manager.scan_with_batch("search:*", 1).await;
        assert_eq!(keys, vec!["search:a".to_string(), "search:b".to_string()]);
    }

    #[tokio::test]
    async fn type_mismatch_is_treated_as_corruption() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = connected(backend.clone()).await;
        manager.set("api:count", &json!({"n": 1}), 60).await.unwrap();

        let value: Option<Vec<u32>> = manager.get("api:count").await.unwrap();
        assert_eq!(value, None);
        assert!(!backend.contains("recipe_app:api:count"));
    }

    #[tokio::test]
    async fn slow_commands_time_out_into_safe_defaults() {
        let backend = Arc::new(StallingBackend {
            inner: MemoryBackend::new(),
            stall: Duration::from_millis(500),
        });
        let manager = CacheManager::with_backend(test_config(), Environment::Test, backend);
        manager.connect().await.unwrap();

        let started = Instant::now();
        let value: Option<Value> = manager.get("api:slow").await.unwrap();
        assert_eq!(value, None);
        assert!(started.elapsed() < Duration::from_millis(450));

        let metrics = manager.metrics();
        assert_eq!(metrics.errors, 1);
        assert_eq!(metrics.misses, 0);
        // A timeout is not a lost connection
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn lost_connection_recovers_through_supervisor() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = connected(backend.clone()).await;
        let mut events = manager.signals().subscribe();

        backend.set_available(false);
        assert!(!manager.set("api:x", &1, 60).await.unwrap());
        assert!(!manager.is_connected());
        assert!(matches!(
            manager.get::<Value>("api:x").await,
            Err(CacheError::NotConnected)
        ));

        backend.set_available(true);
        tokio::time::timeout(Duration::from_secs(2), async {
            while !manager.is_connected() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert!(manager.set("api:x", &1, 60).await.unwrap());

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(event.event_type);
        }
        use signal_system::EventType;
        assert_eq!(kinds.first(), Some(&EventType::Error));
        assert!(kinds.contains(&EventType::Reconnecting));
        assert_eq!(kinds.last(), Some(&EventType::Ready));
    }

    #[tokio::test]
    async fn disconnect_closes_and_is_idempotent() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = connected(backend.clone()).await;

        manager.disconnect().await;
        manager.disconnect().await;

        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(!backend.is_open());
        assert!(matches!(
            manager.set("api:x", &1, 60).await,
            Err(CacheError::NotConnected)
        ));

        // A fresh connect() revives a closed manager
        manager.connect().await.unwrap();
        assert!(manager.is_connected());
    }
}
