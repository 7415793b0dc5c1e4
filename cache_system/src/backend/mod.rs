//! Backing store abstraction
//!
//! The manager talks to the store only through [`CacheBackend`]. Keys
//! passed here are fully qualified (store prefix included).

pub mod memory;
pub mod redis;

use crate::errors::BackendResult;
use async_trait::async_trait;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

/// Primitive commands the cache manager needs from a key-value store
#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Open (or re-open) the connection
    async fn open(&self) -> BackendResult<()>;

    /// Drop the connection; commands fail until the next `open`
    async fn close(&self);

    async fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Write a value; `None` writes without expiry
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> BackendResult<()>;

    /// Remove keys, returning how many existed
    async fn del(&self, keys: &[String]) -> BackendResult<u64>;

    async fn exists(&self, key: &str) -> BackendResult<bool>;

    /// Remaining TTL in seconds: -1 without expiry, -2 when missing
    async fn ttl(&self, key: &str) -> BackendResult<i64>;

    async fn expire(&self, key: &str, ttl_seconds: u64) -> BackendResult<bool>;

    /// Blocking full listing of keys matching a glob
    async fn keys(&self, pattern: &str) -> BackendResult<Vec<String>>;

    /// One page of a cursor scan; a returned cursor of 0 ends the scan
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> BackendResult<(u64, Vec<String>)>;

    async fn flushdb(&self) -> BackendResult<()>;

    async fn ping(&self) -> BackendResult<String>;
}
