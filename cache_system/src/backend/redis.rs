//! Redis backend over a multiplexed async connection
//!
//! One `MultiplexedConnection` is shared by every caller; it is cloned per
//! command and the clones pipeline over the same socket.

use super::CacheBackend;
use crate::errors::{BackendError, BackendResult, CacheError};
use async_trait::async_trait;
use config::CacheConfig;
use redis::aio::MultiplexedConnection;
use redis::{Client, IntoConnectionInfo};
use std::fmt::Debug;
use std::time::Duration;
use tokio::sync::RwLock;

/// Redis-backed store
pub struct RedisBackend {
    client: Client,
    connect_timeout: Duration,
    connection: RwLock<Option<MultiplexedConnection>>,
}

impl Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connection_status = match self.connection.try_read() {
            Ok(connection) => {
                if connection.is_some() {
                    "open"
                } else {
                    "closed"
                }
            }
            Err(_) => "lock_busy",
        };

        f.debug_struct("RedisBackend")
            .field("connect_timeout", &self.connect_timeout)
            .field("connection", &connection_status)
            .finish()
    }
}

impl RedisBackend {
    /// Create a client for the configured node; no connection is made yet
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let url = format!("redis://{}:{}/{}", config.host, config.port, config.db);
        let mut info = url
            .as_str()
            .into_connection_info()
            .map_err(|e| CacheError::Config(format!("invalid Redis address: {}", e)))?;
        info.redis.password = config.password.clone();

        let client = Client::open(info)
            .map_err(|e| CacheError::Config(format!("failed to create Redis client: {}", e)))?;

        Ok(Self {
            client,
            connect_timeout: config.connect_timeout(),
            connection: RwLock::new(None),
        })
    }

    async fn connection(&self) -> BackendResult<MultiplexedConnection> {
        self.connection
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or_else(|| BackendError::Connection("no open Redis connection".to_string()))
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn open(&self) -> BackendResult<()> {
        let connection = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            BackendError::Connection(format!("connect timed out after {:?}", self.connect_timeout))
        })?
        .map_err(|e| BackendError::Connection(e.to_string()))?;

        *self.connection.write().await = Some(connection);
        Ok(())
    }

    async fn close(&self) {
        // The socket closes once in-flight clones finish
        self.connection.write().await.take();
    }

    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> BackendResult<()> {
        let mut conn = self.connection().await?;
        match ttl_seconds {
            Some(ttl) => {
                redis::cmd("SETEX")
                    .arg(key)
                    .arg(ttl)
                    .arg(value)
                    .query_async::<()>(&mut conn)
                    .await?
            }
            None => {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .query_async::<()>(&mut conn)
                    .await?
            }
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> BackendResult<u64> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key);
        }
        let deleted: u64 = cmd.query_async(&mut conn).await?;
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> BackendResult<bool> {
        let mut conn = self.connection().await?;
        let count: u64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(count > 0)
    }

    async fn ttl(&self, key: &str) -> BackendResult<i64> {
        let mut conn = self.connection().await?;
        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        Ok(ttl)
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> BackendResult<bool> {
        let mut conn = self.connection().await?;
        let updated: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(updated == 1)
    }

    async fn keys(&self, pattern: &str) -> BackendResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
        Ok(keys)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> BackendResult<(u64, Vec<String>)> {
        let mut conn = self.connection().await?;
        let page: (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok(page)
    }

    async fn flushdb(&self) -> BackendResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> BackendResult<String> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong)
    }
}
