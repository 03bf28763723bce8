//! Redis-backed atomic store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::time::Duration;
use tracing::info;

use crate::config::LockConfig;
use crate::error::{LockError, Result};
use crate::traits::AtomicStore;

/// Atomic store over Redis.
///
/// Acquisition maps to `SET key value NX PX ttl`; the compare-guarded
/// operations run as Lua scripts so the value check and the mutation are a
/// single indivisible server-side step. The scripts are owned by the store
/// and built once at construction.
pub struct RedisStore {
    conn: ConnectionManager,
    command_timeout: Duration,
    refresh_script: Script,
    release_script: Script,
}

impl RedisStore {
    /// Connect to Redis using the given configuration.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use leaselock::{LockConfig, RedisStore};
    ///
    /// let config = LockConfig::new("redis://127.0.0.1:6379");
    /// let store = RedisStore::new(&config).await?;
    /// ```
    pub async fn new(config: &LockConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| LockError::Connection(e.to_string()))?;

        let conn = tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| LockError::Timeout)?
            .map_err(|e| LockError::Connection(e.to_string()))?;

        info!(url = %config.url, "connected lock store");

        Ok(Self::from_connection(conn, config.command_timeout))
    }

    /// Create a store from an existing connection manager.
    pub fn from_connection(conn: ConnectionManager, command_timeout: Duration) -> Self {
        Self {
            conn,
            command_timeout,
            refresh_script: Script::new(
                r#"
                if redis.call("get", KEYS[1]) == ARGV[1] then
                    return redis.call("pexpire", KEYS[1], ARGV[2])
                else
                    return 0
                end
                "#,
            ),
            release_script: Script::new(
                r#"
                if redis.call("get", KEYS[1]) == ARGV[1] then
                    return redis.call("del", KEYS[1])
                else
                    return 0
                end
                "#,
            ),
        }
    }

    /// Bound a store call by the configured command timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(LockError::Timeout),
        }
    }
}

#[async_trait]
impl AtomicStore for RedisStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();

        let set: Option<String> = self
            .bounded(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl.as_millis() as u64)
                    .query_async(&mut conn),
            )
            .await?;

        Ok(set.is_some())
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        new_ttl: Duration,
    ) -> Result<bool> {
        let mut conn = self.conn.clone();

        let extended: i32 = self
            .bounded(
                self.refresh_script
                    .key(key)
                    .arg(expected)
                    .arg(new_ttl.as_millis() as u64)
                    .invoke_async(&mut conn),
            )
            .await?;

        Ok(extended == 1)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let mut conn = self.conn.clone();

        let deleted: i32 = self
            .bounded(
                self.release_script
                    .key(key)
                    .arg(expected)
                    .invoke_async(&mut conn),
            )
            .await?;

        Ok(deleted == 1)
    }

    async fn current_token(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = self.bounded(conn.get(key)).await?;
        Ok(value)
    }

    async fn time_to_live(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.conn.clone();

        // PTTL reports -2 for a missing key and -1 for a key without expiry.
        let pttl: i64 = self
            .bounded(redis::cmd("PTTL").arg(key).query_async(&mut conn))
            .await?;

        if pttl < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_millis(pttl as u64)))
        }
    }
}
