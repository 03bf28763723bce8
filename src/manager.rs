//! High-level lock manager.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::LockConfig;
use crate::error::{LockError, Result};
use crate::lock::Lock;
use crate::redis_store::RedisStore;
use crate::retry::RetryPolicy;
use crate::traits::AtomicStore;

/// Facade that acquires locks against an atomic store.
///
/// Acquisition is a single store round trip: the manager never polls or
/// retries on conflict, since retry and backoff policy belongs to the
/// caller. Any number of managers in any number of processes may race
/// `acquire` for the same key; the store's set-if-absent serializes the
/// outcome so exactly one wins.
pub struct LockManager<S: AtomicStore> {
    store: Arc<S>,
    key_prefix: Option<String>,
    retry: RetryPolicy,
}

impl<S: AtomicStore> Clone for LockManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key_prefix: self.key_prefix.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl LockManager<RedisStore> {
    /// Connect to Redis and build a manager from the configuration.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use leaselock::{LockConfig, LockManager};
    ///
    /// let config = LockConfig::from_env().build();
    /// let manager = LockManager::connect(config).await?;
    /// ```
    pub async fn connect(config: LockConfig) -> Result<Self> {
        let store = RedisStore::new(&config).await?;
        Ok(Self::with_config(store, &config))
    }
}

impl<S: AtomicStore> LockManager<S> {
    /// Create a manager over an existing store.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            key_prefix: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Create a manager over an existing store, taking the key prefix and
    /// retry policy from the configuration.
    pub fn with_config(store: S, config: &LockConfig) -> Self {
        Self {
            store: Arc::new(store),
            key_prefix: config.key_prefix.clone(),
            retry: config.retry.clone(),
        }
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Set the renewal retry policy handed to acquired locks.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Acquire the lock for `key` with the given lease duration.
    ///
    /// Generates a fresh token and performs exactly one
    /// set-if-absent round trip. [`LockError::AlreadyLocked`] means another
    /// holder's entry is present; that result is definitive and not retried
    /// here.
    pub async fn acquire(&self, key: &str, lease: Duration) -> Result<Lock<S>> {
        if lease.is_zero() {
            return Err(LockError::Config(
                "lease duration must be non-zero".to_string(),
            ));
        }

        let key = self.build_key(key);
        let token = Uuid::new_v4().to_string();

        if self.store.set_if_absent(&key, &token, lease).await? {
            info!(key = %key, lease_ms = lease.as_millis() as u64, "acquired lock");
            Ok(Lock::new(
                key,
                token,
                lease,
                Arc::clone(&self.store),
                self.retry.clone(),
            ))
        } else {
            debug!(key = %key, "failed to acquire lock (already held)");
            Err(LockError::AlreadyLocked(key))
        }
    }

    /// Token of the current holder of `key`, if any. Diagnostic probe.
    pub async fn holder(&self, key: &str) -> Result<Option<String>> {
        self.store.current_token(&self.build_key(key)).await
    }

    /// Remaining lease of `key`, if the key exists and carries an expiry.
    /// Diagnostic probe.
    pub async fn remaining_lease(&self, key: &str) -> Result<Option<Duration>> {
        self.store.time_to_live(&self.build_key(key)).await
    }

    fn build_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn test_acquire_conflict_is_definitive() {
        let manager = LockManager::new(MemoryStore::new());

        let mut first = manager
            .acquire("job-1", Duration::from_secs(15))
            .await
            .unwrap();
        let err = manager
            .acquire("job-1", Duration::from_secs(15))
            .await
            .unwrap_err();

        assert!(matches!(err, LockError::AlreadyLocked(_)));
        first.release().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_prefix_scopes_locks() {
        let store = MemoryStore::new();
        let blue = LockManager::new(store.clone()).with_key_prefix("blue");
        let green = LockManager::new(store.clone()).with_key_prefix("green");

        // Same logical key, different scopes: both acquisitions succeed.
        let mut a = blue.acquire("job-1", Duration::from_secs(15)).await.unwrap();
        let mut b = green
            .acquire("job-1", Duration::from_secs(15))
            .await
            .unwrap();

        assert_eq!(a.key(), "blue:job-1");
        assert_eq!(
            store.current_token("green:job-1").await.unwrap().as_deref(),
            Some(b.token())
        );

        a.release().await.unwrap();
        b.release().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_holder_reports_the_winning_token() {
        let manager = LockManager::new(MemoryStore::new());

        assert_eq!(manager.holder("job-1").await.unwrap(), None);

        let mut lock = manager
            .acquire("job-1", Duration::from_secs(15))
            .await
            .unwrap();
        assert_eq!(
            manager.holder("job-1").await.unwrap().as_deref(),
            Some(lock.token())
        );

        lock.release().await.unwrap();
        assert_eq!(manager.holder("job-1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_lease_is_rejected() {
        let manager = LockManager::new(MemoryStore::new());
        let err = manager.acquire("job-1", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, LockError::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_are_unique_per_acquisition() {
        let manager = LockManager::new(MemoryStore::new());

        let mut first = manager
            .acquire("job-1", Duration::from_secs(15))
            .await
            .unwrap();
        let first_token = first.token().to_string();
        first.release().await.unwrap();

        let mut second = manager
            .acquire("job-1", Duration::from_secs(15))
            .await
            .unwrap();
        assert_ne!(second.token(), first_token);
        second.release().await.unwrap();
    }
}
