//! In-memory atomic store for local development and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::Result;
use crate::traits::AtomicStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Single-process atomic store.
///
/// Expiry is tracked against the tokio clock, so paused-clock tests can
/// drive lease timing deterministically. Not distributed; use
/// [`RedisStore`](crate::RedisStore) for anything spanning processes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_live(entry: &Entry, now: Instant) -> bool {
    entry.expires_at > now
}

#[async_trait]
impl AtomicStore for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        match entries.get(key) {
            Some(entry) if is_live(entry, now) => Ok(false),
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: value.to_string(),
                        expires_at: now + ttl,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        new_ttl: Duration,
    ) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        if let Some(entry) = entries.get_mut(key) {
            if is_live(entry, now) {
                if entry.value == expected {
                    entry.expires_at = now + new_ttl;
                    return Ok(true);
                }
                return Ok(false);
            }
        } else {
            return Ok(false);
        }

        // The entry has lapsed; drop it eagerly, as the store's own expiry
        // would have.
        entries.remove(key);
        Ok(false)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let (live, matched) = match entries.get(key) {
            Some(entry) => (is_live(entry, now), entry.value == expected),
            None => return Ok(false),
        };

        if live && matched {
            entries.remove(key);
            return Ok(true);
        }
        if !live {
            entries.remove(key);
        }
        Ok(false)
    }

    async fn current_token(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        let now = Instant::now();

        Ok(entries
            .get(key)
            .filter(|entry| is_live(entry, now))
            .map(|entry| entry.value.clone()))
    }

    async fn time_to_live(&self, key: &str) -> Result<Option<Duration>> {
        let entries = self.entries.lock().await;
        let now = Instant::now();

        Ok(entries
            .get(key)
            .filter(|entry| is_live(entry, now))
            .map(|entry| entry.expires_at - now))
    }
}
