//! Atomic store trait definition.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Atomic primitives over the external key-value store.
///
/// All mutual exclusion is delegated to the atomicity of these operations;
/// no implementation may substitute a read followed by a write for a
/// compare-guarded mutation, since that reopens the race window between
/// check and act.
#[async_trait]
pub trait AtomicStore: Send + Sync + 'static {
    /// Set `key` to `value` with expiry `ttl` only if the key is absent.
    ///
    /// # Returns
    ///
    /// Returns `Ok(true)` if the key was absent and is now set,
    /// `Ok(false)` if another value is already present.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Reset the expiry of `key` to `new_ttl` only if the stored value
    /// equals `expected`.
    ///
    /// # Returns
    ///
    /// Returns `Ok(true)` only on a token match; `Ok(false)` means the key
    /// is absent or held by a different value.
    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        new_ttl: Duration,
    ) -> Result<bool>;

    /// Delete `key` only if the stored value equals `expected`.
    ///
    /// # Returns
    ///
    /// Returns `Ok(true)` only if the key existed with the expected value
    /// and was removed.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool>;

    /// Read the value currently stored under `key`, if any.
    ///
    /// Diagnostic probe; never use its result to guard a mutation.
    async fn current_token(&self, key: &str) -> Result<Option<String>>;

    /// Remaining time to live of `key`, or `None` if the key is absent or
    /// carries no expiry.
    async fn time_to_live(&self, key: &str) -> Result<Option<Duration>>;
}
