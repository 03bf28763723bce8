//! # Leaselock
//!
//! Distributed mutual-exclusion locks over a shared atomic key-value
//! store, with Redis as the primary backend.
//!
//! ## Features
//!
//! - **Atomic Acquisition** - single `SET NX PX` round trip, exactly one
//!   winner per key across any number of processes
//! - **Token-Guarded Release** - compare-and-delete server-side scripts,
//!   so only the rightful holder can release or extend
//! - **Lease Auto-Renewal** - background refresher with bounded
//!   retry-with-backoff and a single terminal-error slot
//! - **Pluggable Store** - [`AtomicStore`] trait with Redis and in-memory
//!   implementations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leaselock::{LockConfig, LockManager};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LockConfig::builder()
//!         .url("redis://127.0.0.1:6379")
//!         .build();
//!     let manager = LockManager::connect(config).await?;
//!
//!     // Exactly one process at a time gets this lock.
//!     let mut lock = manager.acquire("jobs:nightly-report", Duration::from_secs(15)).await?;
//!
//!     // Keep the lease alive while the work runs.
//!     let mut refresher = lock.auto_refresh(Duration::from_secs(1), Duration::from_secs(15))?;
//!
//!     tokio::select! {
//!         err = refresher.recv() => {
//!             // Lock lost (or renewal gave up): roll back.
//!             eprintln!("lost the lock: {:?}", err);
//!         }
//!         _ = run_nightly_report() => {}
//!     }
//!
//!     lock.release().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Losing a lock
//!
//! A lease can vanish underneath a holder (expiry during a stall, a rival
//! acquiring afterwards). The refresher reports that as
//! [`LockError::RefreshLost`]; transport trouble that exhausts the retry
//! budget surfaces as the transport error itself, because "store
//! unreachable" means the lock state is unknown, not lost. Use
//! [`LockError::is_ownership_loss`] to tell the two apart.

mod config;
mod error;
mod lock;
mod manager;
mod memory_store;
mod redis_store;
mod refresh;
mod retry;
mod traits;

pub use config::{LockConfig, LockConfigBuilder};
pub use error::{LockError, Result};
pub use lock::{Lock, LockState};
pub use manager::LockManager;
pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use refresh::Refresher;
pub use retry::{Backoff, RetryPolicy};
pub use traits::AtomicStore;

// Re-export redis crate for convenience
pub use redis;

/// Prelude for common imports.
///
/// ```
/// use leaselock::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{LockConfig, LockConfigBuilder};
    pub use crate::error::{LockError, Result};
    pub use crate::lock::{Lock, LockState};
    pub use crate::manager::LockManager;
    pub use crate::redis_store::RedisStore;
    pub use crate::refresh::Refresher;
    pub use crate::retry::RetryPolicy;
    pub use crate::traits::AtomicStore;
}
