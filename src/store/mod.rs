//! Key/value lock store contract.
//!
//! The throttle-coordination protocol only needs three operations from its
//! store: an atomic conditional set with a TTL, a lazy-expiry read, and an
//! unconditional delete. Each key is an independent resource; no cross-key
//! transactions are required. Mutual exclusion across instances rests
//! entirely on the backend's conditional set being atomic.

mod memory;

pub use memory::MemoryStore;

use crate::errors::StoreError;
use async_trait::async_trait;
use std::time::Duration;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store contract required by the lock coordination layer.
///
/// In production this is backed by a networked key/value store with native
/// TTLs and an atomic set-if-absent primitive; [`MemoryStore`] backs tests
/// and single-host deployments.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Atomically set `key` to `value` with the given TTL.
    ///
    /// With `require_absent`, the set succeeds only when no live
    /// (non-expired) entry exists and returns `false` otherwise, leaving
    /// the existing entry's value and expiry untouched.
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        require_absent: bool,
    ) -> StoreResult<bool>;

    /// Read a key; an entry past its TTL is treated as absent even if not
    /// physically deleted.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Unconditionally remove a key.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Check whether a live entry exists for `key`.
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Close the backend connection. No-op for backends without one.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
