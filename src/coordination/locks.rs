//! Lock acquisition and release over the key/value store.

use crate::config::LockConfig;
use crate::errors::{LockError, MetaResult};
use crate::store::KeyValueStore;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Lock manager for one instance.
///
/// All waits poll the store at the configured interval until the watched
/// entry lazily expires, bounded by the configured ceiling. Acquisition for
/// a given key is serialized within the instance: a new set always waits
/// out any prior unexpired entry for that key first.
///
/// The set of lock ids this instance believes it holds is tracked locally
/// for best-effort release at shutdown. It is advisory cleanup state, not
/// a correctness mechanism; the store is never consulted to verify
/// ownership beyond comparing a lock's stored value.
pub struct LockManager {
    store: Arc<dyn KeyValueStore>,
    config: LockConfig,
    held: Mutex<HashSet<String>>,
}

impl LockManager {
    /// Create a new lock manager over the given store
    pub fn new(store: Arc<dyn KeyValueStore>, config: LockConfig) -> Self {
        Self {
            store,
            config,
            held: Mutex::new(HashSet::new()),
        }
    }

    /// Check whether a live entry exists for `lock_id`
    pub async fn exists(&self, lock_id: &str) -> MetaResult<bool> {
        Ok(self.store.exists(lock_id).await?)
    }

    /// Read the current value of a lock, if live
    pub async fn value(&self, lock_id: &str) -> MetaResult<Option<String>> {
        Ok(self.store.get(lock_id).await?)
    }

    /// Wait until no live entry exists for `lock_id`.
    ///
    /// Returns `false` when the lock was already absent, `true` when a wait
    /// occurred. Fails with [`LockError::MaxedOut`] once the total wait
    /// exceeds the configured ceiling.
    pub async fn await_expiration(&self, lock_id: &str) -> MetaResult<bool> {
        let mut live = self.store.exists(lock_id).await?;
        if live {
            info!(lock_id, "Waiting for lock to expire");
        }

        let mut waited = Duration::ZERO;
        while live {
            if let Some(max) = self.config.max_wait {
                if waited > max {
                    return Err(LockError::MaxedOut {
                        lock_id: lock_id.to_string(),
                        waited,
                        max,
                    }
                    .into());
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
            waited += self.config.poll_interval;
            live = self.store.exists(lock_id).await?;
        }

        self.held.lock().remove(lock_id);
        Ok(waited > Duration::ZERO)
    }

    /// Acquire `lock_id` for `ttl`, first waiting out any live entry.
    ///
    /// `value` defaults to a fresh UUID. With `overwrite` false the
    /// underlying set requires the key to be absent, so a concurrent
    /// instance that set the key between our poll and our set wins and
    /// this returns `false`.
    pub async fn set_lock(
        &self,
        lock_id: &str,
        ttl: Duration,
        value: Option<&str>,
        overwrite: bool,
    ) -> MetaResult<bool> {
        self.await_expiration(lock_id).await?;

        debug!(lock_id, ttl_ms = ttl.as_millis() as u64, overwrite, "Setting lock");
        let value = match value {
            Some(v) => v.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        let set = self
            .store
            .conditional_set(lock_id, &value, ttl, !overwrite)
            .await?;

        if set {
            self.held.lock().insert(lock_id.to_string());
        }
        Ok(set)
    }

    /// Unconditionally release a lock
    pub async fn release(&self, lock_id: &str) -> MetaResult<()> {
        debug!(lock_id, "Releasing lock");
        self.store.delete(lock_id).await?;
        self.held.lock().remove(lock_id);
        Ok(())
    }

    /// Best-effort release of every lock this instance believes it holds.
    ///
    /// Called at shutdown; failures are surfaced to the caller but the
    /// held-set is drained regardless so a retry does not double-release.
    pub async fn release_all(&self) -> MetaResult<()> {
        let held: Vec<String> = self.held.lock().drain().collect();
        info!(count = held.len(), "Releasing all held locks");
        for lock_id in held {
            self.store.delete(&lock_id).await?;
        }
        Ok(())
    }

    /// Number of locks currently tracked as held
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}
