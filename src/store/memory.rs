//! In-memory key/value store with TTL-based lazy expiry.

use super::{KeyValueStore, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

struct StoredEntry {
    value: String,
    expires_at: Instant,
}

impl StoredEntry {
    fn is_live(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

/// Map-backed [`KeyValueStore`] implementation.
///
/// Entries are replaced, never mutated in place; expired entries are
/// treated as absent on read and pruned lazily. Wrap in an `Arc` to share
/// one store between components (or, in tests, between simulated
/// instances).
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries (expired entries are not counted)
    pub fn live_len(&self) -> usize {
        let entries = self.entries.lock();
        entries.values().filter(|e| e.is_live()).count()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        require_absent: bool,
    ) -> StoreResult<bool> {
        let mut entries = self.entries.lock();

        if require_absent {
            if let Some(existing) = entries.get(key) {
                if existing.is_live() {
                    debug!(key, "Conditional set refused, live entry present");
                    return Ok(false);
                }
            }
        }

        entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        assert!(store
            .conditional_set("k", "v", Duration::from_secs(10), false)
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_lazy_expiry() {
        let store = MemoryStore::new();
        store
            .conditional_set("k", "v", Duration::from_millis(20), false)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_require_absent_refused_on_live_entry() {
        let store = MemoryStore::new();
        store
            .conditional_set("k", "original", Duration::from_millis(60), false)
            .await
            .unwrap();

        let set = store
            .conditional_set("k", "intruder", Duration::from_secs(60), true)
            .await
            .unwrap();
        assert!(!set);

        // value untouched by the failed set
        assert_eq!(store.get("k").await.unwrap(), Some("original".to_string()));

        // expiry untouched too: original TTL still applies
        tokio::time::sleep(Duration::from_millis(90)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_require_absent_succeeds_after_expiry() {
        let store = MemoryStore::new();
        store
            .conditional_set("k", "first", Duration::from_millis(20), true)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store
            .conditional_set("k", "second", Duration::from_secs(10), true)
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("second".to_string()));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store
            .conditional_set("k", "v", Duration::from_secs(10), false)
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
