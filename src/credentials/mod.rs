//! Customer access-token management.
//!
//! Tokens live in an external secret store and are cached per process.
//! A distributed freshness marker (a TTL key in the shared store) controls
//! revalidation: when the marker expires, every instance refetches from
//! the secret store within one TTL window. Tokens can therefore be
//! rotated or revoked externally without redeploying.

use crate::errors::{MetaResult, SecretError};
use crate::store::KeyValueStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Freshness marker key for a customer's access token
pub fn token_validation_key(customer: &str) -> String {
    format!("token-validation::customer::{customer}")
}

/// Secret store boundary.
///
/// Production deployments back this with a managed secrets service; paths
/// are qualified with the deployment stage inside the implementation.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the secret stored at `path`
    async fn get(&self, path: &str) -> MetaResult<SecretString>;

    /// Store a secret at `path`
    async fn set(&self, path: &str, secret: SecretString) -> MetaResult<()>;
}

/// Map-backed [`SecretStore`] for tests and local runs
pub struct MemorySecretStore {
    stage: String,
    secrets: Mutex<HashMap<String, SecretString>>,
}

impl MemorySecretStore {
    /// Create an empty store for the given stage
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            secrets: Mutex::new(HashMap::new()),
        }
    }

    fn qualified(&self, path: &str) -> String {
        format!("{}/{path}", self.stage)
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, path: &str) -> MetaResult<SecretString> {
        let qualified = self.qualified(path);
        self.secrets
            .lock()
            .get(&qualified)
            .cloned()
            .ok_or_else(|| SecretError::NotFound { path: qualified }.into())
    }

    async fn set(&self, path: &str, secret: SecretString) -> MetaResult<()> {
        let qualified = self.qualified(path);
        debug!(path = %qualified, "Storing secret");
        self.secrets.lock().insert(qualified, secret);
        Ok(())
    }
}

/// Per-customer access-token cache with a distributed freshness marker
pub struct CredentialCache {
    store: Arc<dyn KeyValueStore>,
    secrets: Arc<dyn SecretStore>,
    validation_ttl: Duration,
    local: Mutex<HashMap<String, SecretString>>,
}

impl CredentialCache {
    /// Create a cache over the shared store and the secret store
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        secrets: Arc<dyn SecretStore>,
        validation_ttl: Duration,
    ) -> Self {
        Self {
            store,
            secrets,
            validation_ttl,
            local: Mutex::new(HashMap::new()),
        }
    }

    /// Get a validated-fresh access token for `customer`.
    ///
    /// Refetches from the secret store when no local value exists or the
    /// distributed marker has expired, re-arming the marker either way.
    pub async fn access_token(&self, customer: &str) -> MetaResult<SecretString> {
        let marker_key = token_validation_key(customer);
        let marker_live = self.store.exists(&marker_key).await?;
        let local = self.local.lock().get(customer).cloned();

        if let Some(token) = local {
            if marker_live {
                return Ok(token);
            }
            info!(customer, "Access token marker expired, refreshing");
        }

        let token = self.secrets.get(customer).await?;
        self.store
            .conditional_set(&marker_key, "true", self.validation_ttl, false)
            .await?;
        self.local
            .lock()
            .insert(customer.to_string(), token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use secrecy::ExposeSecret;

    const CUSTOMER: &str = "acme";

    fn cache_with(
        store: Arc<MemoryStore>,
        secrets: Arc<MemorySecretStore>,
        ttl: Duration,
    ) -> CredentialCache {
        CredentialCache::new(store, secrets, ttl)
    }

    #[tokio::test]
    async fn test_fetches_and_arms_marker_on_first_use() {
        let store = Arc::new(MemoryStore::new());
        let secrets = Arc::new(MemorySecretStore::new("dev"));
        secrets
            .set(CUSTOMER, SecretString::new("token-1".to_string()))
            .await
            .unwrap();

        let cache = cache_with(store.clone(), secrets, Duration::from_secs(60));
        let token = cache.access_token(CUSTOMER).await.unwrap();
        assert_eq!(token.expose_secret(), "token-1");
        assert!(store
            .exists(&token_validation_key(CUSTOMER))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_reuses_local_value_while_marker_live() {
        let store = Arc::new(MemoryStore::new());
        let secrets = Arc::new(MemorySecretStore::new("dev"));
        secrets
            .set(CUSTOMER, SecretString::new("token-1".to_string()))
            .await
            .unwrap();

        let cache = cache_with(store, secrets.clone(), Duration::from_secs(60));
        cache.access_token(CUSTOMER).await.unwrap();

        // rotation is not picked up until the marker lapses
        secrets
            .set(CUSTOMER, SecretString::new("token-2".to_string()))
            .await
            .unwrap();
        let token = cache.access_token(CUSTOMER).await.unwrap();
        assert_eq!(token.expose_secret(), "token-1");
    }

    #[tokio::test]
    async fn test_marker_expiry_forces_refresh() {
        let store = Arc::new(MemoryStore::new());
        let secrets = Arc::new(MemorySecretStore::new("dev"));
        secrets
            .set(CUSTOMER, SecretString::new("token-1".to_string()))
            .await
            .unwrap();

        let cache = cache_with(store, secrets.clone(), Duration::from_millis(20));
        cache.access_token(CUSTOMER).await.unwrap();

        secrets
            .set(CUSTOMER, SecretString::new("token-2".to_string()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let token = cache.access_token(CUSTOMER).await.unwrap();
        assert_eq!(token.expose_secret(), "token-2");
    }

    #[tokio::test]
    async fn test_missing_secret_propagates() {
        let store = Arc::new(MemoryStore::new());
        let secrets = Arc::new(MemorySecretStore::new("dev"));
        let cache = cache_with(store, secrets, Duration::from_secs(60));

        let err = cache.access_token("unknown").await.unwrap_err();
        assert_eq!(err.error_code(), "META_SECRET");
        assert!(err.to_string().contains("dev/unknown"));
    }
}
