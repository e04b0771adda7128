//! Meta client implementation.
//!
//! Wires the configuration, stores, coordination, credentials and
//! services together once at startup (plain constructor injection, no
//! runtime container) and owns graceful shutdown.

use crate::config::EnvironmentConfig;
use crate::coordination::{LockManager, ThrottleCoordinator};
use crate::credentials::{CredentialCache, MemorySecretStore, SecretStore};
use crate::errors::MetaResult;
use crate::executor::ExecutorContext;
use crate::resilience::{BackoffPolicy, Classifier, HintedBackoff};
use crate::services::{UserPoller, UserService};
use crate::storage::{CustomerStore, MemoryCustomerStore};
use crate::store::{KeyValueStore, MemoryStore};
use crate::transport::{HttpTransport, ReqwestTransport};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Main client: one instance of the polling service fleet
pub struct MetaClient {
    config: Arc<EnvironmentConfig>,
    store: Arc<dyn KeyValueStore>,
    locks: Arc<LockManager>,
    users: UserService,
    poller: Arc<UserPoller>,
    instance_id: String,
}

impl MetaClient {
    /// Create a client with default collaborators
    pub fn new(config: EnvironmentConfig) -> MetaResult<Self> {
        Self::builder(config).build()
    }

    /// Create a builder to override collaborators (store, transport, ...)
    pub fn builder(config: EnvironmentConfig) -> MetaClientBuilder {
        MetaClientBuilder::new(config)
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Identifier this instance uses in the recovery election
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// The user service
    pub fn users(&self) -> &UserService {
        &self.users
    }

    /// The polling service
    pub fn poller(&self) -> Arc<UserPoller> {
        self.poller.clone()
    }

    /// Graceful shutdown: stop scheduling, best-effort release of every
    /// lock this instance believes it holds, then close the store
    /// connection. In-flight attempts are left to finish on their own.
    pub async fn shutdown(&self) {
        info!(instance_id = %self.instance_id, "Shutting down");
        self.poller.stop();
        if let Err(e) = self.locks.release_all().await {
            warn!(error = %e, "Failed to release locks during shutdown");
        }
        if let Err(e) = self.store.close().await {
            warn!(error = %e, "Failed to close store connection during shutdown");
        }
    }
}

/// Builder for [`MetaClient`]
pub struct MetaClientBuilder {
    config: EnvironmentConfig,
    instance_id: Option<String>,
    store: Option<Arc<dyn KeyValueStore>>,
    secrets: Option<Arc<dyn SecretStore>>,
    transport: Option<Arc<dyn HttpTransport>>,
    customer_store: Option<Arc<dyn CustomerStore>>,
    policy: Option<Arc<dyn BackoffPolicy>>,
}

impl MetaClientBuilder {
    /// Create a builder over the given configuration
    pub fn new(config: EnvironmentConfig) -> Self {
        Self {
            config,
            instance_id: None,
            store: None,
            secrets: None,
            transport: None,
            customer_store: None,
            policy: None,
        }
    }

    /// Set the instance id used in the recovery election.
    ///
    /// Defaults to a fresh UUID; deployments with stable task identifiers
    /// (e.g. a container task ARN suffix) should pass those instead.
    pub fn instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    /// Set the shared key/value store
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the secret store
    pub fn secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Set the HTTP transport
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the customer data store
    pub fn customer_store(mut self, store: Arc<dyn CustomerStore>) -> Self {
        self.customer_store = Some(store);
        self
    }

    /// Set the backoff policy
    pub fn policy(mut self, policy: Arc<dyn BackoffPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Build the client
    pub fn build(self) -> MetaResult<MetaClient> {
        let config = Arc::new(self.config);
        let instance_id = self
            .instance_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
        let secrets = self.secrets.unwrap_or_else(|| {
            Arc::new(MemorySecretStore::new(config.stage.clone())) as Arc<dyn SecretStore>
        });
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(config.http_timeout())?),
        };
        let customer_store = self
            .customer_store
            .unwrap_or_else(|| Arc::new(MemoryCustomerStore::new()) as Arc<dyn CustomerStore>);
        let policy = self.policy.unwrap_or_else(|| {
            Arc::new(HintedBackoff::new(config.platform.user_fetch.retry.clone()))
                as Arc<dyn BackoffPolicy>
        });

        let locks = Arc::new(LockManager::new(store.clone(), config.lock.clone()));
        let coordinator = ThrottleCoordinator::new(locks.clone(), instance_id.clone());
        let credentials = Arc::new(CredentialCache::new(
            store.clone(),
            secrets,
            config.credentials.token_validation_ttl,
        ));

        let ctx = ExecutorContext {
            transport,
            coordinator,
            credentials,
            classifier: Classifier::new(config.platform.throttle_detection.clone()),
            usage: config.platform.usage.clone(),
        };

        let users = UserService::new(config.clone(), ctx, policy);
        let poller = Arc::new(UserPoller::new(
            Arc::new(users.clone()),
            customer_store,
            config.poller.clone(),
        ));

        info!(instance_id = %instance_id, stage = %config.stage, "Meta client initialized");
        Ok(MetaClient {
            config,
            store,
            locks,
            users,
            poller,
            instance_id,
        })
    }
}
