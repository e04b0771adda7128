//! Service-level tests through the fully wired client.

use crate::client::MetaClient;
use crate::config::EnvironmentConfig;
use crate::coordination::throttle_lock_id;
use crate::credentials::{MemorySecretStore, SecretStore};
use crate::errors::ErrorKind;
use crate::fixtures;
use crate::mocks::{MockResponse, MockTransport, StubBackoffPolicy};
use crate::services::UserServiceTrait;
use crate::storage::MemoryCustomerStore;
use crate::store::{KeyValueStore, MemoryStore};
use crate::types::UserDetails;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

const CUSTOMER: &str = "dummy_customer_name";

fn test_config() -> EnvironmentConfig {
    EnvironmentConfig::builder()
        .lock_poll_interval(Duration::from_millis(10))
        .stage("dev")
        .build()
        .unwrap()
}

async fn seeded_secrets() -> Arc<MemorySecretStore> {
    let secrets = Arc::new(MemorySecretStore::new("dev"));
    secrets
        .set(CUSTOMER, SecretString::new("token-1".to_string()))
        .await
        .unwrap();
    secrets
}

async fn client_with(
    config: EnvironmentConfig,
    store: Arc<MemoryStore>,
    transport: Arc<MockTransport>,
    policy: Arc<StubBackoffPolicy>,
    customer_store: Arc<MemoryCustomerStore>,
) -> MetaClient {
    MetaClient::builder(config)
        .instance_id("instance-a")
        .store(store)
        .secrets(seeded_secrets().await)
        .transport(transport)
        .policy(policy)
        .customer_store(customer_store)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_successful_fetch_produces_data_outcome() {
    let transport = Arc::new(MockTransport::new().with_response(MockResponse::user_ok()));
    let policy = Arc::new(StubBackoffPolicy::never());
    let client = client_with(
        test_config(),
        Arc::new(MemoryStore::new()),
        transport.clone(),
        policy.clone(),
        Arc::new(MemoryCustomerStore::new()),
    )
    .await;

    let outcome = client.users().get_user_info(CUSTOMER).await;

    assert!(outcome.success);
    assert_eq!(
        outcome.data,
        Some(UserDetails {
            id: "1234567890".to_string(),
            name: "Jane".to_string(),
            last_name: Some("Doe".to_string()),
        })
    );
    assert!(outcome.error.is_none());
    assert_eq!(outcome.attempts, 1);
    assert_eq!(policy.should_retry_calls(), 0);
    assert_eq!(policy.wait_calls(), 0);
}

#[tokio::test]
async fn test_throttled_fetch_produces_classified_failure() {
    let transport = Arc::new(MockTransport::new().with_default(MockResponse::throttled()));
    let policy = Arc::new(StubBackoffPolicy::never());
    let client = client_with(
        test_config(),
        Arc::new(MemoryStore::new()),
        transport.clone(),
        policy,
        Arc::new(MemoryCustomerStore::new()),
    )
    .await;

    let outcome = client.users().get_user_info(CUSTOMER).await;

    assert!(!outcome.success);
    assert!(outcome.data.is_none());
    let error = outcome.error.unwrap();
    assert_eq!(error.code, "META_API");
    assert_eq!(error.classification.unwrap().kind, ErrorKind::Throttling);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_connectivity_failure_produces_classified_failure() {
    let transport = Arc::new(MockTransport::new().with_default(MockResponse::connectivity()));
    let policy = Arc::new(StubBackoffPolicy::never());
    let client = client_with(
        test_config(),
        Arc::new(MemoryStore::new()),
        transport,
        policy,
        Arc::new(MemoryCustomerStore::new()),
    )
    .await;

    let outcome = client.users().get_user_info(CUSTOMER).await;
    assert!(!outcome.success);
    let classification = outcome.error.unwrap().classification.unwrap();
    assert_eq!(classification.kind, ErrorKind::Connectivity);
}

#[tokio::test]
async fn test_undecodable_success_body_is_reported() {
    let transport = Arc::new(MockTransport::new().with_response(MockResponse::ok(
        serde_json::json!({"unexpected": "shape"}),
    )));
    let policy = Arc::new(StubBackoffPolicy::never());
    let client = client_with(
        test_config(),
        Arc::new(MemoryStore::new()),
        transport,
        policy,
        Arc::new(MemoryCustomerStore::new()),
    )
    .await;

    let outcome = client.users().get_user_info(CUSTOMER).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().code, "META_RESPONSE");
    assert_eq!(outcome.attempts, 1);
}

#[tokio::test]
async fn test_lock_wait_ceiling_surfaces_as_outcome() {
    let mut config = test_config();
    config.lock.max_wait = Some(Duration::from_millis(20));

    let store = Arc::new(MemoryStore::new());
    // another instance holds the throttle lock for much longer than our ceiling
    store
        .conditional_set(
            &throttle_lock_id(CUSTOMER),
            "instance-elsewhere",
            Duration::from_secs(60),
            false,
        )
        .await
        .unwrap();

    let transport = Arc::new(MockTransport::new().with_default(MockResponse::user_ok()));
    let policy = Arc::new(StubBackoffPolicy::never());
    let client = client_with(
        config,
        store,
        transport.clone(),
        policy,
        Arc::new(MemoryCustomerStore::new()),
    )
    .await;

    let outcome = client.users().get_user_info(CUSTOMER).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().code, "META_LOCK");
    assert_eq!(outcome.attempts, 0);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_poller_persists_polled_user() {
    let transport = Arc::new(MockTransport::new().with_default(MockResponse::user_ok()));
    let policy = Arc::new(StubBackoffPolicy::never());
    let customer_store = Arc::new(MemoryCustomerStore::new());
    customer_store.seed_customer(CUSTOMER);

    let client = client_with(
        test_config(),
        Arc::new(MemoryStore::new()),
        transport,
        policy,
        customer_store.clone(),
    )
    .await;

    client.poller().run_once(CUSTOMER).await.unwrap();

    let users = customer_store.users();
    assert_eq!(users.len(), 1);
    assert_eq!(users["1234567890"].name, "Jane");
}

#[tokio::test]
async fn test_rate_limit_proximity_is_informational_only() {
    let response = MockResponse::ok(fixtures::user_details_body())
        .with_header("x-app-usage", fixtures::app_usage_header(95, 10, 10));
    let transport = Arc::new(MockTransport::new().with_response(response));
    let policy = Arc::new(StubBackoffPolicy::never());
    let client = client_with(
        test_config(),
        Arc::new(MemoryStore::new()),
        transport,
        policy,
        Arc::new(MemoryCustomerStore::new()),
    )
    .await;

    // call count 95 >= 100 * 0.8 flags proximity, but the fetch still succeeds
    let outcome = client.users().get_user_info(CUSTOMER).await;
    assert!(outcome.success);
    assert_eq!(outcome.attempts, 1);
}
