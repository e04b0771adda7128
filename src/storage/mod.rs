//! Customer/user data store boundary.
//!
//! The persistent store is an external collaborator; only the interface
//! the poller needs is modeled here, with a map-backed implementation for
//! tests and local runs.

use crate::errors::MetaResult;
use crate::types::UserDetails;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// A customer registered for polling
#[derive(Debug, Clone)]
pub struct StoredCustomer {
    /// Customer name, also the secret path and lock key component
    pub name: String,
    /// Last update stamp
    pub updated: DateTime<Utc>,
}

/// Persisted user profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUserDetails {
    /// Graph user id
    pub id: String,
    /// First name
    pub name: String,
    /// Last name
    pub last_name: Option<String>,
    /// When this record was written
    pub updated: DateTime<Utc>,
}

impl From<&UserDetails> for StoredUserDetails {
    fn from(user: &UserDetails) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            last_name: user.last_name.clone(),
            updated: Utc::now(),
        }
    }
}

/// Persistent store contract used by the polling service
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// All customers registered for polling
    async fn customers(&self) -> MetaResult<Vec<StoredCustomer>>;

    /// Upsert a fetched user profile
    async fn update_user_details(&self, user: StoredUserDetails) -> MetaResult<()>;
}

/// Map-backed [`CustomerStore`] for tests and local runs
#[derive(Default)]
pub struct MemoryCustomerStore {
    customers: Mutex<Vec<StoredCustomer>>,
    users: Mutex<HashMap<String, StoredUserDetails>>,
}

impl MemoryCustomerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a customer
    pub fn seed_customer(&self, name: impl Into<String>) {
        self.customers.lock().push(StoredCustomer {
            name: name.into(),
            updated: Utc::now(),
        });
    }

    /// Stored user records, keyed by user id
    pub fn users(&self) -> HashMap<String, StoredUserDetails> {
        self.users.lock().clone()
    }
}

#[async_trait]
impl CustomerStore for MemoryCustomerStore {
    async fn customers(&self) -> MetaResult<Vec<StoredCustomer>> {
        Ok(self.customers.lock().clone())
    }

    async fn update_user_details(&self, user: StoredUserDetails) -> MetaResult<()> {
        self.users.lock().insert(user.id.clone(), user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_and_list_customers() {
        let store = MemoryCustomerStore::new();
        store.seed_customer("acme");
        let customers = store.customers().await.unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].name, "acme");
    }

    #[tokio::test]
    async fn test_update_user_details_upserts() {
        let store = MemoryCustomerStore::new();
        let user = UserDetails {
            id: "42".to_string(),
            name: "Jane".to_string(),
            last_name: Some("Doe".to_string()),
        };

        store
            .update_user_details(StoredUserDetails::from(&user))
            .await
            .unwrap();
        store
            .update_user_details(StoredUserDetails::from(&user))
            .await
            .unwrap();

        assert_eq!(store.users().len(), 1);
        assert_eq!(store.users()["42"].name, "Jane");
    }
}
