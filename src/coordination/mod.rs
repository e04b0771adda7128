//! Distributed lock coordination.
//!
//! Built on the [`KeyValueStore`](crate::store::KeyValueStore) contract:
//! [`LockManager`] provides bounded lazy-expiry waits and best-effort
//! release tracking, and [`ThrottleCoordinator`] implements the two-lock
//! election protocol that lets exactly one instance probe for recovery
//! from upstream throttling while every other instance waits.

mod locks;
mod throttle;

pub use locks::LockManager;
pub use throttle::ThrottleCoordinator;

/// Lock key guarding upstream calls for a customer while throttling is in
/// effect. Its TTL equals the computed backoff wait.
pub fn throttle_lock_id(customer: &str) -> String {
    format!("lock::customer::{customer}")
}

/// Lock key electing the instance responsible for the recovery probe.
/// Lives 5x longer than the throttle lock; its value is the elected
/// instance id.
pub fn recovery_check_lock_id(customer: &str) -> String {
    format!("lock::customer-check::{customer}")
}
