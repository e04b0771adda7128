//! Two-lock recovery election for upstream throttling.
//!
//! The instance that first registers a throttling event sets two locks:
//! the short throttle lock ("do not call upstream yet") and the longer
//! recovery-check lock whose value elects that instance to probe for
//! recovery. Late arrivals wait out both phases, so only the elected
//! instance ever issues the recovery probe. Both locks are re-set each
//! time a recovery probe fails.

use super::{recovery_check_lock_id, throttle_lock_id, LockManager};
use crate::errors::MetaResult;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Coordinates throttle waits and the recovery election for one instance
#[derive(Clone)]
pub struct ThrottleCoordinator {
    locks: Arc<LockManager>,
    instance_id: String,
}

impl ThrottleCoordinator {
    /// Create a coordinator for the given instance id
    pub fn new(locks: Arc<LockManager>, instance_id: impl Into<String>) -> Self {
        Self {
            locks,
            instance_id: instance_id.into(),
        }
    }

    /// The id this coordinator identifies itself with in the election
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wait until no throttling lock is in effect for `customer`.
    ///
    /// Returns `false` immediately when no wait was needed. After a wait,
    /// reads the recovery-check lock: if its value is our own instance id
    /// we were elected to probe for recovery and `true` is returned; any
    /// other instance keeps waiting until the elected prober's lock clears.
    pub async fn await_throttling_locks(&self, customer: &str) -> MetaResult<bool> {
        let throttle_id = throttle_lock_id(customer);
        let waited = self.locks.await_expiration(&throttle_id).await?;
        if !waited {
            return Ok(false);
        }

        info!(customer, "Done waiting for throttle lock, checking recovery election");
        let recovery_id = recovery_check_lock_id(customer);
        let elected = self.locks.value(&recovery_id).await?;
        if elected.as_deref() == Some(self.instance_id.as_str()) {
            info!(
                instance_id = %self.instance_id,
                customer,
                "Elected to check whether throttling is still in effect"
            );
            return Ok(true);
        }

        info!(
            elected = elected.as_deref().unwrap_or("<none>"),
            instance_id = %self.instance_id,
            customer,
            "Another instance is probing for recovery, waiting for it to finish"
        );
        self.locks.await_expiration(&recovery_id).await?;
        Ok(false)
    }

    /// Register a newly observed throttling event.
    ///
    /// Sets the throttle lock with TTL `wait` and `require_absent =
    /// !is_overwrite`: the first instance to observe the event wins the
    /// set and also writes the recovery-check lock (value = own instance
    /// id, TTL = 5x `wait`). A losing set means another instance already
    /// registered the event and nothing further is done here.
    pub async fn handle_new_throttling(
        &self,
        customer: &str,
        wait: Duration,
        is_overwrite: bool,
    ) -> MetaResult<()> {
        let throttle_id = throttle_lock_id(customer);
        let first_set = self
            .locks
            .set_lock(&throttle_id, wait, None, is_overwrite)
            .await?;

        if first_set {
            info!(
                instance_id = %self.instance_id,
                customer,
                wait_ms = wait.as_millis() as u64,
                "Throttling detected, throttle lock set"
            );
            let recovery_id = recovery_check_lock_id(customer);
            self.locks
                .set_lock(&recovery_id, wait * 5, Some(&self.instance_id), true)
                .await?;
        } else {
            info!(
                instance_id = %self.instance_id,
                customer,
                "Throttling detected, lock already set by another instance"
            );
        }
        Ok(())
    }

    /// Release both throttling locks, but only if the recovery-check lock
    /// still names this instance; releasing another instance's locks would
    /// break the election.
    pub async fn release_throttling_locks(&self, customer: &str) -> MetaResult<()> {
        info!(instance_id = %self.instance_id, customer, "Releasing throttling locks");
        let recovery_id = recovery_check_lock_id(customer);
        let elected = self.locks.value(&recovery_id).await?;
        if elected.as_deref() != Some(self.instance_id.as_str()) {
            warn!(
                instance_id = %self.instance_id,
                elected = elected.as_deref().unwrap_or("<none>"),
                customer,
                "Skipping release of throttling locks set by another instance"
            );
            return Ok(());
        }

        self.locks.release(&throttle_lock_id(customer)).await?;
        self.locks.release(&recovery_id).await?;
        info!(instance_id = %self.instance_id, customer, "Throttling locks released");
        Ok(())
    }
}
