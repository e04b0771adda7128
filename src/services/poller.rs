//! Interval-driven polling of the self-fetch endpoint.
//!
//! Triggers fetches on a fixed interval (or on demand via `run_once`) and
//! persists successful results. Stopping halts scheduling only; an
//! in-flight fetch is never aborted mid-attempt.

use crate::config::PollerConfig;
use crate::errors::MetaResult;
use crate::services::users::UserServiceTrait;
use crate::storage::{CustomerStore, StoredUserDetails};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Polling service for user data
pub struct UserPoller {
    service: Arc<dyn UserServiceTrait>,
    storage: Arc<dyn CustomerStore>,
    config: PollerConfig,
    stop_tx: watch::Sender<bool>,
}

impl UserPoller {
    /// Create a new poller
    pub fn new(
        service: Arc<dyn UserServiceTrait>,
        storage: Arc<dyn CustomerStore>,
        config: PollerConfig,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            service,
            storage,
            config,
            stop_tx,
        }
    }

    fn stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Fan out several concurrent fetches for the same customer.
    ///
    /// Exists to exercise the throttle coordination under concurrency; a
    /// production deployment keeps `concurrent_requests` at 1.
    async fn fan_out(&self, customer: &str) {
        info!(
            customer,
            concurrent = self.config.concurrent_requests,
            "Running concurrent fetches"
        );
        let fetches = (0..self.config.concurrent_requests)
            .map(|_| self.service.get_user_info(customer));
        join_all(fetches).await;
    }

    /// Run a single poll for `customer`
    pub async fn run_once(&self, customer: &str) -> MetaResult<()> {
        if self.stopped() {
            info!(customer, "Poller is stopped, skipping run");
            return Ok(());
        }

        if self.config.concurrent_requests > 1 {
            self.fan_out(customer).await;
            return Ok(());
        }

        info!(customer, "Polling user data");
        let outcome = self.service.get_user_info(customer).await;
        if outcome.success {
            if let Some(user) = &outcome.data {
                self.storage
                    .update_user_details(StoredUserDetails::from(user))
                    .await?;
            }
        } else {
            error!(
                customer,
                attempts = outcome.attempts,
                error = ?outcome.error,
                "Poll failed"
            );
        }
        info!(customer, attempts = outcome.attempts, "Finished poll");
        Ok(())
    }

    /// Run the polling loop until stopped.
    ///
    /// Polls the first registered customer, matching the single-customer
    /// deployment model; returns immediately when no customer is
    /// registered.
    pub async fn run(&self) -> MetaResult<()> {
        let customers = self.storage.customers().await?;
        let Some(customer) = customers.first().map(|c| c.name.clone()) else {
            warn!("No customers registered, poller exiting");
            return Ok(());
        };

        if self.config.run_on_init {
            info!(customer = %customer, "Running poller on init");
            self.run_once(&customer).await?;
        }

        let mut stop_rx = self.stop_tx.subscribe();
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // the first tick completes immediately

        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = interval.tick() => {}
            }
            if self.stopped() {
                break;
            }
            // outside the select so a stop never aborts an in-flight poll
            self.run_once(&customer).await?;
        }

        info!(customer = %customer, "Poller stopped");
        Ok(())
    }

    /// Stop scheduling new polls
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}
