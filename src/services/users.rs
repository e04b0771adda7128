//! User self-fetch service.
//!
//! Handles the business side of the self-fetch endpoint: it hands the HTTP
//! and rate-limit mechanics to a per-call [`RequestExecutor`] and only
//! cares about the terminal outcome, which it reports as a structured
//! [`FetchOutcome`] — expected failures never cross this boundary as
//! errors.

use crate::config::EnvironmentConfig;
use crate::executor::{ExecutorContext, RequestExecutor};
use crate::resilience::BackoffPolicy;
use crate::types::{FetchOutcome, UserDetails};
use async_trait::async_trait;
use http::Method;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Trait for user service operations
#[async_trait]
pub trait UserServiceTrait: Send + Sync {
    /// Fetch the user profile for a customer's token
    async fn get_user_info(&self, customer: &str) -> FetchOutcome<UserDetails>;
}

/// User service implementation
#[derive(Clone)]
pub struct UserService {
    config: Arc<EnvironmentConfig>,
    ctx: ExecutorContext,
    policy: Arc<dyn BackoffPolicy>,
}

impl UserService {
    /// Create a new user service
    pub fn new(
        config: Arc<EnvironmentConfig>,
        ctx: ExecutorContext,
        policy: Arc<dyn BackoffPolicy>,
    ) -> Self {
        Self {
            config,
            ctx,
            policy,
        }
    }

    fn executor(&self, customer: &str) -> RequestExecutor {
        let endpoint = &self.config.platform.user_fetch;
        RequestExecutor::new(
            self.ctx.clone(),
            self.policy.clone(),
            Method::GET,
            customer,
            self.config.platform.endpoint_url(&endpoint.path),
            endpoint.fields.clone(),
        )
    }
}

#[async_trait]
impl UserServiceTrait for UserService {
    #[instrument(skip(self), fields(customer = %customer))]
    async fn get_user_info(&self, customer: &str) -> FetchOutcome<UserDetails> {
        let mut executor = self.executor(customer);

        match executor.execute().await {
            Ok(response) => {
                debug!(status = response.status, "Received user response");
                match response.data::<UserDetails>() {
                    Ok(user) => FetchOutcome::success(user, executor.attempts()),
                    Err(err) => {
                        error!(error = %err, "Failed to decode user response");
                        FetchOutcome::failure(&err, executor.attempts())
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "Failed fetching user");
                FetchOutcome::failure(&err, executor.attempts())
            }
        }
    }
}
