//! Request execution with throttle coordination.
//!
//! One [`RequestExecutor`] owns one logical fetch: it awaits the customer's
//! throttling locks, attempts the call with a freshly validated token, and
//! on failure consults the classifier, the backoff policy and the throttle
//! coordinator to decide between retrying, re-entering the lock-await
//! cycle, or failing terminally. The attempt counter is monotonic across
//! lock-cycle re-entries.

use crate::config::UsageThresholds;
use crate::coordination::ThrottleCoordinator;
use crate::credentials::CredentialCache;
use crate::errors::{ClassifiedFailure, MetaError, MetaResult};
use crate::resilience::{BackoffPolicy, Classifier};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::types::AppUsage;
use http::Method;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Telemetry header inspected after every successful response
const APP_USAGE_HEADER: &str = "x-app-usage";

/// Shared collaborators for request execution, wired once at startup
#[derive(Clone)]
pub struct ExecutorContext {
    /// HTTP transport
    pub transport: Arc<dyn HttpTransport>,
    /// Throttle lock coordination
    pub coordinator: ThrottleCoordinator,
    /// Access-token cache
    pub credentials: Arc<CredentialCache>,
    /// Failure classifier
    pub classifier: Classifier,
    /// Usage telemetry warning thresholds
    pub usage: UsageThresholds,
}

/// Executes one logical fetch against a Graph API endpoint.
///
/// The flow re-enters the lock-await cycle (not merely the attempt loop)
/// whenever new throttling is detected, expressed as a labeled loop so the
/// state stays observable and the depth bounded.
pub struct RequestExecutor {
    ctx: ExecutorContext,
    policy: Arc<dyn BackoffPolicy>,
    method: Method,
    customer: String,
    url: String,
    fields: Vec<String>,
    attempts: u32,
}

impl RequestExecutor {
    /// Create an executor for one logical fetch
    pub fn new(
        ctx: ExecutorContext,
        policy: Arc<dyn BackoffPolicy>,
        method: Method,
        customer: impl Into<String>,
        url: impl Into<String>,
        fields: Vec<String>,
    ) -> Self {
        Self {
            ctx,
            policy,
            method,
            customer: customer.into(),
            url: url.into(),
            fields,
            attempts: 0,
        }
    }

    /// Total upstream attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    async fn build_request(&self) -> MetaResult<ApiRequest> {
        let token = self.ctx.credentials.access_token(&self.customer).await?;
        let mut request = ApiRequest::new(self.method.clone(), self.url.clone());
        if !self.fields.is_empty() {
            request = request.query("fields", self.fields.join(","));
        }
        Ok(request.query("access_token", token.expose_secret()))
    }

    /// Inspect response telemetry and flag proximity to the rate limit.
    ///
    /// Informational only; the warning gives operators lead time before
    /// throttling actually starts.
    fn close_to_rate_limit(&self, response: &ApiResponse) -> bool {
        let Some(raw) = response.header(APP_USAGE_HEADER) else {
            debug!(customer = %self.customer, "Response carried no app-usage telemetry");
            return false;
        };

        let usage: AppUsage = match serde_json::from_str(raw) {
            Ok(usage) => usage,
            Err(e) => {
                error!(customer = %self.customer, error = %e, "Failed to parse app-usage header");
                return false;
            }
        };

        let thresholds = &self.ctx.usage;
        let call_budget =
            thresholds.max_call_count as f64 * thresholds.max_call_count_factor;
        let close = usage.total_cputime >= thresholds.cpu_time_warning
            || usage.total_time >= thresholds.total_time_warning
            || usage.call_count as f64 >= call_budget;

        if close {
            warn!(
                customer = %self.customer,
                call_count = usage.call_count,
                total_cputime = usage.total_cputime,
                total_time = usage.total_time,
                "Close to upstream rate limit"
            );
        }
        close
    }

    async fn terminal(
        &self,
        classified: ClassifiedFailure,
        is_recovery: bool,
    ) -> MetaResult<ApiResponse> {
        if is_recovery {
            self.ctx
                .coordinator
                .release_throttling_locks(&self.customer)
                .await?;
        }
        Err(MetaError::from_classified(classified))
    }

    /// Execute the fetch unless throttling is in place.
    ///
    /// If throttling is in place and this instance is the elected recovery
    /// prober, the probe happens here once the throttle lock clears; every
    /// other instance waits out both locks before attempting.
    pub async fn execute(&mut self) -> MetaResult<ApiResponse> {
        'cycle: loop {
            let is_recovery = self
                .ctx
                .coordinator
                .await_throttling_locks(&self.customer)
                .await?;

            loop {
                self.attempts += 1;
                let request = self.build_request().await?;

                match self.ctx.transport.send(request).await {
                    Ok(response) => {
                        if is_recovery {
                            self.ctx
                                .coordinator
                                .release_throttling_locks(&self.customer)
                                .await?;
                        }
                        self.close_to_rate_limit(&response);
                        return Ok(response);
                    }
                    Err(failure) => {
                        let classified = self.ctx.classifier.classify_failure(failure);
                        error!(
                            customer = %self.customer,
                            attempt = self.attempts,
                            error = %classified,
                            "Attempt failed"
                        );

                        // only idempotent reads are ever retried
                        if self.method != Method::GET {
                            return self.terminal(classified, is_recovery).await;
                        }

                        if !self.policy.should_retry(&classified, self.attempts) {
                            return self.terminal(classified, is_recovery).await;
                        }

                        let Some(wait) =
                            self.policy.retry_wait_time(&classified, self.attempts)
                        else {
                            continue;
                        };

                        if classified.classification.is_throttling() {
                            self.ctx
                                .coordinator
                                .handle_new_throttling(&self.customer, wait, is_recovery)
                                .await?;
                            continue 'cycle;
                        }

                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
    }
}
