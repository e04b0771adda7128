//! Retry eligibility and wait-time computation.

use crate::config::RetryConfig;
use crate::errors::ClassifiedFailure;
use std::time::Duration;
use tracing::{error, warn};

/// Header carrying ad-account level throttling hints
const AD_ACCOUNT_USAGE_HEADER: &str = "x-ad-account-usage";
/// Hint field: seconds until the ad-account budget resets
const AD_ACCOUNT_RESET_FIELD: &str = "reset_time_duration";

/// Header carrying business-use-case level throttling hints
const BUSINESS_USE_CASE_HEADER: &str = "x-business-use-case";
/// Hint field: estimated seconds until access is regained
const BUSINESS_REGAIN_FIELD: &str = "estimated_time_to_regain_access";

/// Decides whether a failed attempt is retried and how long to wait first.
///
/// Throttling failures are always eligible to retry (the throttle locks
/// moderate the actual pacing); everything else stops at the configured
/// attempt ceiling.
pub trait BackoffPolicy: Send + Sync {
    /// Whether another attempt should be made after `attempt` attempts
    fn should_retry(&self, failure: &ClassifiedFailure, attempt: u32) -> bool;

    /// Wait before the next attempt; `None` means retry immediately
    fn retry_wait_time(&self, failure: &ClassifiedFailure, attempt: u32) -> Option<Duration>;
}

/// Production policy: upstream response hints first, configured
/// exponential backoff as the fallback.
#[derive(Debug, Clone)]
pub struct HintedBackoff {
    retry: RetryConfig,
}

impl HintedBackoff {
    /// Create a policy over the resolved retry parameters
    pub fn new(retry: RetryConfig) -> Self {
        Self { retry }
    }

    /// Compute the exponential delay for an attempt.
    ///
    /// `delay = starting_delay * multiplier^(attempt - 1)`, clamped to
    /// `max_delay` the moment it is exceeded. Attempts number from 1; an
    /// attempt of 0 is invalid and falls back to the unmultiplied
    /// starting delay.
    fn config_backoff(&self, failure: &ClassifiedFailure, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            error!("Retry attempt numbering starts at 1, got 0");
            return Some(self.retry.starting_delay);
        }

        if attempt >= self.retry.max_attempts && !failure.classification.is_throttling() {
            return None;
        }

        let mut delay = self.retry.starting_delay;
        for _ in 1..attempt {
            delay = delay.mul_f64(self.retry.multiplier);
            if delay > self.retry.max_delay {
                return Some(self.retry.max_delay);
            }
        }
        Some(delay)
    }

    /// Pull a throttling wait hint from a JSON-encoded response header
    fn backoff_from_header(
        failure: &ClassifiedFailure,
        header: &str,
        field: &str,
    ) -> Option<Duration> {
        let raw = failure.failure.header(header)?;
        let parsed: serde_json::Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(header, error = %e, "Failed to parse throttling hint header");
                return None;
            }
        };

        parsed
            .get(field)
            .and_then(|v| v.as_f64())
            .map(Duration::from_secs_f64)
    }

    /// Reserved: wait hints derived from documented stability codes
    fn stability_code_backoff(_failure: &ClassifiedFailure) -> Option<Duration> {
        None
    }

    fn ad_account_backoff(failure: &ClassifiedFailure) -> Option<Duration> {
        Self::backoff_from_header(failure, AD_ACCOUNT_USAGE_HEADER, AD_ACCOUNT_RESET_FIELD)
    }

    fn business_use_case_backoff(failure: &ClassifiedFailure) -> Option<Duration> {
        Self::backoff_from_header(failure, BUSINESS_USE_CASE_HEADER, BUSINESS_REGAIN_FIELD)
    }

    /// First hint that yields a value wins
    fn throttling_backoff(failure: &ClassifiedFailure) -> Option<Duration> {
        Self::ad_account_backoff(failure)
            .or_else(|| Self::business_use_case_backoff(failure))
            .or_else(|| Self::stability_code_backoff(failure))
    }
}

impl BackoffPolicy for HintedBackoff {
    fn should_retry(&self, failure: &ClassifiedFailure, attempt: u32) -> bool {
        failure.classification.is_throttling() || attempt < self.retry.max_attempts
    }

    fn retry_wait_time(&self, failure: &ClassifiedFailure, attempt: u32) -> Option<Duration> {
        if failure.classification.is_throttling() {
            if let Some(hinted) = Self::throttling_backoff(failure) {
                return Some(hinted);
            }
        }
        self.config_backoff(failure, attempt)
    }
}
