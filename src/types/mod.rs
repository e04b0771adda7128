//! Wire types for the Meta client.

use crate::errors::{Classification, MetaError};
use serde::{Deserialize, Serialize};

/// Structured error payload returned by the Graph API inside `{"error": ...}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphError {
    /// Error message
    pub message: Option<String>,
    /// Error type, e.g. `OAuthException`
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    /// Application error code
    pub code: Option<i64>,
    /// Application error sub-code
    pub error_subcode: Option<i64>,
    /// Trace id for support lookups
    pub fbtrace_id: Option<String>,
}

/// User profile fields returned by the self-fetch endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserDetails {
    /// Graph user id
    pub id: String,
    /// First name
    pub name: String,
    /// Last name
    pub last_name: Option<String>,
}

/// Application usage telemetry from the `x-app-usage` response header.
///
/// All three values are percentages of the allowed hourly budget.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct AppUsage {
    /// Number of calls made
    #[serde(default)]
    pub call_count: u32,
    /// Cumulative CPU time consumed
    #[serde(default)]
    pub total_cputime: u32,
    /// Cumulative wall time consumed
    #[serde(default)]
    pub total_time: u32,
}

/// Error details surfaced to callers inside a [`FetchOutcome`]
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    /// Stable error code (`META_API`, `META_LOCK`, ...)
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
    /// Attempt classification, when the failure came from the upstream API
    pub classification: Option<Classification>,
}

impl From<&MetaError> for ErrorDetail {
    fn from(error: &MetaError) -> Self {
        Self {
            code: error.error_code(),
            message: error.to_string(),
            classification: error.classification().cloned(),
        }
    }
}

/// Terminal result of one logical fetch.
///
/// Expected failure categories are reported here rather than as errors;
/// only unexpected internal faults propagate as `Err` past the service layer.
#[derive(Debug, Clone)]
pub struct FetchOutcome<T> {
    /// Whether the fetch ultimately succeeded
    pub success: bool,
    /// Fetched payload on success
    pub data: Option<T>,
    /// Terminal error detail on failure
    pub error: Option<ErrorDetail>,
    /// Total upstream attempts made
    pub attempts: u32,
}

impl<T> FetchOutcome<T> {
    /// Build a successful outcome
    pub fn success(data: T, attempts: u32) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            attempts,
        }
    }

    /// Build a failed outcome
    pub fn failure(error: &MetaError, attempts: u32) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorDetail::from(error)),
            attempts,
        }
    }
}
