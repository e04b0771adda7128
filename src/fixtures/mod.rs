//! Test fixtures for Graph API payloads.
//!
//! Provides realistic canned bodies and telemetry headers for unit tests.

use serde_json::{json, Value};

/// Self-fetch success payload
pub fn user_details_body() -> Value {
    json!({
        "id": "1234567890",
        "name": "Jane",
        "last_name": "Doe"
    })
}

/// Throttling error body (application request limit, code 4)
pub fn throttling_error_body() -> Value {
    json!({
        "error": {
            "message": "(#4) Application request limit reached",
            "type": "OAuthException",
            "code": 4,
            "fbtrace_id": "AbCdEfGh123"
        }
    })
}

/// Throttling error body matching a configured (code, sub-code) pair
pub fn throttling_pair_error_body() -> Value {
    json!({
        "error": {
            "message": "There have been too many calls from this ad-account",
            "type": "OAuthException",
            "code": 80000,
            "error_subcode": 2446079,
            "fbtrace_id": "AbCdEfGh456"
        }
    })
}

/// Generic application error body
pub fn generic_error_body() -> Value {
    json!({
        "error": {
            "message": "Unsupported get request",
            "type": "GraphMethodException",
            "code": 100,
            "fbtrace_id": "AbCdEfGh789"
        }
    })
}

/// JSON-encoded `x-app-usage` header value
pub fn app_usage_header(call_count: u32, total_cputime: u32, total_time: u32) -> String {
    json!({
        "call_count": call_count,
        "total_cputime": total_cputime,
        "total_time": total_time
    })
    .to_string()
}

/// JSON-encoded `x-ad-account-usage` header value
pub fn ad_account_usage_header(reset_secs: u64) -> String {
    json!({ "reset_time_duration": reset_secs }).to_string()
}

/// JSON-encoded `x-business-use-case` header value
pub fn business_use_case_header(regain_secs: u64) -> String {
    json!({ "estimated_time_to_regain_access": regain_secs }).to_string()
}
