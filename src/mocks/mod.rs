//! Mock implementations for testing.
//!
//! Provides a scripted transport and a stub backoff policy so executor
//! and service behavior can be verified without a network or real delays.

use crate::errors::ClassifiedFailure;
use crate::fixtures;
use crate::resilience::BackoffPolicy;
use crate::transport::{ApiFailure, ApiRequest, ApiResponse, HttpTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// One scripted transport outcome
#[derive(Debug, Clone)]
pub struct MockResponse(Result<ApiResponse, ApiFailure>);

impl MockResponse {
    /// Successful response with the given JSON body
    pub fn ok(body: serde_json::Value) -> Self {
        Self(Ok(ApiResponse {
            status: 200,
            headers: HashMap::new(),
            body,
        }))
    }

    /// Successful self-fetch response
    pub fn user_ok() -> Self {
        Self::ok(fixtures::user_details_body())
    }

    /// Failure with the given status and JSON error body
    pub fn failure(status: u16, body: serde_json::Value) -> Self {
        let message = body
            .get("error")
            .map(|e| format!("HTTP {status}, {e}"))
            .unwrap_or_else(|| format!("HTTP {status}"));
        Self(Err(ApiFailure {
            status: Some(status),
            headers: HashMap::new(),
            body: Some(body),
            message,
        }))
    }

    /// HTTP 429 throttling failure
    pub fn throttled() -> Self {
        Self::failure(429, fixtures::throttling_error_body())
    }

    /// Application-level throttling failure (HTTP 400, throttling code)
    pub fn throttled_by_code() -> Self {
        Self::failure(400, fixtures::throttling_error_body())
    }

    /// Generic application failure
    pub fn generic_error() -> Self {
        Self::failure(400, fixtures::generic_error_body())
    }

    /// Connectivity failure with no response
    pub fn connectivity() -> Self {
        Self(Err(ApiFailure::from_message("connection refused")))
    }

    /// Attach a response header (works for successes and failures)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let headers = match &mut self.0 {
            Ok(response) => &mut response.headers,
            Err(failure) => &mut failure.headers,
        };
        headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }
}

/// Scripted [`HttpTransport`] that records every request.
///
/// Responses are served from a FIFO queue; when the queue is empty the
/// default response (if any) is served, otherwise a connectivity failure.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<ApiRequest>>,
    default_response: Mutex<Option<MockResponse>>,
}

impl MockTransport {
    /// Create a transport with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response
    pub fn with_response(self, response: MockResponse) -> Self {
        self.responses.lock().push_back(response);
        self
    }

    /// Set the response served once the queue is empty
    pub fn with_default(self, response: MockResponse) -> Self {
        *self.default_response.lock() = Some(response);
        self
    }

    /// Requests recorded so far
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests issued
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiFailure> {
        self.requests.lock().push(request);

        let next = self
            .responses
            .lock()
            .pop_front()
            .or_else(|| self.default_response.lock().clone());
        match next {
            Some(MockResponse(outcome)) => outcome,
            None => Err(ApiFailure::from_message("no scripted response left")),
        }
    }
}

/// Stub [`BackoffPolicy`] with fixed answers and invocation counters
pub struct StubBackoffPolicy {
    retry: AtomicBool,
    wait: Option<Duration>,
    should_retry_calls: AtomicU32,
    wait_calls: AtomicU32,
}

impl StubBackoffPolicy {
    /// Policy that never advises a retry
    pub fn never() -> Self {
        Self {
            retry: AtomicBool::new(false),
            wait: None,
            should_retry_calls: AtomicU32::new(0),
            wait_calls: AtomicU32::new(0),
        }
    }

    /// Policy that always advises a retry with the given wait
    pub fn always(wait: Option<Duration>) -> Self {
        Self {
            retry: AtomicBool::new(true),
            wait,
            should_retry_calls: AtomicU32::new(0),
            wait_calls: AtomicU32::new(0),
        }
    }

    /// Flip the retry answer mid-scenario
    pub fn set_retry(&self, retry: bool) {
        self.retry.store(retry, Ordering::SeqCst);
    }

    /// How many times `should_retry` was consulted
    pub fn should_retry_calls(&self) -> u32 {
        self.should_retry_calls.load(Ordering::SeqCst)
    }

    /// How many times `retry_wait_time` was consulted
    pub fn wait_calls(&self) -> u32 {
        self.wait_calls.load(Ordering::SeqCst)
    }
}

impl BackoffPolicy for StubBackoffPolicy {
    fn should_retry(&self, _failure: &ClassifiedFailure, _attempt: u32) -> bool {
        self.should_retry_calls.fetch_add(1, Ordering::SeqCst);
        self.retry.load(Ordering::SeqCst)
    }

    fn retry_wait_time(&self, _failure: &ClassifiedFailure, _attempt: u32) -> Option<Duration> {
        self.wait_calls.fetch_add(1, Ordering::SeqCst);
        self.wait
    }
}
