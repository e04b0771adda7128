//! HTTP transport layer for the Meta client.
//!
//! Provides low-level HTTP communication with the Graph API. Responses and
//! failures are surfaced with their raw status, headers and parsed JSON body
//! so the classification and backoff layers can inspect them without
//! re-fetching anything.

use crate::errors::{MetaError, MetaResult, NetworkError, ResponseError};
use crate::types::GraphError;
use async_trait::async_trait;
use http::Method;
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// A single Graph API request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Fully qualified URL
    pub url: String,
    /// Query parameters (field list, access token, ...)
    pub query: Vec<(String, String)>,
    /// Per-request timeout override
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    /// Create a new GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            timeout: None,
        }
    }

    /// Create a request with an explicit method
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            timeout: None,
        }
    }

    /// Add a query parameter
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A successful Graph API response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status
    pub status: u16,
    /// Response headers, keys lowercased
    pub headers: HashMap<String, String>,
    /// Parsed JSON body
    pub body: serde_json::Value,
}

impl ApiResponse {
    /// Look up a header by (case-insensitive) name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }

    /// Deserialize the body into a concrete payload type
    pub fn data<T: DeserializeOwned>(&self) -> MetaResult<T> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| MetaError::Response(ResponseError::from(e)))
    }
}

/// A failed Graph API attempt.
///
/// `status` is absent when no response was received at all (connectivity
/// failure); otherwise status, headers and body reflect the error response.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// Response headers, keys lowercased
    pub headers: HashMap<String, String>,
    /// Parsed JSON error body, when one was received
    pub body: Option<serde_json::Value>,
    /// Human-readable summary of the failure
    pub message: String,
}

impl ApiFailure {
    /// Create a connectivity-style failure with no response details
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            headers: HashMap::new(),
            body: None,
            message: message.into(),
        }
    }

    /// Look up a header by (case-insensitive) name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }

    /// Extract the structured Graph error from the body, if present
    pub fn graph_error(&self) -> Option<GraphError> {
        let error = self.body.as_ref()?.get("error")?;
        serde_json::from_value(error.clone()).ok()
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// HTTP transport trait for issuing Graph API requests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a request, returning the raw response or the raw failure
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiFailure>;
}

/// Default HTTP transport implementation using reqwest
pub struct ReqwestTransport {
    client: Client,
    default_timeout: Duration,
}

impl ReqwestTransport {
    /// Create a new transport with the given timeout
    pub fn new(timeout: Duration) -> MetaResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| MetaError::Network(NetworkError::Http(e.to_string())))?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// Create a new transport with a pre-built client
    pub fn with_client(client: Client, default_timeout: Duration) -> Self {
        Self {
            client,
            default_timeout,
        }
    }
}

fn describe_request(request: &ApiRequest) -> String {
    if request.query.is_empty() {
        return request.url.clone();
    }
    let query: Vec<String> = request
        .query
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    crate::observability::redact_url(&format!("{}?{}", request.url, query.join("&")))
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

fn failure_message(status: u16, body: &serde_json::Value) -> String {
    let mut parts = vec![format!("HTTP {status}")];
    if let Some(error) = body.get("error") {
        parts.push(error.to_string());
    }
    parts.join(", ")
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiFailure> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        debug!(request = %describe_request(&request), "Sending Graph API request");

        let response = self
            .client
            .request(request.method, &request.url)
            .query(&request.query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ApiFailure::from_message(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        let text = response
            .text()
            .await
            .map_err(|e| ApiFailure::from_message(e.to_string()))?;
        let body: serde_json::Value =
            serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);

        debug!(status, "Received Graph API response");

        if (200..300).contains(&status) {
            return Ok(ApiResponse {
                status,
                headers,
                body,
            });
        }

        Err(ApiFailure {
            status: Some(status),
            message: failure_message(status, &body),
            headers,
            body: Some(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("x-app-usage".to_string(), "{}".to_string());
        let response = ApiResponse {
            status: 200,
            headers,
            body: json!({}),
        };

        assert_eq!(response.header("X-App-Usage"), Some("{}"));
        assert_eq!(response.header("missing"), None);
    }

    #[test]
    fn test_graph_error_extraction() {
        let failure = ApiFailure {
            status: Some(400),
            headers: HashMap::new(),
            body: Some(json!({
                "error": {
                    "message": "Application request limit reached",
                    "type": "OAuthException",
                    "code": 4,
                    "fbtrace_id": "AbCdEf"
                }
            })),
            message: "HTTP 400".to_string(),
        };

        let error = failure.graph_error().unwrap();
        assert_eq!(error.code, Some(4));
        assert_eq!(
            error.message.as_deref(),
            Some("Application request limit reached")
        );
    }

    #[test]
    fn test_failure_message_includes_error_body() {
        let body = json!({"error": {"message": "nope", "code": 100}});
        let msg = failure_message(400, &body);
        assert!(msg.starts_with("HTTP 400"));
        assert!(msg.contains("nope"));
    }

    #[test]
    fn test_request_description_redacts_token() {
        let request = ApiRequest::get("https://graph.facebook.com/v18.0/me")
            .query("fields", "id,name")
            .query("access_token", "EAAB-very-secret");
        let description = describe_request(&request);
        assert!(description.contains("fields=id,name"));
        assert!(!description.contains("EAAB-very-secret"));
    }
}
