//! Error types for the Meta client.
//!
//! Provides an error hierarchy mapping Graph API failures to semantic
//! error types, including the per-attempt classification consumed by the
//! retry and throttle-coordination layers.

use crate::transport::ApiFailure;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for Meta operations
pub type MetaResult<T> = Result<T, MetaError>;

/// Root error type for the Meta integration
#[derive(Error, Debug)]
pub enum MetaError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Secret store error
    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    /// Lock coordination error
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// Key/value store backend error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Network error outside of a classified API attempt
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Response parsing error
    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    /// Terminal API failure, carrying the per-attempt classification
    #[error("API call failed: {0}")]
    Api(Box<ClassifiedFailure>),
}

impl MetaError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "META_CONFIG",
            Self::Secret(_) => "META_SECRET",
            Self::Lock(_) => "META_LOCK",
            Self::Store(_) => "META_STORE",
            Self::Network(_) => "META_NETWORK",
            Self::Response(_) => "META_RESPONSE",
            Self::Api(_) => "META_API",
        }
    }

    /// Get the attached classification, if this is a classified API failure
    pub fn classification(&self) -> Option<&Classification> {
        match self {
            Self::Api(classified) => Some(&classified.classification),
            _ => None,
        }
    }

    /// Check whether this error was classified as upstream throttling
    pub fn is_throttling(&self) -> bool {
        self.classification()
            .map(|c| c.is_throttling())
            .unwrap_or(false)
    }

    /// Wrap a classified attempt failure as a terminal error
    pub fn from_classified(classified: ClassifiedFailure) -> Self {
        Self::Api(Box::new(classified))
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Environment variable error
    #[error("Environment variable {name} has invalid value: {value}")]
    EnvVar {
        /// Variable name
        name: String,
        /// Offending value
        value: String,
    },
}

/// Secret store errors
#[derive(Error, Debug)]
pub enum SecretError {
    /// No secret stored at the requested path
    #[error("Secret not found for path: {path}")]
    NotFound {
        /// Stage-qualified secret path
        path: String,
    },

    /// Backend failure while reading or writing a secret
    #[error("Secret backend error: {message}")]
    Backend {
        /// Error message
        message: String,
    },
}

/// Lock coordination errors
#[derive(Error, Debug)]
pub enum LockError {
    /// A bounded lock wait exceeded its ceiling
    #[error("Lock {lock_id} maxed out after {waited:?}, max wait is {max:?}")]
    MaxedOut {
        /// The lock that was being awaited
        lock_id: String,
        /// Total time spent waiting
        waited: Duration,
        /// Configured wait ceiling
        max: Duration,
    },
}

/// Key/value store backend errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend failure
    #[error("Store backend error: {message}")]
    Backend {
        /// Error message
        message: String,
    },
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection failed
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Error message
        message: String,
    },

    /// Request timeout
    #[error("Request timed out")]
    Timeout,

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else if err.is_connect() {
            NetworkError::ConnectionFailed {
                message: err.to_string(),
            }
        } else {
            NetworkError::Http(err.to_string())
        }
    }
}

/// Response parsing errors
#[derive(Error, Debug)]
pub enum ResponseError {
    /// JSON deserialization error
    #[error("Deserialization error: {message}")]
    DeserializationError {
        /// Error message
        message: String,
    },

    /// Unexpected response shape
    #[error("Unexpected response: {message}")]
    UnexpectedResponse {
        /// Error message
        message: String,
    },
}

impl From<serde_json::Error> for ResponseError {
    fn from(err: serde_json::Error) -> Self {
        ResponseError::DeserializationError {
            message: err.to_string(),
        }
    }
}

/// Failure category derived from a single failed attempt.
///
/// Throttling failures are coordinated through the distributed locks,
/// generic failures retry with plain exponential backoff up to the attempt
/// ceiling, and connectivity failures (no response received) retry like
/// generic ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Upstream signalled the caller exceeded its allowed request rate
    Throttling,
    /// Application-level failure with an HTTP response
    Generic,
    /// No response received at all
    Connectivity,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throttling => write!(f, "THROTTLING"),
            Self::Generic => write!(f, "GENERIC"),
            Self::Connectivity => write!(f, "CONNECTIVITY"),
        }
    }
}

/// Classification of one failed attempt, derived once and carried with the
/// raw failure so downstream consumers never re-derive it.
#[derive(Debug, Clone)]
pub struct Classification {
    /// HTTP status, when a response was received
    pub http_status: Option<u16>,
    /// Graph application error code
    pub code: Option<i64>,
    /// Graph application error sub-code
    pub sub_code: Option<i64>,
    /// Best-available error message
    pub message: String,
    /// Failure category
    pub kind: ErrorKind,
}

impl Classification {
    /// Check whether this failure was classified as throttling
    pub fn is_throttling(&self) -> bool {
        self.kind == ErrorKind::Throttling
    }
}

/// A raw attempt failure together with its classification
#[derive(Debug, Clone)]
pub struct ClassifiedFailure {
    /// Raw transport-level failure details
    pub failure: ApiFailure,
    /// Derived classification
    pub classification: Classification,
}

impl fmt::Display for ClassifiedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.classification.kind, self.classification.message
        )?;
        if let Some(status) = self.classification.http_status {
            write!(f, " (HTTP {status})")?;
        }
        if let Some(code) = self.classification.code {
            write!(f, " (code {code}")?;
            if let Some(sub) = self.classification.sub_code {
                write!(f, ", subcode {sub}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for ClassifiedFailure {}
