//! Failure classification against the configured throttling detection sets.

use crate::config::ThrottleDetection;
use crate::errors::{Classification, ClassifiedFailure, ErrorKind};
use crate::transport::ApiFailure;
use http::StatusCode;

/// Classifies failed attempts.
///
/// Classification order: HTTP 429, then the application error code set,
/// then (code, sub-code) pairs, then message substrings (case-insensitive).
/// Anything else with an HTTP status is a generic application failure;
/// a failure with no response at all is a connectivity failure.
#[derive(Debug, Clone)]
pub struct Classifier {
    detection: ThrottleDetection,
}

impl Classifier {
    /// Create a classifier over the configured detection sets
    pub fn new(detection: ThrottleDetection) -> Self {
        Self { detection }
    }

    /// Derive the classification for a raw failure
    pub fn classify(&self, failure: &ApiFailure) -> Classification {
        let graph_error = failure.graph_error();
        let code = graph_error.as_ref().and_then(|e| e.code);
        let sub_code = graph_error.as_ref().and_then(|e| e.error_subcode);
        let message = graph_error
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| failure.message.clone());

        let kind = if self.is_throttling(failure.status, code, sub_code, &message) {
            ErrorKind::Throttling
        } else if failure.status.is_some() {
            ErrorKind::Generic
        } else {
            ErrorKind::Connectivity
        };

        Classification {
            http_status: failure.status,
            code,
            sub_code,
            message,
            kind,
        }
    }

    /// Classify a failure and attach the result to it
    pub fn classify_failure(&self, failure: ApiFailure) -> ClassifiedFailure {
        let classification = self.classify(&failure);
        ClassifiedFailure {
            failure,
            classification,
        }
    }

    fn is_throttling(
        &self,
        status: Option<u16>,
        code: Option<i64>,
        sub_code: Option<i64>,
        message: &str,
    ) -> bool {
        if status == Some(StatusCode::TOO_MANY_REQUESTS.as_u16()) {
            return true;
        }

        if let Some(code) = code {
            if self.detection.error_codes.contains(&code) {
                return true;
            }
            if let Some(sub_code) = sub_code {
                if self.detection.code_pairs.get(&code) == Some(&sub_code) {
                    return true;
                }
            }
        }

        let message = message.to_lowercase();
        self.detection
            .message_substrings
            .iter()
            .any(|substring| message.contains(substring))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn classifier() -> Classifier {
        Classifier::new(ThrottleDetection::default())
    }

    fn failure_with(status: Option<u16>, body: Option<serde_json::Value>) -> ApiFailure {
        ApiFailure {
            status,
            headers: HashMap::new(),
            body,
            message: "request failed".to_string(),
        }
    }

    #[test]
    fn test_http_429_is_throttling() {
        let failure = failure_with(Some(429), None);
        let classification = classifier().classify(&failure);
        assert_eq!(classification.kind, ErrorKind::Throttling);
        assert_eq!(classification.http_status, Some(429));
    }

    #[test]
    fn test_throttling_code_is_throttling() {
        let failure = failure_with(
            Some(400),
            Some(json!({"error": {"message": "something", "code": 17}})),
        );
        let classification = classifier().classify(&failure);
        assert_eq!(classification.kind, ErrorKind::Throttling);
        assert_eq!(classification.code, Some(17));
    }

    #[test]
    fn test_code_pair_is_throttling() {
        let failure = failure_with(
            Some(400),
            Some(json!({"error": {"message": "cap hit", "code": 80000, "error_subcode": 2446079}})),
        );
        let classification = classifier().classify(&failure);
        assert_eq!(classification.kind, ErrorKind::Throttling);
        assert_eq!(classification.sub_code, Some(2446079));
    }

    #[test]
    fn test_code_pair_requires_matching_sub_code() {
        let failure = failure_with(
            Some(400),
            Some(json!({"error": {"message": "cap hit", "code": 80000, "error_subcode": 999}})),
        );
        let classification = classifier().classify(&failure);
        assert_eq!(classification.kind, ErrorKind::Generic);
    }

    #[test]
    fn test_message_substring_is_throttling_case_insensitive() {
        let failure = failure_with(
            Some(500),
            Some(json!({"error": {"message": "Application Request Limit Reached", "code": 1}})),
        );
        let classification = classifier().classify(&failure);
        assert_eq!(classification.kind, ErrorKind::Throttling);
    }

    #[test]
    fn test_status_without_throttling_signals_is_generic() {
        let failure = failure_with(
            Some(400),
            Some(json!({"error": {"message": "bad field", "code": 100}})),
        );
        let classification = classifier().classify(&failure);
        assert_eq!(classification.kind, ErrorKind::Generic);
    }

    #[test]
    fn test_no_response_is_connectivity() {
        let failure = ApiFailure::from_message("connection refused");
        let classification = classifier().classify(&failure);
        assert_eq!(classification.kind, ErrorKind::Connectivity);
        assert_eq!(classification.message, "connection refused");
    }
}
