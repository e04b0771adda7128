//! Logging utilities with sensitive data redaction.

use std::fmt;

/// Wrapper for sensitive data that redacts on display
#[derive(Clone)]
pub struct Redacted<T>(T);

impl<T> Redacted<T> {
    /// Create a new redacted value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Get the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Redact a token, preserving a short prefix for debugging
pub fn redact_token(token: &str) -> String {
    if token.len() <= 8 {
        "[REDACTED]".to_string()
    } else {
        format!("{}...[REDACTED]", &token[..8])
    }
}

/// Redact a URL, hiding any tokens in query parameters
pub fn redact_url(url: &str) -> String {
    if let Some(query_start) = url.find('?') {
        let (base, query) = url.split_at(query_start);
        format!("{}{}", base, redact_query_params(query))
    } else {
        url.to_string()
    }
}

/// Redact sensitive query parameters
fn redact_query_params(query: &str) -> String {
    let sensitive_params = ["access_token", "token", "key", "secret", "password"];

    let mut result = String::from("?");
    let params = query.trim_start_matches('?');

    for (i, pair) in params.split('&').enumerate() {
        if i > 0 {
            result.push('&');
        }

        if let Some(eq_pos) = pair.find('=') {
            let (key, _value) = pair.split_at(eq_pos);
            if sensitive_params.iter().any(|&s| key.eq_ignore_ascii_case(s)) {
                result.push_str(key);
                result.push_str("=[REDACTED]");
            } else {
                result.push_str(pair);
            }
        } else {
            result.push_str(pair);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_token() {
        assert_eq!(redact_token("short"), "[REDACTED]");
        assert_eq!(
            redact_token("EAABwzLixnjYBO1234567890"),
            "EAABwzLi...[REDACTED]"
        );
    }

    #[test]
    fn test_redact_url_hides_access_token() {
        let url = "https://graph.facebook.com/v18.0/me?fields=id,name&access_token=EAAB123";
        let redacted = redact_url(url);
        assert!(redacted.contains("fields=id,name"));
        assert!(redacted.contains("access_token=[REDACTED]"));
        assert!(!redacted.contains("EAAB123"));
    }

    #[test]
    fn test_redact_url_without_query() {
        assert_eq!(
            redact_url("https://graph.facebook.com/v18.0/me"),
            "https://graph.facebook.com/v18.0/me"
        );
    }
}
