//! Observability helpers.
//!
//! Log output must never leak access tokens; the redaction helpers here
//! are used wherever request details are logged.

pub mod logging;

pub use logging::{redact_token, redact_url, Redacted};
