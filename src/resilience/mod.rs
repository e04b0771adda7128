//! Failure classification and retry backoff.
//!
//! [`classify::Classifier`] turns a raw attempt failure into a typed
//! classification; [`backoff::BackoffPolicy`] decides whether and how long
//! to wait before the next attempt, preferring upstream response hints
//! over the configured exponential schedule.

pub mod backoff;
pub mod classify;

pub use backoff::{BackoffPolicy, HintedBackoff};
pub use classify::Classifier;
