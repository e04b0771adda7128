//! Meta Graph API Client
//!
//! Production-ready Graph API poller with:
//! - Distributed throttle coordination: a two-lock election protocol over a
//!   shared key/value store lets exactly one instance probe for recovery
//!   from throttling while every other instance waits
//! - Failure classification (throttling / generic / connectivity) driven by
//!   configurable detection sets
//! - Hinted exponential backoff honoring upstream usage headers
//! - Per-customer credential caching with distributed invalidation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use meta_client::UserServiceTrait;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create client from environment
//!     let client = meta_client::create_client_from_env()?;
//!
//!     // Fetch the user profile for a customer's token
//!     let outcome = client.users().get_user_info("acme").await;
//!     println!("success={} attempts={}", outcome.success, outcome.attempts);
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Core modules
pub mod client;
pub mod config;
pub mod coordination;
pub mod credentials;
pub mod errors;
pub mod executor;
pub mod storage;
pub mod store;
pub mod transport;
pub mod types;

// Services
pub mod services;

// Resilience
pub mod resilience;

// Observability
pub mod observability;

// Testing utilities
pub mod fixtures;
pub mod mocks;

// Tests
#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use client::{MetaClient, MetaClientBuilder};
pub use config::EnvironmentConfig;
pub use errors::{MetaError, MetaResult};
pub use services::{UserService, UserServiceTrait};
pub use types::{FetchOutcome, UserDetails};

/// Create a Meta client with the given configuration
pub fn create_client(config: EnvironmentConfig) -> MetaResult<MetaClient> {
    MetaClient::new(config)
}

/// Create a Meta client from environment variables
///
/// Reads, among others:
/// - `META_BASE_URL` / `META_GRAPH_VERSION` - Graph API host and version
/// - `META_RETRY_*` - platform retry parameters
/// - `META_THROTTLING_*` - throttling detection sets
/// - `LOCK_MAX_WAIT_MS` / `LOCK_POLL_INTERVAL_MS` - lock wait bounds
/// - `ACCESS_TOKEN_VALIDATION_TTL_MS` - credential freshness window
/// - `STAGE` - deployment stage qualifying secret paths
pub fn create_client_from_env() -> MetaResult<MetaClient> {
    let config = EnvironmentConfig::from_env()?;
    create_client(config)
}
