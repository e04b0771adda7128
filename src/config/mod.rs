//! Configuration management for the Meta client.
//!
//! Supports configuration via:
//! - Explicit values
//! - Environment variables
//! - Builder pattern
//!
//! The configuration is resolved once at startup and is read-only
//! afterwards; endpoint retry parameters fall back to the platform-level
//! defaults when not set explicitly.

use crate::errors::{ConfigurationError, MetaResult};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use url::Url;

/// Default Graph API host
pub const DEFAULT_BASE_URL: &str = "graph.facebook.com";

/// Default Graph API version
pub const DEFAULT_GRAPH_VERSION: &str = "v18.0";

/// Default self-fetch endpoint path
pub const DEFAULT_SELF_FETCH_PATH: &str = "/me";

/// Application error codes Meta documents as throttling signals
static DEFAULT_THROTTLING_CODES: &[i64] =
    &[4, 17, 32, 613, 80001, 80002, 80005, 80006, 80008, 80009, 80014];

/// (code, sub-code) pairs Meta documents as throttling signals
static DEFAULT_THROTTLING_CODE_PAIRS: Lazy<HashMap<i64, i64>> = Lazy::new(|| {
    [(80000, 2446079), (80003, 2446079), (80004, 2446079)]
        .into_iter()
        .collect()
});

/// Retry parameters for one endpoint or platform
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum attempts for non-throttling failures
    pub max_attempts: u32,
    /// Delay before the first retry
    pub starting_delay: Duration,
    /// Multiplier applied per attempt already made
    pub multiplier: f64,
    /// Ceiling on the computed delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            starting_delay: Duration::from_millis(1000),
            multiplier: 1.5,
            max_delay: Duration::from_millis(10_000),
        }
    }
}

/// Partial retry parameters; unset fields fall back to the platform defaults
#[derive(Debug, Clone, Default)]
pub struct RetryOverrides {
    /// Maximum attempts override
    pub max_attempts: Option<u32>,
    /// Starting delay override
    pub starting_delay: Option<Duration>,
    /// Multiplier override
    pub multiplier: Option<f64>,
    /// Max delay override
    pub max_delay: Option<Duration>,
}

impl RetryOverrides {
    /// Merge with the platform fallback into a fully resolved config
    pub fn resolve(&self, fallback: &RetryConfig) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.unwrap_or(fallback.max_attempts),
            starting_delay: self.starting_delay.unwrap_or(fallback.starting_delay),
            multiplier: self.multiplier.unwrap_or(fallback.multiplier),
            max_delay: self.max_delay.unwrap_or(fallback.max_delay),
        }
    }
}

/// One upstream endpoint: path, requested fields and resolved retry config
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Path under the versioned Graph base, e.g. `/me`
    pub path: String,
    /// Fields requested via the `fields` query parameter
    pub fields: Vec<String>,
    /// Resolved retry parameters
    pub retry: RetryConfig,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_SELF_FETCH_PATH.to_string(),
            fields: vec![
                "id".to_string(),
                "name".to_string(),
                "last_name".to_string(),
            ],
            retry: RetryConfig::default(),
        }
    }
}

/// Throttling detection sets; message substrings are matched case-insensitively
#[derive(Debug, Clone)]
pub struct ThrottleDetection {
    /// Application error codes that mean throttling
    pub error_codes: HashSet<i64>,
    /// (code, sub-code) pairs that mean throttling
    pub code_pairs: HashMap<i64, i64>,
    /// Lowercased message substrings that mean throttling
    pub message_substrings: Vec<String>,
}

impl Default for ThrottleDetection {
    fn default() -> Self {
        Self {
            error_codes: DEFAULT_THROTTLING_CODES.iter().copied().collect(),
            code_pairs: DEFAULT_THROTTLING_CODE_PAIRS.clone(),
            message_substrings: vec!["request limit reached".to_string()],
        }
    }
}

/// Warning thresholds for the `x-app-usage` telemetry header
#[derive(Debug, Clone)]
pub struct UsageThresholds {
    /// Allowed call budget
    pub max_call_count: u32,
    /// Fraction of the call budget that triggers a warning
    pub max_call_count_factor: f64,
    /// Cumulative CPU time warning threshold
    pub cpu_time_warning: u32,
    /// Cumulative total time warning threshold
    pub total_time_warning: u32,
}

impl Default for UsageThresholds {
    fn default() -> Self {
        Self {
            max_call_count: 100,
            max_call_count_factor: 0.8,
            cpu_time_warning: 80,
            total_time_warning: 80,
        }
    }
}

/// Platform-level Meta configuration
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Graph API host
    pub base_url: String,
    /// Graph API version segment
    pub graph_version: String,
    /// Self-fetch endpoint
    pub user_fetch: EndpointConfig,
    /// Platform fallback retry parameters
    pub retry: RetryConfig,
    /// Throttling detection sets
    pub throttle_detection: ThrottleDetection,
    /// Usage telemetry thresholds
    pub usage: UsageThresholds,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            graph_version: DEFAULT_GRAPH_VERSION.to_string(),
            user_fetch: EndpointConfig::default(),
            retry: RetryConfig::default(),
            throttle_detection: ThrottleDetection::default(),
            usage: UsageThresholds::default(),
        }
    }
}

impl PlatformConfig {
    /// Build the full URL for an endpoint path
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "https://{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.graph_version.trim_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Lock coordination parameters
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Ceiling on any single lock wait; `None` waits indefinitely
    pub max_wait: Option<Duration>,
    /// Poll interval while waiting for lazy expiry
    pub poll_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_wait: None,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Credential cache parameters
#[derive(Debug, Clone)]
pub struct CredentialsConfig {
    /// TTL of the distributed token-validation marker
    pub token_validation_ttl: Duration,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            token_validation_ttl: Duration::from_secs(2 * 60 * 60),
        }
    }
}

/// Polling service parameters
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval between polls
    pub interval: Duration,
    /// Whether to fetch immediately on startup
    pub run_on_init: bool,
    /// Concurrent fetches per poll; values above 1 are a testing aid
    pub concurrent_requests: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            run_on_init: false,
            concurrent_requests: 1,
        }
    }
}

/// Configuration for the Meta client, resolved once at startup
#[derive(Debug, Clone, Default)]
pub struct EnvironmentConfig {
    /// Platform configuration
    pub platform: PlatformConfig,
    /// Lock coordination parameters
    pub lock: LockConfig,
    /// Credential cache parameters
    pub credentials: CredentialsConfig,
    /// Polling service parameters
    pub poller: PollerConfig,
    /// Deployment stage, used to qualify secret paths
    pub stage: String,
    /// HTTP request timeout
    pub timeout: Option<Duration>,
}

impl EnvironmentConfig {
    /// Create a new configuration builder
    pub fn builder() -> EnvironmentConfigBuilder {
        EnvironmentConfigBuilder::new()
    }

    /// HTTP timeout, defaulting to 30 seconds
    pub fn http_timeout(&self) -> Duration {
        self.timeout.unwrap_or(Duration::from_secs(30))
    }

    /// Create configuration from environment variables
    pub fn from_env() -> MetaResult<Self> {
        let mut builder = EnvironmentConfigBuilder::new();

        if let Ok(url) = std::env::var("META_BASE_URL") {
            builder = builder.base_url(&url);
        }
        if let Ok(version) = std::env::var("META_GRAPH_VERSION") {
            builder = builder.graph_version(&version);
        }
        if let Ok(path) = std::env::var("META_SELF_FETCH_ENDPOINT") {
            builder = builder.self_fetch_path(&path);
        }
        if let Ok(fields) = std::env::var("META_FIELDS_USER_FETCH") {
            builder = builder.self_fetch_fields(fields.split(',').map(str::trim));
        }

        builder = builder.retry(RetryConfig {
            max_attempts: env_u32("META_RETRY_MAX_ATTEMPTS")?.unwrap_or(5),
            starting_delay: env_millis("META_RETRY_STARTING_DELAY_MS")?
                .unwrap_or(Duration::from_millis(1000)),
            multiplier: env_f64("META_RETRY_MULTIPLIER")?.unwrap_or(1.5),
            max_delay: env_millis("META_RETRY_MAX_DELAY_MS")?
                .unwrap_or(Duration::from_millis(10_000)),
        });
        builder = builder.self_fetch_retry(RetryOverrides {
            max_attempts: env_u32("META_SELF_FETCH_MAX_ATTEMPTS")?,
            starting_delay: env_millis("META_SELF_FETCH_STARTING_DELAY_MS")?,
            multiplier: env_f64("META_SELF_FETCH_MULTIPLIER")?,
            max_delay: env_millis("META_SELF_FETCH_MAX_DELAY_MS")?,
        });

        if let Some(codes) = env_i64_list("META_THROTTLING_ERROR_CODES")? {
            builder = builder.throttling_error_codes(codes);
        }
        if let Ok(pairs) = std::env::var("META_THROTTLING_ERROR_CODE_PAIRS") {
            builder = builder.throttling_code_pairs(parse_code_pairs(&pairs)?);
        }
        if let Ok(substrings) = std::env::var("META_THROTTLING_MESSAGE_SUBSTRINGS") {
            builder = builder.throttling_message_substrings(substrings.split(',').map(str::trim));
        }

        let usage_defaults = UsageThresholds::default();
        builder = builder.usage(UsageThresholds {
            max_call_count: env_u32("META_MAX_CALL_COUNT")?
                .unwrap_or(usage_defaults.max_call_count),
            max_call_count_factor: env_f64("META_MAX_CALL_COUNT_FACTOR")?
                .unwrap_or(usage_defaults.max_call_count_factor),
            cpu_time_warning: env_u32("META_CPU_TIME_WARNING_THRESHOLD")?
                .unwrap_or(usage_defaults.cpu_time_warning),
            total_time_warning: env_u32("META_TOTAL_TIME_WARNING_THRESHOLD")?
                .unwrap_or(usage_defaults.total_time_warning),
        });

        builder = builder.lock(LockConfig {
            max_wait: env_millis("LOCK_MAX_WAIT_MS")?,
            poll_interval: env_millis("LOCK_POLL_INTERVAL_MS")?
                .unwrap_or(Duration::from_millis(500)),
        });

        if let Some(ttl) = env_millis("ACCESS_TOKEN_VALIDATION_TTL_MS")? {
            builder = builder.token_validation_ttl(ttl);
        }

        builder = builder.poller(PollerConfig {
            interval: env_millis("POLL_INTERVAL_MS")?.unwrap_or(Duration::from_millis(2000)),
            run_on_init: env_bool("POLL_RUN_ON_INIT")?.unwrap_or(false),
            concurrent_requests: env_u32("POLL_CONCURRENT_REQUESTS")?.unwrap_or(1),
        });

        if let Ok(stage) = std::env::var("STAGE") {
            builder = builder.stage(&stage);
        }
        if let Some(secs) = env_u32("META_TIMEOUT_SECS")? {
            builder = builder.timeout(Duration::from_secs(secs as u64));
        }

        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> MetaResult<()> {
        let base = format!("https://{}", self.platform.base_url);
        Url::parse(&base).map_err(|e| ConfigurationError::InvalidConfiguration {
            message: format!("Invalid base URL {}: {e}", self.platform.base_url),
        })?;

        if self.platform.retry.multiplier < 1.0 {
            return Err(ConfigurationError::InvalidConfiguration {
                message: format!(
                    "Retry multiplier must be >= 1.0, got {}",
                    self.platform.retry.multiplier
                ),
            }
            .into());
        }

        if self.lock.poll_interval.is_zero() {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "Lock poll interval must be non-zero".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Builder for [`EnvironmentConfig`]
#[derive(Default)]
pub struct EnvironmentConfigBuilder {
    config: EnvironmentConfig,
    self_fetch_retry: RetryOverrides,
}

impl EnvironmentConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: EnvironmentConfig {
                stage: "dev".to_string(),
                ..EnvironmentConfig::default()
            },
            self_fetch_retry: RetryOverrides::default(),
        }
    }

    /// Set the Graph API host
    pub fn base_url(mut self, url: &str) -> Self {
        self.config.platform.base_url = url.to_string();
        self
    }

    /// Set the Graph API version segment
    pub fn graph_version(mut self, version: &str) -> Self {
        self.config.platform.graph_version = version.to_string();
        self
    }

    /// Set the self-fetch endpoint path
    pub fn self_fetch_path(mut self, path: &str) -> Self {
        self.config.platform.user_fetch.path = path.to_string();
        self
    }

    /// Set the self-fetch field list
    pub fn self_fetch_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.platform.user_fetch.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the platform fallback retry parameters
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.platform.retry = retry;
        self
    }

    /// Set per-endpoint retry overrides for the self-fetch endpoint
    pub fn self_fetch_retry(mut self, overrides: RetryOverrides) -> Self {
        self.self_fetch_retry = overrides;
        self
    }

    /// Set the throttling error code set
    pub fn throttling_error_codes<I: IntoIterator<Item = i64>>(mut self, codes: I) -> Self {
        self.config.platform.throttle_detection.error_codes = codes.into_iter().collect();
        self
    }

    /// Set the throttling (code, sub-code) pairs
    pub fn throttling_code_pairs(mut self, pairs: HashMap<i64, i64>) -> Self {
        self.config.platform.throttle_detection.code_pairs = pairs;
        self
    }

    /// Set the throttling message substrings (stored lowercased)
    pub fn throttling_message_substrings<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.platform.throttle_detection.message_substrings = substrings
            .into_iter()
            .map(|s| s.into().to_lowercase())
            .collect();
        self
    }

    /// Set the usage telemetry thresholds
    pub fn usage(mut self, usage: UsageThresholds) -> Self {
        self.config.platform.usage = usage;
        self
    }

    /// Set the lock coordination parameters
    pub fn lock(mut self, lock: LockConfig) -> Self {
        self.config.lock = lock;
        self
    }

    /// Set the lock wait ceiling
    pub fn max_lock_wait(mut self, max: Duration) -> Self {
        self.config.lock.max_wait = Some(max);
        self
    }

    /// Set the lock poll interval
    pub fn lock_poll_interval(mut self, interval: Duration) -> Self {
        self.config.lock.poll_interval = interval;
        self
    }

    /// Set the token-validation marker TTL
    pub fn token_validation_ttl(mut self, ttl: Duration) -> Self {
        self.config.credentials.token_validation_ttl = ttl;
        self
    }

    /// Set the polling service parameters
    pub fn poller(mut self, poller: PollerConfig) -> Self {
        self.config.poller = poller;
        self
    }

    /// Set the deployment stage
    pub fn stage(mut self, stage: &str) -> Self {
        self.config.stage = stage.to_string();
        self
    }

    /// Set the HTTP timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Build the configuration
    pub fn build(mut self) -> MetaResult<EnvironmentConfig> {
        self.config.platform.user_fetch.retry =
            self.self_fetch_retry.resolve(&self.config.platform.retry);
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build the configuration without validation (for testing)
    pub fn build_unchecked(mut self) -> EnvironmentConfig {
        self.config.platform.user_fetch.retry =
            self.self_fetch_retry.resolve(&self.config.platform.retry);
        self.config
    }
}

fn env_u32(name: &str) -> MetaResult<Option<u32>> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| env_error(name, &value)),
        Err(_) => Ok(None),
    }
}

fn env_f64(name: &str) -> MetaResult<Option<f64>> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<f64>()
            .map(Some)
            .map_err(|_| env_error(name, &value)),
        Err(_) => Ok(None),
    }
}

fn env_millis(name: &str) -> MetaResult<Option<Duration>> {
    Ok(env_u32(name)?.map(|ms| Duration::from_millis(ms as u64)))
}

fn env_bool(name: &str) -> MetaResult<Option<bool>> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value.eq_ignore_ascii_case("true"))),
        Err(_) => Ok(None),
    }
}

fn env_i64_list(name: &str) -> MetaResult<Option<Vec<i64>>> {
    match std::env::var(name) {
        Ok(value) => value
            .split(',')
            .map(|part| part.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
            .map_err(|_| env_error(name, &value)),
        Err(_) => Ok(None),
    }
}

fn parse_code_pairs(raw: &str) -> MetaResult<HashMap<i64, i64>> {
    let parsed: HashMap<String, i64> = serde_json::from_str(raw)
        .map_err(|_| env_error("META_THROTTLING_ERROR_CODE_PAIRS", raw))?;
    parsed
        .into_iter()
        .map(|(code, sub)| {
            code.parse::<i64>()
                .map(|c| (c, sub))
                .map_err(|_| env_error("META_THROTTLING_ERROR_CODE_PAIRS", &code))
        })
        .collect()
}

fn env_error(name: &str, value: &str) -> crate::errors::MetaError {
    ConfigurationError::EnvVar {
        name: name.to_string(),
        value: value.to_string(),
    }
    .into()
}
