//! Run configuration
//!
//! Values come from defaults, then the environment (`.env` is honored), then
//! command-line overrides applied by the binary.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use swapi_common::{Result, SwapiError};

// ============================================================================
// Defaults
// ============================================================================

/// Root of the upstream REST API.
pub const DEFAULT_BASE_URL: &str = "https://swapi.dev/api";

/// Identifiers `1..DEFAULT_TOTAL_SCAN_COUNT` are attempted.
pub const DEFAULT_TOTAL_SCAN_COUNT: u32 = 100;

/// Identifiers fetched concurrently per wave.
pub const DEFAULT_GROUP_SIZE: u32 = 20;

/// Local SQLite file, created on first run.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://swapi.db?mode=rwc";

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// What happens when a single identifier fails to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// The first failure aborts the group, and with it the run
    #[default]
    FailFast,
    /// The failing identifier is logged and left out; its siblings are kept
    SkipAndLog,
}

impl std::str::FromStr for FailurePolicy {
    type Err = SwapiError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail-fast" | "fail_fast" | "abort" => Ok(FailurePolicy::FailFast),
            "skip" | "skip-and-log" | "skip_and_log" => Ok(FailurePolicy::SkipAndLog),
            _ => Err(SwapiError::Config(format!("Invalid failure policy: {}", s))),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::FailFast => f.write_str("fail-fast"),
            FailurePolicy::SkipAndLog => f.write_str("skip-and-log"),
        }
    }
}

/// Parameters of one archive run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub base_url: String,
    /// Exclusive upper bound of attempted identifiers
    pub total_scan_count: u32,
    pub group_size: u32,
    pub failure_policy: FailurePolicy,
    pub database_url: String,
    pub max_connections: u32,
    pub request_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            total_scan_count: DEFAULT_TOTAL_SCAN_COUNT,
            group_size: DEFAULT_GROUP_SIZE,
            failure_policy: FailurePolicy::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    ///
    /// - `SWAPI_BASE_URL`
    /// - `SWAPI_TOTAL`
    /// - `SWAPI_GROUP_SIZE`
    /// - `SWAPI_ON_ERROR` (`fail-fast` or `skip`)
    /// - `DATABASE_URL`
    /// - `DATABASE_MAX_CONNECTIONS`
    /// - `SWAPI_REQUEST_TIMEOUT_SECS`
    ///
    /// Values are not validated; call [`IngestConfig::validate`] once any
    /// overrides have been applied.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            base_url: std::env::var("SWAPI_BASE_URL").unwrap_or(defaults.base_url),
            total_scan_count: std::env::var("SWAPI_TOTAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.total_scan_count),
            group_size: std::env::var("SWAPI_GROUP_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.group_size),
            failure_policy: match std::env::var("SWAPI_ON_ERROR") {
                Ok(policy) => policy.parse()?,
                Err(_) => defaults.failure_policy,
            },
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_connections),
            request_timeout_secs: std::env::var("SWAPI_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
        };

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.total_scan_count == 0 {
            return Err(SwapiError::Config(
                "total scan count must be greater than 0".to_string(),
            ));
        }
        if self.group_size == 0 {
            return Err(SwapiError::Config(
                "group size must be greater than 0".to_string(),
            ));
        }
        url::Url::parse(&self.base_url).map_err(|e| {
            SwapiError::Config(format!("Invalid base URL '{}': {}", self.base_url, e))
        })?;
        if self.database_url.is_empty() {
            return Err(SwapiError::Config("Database URL cannot be empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(SwapiError::Config(
                "Database max_connections must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
