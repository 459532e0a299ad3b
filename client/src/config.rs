//! Configuration management for the shop client.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::ConfigError;
use crate::lifecycle::SettlePolicy;
use reqwest::Url;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default shop backend
pub const DEFAULT_API_URL: &str = "http://localhost:4000";

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "motoshop_client=info,motoshop_runtime=info";

/// Default limit on address chains resolved at once
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 8;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shop backend
    pub api: ApiConfig,
    /// Address directory
    pub directory: DirectoryConfig,
    /// Lifecycle behavior
    pub lifecycle: LifecycleConfig,
    /// Tracing filter directives
    pub log_filter: String,
    /// Render Prometheus metrics before exiting
    pub print_metrics: bool,
}

/// Shop backend configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Address directory configuration
///
/// The HTTP directory wins when both sources are set. With neither,
/// addresses are listed without names.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Base URL of an HTTP directory
    pub base_url: Option<String>,
    /// Folder holding `region.json`, `province.json`, `city.json`, `barangay.json`
    pub data_dir: Option<PathBuf>,
    /// Address chains resolved at once (`None` = unbounded)
    pub resolve_concurrency: Option<usize>,
}

/// Lifecycle configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleConfig {
    /// Treatment of overlapping executes
    pub settle_policy: SettlePolicy,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a URL or the settle policy is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// Unparseable numbers fall back to their defaults; empty values count
    /// as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a URL or the settle policy is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty());

        let base_url = var("MOTOSHOP_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let base_url = validate_url("MOTOSHOP_API_URL", base_url)?;

        let directory_url = var("MOTOSHOP_DIRECTORY_URL")
            .map(|url| validate_url("MOTOSHOP_DIRECTORY_URL", url))
            .transpose()?;

        let settle_policy = var("MOTOSHOP_SETTLE_POLICY")
            .map(|policy| policy.parse::<SettlePolicy>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            api: ApiConfig {
                base_url,
                token: var("MOTOSHOP_API_TOKEN"),
                request_timeout: Duration::from_secs(
                    var("MOTOSHOP_REQUEST_TIMEOUT_SECS")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(30),
                ),
            },
            directory: DirectoryConfig {
                base_url: directory_url,
                data_dir: var("MOTOSHOP_DIRECTORY_DATA_DIR").map(PathBuf::from),
                resolve_concurrency: Some(
                    var("MOTOSHOP_RESOLVE_CONCURRENCY")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(DEFAULT_RESOLVE_CONCURRENCY),
                )
                .filter(|limit| *limit > 0),
            },
            lifecycle: LifecycleConfig { settle_policy },
            log_filter: var("MOTOSHOP_LOG")
                .or_else(|| var("RUST_LOG"))
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            print_metrics: var("MOTOSHOP_PRINT_METRICS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
        })
    }
}

fn validate_url(variable: &'static str, value: String) -> Result<String, ConfigError> {
    match Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(value.trim_end_matches('/').to_string()),
        _ => Err(ConfigError::InvalidUrl { variable, value }),
    }
}
