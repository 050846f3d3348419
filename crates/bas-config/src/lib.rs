// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the simulation engine.
//!
//! [`EngineConfig`] groups three sections: `[engine]` (loop pacing, job
//! retention, logging), `[mock]` (the in-process mock platform) and
//! `[remote]` (the remote red-team automation service). Helpers load it from
//! TOML, apply `BAS_*` environment overrides, merge overlays and produce
//! advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use bas_error::{BasError, ErrorCode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

impl From<ConfigError> for BasError {
    fn from(err: ConfigError) -> Self {
        let message = err.to_string();
        let base = BasError::new(ErrorCode::ConfigInvalid, message);
        match err {
            ConfigError::FileNotFound { path } => base.with_context("path", path),
            ConfigError::ValidationError { reasons } => base.with_context("reasons", reasons),
            ConfigError::ParseError { .. } => base,
        }
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// Remote integration is enabled against a non-local host without a key.
    MissingApiKey {
        /// Configured base URL.
        base_url: String,
    },
    /// Retry settings differ from the defaults but nothing consumes them.
    UnusedRetrySettings,
    /// Terminal jobs are never evicted.
    UnboundedRetention,
    /// The poll deadline is shorter than a single poll interval.
    PollTimeoutBelowInterval {
        /// Poll interval in seconds.
        interval_secs: f64,
        /// Poll deadline in seconds.
        timeout_secs: f64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingApiKey { base_url } => {
                write!(f, "remote integration enabled for '{base_url}' without an api_key")
            }
            ConfigWarning::UnusedRetrySettings => {
                f.write_str("remote retry settings are accepted but not applied by the adapter")
            }
            ConfigWarning::UnboundedRetention => {
                f.write_str("retention is unbounded; finished jobs stay in memory for the process lifetime")
            }
            ConfigWarning::PollTimeoutBelowInterval {
                interval_secs,
                timeout_secs,
            } => write!(
                f,
                "operation poll timeout ({timeout_secs}s) is shorter than the poll interval ({interval_secs}s)"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Execution loop settings.
    pub engine: EngineSettings,
    /// Mock platform settings.
    pub mock: MockSettings,
    /// Remote red-team automation service settings.
    pub remote: RemoteSettings,
}

/// How many finished jobs the engine keeps in its table.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Never evict.
    #[default]
    Unbounded,
    /// Keep at most this many terminal jobs; the oldest are evicted first.
    MaxTerminalJobs(usize),
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// Pause between consecutive steps of one job, in milliseconds.
    pub step_pacing_ms: u64,
    /// Retention of terminal jobs.
    pub retention: RetentionPolicy,
    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            step_pacing_ms: 1000,
            retention: RetentionPolicy::Unbounded,
            log_level: Some("info".into()),
        }
    }
}

impl EngineSettings {
    /// Step pacing as a [`Duration`].
    pub fn step_pacing(&self) -> Duration {
        Duration::from_millis(self.step_pacing_ms)
    }
}

/// `[mock]` section.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct MockSettings {
    /// Probability that a step succeeds.
    pub success_rate: f64,
    /// Upper bound on simulated latency, in milliseconds.
    pub max_latency_ms: u64,
    /// Seed for the step outcome RNG; entropy-seeded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            success_rate: 0.85,
            max_latency_ms: 5000,
            seed: None,
        }
    }
}

impl MockSettings {
    /// Latency cap as a [`Duration`].
    pub fn max_latency(&self) -> Duration {
        Duration::from_millis(self.max_latency_ms)
    }
}

/// `[remote]` section.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct RemoteSettings {
    /// Whether the remote platform is available at all.
    pub enabled: bool,
    /// Service base URL.
    pub base_url: String,
    /// API key sent as `KEY` and bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Verify TLS certificates.
    pub verify_ssl: bool,
    /// Health check request timeout.
    pub healthcheck_timeout_seconds: f64,
    /// Interval between background health checks.
    pub healthcheck_interval_seconds: f64,
    /// Delay between operation polls.
    pub operation_poll_interval_seconds: f64,
    /// Deadline for one polling phase.
    pub operation_poll_timeout_seconds: f64,
    /// Retry attempts for remote calls. Not applied by the adapter.
    pub max_retry_attempts: u32,
    /// Backoff between retries. Not applied by the adapter.
    pub retry_backoff_seconds: f64,
    /// Fixed operation name; generated from the scenario name when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: DEFAULT_REMOTE_BASE_URL.into(),
            api_key: None,
            verify_ssl: false,
            healthcheck_timeout_seconds: 5.0,
            healthcheck_interval_seconds: 60.0,
            operation_poll_interval_seconds: 5.0,
            operation_poll_timeout_seconds: 900.0,
            max_retry_attempts: 3,
            retry_backoff_seconds: 2.0,
            operation_name: None,
        }
    }
}

impl RemoteSettings {
    /// Base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Whether a key is present and non-blank.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Whether the base URL points at the local machine.
    pub fn is_local(&self) -> bool {
        let url = self.api_base();
        url.contains("localhost") || url.contains("127.0.0.1")
    }

    /// Enabled, and either keyed or pointed at a local instance.
    pub fn is_configured(&self) -> bool {
        self.enabled && (self.has_api_key() || self.is_local())
    }

    /// Health check timeout.
    pub fn healthcheck_timeout(&self) -> Duration {
        secs(self.healthcheck_timeout_seconds)
    }

    /// Delay between operation polls.
    pub fn poll_interval(&self) -> Duration {
        secs(self.operation_poll_interval_seconds)
    }

    /// Deadline for one polling phase.
    pub fn poll_timeout(&self) -> Duration {
        secs(self.operation_poll_timeout_seconds)
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default remote service URL.
pub const DEFAULT_REMOTE_BASE_URL: &str = "http://127.0.0.1:8888";

const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load an [`EngineConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`EngineConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => EngineConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into an [`EngineConfig`].
pub fn parse_toml(content: &str) -> Result<EngineConfig, ConfigError> {
    let mut config =
        toml::from_str::<EngineConfig>(content).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })?;
    normalize(&mut config);
    Ok(config)
}

fn normalize(config: &mut EngineConfig) {
    let trimmed = config.remote.api_base().len();
    config.remote.base_url.truncate(trimmed);
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply `BAS_*` environment variable overrides.
///
/// Recognised variables:
/// - `BAS_LOG_LEVEL`, `BAS_STEP_PACING_MS`
/// - `BAS_REMOTE_ENABLED`, `BAS_REMOTE_BASE_URL`, `BAS_REMOTE_API_KEY`,
///   `BAS_REMOTE_VERIFY_SSL`
/// - `BAS_REMOTE_POLL_INTERVAL`, `BAS_REMOTE_POLL_TIMEOUT`,
///   `BAS_REMOTE_HEALTHCHECK_TIMEOUT`
/// - `BAS_REMOTE_MAX_RETRY_ATTEMPTS`, `BAS_REMOTE_RETRY_BACKOFF`
///
/// Numeric values that fail to parse leave the current value untouched.
pub fn apply_env_overrides(config: &mut EngineConfig) {
    apply_overrides_with(config, |key| std::env::var(key).ok());
}

/// Like [`apply_env_overrides`] but reads values through `lookup`.
pub fn apply_overrides_with<F>(config: &mut EngineConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("BAS_LOG_LEVEL") {
        config.engine.log_level = Some(val);
    }
    override_parsed(&lookup, "BAS_STEP_PACING_MS", &mut config.engine.step_pacing_ms);

    let remote = &mut config.remote;
    if let Some(val) = lookup("BAS_REMOTE_ENABLED").and_then(|v| parse_bool(&v)) {
        remote.enabled = val;
    }
    if let Some(val) = lookup("BAS_REMOTE_BASE_URL") {
        remote.base_url = val.trim_end_matches('/').to_string();
    }
    if let Some(val) = lookup("BAS_REMOTE_API_KEY") {
        remote.api_key = Some(val);
    }
    if let Some(val) = lookup("BAS_REMOTE_VERIFY_SSL").and_then(|v| parse_bool(&v)) {
        remote.verify_ssl = val;
    }
    override_parsed(
        &lookup,
        "BAS_REMOTE_POLL_INTERVAL",
        &mut remote.operation_poll_interval_seconds,
    );
    override_parsed(
        &lookup,
        "BAS_REMOTE_POLL_TIMEOUT",
        &mut remote.operation_poll_timeout_seconds,
    );
    override_parsed(
        &lookup,
        "BAS_REMOTE_HEALTHCHECK_TIMEOUT",
        &mut remote.healthcheck_timeout_seconds,
    );
    override_parsed(
        &lookup,
        "BAS_REMOTE_MAX_RETRY_ATTEMPTS",
        &mut remote.max_retry_attempts,
    );
    override_parsed(&lookup, "BAS_REMOTE_RETRY_BACKOFF", &mut remote.retry_backoff_seconds);
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(parsed) = lookup(key).and_then(|v| v.trim().parse().ok()) {
        *slot = parsed;
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Out-of-range values are returned as a [`ConfigError::ValidationError`];
/// soft issues come back as warnings.
pub fn validate_config(config: &EngineConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.engine.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }
    match config.engine.retention {
        RetentionPolicy::MaxTerminalJobs(0) => {
            errors.push("retention.max_terminal_jobs must be at least 1".into());
        }
        RetentionPolicy::Unbounded => warnings.push(ConfigWarning::UnboundedRetention),
        RetentionPolicy::MaxTerminalJobs(_) => {}
    }

    let rate = config.mock.success_rate;
    if !(0.0..=1.0).contains(&rate) {
        errors.push(format!("mock.success_rate {rate} out of range (0..=1)"));
    }

    let remote = &config.remote;
    let minimums = [
        ("healthcheck_timeout_seconds", remote.healthcheck_timeout_seconds, 1.0),
        ("healthcheck_interval_seconds", remote.healthcheck_interval_seconds, 5.0),
        ("operation_poll_interval_seconds", remote.operation_poll_interval_seconds, 1.0),
        ("operation_poll_timeout_seconds", remote.operation_poll_timeout_seconds, 30.0),
        ("retry_backoff_seconds", remote.retry_backoff_seconds, 0.1),
    ];
    for (field, value, min) in minimums {
        if value.is_nan() || value < min {
            errors.push(format!("remote.{field} must be at least {min} (got {value})"));
        }
    }
    let url = remote.api_base();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("remote.base_url '{url}' must be an http(s) URL"));
    }

    if remote.enabled && !remote.has_api_key() && !remote.is_local() {
        warnings.push(ConfigWarning::MissingApiKey {
            base_url: url.to_string(),
        });
    }
    let defaults = RemoteSettings::default();
    if remote.max_retry_attempts != defaults.max_retry_attempts
        || remote.retry_backoff_seconds != defaults.retry_backoff_seconds
    {
        warnings.push(ConfigWarning::UnusedRetrySettings);
    }
    if remote.operation_poll_timeout_seconds < remote.operation_poll_interval_seconds {
        warnings.push(ConfigWarning::PollTimeoutBelowInterval {
            interval_secs: remote.operation_poll_interval_seconds,
            timeout_secs: remote.operation_poll_timeout_seconds,
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`
/// wherever they differ from the built-in defaults.
pub fn merge_configs(base: EngineConfig, overlay: EngineConfig) -> EngineConfig {
    let d = EngineConfig::default();
    EngineConfig {
        engine: EngineSettings {
            step_pacing_ms: pick(
                base.engine.step_pacing_ms,
                overlay.engine.step_pacing_ms,
                &d.engine.step_pacing_ms,
            ),
            retention: pick(
                base.engine.retention,
                overlay.engine.retention,
                &d.engine.retention,
            ),
            log_level: pick(
                base.engine.log_level,
                overlay.engine.log_level,
                &d.engine.log_level,
            ),
        },
        mock: MockSettings {
            success_rate: pick(
                base.mock.success_rate,
                overlay.mock.success_rate,
                &d.mock.success_rate,
            ),
            max_latency_ms: pick(
                base.mock.max_latency_ms,
                overlay.mock.max_latency_ms,
                &d.mock.max_latency_ms,
            ),
            seed: overlay.mock.seed.or(base.mock.seed),
        },
        remote: merge_remote(base.remote, overlay.remote, &d.remote),
    }
}

fn merge_remote(
    base: RemoteSettings,
    overlay: RemoteSettings,
    d: &RemoteSettings,
) -> RemoteSettings {
    RemoteSettings {
        enabled: pick(base.enabled, overlay.enabled, &d.enabled),
        base_url: pick(base.base_url, overlay.base_url, &d.base_url),
        api_key: overlay.api_key.or(base.api_key),
        verify_ssl: pick(base.verify_ssl, overlay.verify_ssl, &d.verify_ssl),
        healthcheck_timeout_seconds: pick(
            base.healthcheck_timeout_seconds,
            overlay.healthcheck_timeout_seconds,
            &d.healthcheck_timeout_seconds,
        ),
        healthcheck_interval_seconds: pick(
            base.healthcheck_interval_seconds,
            overlay.healthcheck_interval_seconds,
            &d.healthcheck_interval_seconds,
        ),
        operation_poll_interval_seconds: pick(
            base.operation_poll_interval_seconds,
            overlay.operation_poll_interval_seconds,
            &d.operation_poll_interval_seconds,
        ),
        operation_poll_timeout_seconds: pick(
            base.operation_poll_timeout_seconds,
            overlay.operation_poll_timeout_seconds,
            &d.operation_poll_timeout_seconds,
        ),
        max_retry_attempts: pick(
            base.max_retry_attempts,
            overlay.max_retry_attempts,
            &d.max_retry_attempts,
        ),
        retry_backoff_seconds: pick(
            base.retry_backoff_seconds,
            overlay.retry_backoff_seconds,
            &d.retry_backoff_seconds,
        ),
        operation_name: overlay.operation_name.or(base.operation_name),
    }
}

fn pick<T: PartialEq>(base: T, overlay: T, default: &T) -> T {
    if overlay != *default { overlay } else { base }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
