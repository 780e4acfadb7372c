//! Top-level portal configuration.

use crate::error::{ConfigError, ConfigResult};
use portal_cache::CacheConfig;
use portal_dashboard::DashboardConfig;
use portal_resilience::{CircuitBreakerConfig, ResilienceService, RetryConfig};
use portal_telemetry::{LogFormat, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use validator::{Validate, ValidationError};

/// Environment variable overriding `cache.default_ttl` (humantime, e.g. `90s`)
pub const ENV_CACHE_DEFAULT_TTL: &str = "PORTAL_CACHE_DEFAULT_TTL";
/// Environment variable overriding `cache.key_prefix`
pub const ENV_CACHE_KEY_PREFIX: &str = "PORTAL_CACHE_KEY_PREFIX";
/// Environment variable overriding `cache.redis_url`
pub const ENV_REDIS_URL: &str = "PORTAL_REDIS_URL";
/// Environment variable overriding `logging.level`
pub const ENV_LOG_LEVEL: &str = "PORTAL_LOG_LEVEL";
/// Environment variable overriding `logging.format`
pub const ENV_LOG_FORMAT: &str = "PORTAL_LOG_FORMAT";

/// Breakers to register at startup plus the retry policy callers default to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Breaker configuration per dependency key
    pub breakers: BTreeMap<String, CircuitBreakerConfig>,
    /// Retry policy for calls that opt into retries
    pub default_retry: RetryConfig,
}

impl ResilienceConfig {
    /// Build a registry with every configured breaker registered
    #[must_use]
    pub fn build_service(&self) -> ResilienceService {
        let service = ResilienceService::new();
        for (key, config) in &self.breakers {
            service.register(key.clone(), config.clone());
        }
        service
    }
}

/// Complete portal configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PortalConfig {
    /// Cache settings
    #[validate(custom(function = "validate_cache"))]
    pub cache: CacheConfig,
    /// Circuit breakers and retry defaults
    #[validate(custom(function = "validate_resilience"))]
    pub resilience: ResilienceConfig,
    /// Dashboard TTLs and paging
    #[validate(custom(function = "validate_dashboard"))]
    pub dashboard: DashboardConfig,
    /// Logging output
    #[validate(custom(function = "validate_logging"))]
    pub logging: LoggingConfig,
}

impl PortalConfig {
    /// Parse YAML content
    ///
    /// # Errors
    /// Returns error if the content is not valid YAML for this schema
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::yaml(&e))
    }

    /// Parse TOML content
    ///
    /// # Errors
    /// Returns error if the content is not valid TOML for this schema
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::toml(&e))
    }

    /// Apply `PORTAL_*` overrides from the process environment
    ///
    /// # Errors
    /// Returns error if an override has an unparseable value
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply `PORTAL_*` overrides read through `lookup`
    ///
    /// # Errors
    /// Returns error if an override has an unparseable value
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ttl) = lookup(ENV_CACHE_DEFAULT_TTL) {
            self.cache.default_ttl = humantime_serde::re::humantime::parse_duration(&ttl).map_err(|e| {
                ConfigError::Env {
                    var: ENV_CACHE_DEFAULT_TTL,
                    message: e.to_string(),
                }
            })?;
            debug!(var = ENV_CACHE_DEFAULT_TTL, "Applied environment override");
        }
        if let Some(prefix) = lookup(ENV_CACHE_KEY_PREFIX) {
            self.cache.key_prefix = prefix;
            debug!(var = ENV_CACHE_KEY_PREFIX, "Applied environment override");
        }
        if let Some(url) = lookup(ENV_REDIS_URL) {
            self.cache.redis_url = if url.trim().is_empty() { None } else { Some(url) };
            debug!(var = ENV_REDIS_URL, "Applied environment override");
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
            debug!(var = ENV_LOG_LEVEL, "Applied environment override");
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = format.parse::<LogFormat>().map_err(|e| ConfigError::Env {
                var: ENV_LOG_FORMAT,
                message: e.to_string(),
            })?;
            debug!(var = ENV_LOG_FORMAT, "Applied environment override");
        }
        Ok(())
    }
}

fn invalid(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ValidationError> {
    if cache.key_prefix.is_empty() || cache.key_prefix.contains(':') {
        return Err(invalid("key_prefix", "key_prefix must be non-empty and contain no ':'"));
    }
    if cache.namespace.is_empty() {
        return Err(invalid("namespace", "namespace must be non-empty"));
    }
    if cache.default_ttl.is_zero() {
        return Err(invalid("default_ttl", "default_ttl must be greater than zero"));
    }
    if cache.max_entries == 0 {
        return Err(invalid("max_entries", "max_entries must be at least 1"));
    }
    if cache.operation_timeout.is_zero() {
        return Err(invalid("operation_timeout", "operation_timeout must be greater than zero"));
    }
    if let Some(url) = &cache.redis_url {
        if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
            return Err(invalid("redis_url", "redis_url must start with redis:// or rediss://"));
        }
    }
    Ok(())
}

fn validate_resilience(resilience: &ResilienceConfig) -> Result<(), ValidationError> {
    for (key, breaker) in &resilience.breakers {
        if key.trim().is_empty() {
            return Err(invalid("breaker_key", "breaker keys must be non-empty"));
        }
        if breaker.failure_threshold == 0 || breaker.success_threshold == 0 {
            return Err(invalid(
                "breaker_threshold",
                format!("breaker '{key}' thresholds must be at least 1"),
            ));
        }
        if breaker.timeout.is_zero() || breaker.reset_timeout.is_zero() {
            return Err(invalid(
                "breaker_timeout",
                format!("breaker '{key}' timeouts must be greater than zero"),
            ));
        }
    }

    let retry = &resilience.default_retry;
    if retry.max_attempts == 0 {
        return Err(invalid("max_attempts", "default_retry.max_attempts must be at least 1"));
    }
    if retry.backoff_multiplier < 1.0 {
        return Err(invalid("backoff_multiplier", "default_retry.backoff_multiplier must be >= 1.0"));
    }
    if retry.base_delay > retry.max_delay {
        return Err(invalid("base_delay", "default_retry.base_delay must not exceed max_delay"));
    }
    if !(0.0..=1.0).contains(&retry.jitter) {
        return Err(invalid("jitter", "default_retry.jitter must be within 0.0..=1.0"));
    }
    Ok(())
}

fn validate_dashboard(dashboard: &DashboardConfig) -> Result<(), ValidationError> {
    let ttls: [(&str, Duration); 3] = [
        ("global_stats_ttl", dashboard.global_stats_ttl),
        ("user_dashboard_ttl", dashboard.user_dashboard_ttl),
        ("project_list_ttl", dashboard.project_list_ttl),
    ];
    if let Some((name, _)) = ttls.iter().find(|(_, ttl)| ttl.is_zero()) {
        return Err(invalid("dashboard_ttl", format!("dashboard.{name} must be greater than zero")));
    }
    if dashboard.max_page_size == 0 {
        return Err(invalid("max_page_size", "dashboard.max_page_size must be at least 1"));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ValidationError> {
    if logging.level.trim().is_empty() {
        return Err(invalid("log_level", "logging.level must be non-empty"));
    }
    Ok(())
}
