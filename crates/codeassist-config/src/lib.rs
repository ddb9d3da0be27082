//! Relay configuration loaded from the environment.
//!
//! - [`RelayConfig`] — Everything the server needs, validated once at startup
//! - [`RateLimitSettings`] — Fixed-window quota per client IP
//! - [`ConfigError`] — Missing or malformed variables
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use codeassist_config::RelayConfig;
//!
//! let env = HashMap::from([("OPENAI_API_KEY", "sk-test"), ("PORT", "3000")]);
//! let config = RelayConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
//!
//! assert_eq!(config.port, 3000);
//! assert_eq!(config.model, "gpt-3.5-turbo");
//! assert_eq!(config.rate_limit.max_requests, 10);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use codeassist_core::DEFAULT_MODEL;

/// Errors that can occur when loading configuration.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("Missing required environment variable '{0}'")]
    Missing(String),

    /// A variable is set but cannot be used.
    #[error("Invalid value '{value}' for '{var}': {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var: var.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Fixed-window request quota applied per client IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Requests allowed per window.
    pub max_requests: u64,
    /// Window length.
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60 * 60),
        }
    }
}

/// Validated relay configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Completion service credential.
    pub api_key: String,
    /// Optional API base URL for OpenAI-compatible endpoints.
    pub api_base: Option<String>,
    /// Completion model identifier.
    pub model: String,
    /// Listen address host part.
    pub host: String,
    /// Listen port.
    pub port: u16,
    pub rate_limit: RateLimitSettings,
}

// Keeps the credential out of logs.
impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl RelayConfig {
    /// Loads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| ConfigError::Missing("OPENAI_API_KEY".into()))?;

        let port_raw = get("PORT")
            .or_else(|| get("port"))
            .ok_or_else(|| ConfigError::Missing("PORT".into()))?;
        let port: u16 = parse_var("PORT", &port_raw)?;
        if port == 0 {
            return Err(ConfigError::invalid("PORT", &port_raw, "must be non-zero"));
        }

        let defaults = RateLimitSettings::default();
        let max_requests = match get("RATE_LIMIT_MAX") {
            Some(raw) => positive("RATE_LIMIT_MAX", &raw)?,
            None => defaults.max_requests,
        };
        let window = match get("RATE_LIMIT_WINDOW_SECS") {
            Some(raw) => Duration::from_secs(positive("RATE_LIMIT_WINDOW_SECS", &raw)?),
            None => defaults.window,
        };

        Ok(Self {
            api_key,
            api_base: get("OPENAI_API_BASE"),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            host: get("BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            rate_limit: RateLimitSettings { max_requests, window },
        })
    }

    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(var, raw, e.to_string()))
}

fn positive(var: &str, raw: &str) -> Result<u64, ConfigError> {
    match parse_var::<u64>(var, raw)? {
        0 => Err(ConfigError::invalid(var, raw, "must be greater than zero")),
        n => Ok(n),
    }
}
