//! Process configuration for askgem.
//!
//! All settings come from environment variables (optionally seeded from a
//! `.env` file) and are read once at startup into an immutable [`Settings`]
//! value that is shared by reference.
//!
//! | Variable                          | Default                                      |
//! |-----------------------------------|----------------------------------------------|
//! | `GOOGLE_API_KEY`                  | required for model calls                     |
//! | `ASKGEM_AGENT_MODEL`              | `gemini-2.5-flash-lite`                      |
//! | `ASKGEM_DIRECT_MODEL`             | `gemini-2.5-flash-lite`                      |
//! | `ASKGEM_API_BASE`                 | `https://generativelanguage.googleapis.com`  |
//! | `ASKGEM_BIND_ADDR`                | `0.0.0.0:8000`                               |
//! | `ASKGEM_HTTP_TIMEOUT_SECS`        | none                                         |
//! | `ASKGEM_RETRY_ATTEMPTS`           | `5`                                          |
//! | `ASKGEM_RETRY_BACKOFF_BASE`       | `7`                                          |
//! | `ASKGEM_RETRY_INITIAL_DELAY_SECS` | `1`                                          |
//! | `ASKGEM_RETRY_STATUS_CODES`       | `429,500,503,504`                            |

use std::env::VarError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use askgem_core::{PolicyError, RetryPolicy};
use thiserror::Error;
use tracing::{error, info, warn};

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
pub const AGENT_MODEL_VAR: &str = "ASKGEM_AGENT_MODEL";
pub const DIRECT_MODEL_VAR: &str = "ASKGEM_DIRECT_MODEL";
pub const API_BASE_VAR: &str = "ASKGEM_API_BASE";
pub const BIND_ADDR_VAR: &str = "ASKGEM_BIND_ADDR";
pub const HTTP_TIMEOUT_VAR: &str = "ASKGEM_HTTP_TIMEOUT_SECS";
pub const RETRY_ATTEMPTS_VAR: &str = "ASKGEM_RETRY_ATTEMPTS";
pub const RETRY_BACKOFF_BASE_VAR: &str = "ASKGEM_RETRY_BACKOFF_BASE";
pub const RETRY_INITIAL_DELAY_VAR: &str = "ASKGEM_RETRY_INITIAL_DELAY_SECS";
pub const RETRY_STATUS_CODES_VAR: &str = "ASKGEM_RETRY_STATUS_CODES";

pub const DEFAULT_AGENT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_DIRECT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Above this, a fully failing request keeps a caller waiting for minutes.
const SLOW_RETRY_WARNING: Duration = Duration::from_secs(300);

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The API key variable is unset or blank.
    #[error("API Key not configured. Please add {0} to environment variables.")]
    MissingApiKey(&'static str),

    /// The variable exists but could not be read.
    #[error("Environment variable '{var}' could not be read: {reason}")]
    Unreadable { var: String, reason: String },

    #[error("Invalid value for {var}: '{value}' ({reason})")]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },

    #[error("Invalid retry policy: {0}")]
    Policy(#[from] PolicyError),
}

/// The Gemini API key. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for request headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short prefix suitable for routine logs.
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{}...", prefix)
    }

    /// Prefix and suffix for diagnostics, e.g. `AIzaSyAbCd...wxyz`.
    pub fn masked_ends(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let head: String = chars.iter().take(10).collect();
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("{}...{}", head, tail)
    }

    /// Length in characters, as shown by diagnostics.
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.masked())
    }
}

/// Immutable process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<ApiKey>,
    pub agent_model: String,
    pub direct_model: String,
    pub api_base: String,
    pub bind_addr: String,
    pub http_timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            agent_model: DEFAULT_AGENT_MODEL.to_string(),
            direct_model: DEFAULT_DIRECT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            http_timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name))
    }

    /// Reads settings through an arbitrary variable lookup.
    ///
    /// A missing API key is not an error here; it is reported by
    /// [`Settings::require_api_key`] when a model call is about to happen.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let defaults = Self::default();

        let api_key = read_var(&lookup, API_KEY_VAR)?.map(ApiKey::new);

        let retry = RetryPolicy::new(
            parse_var(&lookup, RETRY_ATTEMPTS_VAR)?.unwrap_or(RetryPolicy::DEFAULT_MAX_ATTEMPTS),
            parse_var(&lookup, RETRY_BACKOFF_BASE_VAR)?.unwrap_or(RetryPolicy::DEFAULT_BACKOFF_BASE),
            parse_secs(&lookup, RETRY_INITIAL_DELAY_VAR)?.unwrap_or(RetryPolicy::DEFAULT_INITIAL_DELAY),
            parse_status_codes(&lookup)?.unwrap_or_else(|| RetryPolicy::DEFAULT_STATUS_CODES.to_vec()),
        )?;

        Ok(Self {
            api_key,
            agent_model: read_var(&lookup, AGENT_MODEL_VAR)?.unwrap_or(defaults.agent_model),
            direct_model: read_var(&lookup, DIRECT_MODEL_VAR)?.unwrap_or(defaults.direct_model),
            api_base: read_var(&lookup, API_BASE_VAR)?.unwrap_or(defaults.api_base),
            bind_addr: read_var(&lookup, BIND_ADDR_VAR)?.unwrap_or(defaults.bind_addr),
            http_timeout: parse_secs(&lookup, HTTP_TIMEOUT_VAR)?,
            retry,
        })
    }

    /// Returns a copy with the given API key set.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(ApiKey::new(key));
        self
    }

    /// Returns the API key or the "not configured" error.
    pub fn require_api_key(&self) -> Result<&ApiKey, ConfigError> {
        self.api_key.as_ref().ok_or(ConfigError::MissingApiKey(API_KEY_VAR))
    }

    /// Logs the effective configuration without exposing the key.
    pub fn log_summary(&self) {
        match &self.api_key {
            Some(key) => info!("API Key configured: {}", key.masked()),
            None => error!("{} environment variable is not set!", API_KEY_VAR),
        }
        info!("Agent model: {}, direct model: {}", self.agent_model, self.direct_model);
        info!(
            "Retry policy: {} attempts, base {}, initial delay {:?}, codes {:?}",
            self.retry.max_attempts(),
            self.retry.backoff_base(),
            self.retry.initial_delay(),
            self.retry.retryable_status_codes()
        );

        let worst_case = self.retry.worst_case_delay();
        if worst_case > SLOW_RETRY_WARNING {
            warn!(
                "Retry policy can wait up to {}s before giving up on a request",
                worst_case.as_secs()
            );
        }
    }
}

/// Reads a variable, treating unset and blank the same way.
fn read_var<F>(lookup: &F, var: &str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    match lookup(var) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::Unreadable {
            var: var.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_var<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Result<String, VarError>,
{
    read_var(lookup, var)?
        .map(|value| {
            value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                var: var.to_string(),
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_secs<F>(lookup: &F, var: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let Some(secs) = parse_var::<f64, F>(lookup, var)? else {
        return Ok(None);
    };

    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            var: var.to_string(),
            value: secs.to_string(),
            reason: e.to_string(),
        })
}

fn parse_status_codes<F>(lookup: &F) -> Result<Option<Vec<u16>>, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let Some(raw) = read_var(lookup, RETRY_STATUS_CODES_VAR)? else {
        return Ok(None);
    };

    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| {
            code.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                var: RETRY_STATUS_CODES_VAR.to_string(),
                value: code.to_string(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
