//! Cart client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_API_BASE_URL` - Base URL of the shop's REST API (e.g. `https://shop.example.com/api`)
//!
//! ## Optional
//! - `CART_API_TOKEN` - Bearer token for the signed-in user's cart endpoints
//! - `CART_USER_ID` - Signed-in user ID (requires `CART_API_TOKEN`)
//! - `CART_STORAGE_PATH` - Local storage file (default: `.organic-basket/storage.json`)
//! - `CART_REQUEST_TIMEOUT_SECS` - Remote request timeout (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use organic_basket_core::UserId;

const DEFAULT_STORAGE_PATH: &str = ".organic-basket/storage.json";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MIN_TOKEN_LENGTH: usize = 16;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Cart client configuration.
#[derive(Debug, Clone)]
pub struct CartClientConfig {
    /// Remote cart API settings
    pub api: CartApiConfig,
    /// Signed-in user, if any
    pub user_id: Option<UserId>,
    /// Path of the durable local storage file
    pub storage_path: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Remote cart API configuration.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct CartApiConfig {
    /// Base URL; endpoint paths such as `/cart/add` are appended to it
    pub base_url: Url,
    /// Bearer token for user cart endpoints
    pub access_token: Option<SecretString>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for CartApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl CartApiConfig {
    /// Configuration for a base URL with no token and the default timeout.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            access_token: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl CartClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, if
    /// the token fails validation, or if a user ID is set without a token.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api = CartApiConfig::from_env()?;
        let user_id = get_optional_env("CART_USER_ID")
            .map(|raw| {
                UserId::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("CART_USER_ID".to_string(), e.to_string())
                })
            })
            .transpose()?;

        if user_id.is_some() && api.access_token.is_none() {
            return Err(ConfigError::MissingEnvVar("CART_API_TOKEN".to_string()));
        }

        let storage_path =
            PathBuf::from(get_env_or_default("CART_STORAGE_PATH", DEFAULT_STORAGE_PATH));

        Ok(Self {
            api,
            user_id,
            storage_path,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl CartApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url(&get_required_env("CART_API_BASE_URL")?)?;
        let access_token = get_optional_env("CART_API_TOKEN")
            .map(|token| {
                validate_token(&token, "CART_API_TOKEN")?;
                Ok::<_, ConfigError>(SecretString::from(token))
            })
            .transpose()?;
        let request_timeout = get_env_or_default(
            "CART_REQUEST_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("CART_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        Ok(Self {
            base_url,
            access_token,
            request_timeout: Duration::from_secs(request_timeout),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse the API base URL, requiring an http(s) scheme.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| {
        ConfigError::InvalidEnvVar("CART_API_BASE_URL".to_string(), e.to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "CART_API_BASE_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a token is long enough, not a placeholder, and has sufficient entropy.
fn validate_token(token: &str, var_name: &str) -> Result<(), ConfigError> {
    if token.len() < MIN_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_TOKEN_LENGTH} characters (got {})",
                token.len()
            ),
        ));
    }

    let lower = token.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(token);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Expose a configured token for use in an `Authorization` header.
#[must_use]
pub fn bearer_value(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}
