//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `CATALOG_URL` or `CATALOG_PATH` - Remote catalog base URL, or a local
//!   JSON product file (the URL wins when both are set)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` session store; falls back to
//!   `DATABASE_URL`, in-memory sessions when neither is set
//! - `CATALOG_API_TOKEN` - Bearer token for the remote catalog
//! - `TAX_SOURCE_URL` - Remote tax configuration document
//! - `STOREFRONT_TAX_TTL_SECS` - Tax rate lifetime (default: 3600)
//! - `STOREFRONT_TAX_FALLBACK_RATE` - Rate used at checkout when no rate is
//!   cached, and the fixed rate when `TAX_SOURCE_URL` is unset (default: 0.1)
//! - `STOREFRONT_TAX_MAX_ATTEMPTS` - Fetch attempts per refresh (default: 3)
//! - `STOREFRONT_TAX_RETRY_BASE_MS` - First retry delay (default: 500)
//! - `STOREFRONT_CART_TTL_SECS` - Cart lifetime (default: 3600)
//! - `STOREFRONT_LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;
use lattice_core::TaxRate;
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use crate::services::RetryPolicy;
use crate::stores::{DEFAULT_CART_TTL_SECS, DEFAULT_TAX_TTL_SECS};

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
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

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` session store URL (contains password)
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    pub catalog: CatalogConfig,
    pub tax: TaxConfig,
    pub cart: CartConfig,
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Where products come from.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub enum CatalogConfig {
    Remote {
        url: String,
        api_token: Option<SecretString>,
    },
    File {
        path: PathBuf,
    },
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote { url, api_token } => f
                .debug_struct("Remote")
                .field("url", url)
                .field("api_token", &api_token.as_ref().map(|_| "[REDACTED]"))
                .finish(),
            Self::File { path } => f.debug_struct("File").field("path", path).finish(),
        }
    }
}

/// Tax rate source and refresh behaviour.
#[derive(Debug, Clone)]
pub struct TaxConfig {
    /// Remote tax document; `None` means the fallback rate is served as a
    /// fixed rate.
    pub source_url: Option<String>,
    pub ttl: Duration,
    /// Rate checkout uses when no valid rate is cached.
    pub fallback_rate: TaxRate,
    pub retry: RetryPolicy,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            ttl: Duration::seconds(DEFAULT_TAX_TTL_SECS),
            fallback_rate: TaxRate::new(Decimal::new(1, 1)).unwrap_or(TaxRate::ZERO),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CartConfig {
    pub ttl: Duration,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_CART_TTL_SECS),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get_database_url(env, "STOREFRONT_DATABASE_URL");
        let host: IpAddr = parse_env_or_default(env, "STOREFRONT_HOST", "127.0.0.1")?;
        let port: u16 = parse_env_or_default(env, "STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env(env, "STOREFRONT_BASE_URL")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            catalog: CatalogConfig::from_lookup(env)?,
            tax: TaxConfig::from_lookup(env)?,
            cart: CartConfig::from_lookup(env)?,
            log_format: parse_env_or_default(env, "STOREFRONT_LOG_FORMAT", "pretty")?,
            sentry_dsn: env("SENTRY_DSN"),
            sentry_environment: env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CatalogConfig {
    fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(url) = env("CATALOG_URL") {
            let api_token = match env("CATALOG_API_TOKEN") {
                Some(token) => {
                    validate_secret_strength(&token, "CATALOG_API_TOKEN")?;
                    Some(SecretString::from(token))
                }
                None => None,
            };
            return Ok(Self::Remote { url, api_token });
        }
        if let Some(path) = env("CATALOG_PATH") {
            return Ok(Self::File { path: path.into() });
        }
        Err(ConfigError::MissingEnvVar("CATALOG_URL or CATALOG_PATH".to_string()))
    }
}

impl TaxConfig {
    fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let ttl_secs: u32 = parse_env_or_default(
            env,
            "STOREFRONT_TAX_TTL_SECS",
            &DEFAULT_TAX_TTL_SECS.to_string(),
        )?;
        let fallback: f64 = parse_env_or_default(env, "STOREFRONT_TAX_FALLBACK_RATE", "0.1")?;
        let fallback_rate = TaxRate::try_from(fallback).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_TAX_FALLBACK_RATE".to_string(), e.to_string())
        })?;
        let max_attempts: u32 = parse_env_or_default(env, "STOREFRONT_TAX_MAX_ATTEMPTS", "3")?;
        let base_ms: u64 = parse_env_or_default(env, "STOREFRONT_TAX_RETRY_BASE_MS", "500")?;

        Ok(Self {
            source_url: env("TAX_SOURCE_URL"),
            ttl: Duration::seconds(i64::from(ttl_secs)),
            fallback_rate,
            retry: RetryPolicy::new(max_attempts, StdDuration::from_millis(base_ms)),
        })
    }
}

impl CartConfig {
    fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let ttl_secs: u32 = parse_env_or_default(
            env,
            "STOREFRONT_CART_TTL_SECS",
            &DEFAULT_CART_TTL_SECS.to_string(),
        )?;
        Ok(Self {
            ttl: Duration::seconds(i64::from(ttl_secs)),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(env: &dyn Fn(&str) -> Option<String>, primary_key: &str) -> Option<SecretString> {
    env(primary_key)
        .or_else(|| env("DATABASE_URL"))
        .map(SecretString::from)
}

/// Parse an environment variable, using `default` when unset.
fn parse_env_or_default<T>(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env(key)
        .as_deref()
        .unwrap_or(default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
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

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_defaults() {
        let env = lookup(&[
            ("STOREFRONT_BASE_URL", "http://localhost:3000"),
            ("CATALOG_PATH", "catalog.json"),
        ]);
        let config = StorefrontConfig::from_lookup(&env).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert!(config.database_url.is_none());
        assert!(!config.is_secure());
        assert!(matches!(config.catalog, CatalogConfig::File { .. }));
        assert_eq!(config.tax.ttl, Duration::hours(1));
        assert_eq!(config.tax.fallback_rate.as_decimal(), Decimal::new(1, 1));
        assert_eq!(config.tax.retry.max_attempts, 3);
        assert_eq!(config.cart.ttl, Duration::hours(1));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_catalog_source_required() {
        let env = lookup(&[("STOREFRONT_BASE_URL", "http://localhost:3000")]);
        assert!(matches!(
            StorefrontConfig::from_lookup(&env),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_database_url_fallback() {
        let env = lookup(&[
            ("STOREFRONT_BASE_URL", "https://shop.test"),
            ("CATALOG_PATH", "catalog.json"),
            ("DATABASE_URL", "postgres://localhost/sessions"),
        ]);
        let config = StorefrontConfig::from_lookup(&env).unwrap();
        assert!(config.database_url.is_some());
        assert!(config.is_secure());
    }

    #[test]
    fn test_out_of_range_fallback_rate_rejected() {
        let env = lookup(&[
            ("STOREFRONT_BASE_URL", "http://localhost:3000"),
            ("CATALOG_PATH", "catalog.json"),
            ("STOREFRONT_TAX_FALLBACK_RATE", "1.5"),
        ]);
        assert!(matches!(
            StorefrontConfig::from_lookup(&env),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "STOREFRONT_TAX_FALLBACK_RATE"
        ));
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let env = lookup(&[
            ("STOREFRONT_BASE_URL", "http://localhost:3000"),
            ("CATALOG_PATH", "catalog.json"),
            ("STOREFRONT_LOG_FORMAT", "xml"),
        ]);
        assert!(StorefrontConfig::from_lookup(&env).is_err());
    }

    #[test]
    fn test_catalog_config_debug_redacts_token() {
        let env = lookup(&[
            ("STOREFRONT_BASE_URL", "http://localhost:3000"),
            ("CATALOG_URL", "https://docs.internal/v1"),
            ("CATALOG_API_TOKEN", "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"),
        ]);
        let config = StorefrontConfig::from_lookup(&env).unwrap();
        let debug_output = format!("{:?}", config.catalog);

        assert!(debug_output.contains("https://docs.internal/v1"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("aB3$xY9"));
    }

    #[test]
    fn test_placeholder_catalog_token_rejected() {
        let env = lookup(&[
            ("STOREFRONT_BASE_URL", "http://localhost:3000"),
            ("CATALOG_URL", "https://docs.internal/v1"),
            ("CATALOG_API_TOKEN", "changeme"),
        ]);
        assert!(matches!(
            StorefrontConfig::from_lookup(&env),
            Err(ConfigError::InsecureSecret(_, _))
        ));
    }
}
