//! Application configuration loaded from environment variables.
//!
//! # Required environment variables
//!
//! - `DATABASE_URL` (or `PARTSMITH_DATABASE_URL`) - PostgreSQL connection string
//! - `STRIPE_SECRET_KEY` - Stripe API secret key
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook signing secret
//! - `STRIPE_SUCCESS_URL` - redirect for completed checkouts
//! - `STRIPE_CANCEL_URL` - redirect for abandoned checkouts
//!
//! # Optional environment variables
//!
//! - `HOST` - bind address (default: 0.0.0.0)
//! - `PORT` - bind port (default: 5050)
//! - `SENTRY_DSN` - error reporting DSN (disabled when unset)
//! - `STRIPE_AUTOMATIC_TAX` - enable Stripe Tax on sessions (default: true)
//! - `EBAY_CLIENT_ID`, `EBAY_CLIENT_SECRET` - catalog sync credentials; the
//!   sync job is disabled when the client id is unset
//! - `EBAY_STORE_NAME` - store identity (default: carismamotorsparts)
//! - `EBAY_SELLER_ID` - seller filter for Browse search (default: store name)
//! - `EBAY_MARKETPLACE_ID` - marketplace header value (default: EBAY_US)
//! - `EBAY_CATALOG_LIMIT` - search page size (default: 50)
//! - `EBAY_QUERY_SEEDS` - comma-separated sweep queries
//! - `EBAY_SYNC_ENABLED` - gate for the background sweep job (default: true)
//! - `EBAY_SYNC_INTERVAL_MINUTES` - sweep cadence (default: 30)
//! - `EBAY_COMPATIBILITY_ENABLED` - fitment fetch from the Shopping API when a
//!   listing description has none (default: true)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM`,
//!   `MERCHANT_EMAIL` - order email settings; all emails are skipped when
//!   `SMTP_HOST` is unset

use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Patterns that indicate a placeholder value was left in a secret.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "changeme",
    "change-me",
    "placeholder",
    "example",
    "your-",
    "your_",
    "xxx",
    "dummy",
    "insert-",
    "<",
    ">",
];

/// Minimum Shannon entropy (bits per character) for secrets.
const MIN_SECRET_ENTROPY: f64 = 3.3;

const DEFAULT_STORE_NAME: &str = "carismamotorsparts";
const DEFAULT_MARKETPLACE: &str = "EBAY_US";
const DEFAULT_QUERY_SEEDS: &str = "a,e,i,o,u,0,1,2,3,4,5,6,7,8,9";
const DEFAULT_CATALOG_LIMIT: u32 = 50;
const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 30;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an invalid value.
    #[error("Invalid value for environment variable {name}: {reason}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Secret value appears to be a placeholder or is too weak.
    #[error("Insecure secret in {name}: {reason}")]
    InsecureSecret {
        /// Variable name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string.
    pub database_url: SecretString,
    /// Address the HTTP server binds to.
    pub host: IpAddr,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Sentry DSN, if error reporting is enabled.
    pub sentry_dsn: Option<String>,
    /// eBay API settings; `None` disables the catalog sync job.
    pub ebay: Option<EbayConfig>,
    /// Stripe API settings.
    pub stripe: StripeConfig,
    /// SMTP settings; `None` disables order emails.
    pub email: Option<EmailConfig>,
}

/// eBay API and catalog sweep settings.
#[derive(Clone, Debug)]
pub struct EbayConfig {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: SecretString,
    /// Store whose listings are mirrored; used in logs and as the seller
    /// filter fallback.
    pub store_name: String,
    /// Seller filter for Browse search.
    pub seller_id: String,
    /// Marketplace id sent with Browse API requests.
    pub marketplace: String,
    /// Search page size.
    pub page_size: u32,
    /// Search queries the sweep iterates over.
    pub query_seeds: Vec<String>,
    /// Whether the background sweep job runs at all.
    pub sync_enabled: bool,
    /// Delay between catalog sweeps.
    pub sync_interval: Duration,
    /// Whether to backfill fitment from the Shopping API compatibility call.
    pub compatibility_enabled: bool,
}

/// Stripe checkout and webhook settings.
#[derive(Clone, Debug)]
pub struct StripeConfig {
    /// API secret key.
    pub secret_key: SecretString,
    /// Webhook signing secret.
    pub webhook_secret: SecretString,
    /// Redirect after successful payment.
    pub success_url: Url,
    /// Redirect after cancelled payment.
    pub cancel_url: Url,
    /// Enable Stripe Tax on checkout sessions.
    pub automatic_tax: bool,
}

/// SMTP settings for order emails.
#[derive(Clone, Debug)]
pub struct EmailConfig {
    /// SMTP relay host.
    pub smtp_host: String,
    /// SMTP relay port.
    pub smtp_port: u16,
    /// SMTP username.
    pub smtp_username: String,
    /// SMTP password.
    pub smtp_password: SecretString,
    /// From address for outgoing mail.
    pub from_address: String,
    /// Address that receives new-order notifications.
    pub merchant_address: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads `.env` if present, then validates all required variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing, malformed, or
    /// a secret looks like a leftover placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_database_url()?,
            host: parse_env("HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_env("PORT", 5050)?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            ebay: EbayConfig::from_env()?,
            stripe: StripeConfig::from_env()?,
            email: EmailConfig::from_env()?,
        })
    }

    /// Socket address to bind the HTTP server to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl EbayConfig {
    /// Returns `Ok(None)` when `EBAY_CLIENT_ID` is unset; the sync job cannot
    /// run without credentials and startup logs a warning instead.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(client_id) = get_optional_env("EBAY_CLIENT_ID") else {
            return Ok(None);
        };

        let store_name = get_env_or_default("EBAY_STORE_NAME", DEFAULT_STORE_NAME);
        let seller_id = get_optional_env("EBAY_SELLER_ID").unwrap_or_else(|| store_name.clone());
        let interval_minutes: u64 =
            parse_env("EBAY_SYNC_INTERVAL_MINUTES", DEFAULT_SYNC_INTERVAL_MINUTES)?;
        let raw_seeds = get_env_or_default("EBAY_QUERY_SEEDS", DEFAULT_QUERY_SEEDS);

        Ok(Some(Self {
            client_id,
            client_secret: get_validated_secret("EBAY_CLIENT_SECRET")?,
            store_name,
            seller_id,
            marketplace: get_env_or_default("EBAY_MARKETPLACE_ID", DEFAULT_MARKETPLACE),
            page_size: parse_env("EBAY_CATALOG_LIMIT", DEFAULT_CATALOG_LIMIT)?,
            query_seeds: parse_query_seeds(&raw_seeds),
            sync_enabled: parse_env("EBAY_SYNC_ENABLED", true)?,
            sync_interval: Duration::from_secs(interval_minutes * 60),
            compatibility_enabled: parse_env("EBAY_COMPATIBILITY_ENABLED", true)?,
        }))
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            success_url: get_url("STRIPE_SUCCESS_URL")?,
            cancel_url: get_url("STRIPE_CANCEL_URL")?,
            automatic_tax: parse_env("STRIPE_AUTOMATIC_TAX", true)?,
        })
    }
}

impl EmailConfig {
    /// Returns `Ok(None)` when `SMTP_HOST` is unset; the remaining variables
    /// are only required once it is.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", 587)?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_validated_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("EMAIL_FROM")?,
            merchant_address: get_required_env("MERCHANT_EMAIL")?,
        }))
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("ebay", &self.ebay)
            .field("stripe", &self.stripe)
            .field("email", &self.email)
            .finish()
    }
}

/// Get a required environment variable.
fn get_required_env(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default fallback.
fn get_env_or_default(name: &str, default: &str) -> String {
    get_optional_env(name).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable into `T`, using a default when unset.
fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match get_optional_env(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Get a required environment variable that must parse as an absolute URL.
fn get_url(name: &str) -> Result<Url, ConfigError> {
    let raw = get_required_env(name)?;
    Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Get a secret environment variable, rejecting placeholder and low-entropy
/// values.
fn get_validated_secret(name: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(name)?;
    validate_secret(name, value)
}

fn validate_secret(name: &str, value: String) -> Result<SecretString, ConfigError> {
    let lower = value.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret {
                name: name.to_string(),
                reason: format!("contains placeholder pattern \"{pattern}\""),
            });
        }
    }

    if value.len() >= 16 && shannon_entropy(&value) < MIN_SECRET_ENTROPY {
        return Err(ConfigError::InsecureSecret {
            name: name.to_string(),
            reason: "entropy too low, use a generated secret".to_string(),
        });
    }

    Ok(SecretString::from(value))
}

/// Database URL with a service-specific override.
///
/// `PARTSMITH_DATABASE_URL` takes precedence so the service can point at its
/// own database on shared hosts; falls back to the conventional
/// `DATABASE_URL`.
fn get_database_url() -> Result<SecretString, ConfigError> {
    let url = get_optional_env("PARTSMITH_DATABASE_URL")
        .or_else(|| get_optional_env("DATABASE_URL"))
        .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;
    Ok(SecretString::from(url))
}

/// Split the query seed list on commas, dropping empty entries.
fn parse_query_seeds(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut counts = std::collections::HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_insert(0u32) += 1;
    }

    let len = s.chars().count() as f64;
    counts
        .values()
        .map(|&count| {
            let p = f64::from(count) / len;
            -p * p.log2()
        })
        .sum()
}
