//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `API_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `API_BASE_URL` - Public URL of the API (decides secure cookies)
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 3000)
//! - `PAYMENT_GATEWAY_URL` - Gateway REST base URL (default: `https://api.razorpay.com`)
//! - `PAYMENT_GATEWAY_KEY_ID` / `PAYMENT_GATEWAY_KEY_SECRET` - Gateway credentials (both or neither)
//! - `PAYMENT_SIGNATURE_SECRET` - HMAC secret for payment signatures (default: gateway key secret)
//! - `STORE_CURRENCY` - ISO currency code (default: INR)
//! - `SHIPPING_DISCOUNTED_PREFIXES` - Comma-separated postal prefixes (default: 40,41,42,43,44)
//! - `SHIPPING_DISCOUNTED_RATE` - Regional shipping rate (default: 80)
//! - `SHIPPING_FLAT_RATE` - Shipping rate elsewhere (default: 150)
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD` - Mail relay (all three enable email)
//! - `SMTP_PORT` - Mail relay port (default: 587)
//! - `EMAIL_FROM` - Sender address (default: `orders@<SMTP_HOST>`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//!
//! Payment and mail settings are optional at startup: missing gateway
//! credentials fail the payment endpoints when called, missing SMTP settings
//! turn confirmation emails off.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use emporium_core::CurrencyCode;
use emporium_core::shipping::{
    DEFAULT_DISCOUNTED_PREFIXES, DEFAULT_DISCOUNTED_RATE, DEFAULT_FLAT_RATE, ShippingPolicy,
};

const DEFAULT_GATEWAY_URL: &str = "https://api.razorpay.com";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: String,
    /// Payment gateway credentials, if configured
    pub gateway: Option<GatewayConfig>,
    /// Secret used to verify payment signatures, if configured
    pub signature_secret: Option<SecretString>,
    /// Currency every order is charged in
    pub currency: CurrencyCode,
    /// Shipping rate table
    pub shipping: ShippingPolicy,
    /// SMTP settings for confirmation emails, if configured
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Payment gateway REST configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct GatewayConfig {
    /// REST base URL
    pub base_url: Url,
    /// Public key id (returned to clients for the checkout widget)
    pub key_id: String,
    /// Private key secret (server-side only)
    pub key_secret: SecretString,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url.as_str())
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish()
    }
}

/// SMTP relay configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, values do not
    /// parse, or the gateway secret fails validation (placeholder detection,
    /// entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("API_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("API_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("API_PORT", "3000")?;
        let base_url = get_required_env("API_BASE_URL")?;

        let gateway = GatewayConfig::from_env()?;
        let signature_secret = get_optional_env("PAYMENT_SIGNATURE_SECRET")
            .map(SecretString::from)
            .or_else(|| gateway.as_ref().map(|g| g.key_secret.clone()));

        let currency = get_env_or_default("STORE_CURRENCY", "INR")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("STORE_CURRENCY".to_string(), e))?;

        let shipping = shipping_from_env()?;
        let email = EmailConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            gateway,
            signature_secret,
            currency,
            shipping,
            email,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the API is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl GatewayConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let key_id = get_optional_env("PAYMENT_GATEWAY_KEY_ID");
        let key_secret = get_optional_env("PAYMENT_GATEWAY_KEY_SECRET");

        let (key_id, key_secret) = match (key_id, key_secret) {
            (Some(id), Some(secret)) => (id, secret),
            (None, None) => return Ok(None),
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar(
                    "PAYMENT_GATEWAY_KEY_SECRET".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar(
                    "PAYMENT_GATEWAY_KEY_ID".to_string(),
                ));
            }
        };
        validate_secret_strength(&key_secret, "PAYMENT_GATEWAY_KEY_SECRET")?;

        let base_url = get_env_or_default("PAYMENT_GATEWAY_URL", DEFAULT_GATEWAY_URL);
        let base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("PAYMENT_GATEWAY_URL".to_string(), e.to_string())
        })?;

        Ok(Some(Self {
            base_url,
            key_id,
            key_secret: SecretString::from(key_secret),
        }))
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let (Some(smtp_host), Some(smtp_username), Some(smtp_password)) = (
            get_optional_env("SMTP_HOST"),
            get_optional_env("SMTP_USERNAME"),
            get_optional_env("SMTP_PASSWORD"),
        ) else {
            return Ok(None);
        };

        let smtp_port = parse_env_or_default::<u16>("SMTP_PORT", "587")?;
        let from_address =
            get_optional_env("EMAIL_FROM").unwrap_or_else(|| format!("orders@{smtp_host}"));

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password: SecretString::from(smtp_password),
            from_address,
        }))
    }
}

fn shipping_from_env() -> Result<ShippingPolicy, ConfigError> {
    let prefixes = get_optional_env("SHIPPING_DISCOUNTED_PREFIXES").map_or_else(
        || DEFAULT_DISCOUNTED_PREFIXES.map(str::to_owned).to_vec(),
        |raw| raw.split(',').map(str::to_owned).collect(),
    );
    let discounted = parse_rate("SHIPPING_DISCOUNTED_RATE", DEFAULT_DISCOUNTED_RATE)?;
    let flat = parse_rate("SHIPPING_FLAT_RATE", DEFAULT_FLAT_RATE)?;

    Ok(ShippingPolicy::new(prefixes, discounted, flat))
}

fn parse_rate(key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate = Decimal::from_str(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if rate.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "rate cannot be negative".to_string(),
        ));
    }
    Ok(rate)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
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
    let len = s.chars().count() as f64;
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the secret issued by the gateway."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            gateway: None,
            signature_secret: None,
            currency: CurrencyCode::INR,
            shipping: ShippingPolicy::default(),
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-gateway-secret", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("Qm7vT2pXk9LrB4sWz8NcY1dH", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_is_secure() {
        let mut config = test_config();
        assert!(!config.is_secure());
        config.base_url = "https://shop.example.in".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_gateway_config_debug_redacts_secret() {
        let config = GatewayConfig {
            base_url: Url::parse("https://api.razorpay.com").unwrap(),
            key_id: "rzp_test_public".to_string(),
            key_secret: SecretString::from("super_secret_gateway_key"),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("rzp_test_public"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_gateway_key"));
    }

    #[test]
    fn test_email_config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "smtp.example.in".to_string(),
            smtp_port: 587,
            smtp_username: "mailer".to_string(),
            smtp_password: SecretString::from("hunter2hunter2"),
            from_address: "orders@example.in".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("smtp.example.in"));
        assert!(!debug_output.contains("hunter2hunter2"));
    }
}
