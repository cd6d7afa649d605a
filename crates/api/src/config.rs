//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use domain::{AccessCodeSigner, Currency};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected text or json, got {other}")),
        }
    }
}

/// Connection settings for the hosted payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub base_url: String,
    pub secret_key: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `DATABASE_URL`: PostgreSQL event store; in-memory when unset
/// - `DATABASE_MAX_CONNECTIONS` (default 10)
/// - `CATALOG_PATH`: JSON ticket catalog; built-in catalog when unset
/// - `CURRENCY` (default `USD`)
/// - `ORDER_TTL_SECS` (default 900), `EXPIRY_SWEEP_SECS` (default 30)
/// - `MAX_TICKETS_PER_ORDER` (default 10)
/// - `PAYMENT_GATEWAY_URL`: hosted gateway; in-memory gateway when unset.
///   Requires `PAYMENT_GATEWAY_SECRET_KEY`, `PAYMENT_SUCCESS_URL` and
///   `PAYMENT_CANCEL_URL`.
/// - `WEBHOOK_SECRET` (required), `WEBHOOK_TOLERANCE_SECS` (default 300)
/// - `ACCESS_CODE_SECRET` (required, at least 16 bytes)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub catalog_path: Option<PathBuf>,
    pub currency: Currency,
    pub order_ttl: chrono::Duration,
    pub expiry_sweep: Duration,
    pub max_tickets_per_order: u32,
    pub gateway: Option<GatewaySettings>,
    pub webhook_secret: String,
    pub webhook_tolerance: chrono::Duration,
    pub access_code_secret: String,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the value of a
    /// variable or `None` when it is unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let currency = match env.get("CURRENCY") {
            Some(code) => Currency::parse(&code).ok_or_else(|| ConfigError::Invalid {
                key: "CURRENCY",
                value: code.clone(),
                reason: "expected a three-letter currency code".to_string(),
            })?,
            None => Currency::default(),
        };

        let gateway = match env.get("PAYMENT_GATEWAY_URL") {
            Some(base_url) => Some(GatewaySettings {
                base_url,
                secret_key: env.require("PAYMENT_GATEWAY_SECRET_KEY")?,
                success_url: env.require("PAYMENT_SUCCESS_URL")?,
                cancel_url: env.require("PAYMENT_CANCEL_URL")?,
            }),
            None => None,
        };

        let access_code_secret = env.require("ACCESS_CODE_SECRET")?;
        if access_code_secret.len() < AccessCodeSigner::MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "ACCESS_CODE_SECRET",
                value: "<redacted>".to_string(),
                reason: format!(
                    "must be at least {} bytes",
                    AccessCodeSigner::MIN_SECRET_LEN
                ),
            });
        }

        Ok(Self {
            host: env.get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env.parse("PORT", 3000)?,
            log_level: env.get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_format: env.parse("LOG_FORMAT", LogFormat::Text)?,
            database_url: env.get("DATABASE_URL"),
            database_max_connections: env.parse("DATABASE_MAX_CONNECTIONS", 10)?,
            catalog_path: env.get("CATALOG_PATH").map(PathBuf::from),
            currency,
            order_ttl: chrono::Duration::seconds(env.positive("ORDER_TTL_SECS", 900)?),
            expiry_sweep: Duration::from_secs(env.positive("EXPIRY_SWEEP_SECS", 30)? as u64),
            max_tickets_per_order: env.parse("MAX_TICKETS_PER_ORDER", 10)?,
            gateway,
            webhook_secret: env.require("WEBHOOK_SECRET")?,
            webhook_tolerance: chrono::Duration::seconds(
                env.positive("WEBHOOK_TOLERANCE_SECS", 300)?,
            ),
            access_code_secret,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Value of `key`, treating blank values as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn require(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value: value.clone(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn positive(&self, key: &'static str, default: i64) -> Result<i64, ConfigError> {
        let value = self.parse(key, default)?;
        if value <= 0 {
            return Err(ConfigError::Invalid {
                key,
                value: value.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("WEBHOOK_SECRET", "whsec_test"),
        ("ACCESS_CODE_SECRET", "0123456789abcdef"),
    ];

    #[test]
    fn test_default_values() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.currency, Currency::default());
        assert_eq!(config.order_ttl, chrono::Duration::minutes(15));
        assert_eq!(config.expiry_sweep, Duration::from_secs(30));
        assert_eq!(config.max_tickets_per_order, 10);
        assert_eq!(config.webhook_tolerance, chrono::Duration::seconds(300));
        assert!(config.gateway.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([("HOST", "127.0.0.1"), ("PORT", "8080")]);
        assert_eq!(load(&vars).unwrap().addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("LOG_FORMAT", "JSON"),
            ("CURRENCY", "eur"),
            ("ORDER_TTL_SECS", "600"),
            ("PAYMENT_GATEWAY_URL", "https://gateway.example"),
            ("PAYMENT_GATEWAY_SECRET_KEY", "sk_test"),
            ("PAYMENT_SUCCESS_URL", "https://conf.example/thanks"),
            ("PAYMENT_CANCEL_URL", "https://conf.example/cart"),
        ]);
        let config = load(&vars).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.currency.as_str(), "EUR");
        assert_eq!(config.order_ttl, chrono::Duration::minutes(10));
        assert_eq!(config.gateway.unwrap().secret_key, "sk_test");
    }

    #[test]
    fn test_missing_required() {
        assert_eq!(
            load(&[("ACCESS_CODE_SECRET", "0123456789abcdef")]).unwrap_err(),
            ConfigError::Missing("WEBHOOK_SECRET")
        );

        let mut vars = REQUIRED.to_vec();
        vars.push(("PAYMENT_GATEWAY_URL", "https://gateway.example"));
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing("PAYMENT_GATEWAY_SECRET_KEY")
        );
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "eighty"));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));

        let mut vars = REQUIRED.to_vec();
        vars.push(("EXPIRY_SWEEP_SECS", "0"));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { key: "EXPIRY_SWEEP_SECS", .. })
        ));

        let short = [("WEBHOOK_SECRET", "whsec_test"), ("ACCESS_CODE_SECRET", "short")];
        assert!(matches!(
            load(&short),
            Err(ConfigError::Invalid { key: "ACCESS_CODE_SECRET", .. })
        ));
    }
}
