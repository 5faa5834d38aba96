//! Application configuration loaded from environment variables.

use common::Money;
use domain::PricingPolicy;
use rust_decimal::Decimal;
use thiserror::Error;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Fmt,
    /// One JSON object per line.
    Json,
}

/// An environment variable that is set but cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value for {name}: {value:?} ({reason})")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub reason: String,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `fmt` or `json` (default: `fmt`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory storage when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `TAX_RATE`, `FREE_SHIPPING_THRESHOLD`, `FLAT_SHIPPING_COST`,
///   `DELIVERY_WINDOW_DAYS`: pricing overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub pricing: PricingPolicy,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let pricing_defaults = defaults.pricing.clone();

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("fmt") | Some("") => LogFormat::Fmt,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected fmt or json".to_string(),
                });
            }
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT")?.unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database_max_connections),
            pricing: PricingPolicy {
                tax_rate: parse_var::<Decimal, _>(&lookup, "TAX_RATE")?
                    .unwrap_or(pricing_defaults.tax_rate),
                free_shipping_threshold: parse_var::<Money, _>(&lookup, "FREE_SHIPPING_THRESHOLD")?
                    .unwrap_or(pricing_defaults.free_shipping_threshold),
                flat_shipping_cost: parse_var::<Money, _>(&lookup, "FLAT_SHIPPING_COST")?
                    .unwrap_or(pricing_defaults.flat_shipping_cost),
                delivery_window_days: parse_var(&lookup, "DELIVERY_WINDOW_DAYS")?
                    .unwrap_or(pricing_defaults.delivery_window_days),
            },
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    let parsed: Result<T, T::Err> = value.trim().parse();
    match parsed {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => Err(ConfigError {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Fmt,
            database_url: None,
            database_max_connections: 10,
            pricing: PricingPolicy::default(),
        }
    }
}
