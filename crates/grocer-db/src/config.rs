//! Store configuration.
//!
//! Loaded from `GROCER_*` environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use grocer_core::TaxRate;

use crate::pool::DbConfig;

/// Store-wide settings for the checkout engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// Printed on receipts by the web layer
    pub store_name: String,

    /// Flat sales tax rate
    pub tax_rate: TaxRate,

    pub policy: SalesPolicy,
}

/// Checkout and refund policy switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesPolicy {
    /// Allow refunding units that an earlier refund already restored.
    pub allow_repeat_refunds: bool,

    /// Reject redemptions larger than the customer's balance.
    pub enforce_points_balance: bool,

    /// Upper bound for on-hand quantity when a refund restocks.
    pub max_stock_level: Option<i64>,
}

impl Default for SalesPolicy {
    fn default() -> Self {
        SalesPolicy {
            allow_repeat_refunds: false,
            enforce_points_balance: true,
            max_stock_level: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database_path: PathBuf::from("./grocer.db"),
            max_connections: 5,
            store_name: "Grocery Store".to_string(),
            tax_rate: TaxRate::from_bps(800),
            policy: SalesPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = StoreConfig::default();

        let config = StoreConfig {
            database_path: lookup("GROCER_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: match lookup("GROCER_MAX_CONNECTIONS") {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("GROCER_MAX_CONNECTIONS".to_string()))?,
                None => defaults.max_connections,
            },

            store_name: lookup("GROCER_STORE_NAME").unwrap_or(defaults.store_name),

            // Percent, e.g. "8" or "8.25"
            tax_rate: match lookup("GROCER_TAX_RATE") {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("GROCER_TAX_RATE".to_string()))?,
                None => defaults.tax_rate,
            },

            policy: SalesPolicy {
                allow_repeat_refunds: parse_flag(
                    &lookup,
                    "GROCER_ALLOW_REPEAT_REFUNDS",
                    defaults.policy.allow_repeat_refunds,
                )?,
                enforce_points_balance: parse_flag(
                    &lookup,
                    "GROCER_ENFORCE_POINTS_BALANCE",
                    defaults.policy.enforce_points_balance,
                )?,
                max_stock_level: match lookup("GROCER_MAX_STOCK_LEVEL") {
                    Some(raw) => Some(raw.trim().parse().map_err(|_| {
                        ConfigError::InvalidValue("GROCER_MAX_STOCK_LEVEL".to_string())
                    })?),
                    None => None,
                },
            },
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("GROCER_MAX_CONNECTIONS".to_string()));
        }
        if matches!(config.policy.max_stock_level, Some(level) if level < 0) {
            return Err(ConfigError::InvalidValue("GROCER_MAX_STOCK_LEVEL".to_string()));
        }

        Ok(config)
    }

    /// Pool configuration for this store's database.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.max_connections)
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        },
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
