use crate::domain::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub purchases_path: PathBuf,
    pub sales_path: PathBuf,
    pub conversions_path: PathBuf,
    pub report_dir: PathBuf,
    pub seed_sample_data: bool,
    pub ledger: LedgerSettings,
}

/// Settings that influence computed figures. Everything else in [`Config`]
/// only decides where records come from and where reports go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSettings {
    /// Platform whose trades get an implicit fee when none was recorded.
    pub reference_platform: String,
    /// Implicit fee rate (fraction of traded USDT) for USD trades.
    pub fee_rate_usd: Decimal,
    /// Implicit fee rate (fraction of traded USDT) for UYU trades.
    pub fee_rate_uyu: Decimal,
    /// Inventory at or below this quantity counts as empty.
    pub inventory_epsilon: Decimal,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            reference_platform: DEFAULT_REFERENCE_PLATFORM.to_string(),
            fee_rate_usd: decimal_const(DEFAULT_FEE_RATE_USD),
            fee_rate_uyu: decimal_const(DEFAULT_FEE_RATE_UYU),
            inventory_epsilon: decimal_const(DEFAULT_INVENTORY_EPSILON),
        }
    }
}

const DEFAULT_REFERENCE_PLATFORM: &str = "binance";
const DEFAULT_FEE_RATE_USD: &str = "0.0028";
const DEFAULT_FEE_RATE_UYU: &str = "0.0016";
const DEFAULT_INVENTORY_EPSILON: &str = "0.00000001";

fn decimal_const(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let path = |key: &str, default: &str| {
            PathBuf::from(
                env_map
                    .get(key)
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .unwrap_or(default),
            )
        };

        let purchases_path = path("PURCHASES_PATH", "data/purchases.csv");
        let sales_path = path("SALES_PATH", "data/sales.csv");
        let conversions_path = path("CONVERSIONS_PATH", "data/conversions.csv");
        let report_dir = path("REPORT_DIR", "data/reports");

        let seed_sample_data = match env_map
            .get("SEED_SAMPLE_DATA")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
            .unwrap_or("false")
        {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" | "" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "SEED_SAMPLE_DATA".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        let reference_platform = env_map
            .get("REFERENCE_PLATFORM")
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_REFERENCE_PLATFORM.to_string());

        let fee_rate_usd = parse_non_negative(&env_map, "FEE_RATE_USD", DEFAULT_FEE_RATE_USD)?;
        let fee_rate_uyu = parse_non_negative(&env_map, "FEE_RATE_UYU", DEFAULT_FEE_RATE_UYU)?;
        let inventory_epsilon =
            parse_non_negative(&env_map, "INVENTORY_EPSILON", DEFAULT_INVENTORY_EPSILON)?;

        Ok(Config {
            purchases_path,
            sales_path,
            conversions_path,
            report_dir,
            seed_sample_data,
            ledger: LedgerSettings {
                reference_platform,
                fee_rate_usd,
                fee_rate_uyu,
                inventory_epsilon,
            },
        })
    }
}

fn parse_non_negative(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    let value = Decimal::from_str_canonical(raw).map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), "must be a decimal number".to_string())
    })?;
    if value.is_negative() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(value)
}
