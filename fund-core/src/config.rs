//! Configuration for the validator

use crate::types::{Address, AssetClass};
use serde::{Deserialize, Serialize};

/// Validator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Protocol addresses and marker tokens
    pub protocol: ProtocolConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "fund-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol: ProtocolConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Where protocol records live and which tokens mark them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Canonical address of every asset group
    pub asset_group_address: Address,

    /// Address of the portfolio directory
    pub portfolio_address: Address,

    /// Address of the vault
    pub vault_address: Address,

    /// Token tagging an asset group
    pub asset_group_marker: AssetClass,

    /// Token tagging the portfolio directory
    pub portfolio_marker: AssetClass,

    /// Token tagging the fund configuration record
    pub config_marker: AssetClass,

    /// Token tagging the supply record
    pub supply_marker: AssetClass,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            asset_group_address: Address::new("script_asset_group"),
            portfolio_address: Address::new("script_portfolio"),
            vault_address: Address::new("script_vault"),
            asset_group_marker: AssetClass::new("asset_group_policy", ""),
            portfolio_marker: AssetClass::new("portfolio_policy", ""),
            config_marker: AssetClass::new("config_policy", ""),
            supply_marker: AssetClass::new("supply_policy", ""),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Collect prometheus metrics
    pub enabled: bool,

    /// Metric name prefix
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "fund".to_string(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(address) = std::env::var("FUND_ASSET_GROUP_ADDRESS") {
            config.protocol.asset_group_address = Address::new(address);
        }

        if let Ok(address) = std::env::var("FUND_PORTFOLIO_ADDRESS") {
            config.protocol.portfolio_address = Address::new(address);
        }

        if let Ok(address) = std::env::var("FUND_VAULT_ADDRESS") {
            config.protocol.vault_address = Address::new(address);
        }

        if let Ok(enabled) = std::env::var("FUND_METRICS_ENABLED") {
            config.metrics.enabled = enabled.parse().map_err(|_| {
                crate::Error::Config(format!("FUND_METRICS_ENABLED is not a bool: {}", enabled))
            })?;
        }

        Ok(config)
    }
}
