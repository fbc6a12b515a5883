//! Configuration management for Surplus Manager
//!
//! This module handles loading, validation and management of the application
//! configuration from YAML files. Manager settings are kept as raw property
//! maps, the shape in which a host framework hands them over, and are turned
//! into a typed [`ManagerConfig`] by [`crate::params`].

use crate::error::{ManagerError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

mod defaults;

/// Shortest accepted refresh interval in seconds
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 10;

/// SOC floor used while no SOC threshold is known
pub const DEFAULT_MIN_STORAGE_SOC: f64 = 30.0;

/// SOC ceiling used while no SOC threshold is known
pub const DEFAULT_MAX_STORAGE_SOC: f64 = 100.0;

/// Untyped property map as supplied by the host
pub type RawConfiguration = BTreeMap<String, serde_json::Value>;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Manager instances, each with its own evaluation loop
    #[serde(default)]
    pub managers: Vec<ManagerSection>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level
    pub console_level: Option<String>,

    /// Optional file-specific level
    pub file_level: Option<String>,

    /// Path to log file (its directory receives the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// One configured manager instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerSection {
    /// Unique id, used as the owner id for event registrations
    pub id: String,

    /// Raw manager settings (see [`ManagerConfig`] for the property names)
    pub settings: RawConfiguration,

    /// Output channels in declaration order
    #[serde(default)]
    pub outputs: Vec<OutputChannelDefinition>,
}

/// Raw definition of one output channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputChannelDefinition {
    pub id: String,

    #[serde(default)]
    pub parameters: RawConfiguration,
}

/// SOC thresholds may be written as a bare number or as text
fn soc_threshold<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Threshold {
        Percent(f64),
        Text(String),
    }

    Ok(match Threshold::deserialize(deserializer)? {
        Threshold::Percent(value) => value.to_string(),
        Threshold::Text(text) => text,
    })
}

/// Typed settings of one manager instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerConfig {
    /// Seconds between the end of one cycle and the start of the next
    pub refresh_interval: u64,

    /// Seconds before the first cycle
    #[serde(default)]
    pub initial_delay: u64,

    /// Rated production of the installation in watts
    pub peak_production_power: f64,

    /// Minimum SOC: a literal percentage or the name of an item reporting it
    #[serde(default = "defaults::min_storage_soc", deserialize_with = "soc_threshold")]
    pub min_storage_soc: String,

    /// Maximum SOC: a literal percentage or the name of an item reporting it
    #[serde(default = "defaults::max_storage_soc", deserialize_with = "soc_threshold")]
    pub max_storage_soc: String,

    /// Item reporting production power
    pub production_power: String,

    /// Item reporting grid power (negative = feed-in)
    pub grid_power: String,

    /// Item reporting storage SOC
    #[serde(default)]
    pub storage_soc: Option<String>,

    /// Item reporting storage power (negative = charging)
    #[serde(default)]
    pub storage_power: Option<String>,

    /// Item reporting the current electricity price
    #[serde(default)]
    pub electricity_price: Option<String>,

    /// Surplus kept free for unmanaged loads, in watts
    #[serde(default)]
    pub min_available_surplus_energy: f64,

    /// Grid draw absorbed as meter noise, in watts
    #[serde(default)]
    pub tolerated_power_draw: f64,

    /// Switch every load on while the price is negative
    #[serde(default)]
    pub toggle_on_negative_price: bool,

    /// Assume clipped production when storage is full
    #[serde(default)]
    pub enable_inverter_limiting_heuristic: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "surplus_manager.yaml",
            "/data/surplus_manager.yaml",
            "/etc/surplus-manager/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration, including every manager's typed settings
    pub fn validate(&self) -> Result<()> {
        crate::logging::level::parse_log_level(&self.logging.level)?;

        let mut seen = std::collections::HashSet::new();
        for section in &self.managers {
            if section.id.trim().is_empty() {
                return Err(ManagerError::validation(
                    "managers.id",
                    "Manager id cannot be empty",
                ));
            }
            if !seen.insert(section.id.as_str()) {
                return Err(ManagerError::validation(
                    "managers.id".to_string(),
                    format!("Duplicate manager id '{}'", section.id),
                ));
            }
            crate::params::typed_manager_config(&section.settings)?;
        }

        Ok(())
    }
}

impl ManagerConfig {
    /// Check the constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval < MIN_REFRESH_INTERVAL_SECS {
            return Err(ManagerError::validation(
                "refreshInterval".to_string(),
                format!(
                    "Must be at least {} seconds, got {}",
                    MIN_REFRESH_INTERVAL_SECS, self.refresh_interval
                ),
            ));
        }

        if self.production_power.trim().is_empty() {
            return Err(ManagerError::validation(
                "productionPower",
                "Item name cannot be empty",
            ));
        }

        if self.grid_power.trim().is_empty() {
            return Err(ManagerError::validation(
                "gridPower",
                "Item name cannot be empty",
            ));
        }

        if !self.peak_production_power.is_finite() || self.peak_production_power < 0.0 {
            return Err(ManagerError::validation(
                "peakProductionPower",
                "Must be a non-negative number",
            ));
        }

        if self.min_available_surplus_energy < 0.0 || self.tolerated_power_draw < 0.0 {
            return Err(ManagerError::validation(
                "minAvailableSurplusEnergy/toleratedPowerDraw",
                "Must not be negative",
            ));
        }

        Ok(())
    }
}
