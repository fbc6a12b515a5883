//! Parameter resolution
//!
//! Turns the raw property maps handed over by the host into typed manager
//! settings and per-channel parameters, and resolves SOC thresholds that may
//! be either a literal percentage or the name of a sensor item.

use crate::config::{
    DEFAULT_MAX_STORAGE_SOC, DEFAULT_MIN_STORAGE_SOC, ManagerConfig, OutputChannelDefinition,
    RawConfiguration,
};
use crate::error::{ManagerError, Result};
use crate::state::{InputRole, InputStateHolder};
use serde_json::Value;
use tracing::{debug, error};

/// Typed parameters of one output channel
#[derive(Debug, Clone, PartialEq)]
pub struct OutputChannelConfig {
    /// Lower value = more important
    pub priority: i32,
    /// Watts drawn while on
    pub load_power: u32,
    /// Watts needed to switch on; `load_power` when unset
    pub switching_power: Option<u32>,
    pub min_runtime_minutes: Option<u32>,
    pub min_cooldown_minutes: Option<u32>,
    /// Channel stays off above this price
    pub max_electricity_price: Option<f64>,
}

impl OutputChannelConfig {
    pub fn new(priority: i32, load_power: u32) -> Self {
        Self {
            priority,
            load_power,
            switching_power: None,
            min_runtime_minutes: None,
            min_cooldown_minutes: None,
            max_electricity_price: None,
        }
    }

    pub fn with_switching_power(mut self, watts: u32) -> Self {
        self.switching_power = Some(watts);
        self
    }

    pub fn with_min_runtime(mut self, minutes: u32) -> Self {
        self.min_runtime_minutes = Some(minutes);
        self
    }

    pub fn with_min_cooldown(mut self, minutes: u32) -> Self {
        self.min_cooldown_minutes = Some(minutes);
        self
    }

    pub fn with_max_price(mut self, price: f64) -> Self {
        self.max_electricity_price = Some(price);
        self
    }

    /// Power needed to activate the channel
    pub fn effective_switching_power(&self) -> u32 {
        self.switching_power.unwrap_or(self.load_power)
    }
}

/// An output channel id paired with its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct OutputChannel {
    pub id: String,
    pub config: OutputChannelConfig,
}

impl OutputChannel {
    pub fn new(id: impl Into<String>, config: OutputChannelConfig) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }
}

/// Channel parameter property names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputParameter {
    LoadPower,
    SwitchingPower,
    Priority,
    MinRuntimeMinutes,
    MinCooldownMinutes,
    MaxElectricityPrice,
}

impl OutputParameter {
    pub const ALL: [OutputParameter; 6] = [
        OutputParameter::LoadPower,
        OutputParameter::SwitchingPower,
        OutputParameter::Priority,
        OutputParameter::MinRuntimeMinutes,
        OutputParameter::MinCooldownMinutes,
        OutputParameter::MaxElectricityPrice,
    ];

    pub fn property_name(self) -> &'static str {
        match self {
            OutputParameter::LoadPower => "loadPower",
            OutputParameter::SwitchingPower => "switchingPower",
            OutputParameter::Priority => "priority",
            OutputParameter::MinRuntimeMinutes => "minRuntimeMinutes",
            OutputParameter::MinCooldownMinutes => "minCooldownMinutes",
            OutputParameter::MaxElectricityPrice => "maxElectricityPrice",
        }
    }

    pub fn is_required(self) -> bool {
        matches!(self, OutputParameter::LoadPower | OutputParameter::Priority)
    }
}

/// Parse one channel's raw parameters.
///
/// Missing optional parameters stay unset. A missing required parameter or a
/// value of the wrong shape fails the whole channel.
pub fn parse_output_parameters(raw: &RawConfiguration) -> Result<OutputChannelConfig> {
    let mut config = OutputChannelConfig::new(0, 0);

    for param in OutputParameter::ALL {
        let name = param.property_name();
        let value = match raw.get(name) {
            Some(Value::Null) | None if param.is_required() => {
                return Err(ManagerError::validation(
                    name.to_string(),
                    "Missing required channel parameter".to_string(),
                ));
            }
            Some(Value::Null) | None => continue,
            Some(v) => v,
        };

        match param {
            OutputParameter::LoadPower => config.load_power = as_u32(name, value)?,
            OutputParameter::SwitchingPower => config.switching_power = Some(as_u32(name, value)?),
            OutputParameter::Priority => config.priority = as_i32(name, value)?,
            OutputParameter::MinRuntimeMinutes => {
                config.min_runtime_minutes = Some(as_u32(name, value)?);
            }
            OutputParameter::MinCooldownMinutes => {
                config.min_cooldown_minutes = Some(as_u32(name, value)?);
            }
            OutputParameter::MaxElectricityPrice => {
                config.max_electricity_price = Some(as_f64(name, value)?);
            }
        }
    }

    if config.load_power == 0 {
        return Err(ManagerError::validation("loadPower", "Must be greater than 0"));
    }

    if let Some(switching) = config.switching_power
        && switching > config.load_power
    {
        error!(
            "Switching power {}W exceeds load power {}W; shedding slack is treated as zero",
            switching, config.load_power
        );
    }

    Ok(config)
}

/// Parse every channel definition, skipping the ones that fail
pub fn parse_output_channels(definitions: &[OutputChannelDefinition]) -> Vec<OutputChannel> {
    definitions
        .iter()
        .filter_map(|def| match parse_output_parameters(&def.parameters) {
            Ok(config) => Some(OutputChannel::new(def.id.clone(), config)),
            Err(e) => {
                error!("Could not read channel {} parameters, ignoring it: {}", def.id, e);
                None
            }
        })
        .collect()
}

/// Build the typed manager settings from a raw property map
pub fn typed_manager_config(raw: &RawConfiguration) -> Result<ManagerConfig> {
    let object: serde_json::Map<String, Value> =
        raw.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    let config: ManagerConfig = serde_json::from_value(Value::Object(object))
        .map_err(|e| ManagerError::config(format!("Invalid manager settings: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// A SOC threshold setting
#[derive(Debug, Clone, PartialEq)]
pub enum SocThreshold {
    /// Fixed percentage
    Literal(f64),
    /// Name of the item reporting the threshold
    Item(String),
}

impl SocThreshold {
    /// A setting that parses as a number is a literal, anything else names an item
    pub fn parse(setting: &str) -> Self {
        let trimmed = setting.trim();
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => SocThreshold::Literal(v),
            _ => SocThreshold::Item(trimmed.to_string()),
        }
    }

    pub fn item_name(&self) -> Option<&str> {
        match self {
            SocThreshold::Item(name) => Some(name),
            SocThreshold::Literal(_) => None,
        }
    }
}

/// Minimum SOC from the literal setting, the sensor, or the default
pub fn resolve_min_soc(config: &ManagerConfig, inputs: &InputStateHolder) -> f64 {
    resolve_soc(
        &config.min_storage_soc,
        InputRole::MinStorageSoc,
        DEFAULT_MIN_STORAGE_SOC,
        inputs,
    )
}

/// Maximum SOC from the literal setting, the sensor, or the default
pub fn resolve_max_soc(config: &ManagerConfig, inputs: &InputStateHolder) -> f64 {
    resolve_soc(
        &config.max_storage_soc,
        InputRole::MaxStorageSoc,
        DEFAULT_MAX_STORAGE_SOC,
        inputs,
    )
}

fn resolve_soc(setting: &str, role: InputRole, default: f64, inputs: &InputStateHolder) -> f64 {
    match SocThreshold::parse(setting) {
        SocThreshold::Literal(v) => v,
        SocThreshold::Item(item) => inputs.decimal(role).unwrap_or_else(|| {
            debug!(
                "No value from item '{}' for {} yet, using default {}",
                item, role, default
            );
            default
        }),
    }
}

fn as_f64(name: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).ok_or_else(|| {
        ManagerError::validation(name.to_string(), format!("Expected a number, got {}", value))
    })
}

fn as_i64(name: &str, value: &Value) -> Result<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ManagerError::validation(
            name.to_string(),
            format!("Expected an integer, got {}", value),
        )
    })
}

fn as_u32(name: &str, value: &Value) -> Result<u32> {
    let v = as_i64(name, value)?;
    u32::try_from(v).map_err(|_| {
        ManagerError::validation(name.to_string(), format!("Out of range: {}", v))
    })
}

fn as_i32(name: &str, value: &Value) -> Result<i32> {
    let v = as_i64(name, value)?;
    i32::try_from(v).map_err(|_| {
        ManagerError::validation(name.to_string(), format!("Out of range: {}", v))
    })
}
