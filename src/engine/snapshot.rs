use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};
use crate::params::{resolve_max_soc, resolve_min_soc};
use crate::state::{InputRole, InputStateHolder};

/// Live readings for one evaluation cycle.
///
/// Built once at the start of a cycle and never mutated afterwards, so every
/// channel in that cycle is judged against the same figures.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSnapshot {
    /// Watts produced
    pub production_power: f64,
    /// Watts exchanged with the grid, negative = feed-in
    pub grid_power: f64,
    /// Storage state of charge in percent
    pub storage_soc: Option<f64>,
    /// Watts into or out of storage, negative = charging
    pub storage_power: Option<f64>,
    pub min_storage_soc: Option<f64>,
    pub max_storage_soc: Option<f64>,
    pub electricity_price: Option<f64>,
}

impl InputSnapshot {
    /// Snapshot with only the required readings set
    pub fn new(production_power: f64, grid_power: f64) -> Self {
        Self {
            production_power,
            grid_power,
            storage_soc: None,
            storage_power: None,
            min_storage_soc: None,
            max_storage_soc: None,
            electricity_price: None,
        }
    }

    pub fn with_storage(mut self, soc: f64, power: f64) -> Self {
        self.storage_soc = Some(soc);
        self.storage_power = Some(power);
        self
    }

    pub fn with_soc_limits(mut self, min: f64, max: f64) -> Self {
        self.min_storage_soc = Some(min);
        self.max_storage_soc = Some(max);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.electricity_price = Some(price);
        self
    }

    /// Build a snapshot from the last known inputs.
    ///
    /// Fails while production or grid power has no numeric value. Optional
    /// readings are taken as they are; SOC thresholds resolve to their
    /// literal setting, their sensor or the defaults.
    pub fn build(config: &ManagerConfig, inputs: &InputStateHolder) -> Result<Self> {
        let production_power =
            required(inputs, InputRole::ProductionPower, &config.production_power)?;
        let grid_power = required(inputs, InputRole::GridPower, &config.grid_power)?;

        Ok(Self {
            production_power,
            grid_power,
            storage_soc: inputs.decimal(InputRole::StorageSoc),
            storage_power: inputs.decimal(InputRole::StoragePower),
            min_storage_soc: Some(resolve_min_soc(config, inputs)),
            max_storage_soc: Some(resolve_max_soc(config, inputs)),
            electricity_price: inputs.decimal(InputRole::ElectricityPrice),
        })
    }

    /// True while storage reports a SOC below its minimum
    pub fn storage_below_minimum(&self) -> bool {
        matches!(
            (self.storage_soc, self.min_storage_soc),
            (Some(soc), Some(min)) if soc < min
        )
    }

    pub fn is_price_negative(&self) -> bool {
        self.electricity_price.is_some_and(|p| p < 0.0)
    }
}

fn required(inputs: &InputStateHolder, role: InputRole, item: &str) -> Result<f64> {
    inputs.decimal(role).ok_or_else(|| {
        ManagerError::invalid_value(
            item.to_string(),
            format!("no numeric {} reading yet", role),
        )
    })
}
