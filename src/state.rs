//! In-memory state retention for a single manager instance
//!
//! Two holders are kept per manager: the last-known value of every input
//! role, and the last output written to every channel together with its
//! activation timers. Nothing here survives a restart.

use crate::value::ItemValue;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod output;

pub use output::{ChannelRuntimeState, OutputStateHolder};

/// Semantic role an input item plays for the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputRole {
    ProductionPower,
    GridPower,
    MinStorageSoc,
    MaxStorageSoc,
    StorageSoc,
    StoragePower,
    ElectricityPrice,
}

impl InputRole {
    pub const ALL: [InputRole; 7] = [
        InputRole::ProductionPower,
        InputRole::GridPower,
        InputRole::MinStorageSoc,
        InputRole::MaxStorageSoc,
        InputRole::StorageSoc,
        InputRole::StoragePower,
        InputRole::ElectricityPrice,
    ];

    /// Property name used in configuration and logs
    pub fn as_str(self) -> &'static str {
        match self {
            InputRole::ProductionPower => "productionPower",
            InputRole::GridPower => "gridPower",
            InputRole::MinStorageSoc => "minStorageSoc",
            InputRole::MaxStorageSoc => "maxStorageSoc",
            InputRole::StorageSoc => "storageSoc",
            InputRole::StoragePower => "storagePower",
            InputRole::ElectricityPrice => "electricityPrice",
        }
    }
}

impl fmt::Display for InputRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-known value per input role
#[derive(Debug, Default)]
pub struct InputStateHolder {
    states: RwLock<HashMap<InputRole, ItemValue>>,
}

impl InputStateHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, role: InputRole, value: ItemValue) {
        self.states.write().insert(role, value);
    }

    pub fn get(&self, role: InputRole) -> Option<ItemValue> {
        self.states.read().get(&role).cloned()
    }

    /// Value of `role` coerced to a decimal, if present and numeric
    pub fn decimal(&self, role: InputRole) -> Option<f64> {
        self.states.read().get(&role).and_then(ItemValue::to_decimal)
    }

    pub fn clear(&self) {
        self.states.write().clear();
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

/// Everything a manager remembers between cycles
#[derive(Debug, Default)]
pub struct ManagerState {
    pub inputs: InputStateHolder,
    pub outputs: OutputStateHolder,
}

impl ManagerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all inputs, outputs and timers
    pub fn clear(&self) {
        self.inputs.clear();
        self.outputs.clear();
    }
}
