//! Item values as delivered by the event feed
//!
//! The host reports item states in a handful of shapes. They are modelled as
//! a closed union with a single conversion to a canonical decimal, so numeric
//! roles never have to guess at what they received.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Binary switch state used by output channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OnOff {
    On,
    #[default]
    Off,
}

impl OnOff {
    pub fn is_on(self) -> bool {
        matches!(self, OnOff::On)
    }
}

impl From<bool> for OnOff {
    fn from(on: bool) -> Self {
        if on { OnOff::On } else { OnOff::Off }
    }
}

impl fmt::Display for OnOff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnOff::On => write!(f, "ON"),
            OnOff::Off => write!(f, "OFF"),
        }
    }
}

/// A reported item state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireValue", into = "String")]
pub enum ItemValue {
    /// Plain number
    Decimal(f64),
    /// Percentage in the 0..=100 range
    Percent(f64),
    /// Number with a unit, e.g. `1500 W`
    Quantity { value: f64, unit: String },
    /// Switch state
    OnOff(OnOff),
    /// The host has no value for the item (`UNDEF` / `NULL`)
    Undefined,
    /// Anything else, kept verbatim
    Text(String),
}

impl ItemValue {
    /// Convert to a canonical decimal.
    ///
    /// Quantities are unwrapped to their raw number without unit conversion.
    /// Switch states are rejected: they are never a valid reading for a
    /// numeric role.
    pub fn to_decimal(&self) -> Option<f64> {
        match self {
            ItemValue::Decimal(v) | ItemValue::Percent(v) => Some(*v).filter(|v| v.is_finite()),
            ItemValue::Quantity { value, .. } => Some(*value).filter(|v| v.is_finite()),
            ItemValue::OnOff(state) => {
                warn!("Switch state {} cannot be used as a numeric value", state);
                None
            }
            ItemValue::Undefined => None,
            ItemValue::Text(raw) => raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    /// Switch state, if this value is one
    pub fn as_on_off(&self) -> Option<OnOff> {
        match self {
            ItemValue::OnOff(state) => Some(*state),
            _ => None,
        }
    }
}

impl FromStr for ItemValue {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_uppercase().as_str() {
            "ON" => return Ok(ItemValue::OnOff(OnOff::On)),
            "OFF" => return Ok(ItemValue::OnOff(OnOff::Off)),
            "UNDEF" | "NULL" | "" => return Ok(ItemValue::Undefined),
            _ => {}
        }

        if let Ok(v) = trimmed.parse::<f64>() {
            return Ok(ItemValue::Decimal(v));
        }

        // "<number> <unit>" or "<number><unit>"
        let split_at = trimmed
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
            .map(|(i, _)| i);
        if let Some(idx) = split_at
            && idx > 0
            && let Ok(value) = trimmed[..idx].trim().parse::<f64>()
        {
            let unit = trimmed[idx..].trim();
            if unit == "%" {
                return Ok(ItemValue::Percent(value));
            }
            if !unit.is_empty() {
                return Ok(ItemValue::Quantity {
                    value,
                    unit: unit.to_string(),
                });
            }
        }

        Ok(ItemValue::Text(trimmed.to_string()))
    }
}

impl fmt::Display for ItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemValue::Decimal(v) => write!(f, "{}", v),
            ItemValue::Percent(v) => write!(f, "{} %", v),
            ItemValue::Quantity { value, unit } => write!(f, "{} {}", value, unit),
            ItemValue::OnOff(state) => write!(f, "{}", state),
            ItemValue::Undefined => write!(f, "UNDEF"),
            ItemValue::Text(raw) => write!(f, "{}", raw),
        }
    }
}

impl From<ItemValue> for String {
    fn from(value: ItemValue) -> Self {
        value.to_string()
    }
}

/// JSON shape accepted on the wire: a bare number or a string to parse
#[derive(Deserialize)]
#[serde(untagged)]
enum WireValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Null(()),
}

impl From<WireValue> for ItemValue {
    fn from(wire: WireValue) -> Self {
        match wire {
            WireValue::Number(v) => ItemValue::Decimal(v),
            WireValue::Bool(b) => ItemValue::OnOff(OnOff::from(b)),
            WireValue::Text(s) => match s.parse::<ItemValue>() {
                Ok(v) => v,
                Err(never) => match never {},
            },
            WireValue::Null(()) => ItemValue::Undefined,
        }
    }
}
