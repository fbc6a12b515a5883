//! Priority ordered evaluation of all output channels
//!
//! One call to [`BalancingEngine::evaluate`] is one cycle. Global overrides
//! (negative price, storage protection) are checked first. After that the
//! channels are walked in priority order: ascending while there is surplus to
//! hand out, descending while a deficit has to be shed. At most one channel
//! changes per cycle in shed mode, and at most one channel switches on per
//! cycle in ascending mode.

use super::decision::decide;
use super::snapshot::InputSnapshot;
use super::surplus::compute_available_surplus;
use crate::config::ManagerConfig;
use crate::error::Result;
use crate::params::OutputChannel;
use crate::state::ManagerState;
use crate::value::OnOff;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info};

/// What a cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Required readings missing, outputs untouched
    NotReady(String),
    /// Price below zero, every channel driven on
    NegativePrice,
    /// Storage below its minimum SOC, every channel driven off
    StorageProtection,
    /// Nothing configured to switch
    NoChannels,
    /// Normal evaluation, with the channels that changed state
    Evaluated { changed: Vec<String> },
    /// Cancelled before all channels were evaluated
    Aborted,
}

/// Evaluates one manager's channels against its current state
pub struct BalancingEngine<'a> {
    config: &'a ManagerConfig,
    channels: &'a [OutputChannel],
    state: &'a ManagerState,
}

impl<'a> BalancingEngine<'a> {
    pub fn new(
        config: &'a ManagerConfig,
        channels: &'a [OutputChannel],
        state: &'a ManagerState,
    ) -> Self {
        Self {
            config,
            channels,
            state,
        }
    }

    /// Run one cycle.
    ///
    /// `apply` receives the desired state of every evaluated channel and is
    /// expected to skip writes that would not change anything. `cancel` is
    /// polled before each channel.
    pub fn evaluate<F>(
        &self,
        now: DateTime<Utc>,
        cancel: &AtomicBool,
        mut apply: F,
    ) -> CycleOutcome
    where
        F: FnMut(&str, OnOff) -> Result<()>,
    {
        let snapshot = match InputSnapshot::build(self.config, &self.state.inputs) {
            Ok(s) => s,
            Err(e) => return CycleOutcome::NotReady(e.to_string()),
        };

        if self.config.toggle_on_negative_price && snapshot.is_price_negative() {
            debug!(
                "Electricity price {:?} is negative, switching every channel on",
                snapshot.electricity_price
            );
            return self
                .drive_all(OnOff::On, cancel, &mut apply)
                .unwrap_or(CycleOutcome::NegativePrice);
        }

        if snapshot.storage_below_minimum() {
            debug!(
                "Storage SOC {:?} below minimum {:?}, switching every channel off",
                snapshot.storage_soc, snapshot.min_storage_soc
            );
            return self
                .drive_all(OnOff::Off, cancel, &mut apply)
                .unwrap_or(CycleOutcome::StorageProtection);
        }

        if self.channels.is_empty() {
            info!("No output channels configured, nothing to evaluate");
            return CycleOutcome::NoChannels;
        }

        let active_load = self.active_load();
        let surplus = compute_available_surplus(&snapshot, self.config, active_load);
        debug!(
            "Available surplus {}W with {}W of active load",
            surplus, active_load
        );

        let mut order: Vec<&OutputChannel> = self.channels.iter().collect();
        if surplus >= 0.0 {
            order.sort_by_key(|c| c.config.priority);
            self.distribute(&order, &snapshot, surplus, now, cancel, &mut apply)
        } else {
            order.sort_by_key(|c| Reverse(c.config.priority));
            let deficit = surplus - active_load;
            self.shed(&order, &snapshot, deficit, now, cancel, &mut apply)
        }
    }

    /// Sum of the load of every channel currently on
    pub fn active_load(&self) -> f64 {
        self.channels
            .iter()
            .filter(|c| self.state.outputs.output_or_off(&c.id).is_on())
            .map(|c| f64::from(c.config.load_power))
            .sum()
    }

    fn distribute<F>(
        &self,
        order: &[&OutputChannel],
        snapshot: &InputSnapshot,
        surplus: f64,
        now: DateTime<Utc>,
        cancel: &AtomicBool,
        apply: &mut F,
    ) -> CycleOutcome
    where
        F: FnMut(&str, OnOff) -> Result<()>,
    {
        let mut pool = surplus;
        let mut changed = Vec::new();

        for channel in order {
            if cancel.load(Ordering::Acquire) {
                return CycleOutcome::Aborted;
            }

            let runtime = self.state.outputs.runtime_state(&channel.id);
            let load = f64::from(channel.config.load_power);
            let seen = if runtime.output.is_on() {
                pool - load
            } else {
                pool
            };

            let desired = decide(
                channel,
                snapshot,
                seen,
                runtime.output,
                runtime.last_activation,
                runtime.last_deactivation,
                now,
            );
            push(apply, &channel.id, desired);

            if desired.is_on() {
                pool -= load;
            }

            if desired != runtime.output {
                info!(
                    "Channel {} switched {} (surplus seen {}W)",
                    channel.id, desired, seen
                );
                changed.push(channel.id.clone());
                if desired.is_on() {
                    break;
                }
            }
        }

        CycleOutcome::Evaluated { changed }
    }

    fn shed<F>(
        &self,
        order: &[&OutputChannel],
        snapshot: &InputSnapshot,
        deficit: f64,
        now: DateTime<Utc>,
        cancel: &AtomicBool,
        apply: &mut F,
    ) -> CycleOutcome
    where
        F: FnMut(&str, OnOff) -> Result<()>,
    {
        for channel in order {
            if cancel.load(Ordering::Acquire) {
                return CycleOutcome::Aborted;
            }

            let runtime = self.state.outputs.runtime_state(&channel.id);
            if !runtime.output.is_on() {
                continue;
            }

            let desired = decide(
                channel,
                snapshot,
                deficit,
                runtime.output,
                runtime.last_activation,
                runtime.last_deactivation,
                now,
            );
            push(apply, &channel.id, desired);

            if desired != runtime.output {
                info!("Channel {} shed (deficit {}W)", channel.id, deficit);
                return CycleOutcome::Evaluated {
                    changed: vec![channel.id.clone()],
                };
            }
        }

        CycleOutcome::Evaluated {
            changed: Vec::new(),
        }
    }

    /// Drive every channel to `state`; `Some(Aborted)` if cancelled midway
    fn drive_all<F>(
        &self,
        state: OnOff,
        cancel: &AtomicBool,
        apply: &mut F,
    ) -> Option<CycleOutcome>
    where
        F: FnMut(&str, OnOff) -> Result<()>,
    {
        for channel in self.channels {
            if cancel.load(Ordering::Acquire) {
                return Some(CycleOutcome::Aborted);
            }
            push(apply, &channel.id, state);
        }
        None
    }
}

fn push<F>(apply: &mut F, channel: &str, state: OnOff)
where
    F: FnMut(&str, OnOff) -> Result<()>,
{
    if let Err(e) = apply(channel, state) {
        error!("Failed to set channel {} to {}: {}", channel, state, e);
    }
}
