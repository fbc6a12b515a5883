use crate::value::OnOff;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Output value and switching timers of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRuntimeState {
    pub output: OnOff,
    pub last_activation: DateTime<Utc>,
    pub last_deactivation: DateTime<Utc>,
}

impl Default for ChannelRuntimeState {
    fn default() -> Self {
        Self {
            output: OnOff::Off,
            last_activation: DateTime::<Utc>::UNIX_EPOCH,
            last_deactivation: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Last written output per channel id, with activation timers.
///
/// The timer matching the written state is stamped on every save, inside the
/// same write lock as the value, so readers never observe one without the
/// other.
#[derive(Debug, Default)]
pub struct OutputStateHolder {
    channels: RwLock<HashMap<String, ChannelRuntimeState>>,
}

impl OutputStateHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, channel: &str, state: OnOff) {
        self.save_at(channel, state, Utc::now());
    }

    pub fn save_at(&self, channel: &str, state: OnOff, at: DateTime<Utc>) {
        let mut channels = self.channels.write();
        let entry = channels.entry(channel.to_string()).or_default();
        entry.output = state;
        match state {
            OnOff::On => entry.last_activation = at,
            OnOff::Off => entry.last_deactivation = at,
        }
        debug!("Updated channel {} to {} at {}", channel, state, at);
    }

    /// Last written output, `None` if the channel was never written
    pub fn output(&self, channel: &str) -> Option<OnOff> {
        self.channels.read().get(channel).map(|c| c.output)
    }

    /// Last written output with never-written channels reading as Off
    pub fn output_or_off(&self, channel: &str) -> OnOff {
        self.output(channel).unwrap_or_default()
    }

    /// Epoch if the channel was never switched on
    pub fn last_activation(&self, channel: &str) -> DateTime<Utc> {
        self.runtime_state(channel).last_activation
    }

    /// Epoch if the channel was never switched off
    pub fn last_deactivation(&self, channel: &str) -> DateTime<Utc> {
        self.runtime_state(channel).last_deactivation
    }

    pub fn runtime_state(&self, channel: &str) -> ChannelRuntimeState {
        self.channels
            .read()
            .get(channel)
            .copied()
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.channels.write().clear();
    }
}
