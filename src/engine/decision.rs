use super::snapshot::InputSnapshot;
use crate::params::OutputChannel;
use crate::value::OnOff;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error};

/// Decide the next output of one channel.
///
/// `available_surplus` is the headroom this channel sees: for a channel that
/// is off, the surplus before it switches on; for a channel that is on, what
/// remains while it keeps running.
pub fn decide(
    channel: &OutputChannel,
    snapshot: &InputSnapshot,
    available_surplus: f64,
    current: OnOff,
    last_activation: DateTime<Utc>,
    last_deactivation: DateTime<Utc>,
    now: DateTime<Utc>,
) -> OnOff {
    let cfg = &channel.config;

    let sufficient = match current {
        OnOff::Off => available_surplus >= f64::from(cfg.effective_switching_power()),
        OnOff::On => {
            let slack = f64::from(cfg.load_power.saturating_sub(cfg.effective_switching_power()));
            available_surplus >= 0.0 || -available_surplus < slack
        }
    };

    let desired = OnOff::from(sufficient && price_acceptable(channel, snapshot));
    if desired == current {
        return current;
    }

    match desired {
        OnOff::On => {
            if let Some(minutes) = cfg.min_cooldown_minutes
                && now - last_deactivation < TimeDelta::minutes(i64::from(minutes))
            {
                debug!("Channel {} is cooling down, keeping it off", channel.id);
                return OnOff::Off;
            }
        }
        OnOff::Off => {
            if let Some(minutes) = cfg.min_runtime_minutes
                && now - last_activation < TimeDelta::minutes(i64::from(minutes))
            {
                debug!("Channel {} has not run long enough, keeping it on", channel.id);
                return OnOff::On;
            }
        }
    }

    desired
}

fn price_acceptable(channel: &OutputChannel, snapshot: &InputSnapshot) -> bool {
    let Some(max) = channel.config.max_electricity_price else {
        return true;
    };
    match snapshot.electricity_price {
        Some(price) => price <= max,
        None => {
            error!(
                "Channel {} has a price limit but no electricity price is known, ignoring the limit",
                channel.id
            );
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::OutputChannelConfig;

    fn never() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn channel(config: OutputChannelConfig) -> OutputChannel {
        OutputChannel::new("boiler", config)
    }

    #[test]
    fn off_channel_needs_switching_power() {
        let ch = channel(OutputChannelConfig::new(1, 2000).with_switching_power(1500));
        let snap = InputSnapshot::new(3000.0, -1500.0);
        let now = Utc::now();
        assert_eq!(decide(&ch, &snap, 1500.0, OnOff::Off, never(), never(), now), OnOff::On);
        assert_eq!(decide(&ch, &snap, 1499.0, OnOff::Off, never(), never(), now), OnOff::Off);
    }

    #[test]
    fn on_channel_tolerates_slack_before_shedding() {
        let ch = channel(OutputChannelConfig::new(1, 2000).with_switching_power(1500));
        let snap = InputSnapshot::new(3000.0, 0.0);
        let now = Utc::now();
        assert_eq!(decide(&ch, &snap, -499.0, OnOff::On, never(), never(), now), OnOff::On);
        assert_eq!(decide(&ch, &snap, -500.0, OnOff::On, never(), never(), now), OnOff::Off);
        assert_eq!(decide(&ch, &snap, 0.0, OnOff::On, never(), never(), now), OnOff::On);
    }

    #[test]
    fn price_limit_blocks_activation() {
        let ch = channel(OutputChannelConfig::new(1, 500).with_max_price(0.20));
        let now = Utc::now();
        let cheap = InputSnapshot::new(3000.0, -1000.0).with_price(0.20);
        let dear = InputSnapshot::new(3000.0, -1000.0).with_price(0.21);
        let unknown = InputSnapshot::new(3000.0, -1000.0);

        assert_eq!(decide(&ch, &cheap, 1000.0, OnOff::Off, never(), never(), now), OnOff::On);
        assert_eq!(decide(&ch, &dear, 1000.0, OnOff::Off, never(), never(), now), OnOff::Off);
        assert_eq!(decide(&ch, &unknown, 1000.0, OnOff::Off, never(), never(), now), OnOff::On);
    }

    #[test]
    fn price_limit_stops_running_channel() {
        let ch = channel(OutputChannelConfig::new(1, 500).with_max_price(0.20));
        let dear = InputSnapshot::new(3000.0, -1000.0).with_price(0.50);
        let now = Utc::now();
        assert_eq!(decide(&ch, &dear, 1000.0, OnOff::On, never(), never(), now), OnOff::Off);

        // Minimum runtime still holds a recently started channel
        let locked = channel(
            OutputChannelConfig::new(1, 500)
                .with_max_price(0.20)
                .with_min_runtime(15),
        );
        let started = now - TimeDelta::minutes(5);
        assert_eq!(decide(&locked, &dear, 1000.0, OnOff::On, started, never(), now), OnOff::On);
    }

    #[test]
    fn cooldown_boundary_is_inclusive() {
        let ch = channel(OutputChannelConfig::new(1, 500).with_min_cooldown(10));
        let snap = InputSnapshot::new(3000.0, -1000.0);
        let now = Utc::now();

        let just_off = now - TimeDelta::minutes(10) + TimeDelta::seconds(1);
        assert_eq!(decide(&ch, &snap, 1000.0, OnOff::Off, never(), just_off, now), OnOff::Off);

        let exactly = now - TimeDelta::minutes(10);
        assert_eq!(decide(&ch, &snap, 1000.0, OnOff::Off, never(), exactly, now), OnOff::On);
    }

    #[test]
    fn runtime_boundary_is_inclusive() {
        let ch = channel(OutputChannelConfig::new(1, 500).with_min_runtime(15));
        let snap = InputSnapshot::new(3000.0, 800.0);
        let now = Utc::now();

        let recent = now - TimeDelta::minutes(14);
        assert_eq!(decide(&ch, &snap, -800.0, OnOff::On, recent, never(), now), OnOff::On);

        let exactly = now - TimeDelta::minutes(15);
        assert_eq!(decide(&ch, &snap, -800.0, OnOff::On, exactly, never(), now), OnOff::Off);
    }
}
