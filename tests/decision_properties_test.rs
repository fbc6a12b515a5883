use chrono::{DateTime, TimeDelta, Utc};
use proptest::prelude::*;
use surplus_manager::config::ManagerConfig;
use surplus_manager::engine::{InputSnapshot, compute_available_surplus, decide};
use surplus_manager::params::{OutputChannel, OutputChannelConfig};
use surplus_manager::value::OnOff;

fn never() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn now() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(10_000)
}

prop_compose! {
    fn any_config()(
        tolerated in 0.0f64..500.0,
        reserve in 0.0f64..1000.0,
        peak in 0.0f64..20_000.0,
        heuristic in any::<bool>(),
    ) -> ManagerConfig {
        ManagerConfig {
            tolerated_power_draw: tolerated,
            min_available_surplus_energy: reserve,
            peak_production_power: peak,
            enable_inverter_limiting_heuristic: heuristic,
            ..ManagerConfig::default()
        }
    }
}

prop_compose! {
    fn any_channel()(
        load in 1u32..10_000,
        switching_ratio in 0.1f64..1.0,
        priority in -5i32..5,
    ) -> OutputChannel {
        // Truncation keeps switching power at or below load power
        let switching = ((f64::from(load) * switching_ratio) as u32).max(1);
        OutputChannel::new(
            "ch",
            OutputChannelConfig::new(priority, load).with_switching_power(switching),
        )
    }
}

proptest! {
    #[test]
    fn no_production_means_no_surplus(
        production in -5_000.0f64..=0.0,
        grid in -20_000.0f64..20_000.0,
        storage_power in -5_000.0f64..5_000.0,
        soc in 0.0f64..100.0,
        active in 0.0f64..20_000.0,
        config in any_config(),
    ) {
        let snap = InputSnapshot::new(production, grid)
            .with_storage(soc, storage_power)
            .with_soc_limits(30.0, 90.0);
        prop_assert_eq!(compute_available_surplus(&snap, &config, active), 0.0);
    }

    #[test]
    fn off_channel_starts_iff_surplus_reaches_switching_power(
        channel in any_channel(),
        surplus in -10_000.0f64..10_000.0,
    ) {
        let snap = InputSnapshot::new(1000.0, 0.0);
        let decision = decide(&channel, &snap, surplus, OnOff::Off, never(), never(), now());
        let threshold = f64::from(channel.config.effective_switching_power());
        prop_assert_eq!(decision.is_on(), surplus >= threshold);
    }

    #[test]
    fn price_above_limit_keeps_channel_off(
        channel in any_channel(),
        surplus in 0.0f64..20_000.0,
        limit in -1.0f64..1.0,
        excess in 0.001f64..1.0,
    ) {
        let channel = OutputChannel::new(
            channel.id.clone(),
            channel.config.clone().with_max_price(limit),
        );
        let snap = InputSnapshot::new(1000.0, 0.0).with_price(limit + excess);
        let decision = decide(&channel, &snap, surplus, OnOff::Off, never(), never(), now());
        prop_assert_eq!(decision, OnOff::Off);
    }

    #[test]
    fn price_above_limit_stops_running_channel(
        channel in any_channel(),
        surplus in -5_000.0f64..20_000.0,
        limit in -1.0f64..1.0,
        excess in 0.001f64..1.0,
    ) {
        let channel = OutputChannel::new(
            channel.id.clone(),
            channel.config.clone().with_max_price(limit),
        );
        let snap = InputSnapshot::new(1000.0, 0.0).with_price(limit + excess);
        let decision = decide(&channel, &snap, surplus, OnOff::On, never(), never(), now());
        prop_assert_eq!(decision, OnOff::Off);
    }

    #[test]
    fn on_channel_sheds_when_deficit_exceeds_slack(
        channel in any_channel(),
        extra in 0.0f64..5_000.0,
    ) {
        let cfg = &channel.config;
        let slack = f64::from(cfg.load_power - cfg.effective_switching_power());
        let surplus = -(slack + extra).max(0.001);
        let snap = InputSnapshot::new(1000.0, 0.0);
        let decision = decide(&channel, &snap, surplus, OnOff::On, never(), never(), now());
        prop_assert_eq!(decision, OnOff::Off);
    }

    #[test]
    fn cooldown_window_blocks_restart(
        channel in any_channel(),
        cooldown in 1u32..120,
        elapsed_secs in 0i64..14_400,
    ) {
        let channel = OutputChannel::new(
            channel.id.clone(),
            channel.config.clone().with_min_cooldown(cooldown),
        );
        let snap = InputSnapshot::new(1000.0, 0.0);
        let last_off = now() - TimeDelta::seconds(elapsed_secs);
        let decision = decide(&channel, &snap, 1_000_000.0, OnOff::Off, never(), last_off, now());
        let allowed = elapsed_secs >= i64::from(cooldown) * 60;
        prop_assert_eq!(decision.is_on(), allowed);
    }
}
