use super::snapshot::InputSnapshot;
use crate::config::ManagerConfig;
use tracing::trace;

/// Watts available for discretionary loads.
///
/// `active_load_w` is the summed load of channels currently on; it is added
/// back so running loads compete for the surplus again each cycle. Storage
/// discharge counts against the surplus and charging counts towards it.
/// A negative result is a deficit to shed.
pub fn compute_available_surplus(
    snapshot: &InputSnapshot,
    config: &ManagerConfig,
    active_load_w: f64,
) -> f64 {
    if snapshot.production_power <= 0.0 {
        return 0.0;
    }

    let storage_power = snapshot.storage_power.unwrap_or(0.0);
    let mut surplus = -snapshot.grid_power - storage_power;

    if surplus < 0.0 && surplus >= -config.tolerated_power_draw {
        surplus = 0.0;
    }

    surplus += active_load_w;

    if config.enable_inverter_limiting_heuristic
        && let Some(shortfall) = inverter_shortfall(snapshot, config)
    {
        trace!("Inverter limiting assumed, adding {}W", shortfall);
        surplus += shortfall;
    }

    if surplus > 0.0 {
        surplus -= config.min_available_surplus_energy;
    }

    surplus
}

/// Production the inverter is assumed to be clipping
fn inverter_shortfall(snapshot: &InputSnapshot, config: &ManagerConfig) -> Option<f64> {
    let soc = snapshot.storage_soc?;
    let max_soc = snapshot.max_storage_soc?;
    let storage_power = snapshot.storage_power.unwrap_or(0.0);

    let storage_full = soc >= max_soc;
    let grid_idle = snapshot.grid_power.abs() <= config.tolerated_power_draw;
    let not_discharging = storage_power <= 0.0;
    let below_peak = snapshot.production_power < config.peak_production_power;

    (storage_full && grid_idle && not_discharging && below_peak)
        .then(|| config.peak_production_power - snapshot.production_power)
}
