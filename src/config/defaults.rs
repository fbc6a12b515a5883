use super::*;

pub(super) fn min_storage_soc() -> String {
    DEFAULT_MIN_STORAGE_SOC.to_string()
}

pub(super) fn max_storage_soc() -> String {
    DEFAULT_MAX_STORAGE_SOC.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/surplus_manager.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: 30,
            initial_delay: 0,
            peak_production_power: 0.0,
            min_storage_soc: min_storage_soc(),
            max_storage_soc: max_storage_soc(),
            production_power: String::new(),
            grid_power: String::new(),
            storage_soc: None,
            storage_power: None,
            electricity_price: None,
            min_available_surplus_energy: 0.0,
            tolerated_power_draw: 0.0,
            toggle_on_negative_price: false,
            enable_inverter_limiting_heuristic: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            managers: Vec::new(),
        }
    }
}
