//! Startup assembly: reads the handful of environment overrides this
//! binary accepts and produces a validated [`config::Config`]. Mirrors
//! this codebase's existing `AppConfig::from_env` — env parsing is the
//! only config source this binary knows about; a config-file loader is
//! an external collaborator per spec §1 and would produce the same
//! section structs this function does.

use config::{
    AnalyticsConfig, Config, NavigationConfig, OrdersConfig, RobotConfig, TimingConfig,
    WarehouseConfig,
};

use crate::error::SimError;

/// Deterministic default seed used when `SIM_SEED` is unset, so a bare
/// `cargo run` reproduces the same inventory layout and order stream
/// run to run.
pub const DEFAULT_SEED: u64 = 42;

pub fn config_from_env() -> Result<Config, SimError> {
    let timing = TimingConfig {
        simulation_speed: env_f64("SIM_SPEED", TimingConfig::default().simulation_speed),
        ..TimingConfig::default()
    };

    Config::from_sections(
        timing,
        WarehouseConfig::default(),
        RobotConfig::default(),
        OrdersConfig::default(),
        NavigationConfig::default(),
        AnalyticsConfig::default(),
    )
    .map_err(SimError::from)
}

pub fn seed_from_env() -> u64 {
    std::env::var("SIM_SEED")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_SEED)
}

pub fn json_logs_from_env() -> bool {
    std::env::var("APP_ENV").unwrap_or_default() == "production"
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
