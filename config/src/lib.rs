//! Typed, validated configuration surface consumed by every other crate.
//!
//! This crate deliberately does not parse TOML/JSON/env itself — file I/O
//! is an external collaborator per spec §1 — it only validates
//! already-parsed section structs and hands back one assembled [`Config`].
//! A reload swaps an [`ArcSwap`]-backed cell atomically: no component ever
//! observes a partially-updated config (spec §4.10).

use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("timing.target_fps {0} out of bounds [1, 120]")]
    TargetFpsOutOfBounds(u32),
    #[error("timing.simulation_speed {0} out of bounds [0.1, 10.0]")]
    SimulationSpeedOutOfBounds(f64),
    #[error("warehouse.width must be >= 1, got {0}")]
    WarehouseWidthInvalid(u32),
    #[error("warehouse.height must be >= 1, got {0}")]
    WarehouseHeightInvalid(u32),
    #[error("robot.speed {0} out of bounds [0.5, 10.0]")]
    RobotSpeedOutOfBounds(f64),
    #[error("robot.pick_time_s must be >= 0, got {0}")]
    PickTimeInvalid(f64),
    #[error("robot.max_items must be >= 1, got {0}")]
    MaxItemsInvalid(u32),
    #[error("orders.interval_s must be > 0, got {0}")]
    OrderIntervalInvalid(f64),
    #[error("orders.min_items must be >= 1, got {0}")]
    MinItemsInvalid(u32),
    #[error("orders.max_items ({0}) must be >= orders.min_items ({1})")]
    MaxItemsBelowMin(u32, u32),
    #[error("orders.max_items must be <= robot.max_items ({1}), got {0}")]
    OrderMaxItemsExceedsRobot(u32, u32),
    #[error("orders.queue_cap must be >= 1, got {0}")]
    QueueCapInvalid(u32),
    #[error("navigation.aisle_traversal_s must be > 0, got {0}")]
    AisleTraversalInvalid(f64),
    #[error("navigation.direction_cooldown_s must be >= 0, got {0}")]
    DirectionCooldownInvalid(f64),
    #[error("analytics.window_s must be > 0, got {0}")]
    AnalyticsWindowInvalid(f64),
    #[error("analytics.warn_tick_ms must be > 0, got {0}")]
    WarnTickMsInvalid(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingConfig {
    pub target_fps: u32,
    pub simulation_speed: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            simulation_speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarehouseConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            width: 25,
            height: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotConfig {
    pub speed: f64,
    pub pick_time_s: f64,
    pub max_items: u32,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            speed: 2.0,
            pick_time_s: 3.0,
            max_items: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrdersConfig {
    pub interval_s: f64,
    pub min_items: u32,
    pub max_items: u32,
    pub queue_cap: u32,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            interval_s: 30.0,
            min_items: 1,
            max_items: 4,
            queue_cap: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationConfig {
    pub aisle_traversal_s: f64,
    pub direction_cooldown_s: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            aisle_traversal_s: 7.0,
            direction_cooldown_s: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyticsConfig {
    pub window_s: f64,
    pub warn_tick_ms: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window_s: 3600.0,
            warn_tick_ms: 50.0,
        }
    }
}

/// The assembled, validated configuration. Every component that needs a
/// parameter reads it from here rather than hardcoding a default.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Config {
    pub timing: TimingConfig,
    pub warehouse: WarehouseConfig,
    pub robot: RobotConfig,
    pub orders: OrdersConfig,
    pub navigation: NavigationConfig,
    pub analytics: AnalyticsConfig,
}

impl Config {
    /// Assembles sections into a `Config`, validating every field's
    /// declared domain in one pass. Validation failure means the caller
    /// must not proceed with startup (spec §4.10, §7: unrecoverable).
    pub fn from_sections(
        timing: TimingConfig,
        warehouse: WarehouseConfig,
        robot: RobotConfig,
        orders: OrdersConfig,
        navigation: NavigationConfig,
        analytics: AnalyticsConfig,
    ) -> Result<Self, ConfigError> {
        let cfg = Self {
            timing,
            warehouse,
            robot,
            orders,
            navigation,
            analytics,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=120).contains(&self.timing.target_fps) {
            return Err(ConfigError::TargetFpsOutOfBounds(self.timing.target_fps));
        }
        if !(0.1..=10.0).contains(&self.timing.simulation_speed) {
            return Err(ConfigError::SimulationSpeedOutOfBounds(
                self.timing.simulation_speed,
            ));
        }
        if self.warehouse.width < 1 {
            return Err(ConfigError::WarehouseWidthInvalid(self.warehouse.width));
        }
        if self.warehouse.height < 1 {
            return Err(ConfigError::WarehouseHeightInvalid(self.warehouse.height));
        }
        if !(0.5..=10.0).contains(&self.robot.speed) {
            return Err(ConfigError::RobotSpeedOutOfBounds(self.robot.speed));
        }
        if self.robot.pick_time_s < 0.0 {
            return Err(ConfigError::PickTimeInvalid(self.robot.pick_time_s));
        }
        if self.robot.max_items < 1 {
            return Err(ConfigError::MaxItemsInvalid(self.robot.max_items));
        }
        if self.orders.interval_s <= 0.0 {
            return Err(ConfigError::OrderIntervalInvalid(self.orders.interval_s));
        }
        if self.orders.min_items < 1 {
            return Err(ConfigError::MinItemsInvalid(self.orders.min_items));
        }
        if self.orders.max_items < self.orders.min_items {
            return Err(ConfigError::MaxItemsBelowMin(
                self.orders.max_items,
                self.orders.min_items,
            ));
        }
        if self.orders.max_items > self.robot.max_items {
            return Err(ConfigError::OrderMaxItemsExceedsRobot(
                self.orders.max_items,
                self.robot.max_items,
            ));
        }
        if self.orders.queue_cap < 1 {
            return Err(ConfigError::QueueCapInvalid(self.orders.queue_cap));
        }
        if self.navigation.aisle_traversal_s <= 0.0 {
            return Err(ConfigError::AisleTraversalInvalid(
                self.navigation.aisle_traversal_s,
            ));
        }
        if self.navigation.direction_cooldown_s < 0.0 {
            return Err(ConfigError::DirectionCooldownInvalid(
                self.navigation.direction_cooldown_s,
            ));
        }
        if self.analytics.window_s <= 0.0 {
            return Err(ConfigError::AnalyticsWindowInvalid(self.analytics.window_s));
        }
        if self.analytics.warn_tick_ms <= 0.0 {
            return Err(ConfigError::WarnTickMsInvalid(self.analytics.warn_tick_ms));
        }
        Ok(())
    }
}

/// Owns the live `Config` behind an atomic swap cell. `load` never blocks
/// a concurrent `reload`, and a failed `reload` leaves the prior config
/// untouched and live (spec §4.10).
pub struct Registry {
    current: ArcSwap<Config>,
}

impl Registry {
    pub fn new(initial: Config) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    pub fn load(&self) -> Arc<Config> {
        self.current.load_full()
    }

    /// Validates `candidate` and, only on success, atomically swaps it in.
    pub fn reload(&self, candidate: Config) -> Result<(), ConfigError> {
        candidate.validate()?;
        self.current.store(Arc::new(candidate));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config::from_sections(
            TimingConfig::default(),
            WarehouseConfig::default(),
            RobotConfig::default(),
            OrdersConfig::default(),
            NavigationConfig::default(),
            AnalyticsConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn defaults_validate() {
        valid();
    }

    #[test]
    fn rejects_speed_out_of_bounds() {
        let mut timing = TimingConfig::default();
        timing.simulation_speed = 11.0;
        let err = Config::from_sections(
            timing,
            WarehouseConfig::default(),
            RobotConfig::default(),
            OrdersConfig::default(),
            NavigationConfig::default(),
            AnalyticsConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::SimulationSpeedOutOfBounds(11.0));
    }

    #[test]
    fn rejects_order_max_items_exceeding_robot_capacity() {
        let mut orders = OrdersConfig::default();
        orders.max_items = 6;
        let err = Config::from_sections(
            TimingConfig::default(),
            WarehouseConfig::default(),
            RobotConfig::default(),
            orders,
            NavigationConfig::default(),
            AnalyticsConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::OrderMaxItemsExceedsRobot(6, 5));
    }

    #[test]
    fn reload_rejects_invalid_and_keeps_prior_live() {
        let registry = Registry::new(valid());
        let mut bad = valid();
        bad.orders.queue_cap = 0;
        let err = registry.reload(bad).unwrap_err();
        assert_eq!(err, ConfigError::QueueCapInvalid(0));
        assert_eq!(registry.load().orders.queue_cap, 50);
    }

    #[test]
    fn reload_swaps_on_success() {
        let registry = Registry::new(valid());
        let mut next = valid();
        next.timing.simulation_speed = 2.0;
        registry.reload(next).unwrap();
        assert_eq!(registry.load().timing.simulation_speed, 2.0);
    }
}
