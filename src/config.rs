use std::time::Duration;

use crate::game::constants::{food, spawn, world};
use crate::game::systems::food::{placement_range, SpawnRules};
use crate::game::systems::lifecycle::WorldSettings;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Side length of the square world
    pub world_size: u64,
    /// Interval between spawner ticks in milliseconds
    pub spawn_interval_ms: u64,
    /// Food count each tick tops up to
    pub target_food_count: u64,
    /// Smallest food mass (inclusive)
    pub food_mass_min: u32,
    /// Food mass upper bound (exclusive)
    pub food_mass_max: u32,
    /// Port for the metrics endpoint
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            world_size: world::SIZE,
            spawn_interval_ms: spawn::INTERVAL_MS,
            target_food_count: food::TARGET_COUNT,
            food_mass_min: food::MASS_MIN,
            food_mass_max: food::MASS_MAX,
            metrics_port: 9090,
        }
    }
}

/// Parse env var `name`, keeping `current` when unset or invalid
fn env_override<T>(name: &str, current: T, accept: impl Fn(&T) -> bool) -> T
where
    T: std::str::FromStr,
{
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(parsed) if accept(&parsed) => parsed,
            Ok(_) => {
                tracing::warn!("{} out of range ('{}'), using default", name, raw);
                current
            }
            Err(_) => {
                tracing::warn!("Invalid {} '{}', using default", name, raw);
                current
            }
        },
        Err(_) => current,
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let defaults = Self::default();

        Self {
            world_size: env_override("WORLD_SIZE", defaults.world_size, |v| {
                *v > 0 && *v <= world::MAX_SIZE
            }),
            spawn_interval_ms: env_override("SPAWN_INTERVAL_MS", defaults.spawn_interval_ms, |v| *v > 0),
            target_food_count: env_override("TARGET_FOOD_COUNT", defaults.target_food_count, |v| {
                *v <= 1_000_000
            }),
            food_mass_min: env_override("FOOD_MASS_MIN", defaults.food_mass_min, |v| *v > 0),
            food_mass_max: env_override("FOOD_MASS_MAX", defaults.food_mass_max, |v| *v > 0),
            metrics_port: env_override("METRICS_PORT", defaults.metrics_port, |v| *v > 0),
        }
    }

    pub fn spawn_rules(&self) -> SpawnRules {
        SpawnRules {
            target_food_count: self.target_food_count,
            food_mass_min: self.food_mass_min,
            food_mass_max: self.food_mass_max,
        }
    }

    pub fn world_settings(&self) -> WorldSettings {
        WorldSettings {
            world_size: self.world_size,
            spawn_interval: Duration::from_millis(self.spawn_interval_ms),
            rules: self.spawn_rules(),
        }
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.world_size == 0 {
            return Err("world_size must be at least 1".to_string());
        }
        if self.spawn_interval_ms == 0 {
            return Err("spawn_interval_ms must be at least 1".to_string());
        }
        if self.metrics_port == 0 {
            return Err("metrics_port cannot be 0".to_string());
        }
        let rules = self.spawn_rules();
        rules.validate().map_err(|e| e.to_string())?;
        if self.world_size > world::MAX_SIZE {
            return Err(format!(
                "world_size {} exceeds the maximum of {}",
                self.world_size,
                world::MAX_SIZE
            ));
        }
        if placement_range(self.world_size, rules.largest_radius()).is_err() {
            return Err(format!(
                "world_size {} is too small for food of mass {}",
                self.world_size,
                self.food_mass_max - 1
            ));
        }
        Ok(())
    }
}
