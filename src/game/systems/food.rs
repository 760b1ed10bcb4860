//! Food spawning system
//! Tops the food population up to a target count whenever at least one player is present

use rand::Rng;
use serde::Serialize;

use crate::db::error::ReducerError;
use crate::db::ReducerContext;
use crate::game::constants::{food, mass_to_radius, world};
use crate::game::tables::{Entity, Food, WorldConfig};
use crate::util::vec2::Vec2;

/// Tunables for the food spawner
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpawnRules {
    /// Food count a tick tops up to
    pub target_food_count: u64,
    /// Smallest food mass (inclusive)
    pub food_mass_min: u32,
    /// Food mass upper bound (exclusive)
    pub food_mass_max: u32,
}

impl Default for SpawnRules {
    fn default() -> Self {
        Self {
            target_food_count: food::TARGET_COUNT,
            food_mass_min: food::MASS_MIN,
            food_mass_max: food::MASS_MAX,
        }
    }
}

impl SpawnRules {
    pub fn validate(&self) -> Result<(), ReducerError> {
        if self.food_mass_min == 0 {
            return Err(ReducerError::InvalidRules(
                "food_mass_min must be at least 1".to_string(),
            ));
        }
        if self.food_mass_min >= self.food_mass_max {
            return Err(ReducerError::InvalidRules(format!(
                "food mass range [{}, {}) is empty",
                self.food_mass_min, self.food_mass_max
            )));
        }
        Ok(())
    }

    /// Radius of the heaviest food this rule set can produce
    pub fn largest_radius(&self) -> f32 {
        mass_to_radius(self.food_mass_max.saturating_sub(1).max(self.food_mass_min))
    }
}

/// Outcome of one spawner tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpawnReport {
    pub players: u64,
    pub food_before: u64,
    pub spawned: u64,
}

impl SpawnReport {
    pub fn food_after(&self) -> u64 {
        self.food_before + self.spawned
    }
}

/// Inclusive placement range for a circle of `radius` along one world axis.
///
/// `high` is rounded towards zero so that `high + radius <= world_size` holds exactly.
pub fn placement_range(world_size: u64, radius: f32) -> Result<(f32, f32), ReducerError> {
    if world_size > world::MAX_SIZE {
        return Err(ReducerError::InvalidWorldBounds { world_size, radius });
    }

    let low = radius;
    let exact_high = world_size as f64 - radius as f64;
    let mut high = exact_high as f32;
    if high as f64 > exact_high && high > 0.0 {
        // Nearest f32 rounded up; step one ulp down
        high = f32::from_bits(high.to_bits() - 1);
    }

    if high < low {
        return Err(ReducerError::InvalidWorldBounds { world_size, radius });
    }
    Ok((low, high))
}

/// Spawn food until the world holds `rules.target_food_count` items.
///
/// Does nothing while no players are present. The current food count is read
/// fresh on every call, so repeated firing never overshoots the target.
pub fn spawn_food(ctx: &mut ReducerContext<'_>, rules: &SpawnRules) -> Result<SpawnReport, ReducerError> {
    rules.validate()?;

    let players = ctx.db.player.count();
    let food_before = ctx.db.food.count();
    let mut report = SpawnReport {
        players,
        food_before,
        spawned: 0,
    };

    if players == 0 {
        return Ok(report);
    }

    let world_size = WorldConfig::get(ctx.db)?.world_size;

    let mut food_count = food_before;
    while food_count < rules.target_food_count {
        let mass = ctx.rng.gen_range(rules.food_mass_min..rules.food_mass_max);
        let radius = mass_to_radius(mass);
        let (low, high) = placement_range(world_size, radius)?;
        let x = ctx.rng.gen_range(low..=high);
        let y = ctx.rng.gen_range(low..=high);

        let entity = ctx.db.entity.insert(Entity::new(Vec2::new(x, y), mass))?;
        ctx.db.food.insert(Food {
            entity_id: entity.entity_id,
        })?;

        food_count += 1;
        report.spawned += 1;
    }

    if report.spawned > 0 {
        tracing::debug!(
            "Spawned {} food ({} -> {}) for {} players",
            report.spawned,
            report.food_before,
            report.food_after(),
            players
        );
    }

    Ok(report)
}
