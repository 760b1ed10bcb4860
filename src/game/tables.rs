//! World schema: the singleton config, the base entity table and its overlays,
//! players, and the recurring spawn job.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::db::error::ReducerError;
use crate::db::identity::{Identity, Timestamp};
use crate::db::table::{Row, Table};
use crate::util::vec2::Vec2;

/// Entity identifier (shared by Entity, Food and Circle rows)
pub type EntityId = u64;

/// Auto-assigned player number
pub type PlayerId = u64;

/// Primary key of the world config singleton
pub const WORLD_CONFIG_ID: u32 = 0;

/// World-wide parameters. Exactly one row, keyed [`WORLD_CONFIG_ID`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    pub id: u32,
    pub world_size: u64,
}

impl WorldConfig {
    /// Read the singleton. Absence means init never committed.
    pub fn get(tables: &Tables) -> Result<WorldConfig, ReducerError> {
        tables
            .config
            .find(&WORLD_CONFIG_ID)
            .cloned()
            .ok_or(ReducerError::ConfigMissing)
    }
}

impl Row for WorldConfig {
    type Key = u32;
    const TABLE: &'static str = "config";
    const PRIMARY_KEY: &'static str = "id";

    fn key(&self) -> u32 {
        self.id
    }
}

/// Base record for every spawnable object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: EntityId,
    pub position: Vec2,
    pub mass: u32,
}

impl Entity {
    /// Unsaved entity; the id is assigned on insert
    pub fn new(position: Vec2, mass: u32) -> Self {
        Self {
            entity_id: 0,
            position,
            mass,
        }
    }

    pub fn radius(&self) -> f32 {
        crate::game::constants::mass_to_radius(self.mass)
    }
}

impl Row for Entity {
    type Key = EntityId;
    const TABLE: &'static str = "entity";
    const PRIMARY_KEY: &'static str = "entity_id";

    fn key(&self) -> EntityId {
        self.entity_id
    }

    fn assign_auto_inc(&mut self, next: u64) -> bool {
        if self.entity_id == 0 {
            self.entity_id = next;
            true
        } else {
            false
        }
    }
}

/// Marks an entity as food
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub entity_id: EntityId,
}

impl Row for Food {
    type Key = EntityId;
    const TABLE: &'static str = "food";
    const PRIMARY_KEY: &'static str = "entity_id";

    fn key(&self) -> EntityId {
        self.entity_id
    }
}

/// Marks an entity as a player-controlled circle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub entity_id: EntityId,
    pub player_id: PlayerId,
    pub direction: Vec2,
    pub speed: f32,
    pub last_split_time: Timestamp,
}

impl Row for Circle {
    type Key = EntityId;
    const TABLE: &'static str = "circle";
    const PRIMARY_KEY: &'static str = "entity_id";

    fn key(&self) -> EntityId {
        self.entity_id
    }

    fn indexed_column(&self) -> Option<u64> {
        Some(self.player_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub identity: Identity,
    pub player_id: PlayerId,
    pub name: String,
}

impl Player {
    /// Unsaved player; player_id is assigned on insert
    pub fn new(identity: Identity, name: impl Into<String>) -> Self {
        Self {
            identity,
            player_id: 0,
            name: name.into(),
        }
    }
}

impl Row for Player {
    type Key = Identity;
    const TABLE: &'static str = "player";
    const PRIMARY_KEY: &'static str = "identity";

    fn key(&self) -> Identity {
        self.identity
    }

    fn assign_auto_inc(&mut self, next: u64) -> bool {
        if self.player_id == 0 {
            self.player_id = next;
            true
        } else {
            false
        }
    }

    fn unique_column(&self) -> Option<(&'static str, u64)> {
        Some(("player_id", self.player_id))
    }
}

/// Persistent recurring job that drives the food spawner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnFoodTimer {
    pub scheduled_id: u64,
    pub interval: Duration,
}

impl Row for SpawnFoodTimer {
    type Key = u64;
    const TABLE: &'static str = "spawn_food_timer";
    const PRIMARY_KEY: &'static str = "scheduled_id";

    fn key(&self) -> u64 {
        self.scheduled_id
    }

    fn assign_auto_inc(&mut self, next: u64) -> bool {
        if self.scheduled_id == 0 {
            self.scheduled_id = next;
            true
        } else {
            false
        }
    }
}

/// Every table in the world. Cloned wholesale to form a transaction's working copy.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub config: Table<WorldConfig>,
    pub entity: Table<Entity>,
    pub food: Table<Food>,
    pub circle: Table<Circle>,
    pub player: Table<Player>,
    pub spawn_food_timer: Table<SpawnFoodTimer>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn circles_for_player(&self, player_id: PlayerId) -> Vec<&Circle> {
        self.circle.range_by_index(player_id..=player_id).collect()
    }

    /// Entities that carry neither a Food nor a Circle overlay
    pub fn orphan_entities(&self) -> Vec<EntityId> {
        self.entity
            .iter()
            .map(|e| e.entity_id)
            .filter(|id| self.food.find(id).is_none() && self.circle.find(id).is_none())
            .collect()
    }
}
