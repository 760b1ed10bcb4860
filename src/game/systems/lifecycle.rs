//! World initialization and client connection handlers

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tracing::info;

use crate::db::error::ReducerError;
use crate::db::identity::Identity;
use crate::db::{Database, ReducerContext, ViewContext};
use crate::game::constants::{spawn, world};
use crate::game::scheduler::schedule_spawn_food;
use crate::game::systems::food::{placement_range, SpawnRules};
use crate::game::tables::{SpawnFoodTimer, WorldConfig, WORLD_CONFIG_ID};
use crate::metrics::Metrics;

/// Parameters fixed at world creation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldSettings {
    pub world_size: u64,
    pub spawn_interval: Duration,
    pub rules: SpawnRules,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            world_size: world::SIZE,
            spawn_interval: Duration::from_millis(spawn::INTERVAL_MS),
            rules: SpawnRules::default(),
        }
    }
}

/// Create the world config singleton and register the recurring spawn job.
/// Runs once; a second call fails on the config primary key and changes nothing.
pub fn init(ctx: &mut ReducerContext<'_>, settings: &WorldSettings) -> Result<SpawnFoodTimer, ReducerError> {
    info!("Initializing...");

    settings.rules.validate()?;
    placement_range(settings.world_size, settings.rules.largest_radius())?;

    ctx.db.config.insert(WorldConfig {
        id: WORLD_CONFIG_ID,
        world_size: settings.world_size,
    })?;

    let job = schedule_spawn_food(ctx.db, settings.spawn_interval)?;

    info!(
        "World created: size {}, spawn job {} every {:?}",
        settings.world_size, job.scheduled_id, job.interval
    );
    Ok(job)
}

/// Client connected. Observability only; never fails.
pub fn on_connect(ctx: &ViewContext<'_>) -> Result<(), ReducerError> {
    info!("{} just connected.", ctx.sender);
    Ok(())
}

/// Run [`init`] as its own transaction
pub fn init_world(db: &Database, settings: &WorldSettings) -> Result<SpawnFoodTimer, ReducerError> {
    db.call_reducer(Identity::MODULE, StdRng::from_entropy(), |ctx| init(ctx, settings))
}

/// Run [`on_connect`] against committed state
pub fn connect(db: &Database, identity: Identity, metrics: &Metrics) -> Result<(), ReducerError> {
    db.call_view(identity, on_connect)?;
    metrics.record_connect();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_singleton_and_job() {
        let db = Database::new();
        let job = init_world(&db, &WorldSettings::default()).unwrap();

        assert_eq!(job.interval, Duration::from_millis(500));
        db.read(|t| {
            assert_eq!(t.config.count(), 1);
            let config = WorldConfig::get(t).unwrap();
            assert_eq!(config.id, 0);
            assert_eq!(config.world_size, 1000);
            assert_eq!(t.spawn_food_timer.count(), 1);
            assert_eq!(t.spawn_food_timer.find(&job.scheduled_id), Some(&job));
        });
    }

    #[test]
    fn test_second_init_fails_without_duplicates() {
        let db = Database::new();
        init_world(&db, &WorldSettings::default()).unwrap();

        let again = init_world(
            &db,
            &WorldSettings { world_size: 2000, ..WorldSettings::default() },
        );
        assert!(matches!(
            again,
            Err(ReducerError::ConstraintViolation { table: "config", .. })
        ));

        db.read(|t| {
            assert_eq!(t.config.count(), 1);
            assert_eq!(WorldConfig::get(t).unwrap().world_size, 1000);
            assert_eq!(t.spawn_food_timer.count(), 1);
        });
    }

    #[test]
    fn test_init_rejects_world_too_small() {
        let db = Database::new();
        let result = init_world(&db, &WorldSettings { world_size: 3, ..WorldSettings::default() });

        assert!(matches!(result, Err(ReducerError::InvalidWorldBounds { .. })));
        db.read(|t| {
            assert!(WorldConfig::get(t).is_err());
            assert_eq!(t.spawn_food_timer.count(), 0);
        });
    }

    #[test]
    fn test_init_rejects_world_over_limit() {
        let db = Database::new();
        let result = init_world(
            &db,
            &WorldSettings { world_size: world::MAX_SIZE + 3, ..WorldSettings::default() },
        );

        assert!(matches!(result, Err(ReducerError::InvalidWorldBounds { .. })));
        db.read(|t| assert_eq!(t.config.count(), 0));
    }

    #[test]
    fn test_failed_schedule_rolls_back_config() {
        let db = Database::new();
        let result = init_world(
            &db,
            &WorldSettings { spawn_interval: Duration::ZERO, ..WorldSettings::default() },
        );

        assert_eq!(result, Err(ReducerError::InvalidSchedule));
        db.read(|t| assert_eq!(t.config.count(), 0));

        // The world can still be created afterwards
        assert!(init_world(&db, &WorldSettings::default()).is_ok());
    }

    #[test]
    fn test_init_rejects_invalid_rules() {
        let db = Database::new();
        let rules = SpawnRules { food_mass_min: 5, food_mass_max: 5, ..SpawnRules::default() };
        let result = init_world(&db, &WorldSettings { rules, ..WorldSettings::default() });
        assert!(matches!(result, Err(ReducerError::InvalidRules(_))));
    }

    #[test]
    fn test_connect_is_side_effect_free() {
        let db = Database::new();
        init_world(&db, &WorldSettings::default()).unwrap();
        let metrics = Metrics::new();
        let who = Identity::generate();

        connect(&db, who, &metrics).unwrap();
        connect(&db, who, &metrics).unwrap();

        assert_eq!(metrics.connections_total.load(std::sync::atomic::Ordering::Relaxed), 2);

        db.read(|t| {
            assert_eq!(t.player.count(), 0);
            assert_eq!(t.entity.count(), 0);
            assert_eq!(t.config.count(), 1);
        });
    }

    #[test]
    fn test_connect_does_not_consume_ids() {
        let db = Database::new();
        init_world(&db, &WorldSettings::default()).unwrap();
        let metrics = Metrics::new();
        for _ in 0..3 {
            connect(&db, Identity::generate(), &metrics).unwrap();
        }

        let job = db
            .call_reducer(Identity::MODULE, StdRng::seed_from_u64(0), |ctx| {
                schedule_spawn_food(ctx.db, Duration::from_millis(250))
            })
            .unwrap();
        assert_eq!(job.scheduled_id, 2);
    }

    #[test]
    fn test_connect_before_init() {
        let db = Database::new();
        assert!(connect(&db, Identity::generate(), &Metrics::new()).is_ok());
    }
}
