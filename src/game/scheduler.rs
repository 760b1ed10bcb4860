//! Recurring job scheduler - registers the spawn job and fires it on its interval

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::db::error::ReducerError;
use crate::db::identity::Identity;
use crate::db::{Database, ReducerContext};
use crate::game::constants::spawn;
use crate::game::systems::food::{spawn_food, SpawnReport, SpawnRules};
use crate::game::tables::{SpawnFoodTimer, Tables};
use crate::metrics::Metrics;

/// Register a recurring spawn job. The row persists and re-fires for the server's lifetime.
pub fn schedule_spawn_food(tables: &mut Tables, interval: Duration) -> Result<SpawnFoodTimer, ReducerError> {
    if interval.is_zero() {
        return Err(ReducerError::InvalidSchedule);
    }
    tables.spawn_food_timer.insert(SpawnFoodTimer {
        scheduled_id: 0,
        interval,
    })
}

/// Entry point for one firing of a spawn job
pub fn on_fire(
    ctx: &mut ReducerContext<'_>,
    job: &SpawnFoodTimer,
    rules: &SpawnRules,
) -> Result<SpawnReport, ReducerError> {
    debug!("Spawn job {} fired", job.scheduled_id);
    spawn_food(ctx, rules)
}

/// Fire `job` in its own transaction with a fresh RNG, recording the outcome
pub fn fire_job(
    db: &Database,
    job: &SpawnFoodTimer,
    rules: &SpawnRules,
    metrics: &Metrics,
) -> Result<SpawnReport, ReducerError> {
    let started = Instant::now();
    let result = db.call_reducer(Identity::MODULE, StdRng::from_entropy(), |ctx| {
        on_fire(ctx, job, rules)
    });

    match &result {
        Ok(report) => metrics.record_spawn_tick(report, started.elapsed()),
        Err(e) => {
            metrics.record_spawn_failure();
            if e.is_fatal() {
                error!("Spawn job {} failed, world is broken: {}", job.scheduled_id, e);
            } else {
                warn!("Spawn job {} failed: {}", job.scheduled_id, e);
            }
        }
    }
    db.read(|t| metrics.observe_world(t));

    result
}

/// Deadline bookkeeping for registered jobs.
///
/// The job set is re-read from the table every scheduler loop, so deadlines are
/// keyed by `scheduled_id` and synced rather than held in one `tokio::time::Interval`
/// per job. Missed deadlines are skipped like `MissedTickBehavior::Skip`.
#[derive(Debug, Default)]
pub struct JobClock {
    /// scheduled_id -> (next deadline, interval)
    deadlines: BTreeMap<u64, (Instant, Duration)>,
}

impl JobClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track newly registered jobs (first firing one interval from `now`)
    /// and forget jobs no longer in the table
    pub fn sync(&mut self, jobs: &[SpawnFoodTimer], now: Instant) {
        self.deadlines
            .retain(|id, _| jobs.iter().any(|job| job.scheduled_id == *id));

        for job in jobs {
            let entry = self
                .deadlines
                .entry(job.scheduled_id)
                .or_insert((now + job.interval, job.interval));
            entry.1 = job.interval;
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().map(|(deadline, _)| *deadline).min()
    }

    /// Jobs due at `now`, rescheduled to their next deadline.
    /// Deadlines that already passed are skipped rather than replayed.
    pub fn take_due(&mut self, now: Instant) -> Vec<u64> {
        let mut due = Vec::new();
        for (id, (deadline, interval)) in self.deadlines.iter_mut() {
            if *deadline <= now {
                due.push(*id);
                let mut next = *deadline + *interval;
                if next <= now {
                    next = now + *interval;
                }
                *deadline = next;
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

/// Start the scheduler background task.
/// A single task fires every job, so firings of one job never overlap.
pub fn start_scheduler(db: Arc<Database>, rules: SpawnRules, metrics: Arc<Metrics>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let idle = Duration::from_millis(spawn::IDLE_POLL_MS);
        let mut clock = JobClock::new();

        info!("Scheduler started");

        loop {
            let now = Instant::now();
            let jobs: Vec<SpawnFoodTimer> =
                db.read(|t| t.spawn_food_timer.iter().cloned().collect());
            clock.sync(&jobs, now);

            for job_id in clock.take_due(now) {
                if let Some(job) = jobs.iter().find(|j| j.scheduled_id == job_id) {
                    // Logged and counted inside fire_job; the next firing is the retry
                    if fire_job(&db, job, &rules, &metrics).is_err() {
                        debug!("Spawn job {} retries on its next tick", job_id);
                    }
                }
            }

            // Wake at least every idle period so newly registered jobs are noticed
            let wake = match clock.next_deadline() {
                Some(deadline) => deadline.min(Instant::now() + idle),
                None => Instant::now() + idle,
            };
            tokio::time::sleep_until(tokio::time::Instant::from_std(wake)).await;
        }
    })
}
