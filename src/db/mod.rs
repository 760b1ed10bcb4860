//! Transactional world store
//!
//! Reducers run against a private working copy of every table while holding the
//! writer lock. The copy replaces committed state only if the reducer returns `Ok`,
//! so a failed reducer leaves no partial rows behind.

pub mod error;
pub mod identity;
pub mod table;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use crate::game::tables::Tables;
use error::ReducerError;
use identity::{Identity, Timestamp};

/// Per-invocation handler context: store, caller, clock and a request-scoped RNG
pub struct ReducerContext<'a> {
    pub db: &'a mut Tables,
    pub sender: Identity,
    pub timestamp: Timestamp,
    pub rng: StdRng,
}

/// Read-only handler context for handlers that never mutate rows
pub struct ViewContext<'a> {
    pub db: &'a Tables,
    pub sender: Identity,
    pub timestamp: Timestamp,
}

/// Shared world database
#[derive(Debug, Default)]
pub struct Database {
    committed: Mutex<Tables>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `reducer` as one serializable transaction.
    /// Commits on `Ok`, discards every change on `Err`.
    pub fn call_reducer<T, F>(&self, sender: Identity, rng: StdRng, reducer: F) -> Result<T, ReducerError>
    where
        F: FnOnce(&mut ReducerContext<'_>) -> Result<T, ReducerError>,
    {
        let mut committed = self.committed.lock();
        let mut working = committed.clone();

        let result = {
            let mut ctx = ReducerContext {
                db: &mut working,
                sender,
                timestamp: Timestamp::now(),
                rng,
            };
            reducer(&mut ctx)
        };

        match result {
            Ok(value) => {
                *committed = working;
                debug!("Transaction committed (sender {})", sender);
                Ok(value)
            }
            Err(e) => {
                warn!("Transaction rolled back: {}", e);
                Err(e)
            }
        }
    }

    /// Run a read-only handler against committed state without copying it
    pub fn call_view<T, F>(&self, sender: Identity, handler: F) -> Result<T, ReducerError>
    where
        F: FnOnce(&ViewContext<'_>) -> Result<T, ReducerError>,
    {
        let committed = self.committed.lock();
        let ctx = ViewContext {
            db: &committed,
            sender,
            timestamp: Timestamp::now(),
        };
        handler(&ctx)
    }

    /// Read committed state
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let committed = self.committed.lock();
        f(&committed)
    }
}
