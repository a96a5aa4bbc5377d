use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::timeout;
use uuid::Uuid;

use crate::errors::{FlowError, FlowResult};
use crate::metrics::LOCK_CONFLICTS_TOTAL;

// Above this many entries the lock table is swept for unreferenced locks
// before inserting a new one.
const PRUNE_AT: usize = 1024;

/// A lockable resource. The derived `Ord` gives the global acquisition order:
/// beds first (ascending id), then admissions, then patients, then lab orders.
/// Every multi-resource operation sorts its key set before acquiring, so two
/// operations contending on overlapping sets cannot deadlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKey {
    Bed(Uuid),
    Admission(Uuid),
    Patient(Uuid),
    LabOrder(Uuid),
}

/// Guards held for the duration of one flow operation. Dropping releases all.
#[derive(Debug)]
pub struct LockSet {
    _guards: Vec<OwnedMutexGuard<()>>,
}

/// Per-resource mutual exclusion with bounded acquisition.
///
/// Acquisition that cannot complete within the configured wait fails with a
/// `Conflict` error instead of blocking indefinitely; the caller retries with
/// fresh data.
pub struct LockManager {
    locks: Mutex<HashMap<ResourceKey, Arc<AsyncMutex<()>>>>,
    wait: Duration,
}

impl LockManager {
    pub fn new(wait: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            wait,
        }
    }

    /// Acquires every key in the set, in global order, or fails with
    /// `Conflict` if any single acquisition exceeds the wait bound.
    pub async fn acquire(&self, mut keys: Vec<ResourceKey>) -> FlowResult<LockSet> {
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let lock = self.entry(key);
            match timeout(self.wait, lock.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    LOCK_CONFLICTS_TOTAL.inc();
                    return Err(FlowError::conflict(
                        "timed out waiting for resource locks, retry with fresh data",
                    ));
                }
            }
        }
        Ok(LockSet { _guards: guards })
    }

    fn entry(&self, key: ResourceKey) -> Arc<AsyncMutex<()>> {
        let mut table = self.locks.lock().expect("lock table poisoned");
        if table.len() > PRUNE_AT {
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        table
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}
