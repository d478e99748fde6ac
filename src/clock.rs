//! World clock.
//!
//! World time is the in-fiction calendar, independent of wall-clock time.
//! The engine asks the clock for "now" only when a restore is not given an
//! explicit target.

use std::sync::atomic::{AtomicI64, Ordering};

use uuid::Uuid;

use crate::model::WorldTime;

/// Source of the current world time on a branch.
pub trait WorldClock: Send + Sync {
    fn now(&self, branch_id: Uuid) -> WorldTime;
}

/// Clock advanced explicitly by the caller. Shared by all branches.
#[derive(Debug, Default)]
pub struct ManualWorldClock {
    current: AtomicI64,
}

impl ManualWorldClock {
    pub fn new(start: WorldTime) -> Self {
        Self {
            current: AtomicI64::new(start.value()),
        }
    }

    pub fn set(&self, at: WorldTime) {
        self.current.store(at.value(), Ordering::SeqCst);
    }

    /// Move the clock forward by `ticks` and return the new time.
    pub fn advance(&self, ticks: i64) -> WorldTime {
        WorldTime(self.current.fetch_add(ticks, Ordering::SeqCst) + ticks)
    }
}

impl WorldClock for ManualWorldClock {
    fn now(&self, _branch_id: Uuid) -> WorldTime {
        WorldTime(self.current.load(Ordering::SeqCst))
    }
}
