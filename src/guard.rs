//! Optimistic concurrency guard.
//!
//! Callers pass the version they last read. The guard compares it with the
//! entity's logical version before any write is attempted. The store
//! re-checks the same value inside its transaction, so a writer that slips
//! in between still loses with `Conflict`.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::TimelineKey;
use crate::storage::helpers::logical_version;
use crate::storage::VersionStore;

/// Result of a version check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    /// Expected version matches.
    Valid,
    /// Version mismatch detected.
    Mismatch { expected: u32, actual: u32 },
}

/// Compare the caller's expected version with the actual logical version.
pub fn validate_version(expected: u32, actual: u32) -> VersionCheck {
    if expected == actual {
        VersionCheck::Valid
    } else {
        VersionCheck::Mismatch { expected, actual }
    }
}

#[derive(Clone)]
pub struct ConcurrencyGuard {
    store: Arc<dyn VersionStore>,
}

impl ConcurrencyGuard {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    /// Check `expected` against the timeline's logical version.
    ///
    /// Returns the logical version on success. Never writes.
    pub async fn check_and_advance(&self, key: &TimelineKey, expected: u32) -> Result<u32> {
        let current = self.store.current(key).await?;
        let actual = logical_version(current.as_ref());

        match validate_version(expected, actual) {
            VersionCheck::Valid => Ok(actual),
            VersionCheck::Mismatch { expected, actual } => {
                debug!(timeline = %key, expected, actual, "version check failed");
                Err(Error::Conflict { expected, actual })
            }
        }
    }
}
