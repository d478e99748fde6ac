//! Storage interfaces and implementations.
//!
//! Two persistence traits back the engine:
//! - [`VersionStore`]: append-only bitemporal version rows, one timeline per
//!   `(entity_type, entity_id, branch_id)`.
//! - [`BranchStore`]: branch rows with an immutable self-referential parent.
//!
//! Every mutating method is a single atomic unit in the backend. Backends
//! enforce the timeline invariants themselves so that two concurrent
//! writers can never both observe the same open version.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::{StorageConfig, StorageType};
use crate::model::{Branch, EntityRef, NewVersion, Page, TimelineKey, Version, WorldTime};

pub mod helpers;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{MemoryBranchStore, MemoryVersionStore};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteBranchStore, SqliteVersionStore};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Branch not found: {0}")]
    BranchNotFound(Uuid),

    #[error("Version not found: {0}")]
    VersionNotFound(Uuid),

    #[error("Branch {branch_id} has {children} live child branch(es)")]
    HasChildren { branch_id: Uuid, children: usize },

    #[error("Overlap violation on {key}: valid_from {valid_from} does not follow open version starting at {open_from}")]
    OverlapViolation {
        key: TimelineKey,
        valid_from: WorldTime,
        open_from: WorldTime,
    },

    #[error("Version conflict: expected {expected}, got {actual}")]
    VersionConflict { expected: u32, actual: u32 },

    #[error("Write conflict on {0}")]
    WriteConflict(TimelineKey),

    #[error("Duplicate branch id: {0}")]
    DuplicateBranch(Uuid),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Invalid timestamp format: {0}")]
    InvalidTimestampFormat(String),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unsupported storage backend: {0}")]
    Unsupported(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Interface for version persistence.
///
/// Implementations:
/// - `MemoryVersionStore`: in-memory, for tests and embedded use
/// - `SqliteVersionStore`: SQLite storage
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Close the open version of `key` (if any) and insert `version` as the
    /// new open version, numbered `max + 1`.
    ///
    /// Fails with `OverlapViolation` when `valid_from` does not strictly
    /// follow the open version's `valid_from`, and with `VersionConflict`
    /// when `expected_version` is set and differs from the logical version.
    async fn append(&self, key: &TimelineKey, version: NewVersion) -> Result<Version>;

    /// Fetch a version by id.
    async fn get(&self, id: Uuid) -> Result<Option<Version>>;

    /// The open version of a timeline (`valid_to IS NULL`).
    async fn current(&self, key: &TimelineKey) -> Result<Option<Version>>;

    /// All versions of a timeline ordered by `valid_from` ascending.
    async fn timeline(&self, key: &TimelineKey) -> Result<Vec<Version>>;

    /// The version whose `[valid_from, valid_to)` contains `at`.
    async fn version_at(&self, key: &TimelineKey, at: WorldTime) -> Result<Option<Version>>;

    /// Versions of a timeline, newest first, paginated.
    async fn history(&self, key: &TimelineKey, page: Page) -> Result<Vec<Version>>;

    /// Distinct entities with at least one version on `branch_id`.
    async fn list_entities(&self, branch_id: Uuid) -> Result<Vec<EntityRef>>;
}

/// Interface for branch persistence.
///
/// Implementations:
/// - `MemoryBranchStore`: in-memory, for tests and embedded use
/// - `SqliteBranchStore`: SQLite storage
#[async_trait]
pub trait BranchStore: Send + Sync {
    /// Insert a new branch row.
    async fn insert(&self, branch: &Branch) -> Result<()>;

    /// Fetch a branch by id, including soft-deleted rows.
    async fn get(&self, id: Uuid) -> Result<Option<Branch>>;

    /// Live branches of a campaign ordered by creation time.
    async fn list_by_campaign(&self, campaign_id: &str) -> Result<Vec<Branch>>;

    /// Live branches whose parent is `parent_id`.
    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<Branch>>;

    /// Set `deleted_at` on a live branch that has no live children.
    ///
    /// The child check and the update are one atomic step. Fails with
    /// `BranchNotFound` if the branch is missing or already deleted and
    /// `HasChildren` if a live branch references it as parent.
    async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> Result<Branch>;
}

/// Initialize storage based on configuration.
///
/// Returns tuple of (VersionStore, BranchStore) implementations based on
/// the configured storage type.
pub async fn init_storage(
    config: &StorageConfig,
) -> Result<(Arc<dyn VersionStore>, Arc<dyn BranchStore>)> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Storage: in-memory");
            Ok((
                Arc::new(MemoryVersionStore::new()),
                Arc::new(MemoryBranchStore::new()),
            ))
        }
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            info!("Storage: sqlite at {}", config.sqlite.path);
            let pool = sqlite::connect(&config.sqlite).await?;

            let version_store = Arc::new(SqliteVersionStore::new(pool.clone()));
            version_store.init().await?;

            let branch_store = Arc::new(SqliteBranchStore::new(pool));
            branch_store.init().await?;

            Ok((version_store, branch_store))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            tracing::error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err(StorageError::Unsupported("sqlite".to_string()))
        }
    }
}
