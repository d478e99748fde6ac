//! In-memory VersionStore implementation.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::model::{EntityRef, NewVersion, Page, TimelineKey, Version, WorldTime};
use crate::storage::helpers::{check_append, locate, now};
use crate::storage::{Result, VersionStore};

#[derive(Default)]
struct Tables {
    /// Rows per timeline, ordered by `valid_from`.
    timelines: HashMap<TimelineKey, Vec<Version>>,
    /// Version id to owning timeline.
    by_id: HashMap<Uuid, TimelineKey>,
}

/// Version store that keeps every timeline in memory.
#[derive(Default)]
pub struct MemoryVersionStore {
    tables: RwLock<Tables>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of version rows across all timelines.
    pub async fn len(&self) -> usize {
        self.tables
            .read()
            .await
            .timelines
            .values()
            .map(Vec::len)
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn append(&self, key: &TimelineKey, version: NewVersion) -> Result<Version> {
        let mut tables = self.tables.write().await;
        let last = tables.timelines.get(key).and_then(|rows| rows.last());
        let open = last.filter(|v| v.is_open());
        let max_version = last.map(|v| v.version).unwrap_or(0);
        let number = check_append(key, open, max_version, &version)?;

        // The timeline exists only once an append is accepted.
        let rows = tables.timelines.entry(key.clone()).or_default();
        if let Some(open) = rows.last_mut().filter(|v| v.is_open()) {
            open.valid_to = Some(version.valid_from);
        }

        let row = Version {
            id: Uuid::new_v4(),
            entity_type: key.entity_type.clone(),
            entity_id: key.entity_id.clone(),
            branch_id: key.branch_id,
            version: number,
            valid_from: version.valid_from,
            valid_to: None,
            payload: version.payload,
            comment: version.comment,
            created_by: version.created_by,
            created_at: now(),
            diverged_from_version_id: version.diverged_from_version_id,
        };
        rows.push(row.clone());
        tables.by_id.insert(row.id, key.clone());

        debug!(timeline = %key, version = number, valid_from = %row.valid_from, "appended version");
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Version>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_id
            .get(&id)
            .and_then(|key| tables.timelines.get(key))
            .and_then(|rows| rows.iter().find(|v| v.id == id))
            .cloned())
    }

    async fn current(&self, key: &TimelineKey) -> Result<Option<Version>> {
        let tables = self.tables.read().await;
        Ok(tables
            .timelines
            .get(key)
            .and_then(|rows| rows.last())
            .filter(|v| v.is_open())
            .cloned())
    }

    async fn timeline(&self, key: &TimelineKey) -> Result<Vec<Version>> {
        let tables = self.tables.read().await;
        Ok(tables.timelines.get(key).cloned().unwrap_or_default())
    }

    async fn version_at(&self, key: &TimelineKey, at: WorldTime) -> Result<Option<Version>> {
        let tables = self.tables.read().await;
        Ok(tables
            .timelines
            .get(key)
            .and_then(|rows| locate(rows, at))
            .cloned())
    }

    async fn history(&self, key: &TimelineKey, page: Page) -> Result<Vec<Version>> {
        let tables = self.tables.read().await;
        let rows = match tables.timelines.get(key) {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };
        Ok(page.apply(rows.iter().rev().cloned()))
    }

    async fn list_entities(&self, branch_id: Uuid) -> Result<Vec<EntityRef>> {
        let tables = self.tables.read().await;
        let entities: BTreeSet<EntityRef> = tables
            .timelines
            .keys()
            .filter(|key| key.branch_id == branch_id)
            .map(TimelineKey::entity)
            .collect();
        Ok(entities.into_iter().collect())
    }
}
