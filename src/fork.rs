//! Fork engine.
//!
//! Forking creates a child branch and seeds it with the state of every
//! entity on the source branch as of the cutoff world time. Only the live
//! snapshot is copied: each entity gets a single version 1 on the new
//! branch, valid from the cutoff, pointing back at the source version.
//!
//! A fork is not atomic across entities. Each copy is its own store
//! transaction and a failed copy is logged and skipped, so an interrupted
//! fork leaves a consistent but incomplete branch.

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Branch, EntityRef, NewBranch, Version, WorldTime};
use crate::repository::{BranchRepository, VersionRepository};

/// Default number of entities copied concurrently.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Fork engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForkConfig {
    /// Entity copies in flight at once. Zero is treated as one.
    pub max_concurrency: usize,
}

impl Default for ForkConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Parameters for a fork.
#[derive(Debug, Clone)]
pub struct ForkRequest {
    pub source_branch_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub cutoff: WorldTime,
    pub created_by: String,
}

impl ForkRequest {
    pub fn new(
        source_branch_id: Uuid,
        name: impl Into<String>,
        cutoff: WorldTime,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            source_branch_id,
            name: name.into(),
            description: None,
            cutoff,
            created_by: created_by.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Result of a fork.
#[derive(Debug, Clone)]
pub struct ForkOutcome {
    pub branch: Branch,
    /// Versions written to the new branch, ordered by entity.
    pub copies: Vec<Version>,
    /// Entities with history on the source but nothing live at the cutoff.
    pub skipped: Vec<EntityRef>,
    /// Entities whose copy failed.
    pub failed: Vec<EntityRef>,
}

impl ForkOutcome {
    pub fn versions_copied(&self) -> usize {
        self.copies.len()
    }
}

enum CopyResult {
    Copied(Version),
    Skipped(EntityRef),
    Failed(EntityRef),
}

/// Creates branches seeded from a source branch.
#[derive(Clone)]
pub struct ForkEngine {
    branches: BranchRepository,
    versions: VersionRepository,
    config: ForkConfig,
}

impl ForkEngine {
    pub fn new(branches: BranchRepository, versions: VersionRepository, config: ForkConfig) -> Self {
        Self {
            branches,
            versions,
            config,
        }
    }

    /// Fork `request.source_branch_id` into a new child branch.
    ///
    /// Fails with `SourceNotFound` if the source is missing or deleted.
    /// Per-entity failures do not fail the fork; they are reported in
    /// [`ForkOutcome::failed`].
    pub async fn fork(&self, request: ForkRequest) -> Result<ForkOutcome> {
        let source = self
            .branches
            .find_by_id(request.source_branch_id)
            .await?
            .ok_or(Error::SourceNotFound(request.source_branch_id))?;

        let mut new_branch = NewBranch::child(
            source.campaign_id.clone(),
            request.name,
            source.id,
            request.cutoff,
        );
        new_branch.description = request.description;
        let branch = self.branches.create(new_branch).await?;

        let entities = self.versions.list_entities(source.id).await?;
        debug!(
            source = %source.id,
            target = %branch.id,
            entities = entities.len(),
            cutoff = %request.cutoff,
            "forking branch"
        );

        let results: Vec<CopyResult> = stream::iter(entities)
            .map(|entity| self.copy_entity(entity, source.id, branch.id, request.cutoff, &request.created_by))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut copies = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();
        for result in results {
            match result {
                CopyResult::Copied(version) => copies.push(version),
                CopyResult::Skipped(entity) => skipped.push(entity),
                CopyResult::Failed(entity) => failed.push(entity),
            }
        }
        copies.sort_by(|a, b| a.entity().cmp(&b.entity()));
        skipped.sort();
        failed.sort();

        info!(
            source = %source.id,
            branch_id = %branch.id,
            copied = copies.len(),
            skipped = skipped.len(),
            failed = failed.len(),
            "forked branch"
        );

        Ok(ForkOutcome {
            branch,
            copies,
            skipped,
            failed,
        })
    }

    async fn copy_entity(
        &self,
        entity: EntityRef,
        source_id: Uuid,
        target_id: Uuid,
        cutoff: WorldTime,
        created_by: &str,
    ) -> CopyResult {
        let source_key = entity.on(source_id);
        let live = match self.versions.version_at(&source_key, cutoff).await {
            Ok(Some(version)) => version,
            Ok(None) => return CopyResult::Skipped(entity),
            Err(e) => {
                warn!(entity = %entity, error = %e, "fork: failed to read source version, skipping");
                return CopyResult::Failed(entity);
            }
        };

        match self
            .versions
            .copy_from(&entity.on(target_id), &live, cutoff, created_by)
            .await
        {
            Ok(copy) => CopyResult::Copied(copy),
            Err(e) => {
                warn!(entity = %entity, source_version = %live.id, error = %e, "fork: failed to copy entity, skipping");
                CopyResult::Failed(entity)
            }
        }
    }
}
