//! Engine facade.
//!
//! [`Chronicle`] wires the repositories, the concurrency guard, the fork
//! engine and the audit sink together. Every mutation follows the same
//! path: guard check, store write, then an audit record once the write has
//! committed.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::audit::{AuditSink, ChangeKind, ChangeRecord, TracingAuditSink};
use crate::clock::{ManualWorldClock, WorldClock};
use crate::codec::PayloadCodec;
use crate::config::Config;
use crate::diff::VersionDiff;
use crate::error::Result;
use crate::fork::{ForkConfig, ForkEngine, ForkOutcome, ForkRequest};
use crate::guard::ConcurrencyGuard;
use crate::model::{
    Branch, BranchNode, Change, EntityRef, NewBranch, Page, Restore, TimelineKey, Version, WorldTime,
};
use crate::repository::{BranchRepository, VersionRepository};
use crate::storage::{init_storage, BranchStore, VersionStore};

/// Branch and version engine for one storage backend.
#[derive(Clone)]
pub struct Chronicle {
    branches: BranchRepository,
    versions: VersionRepository,
    guard: ConcurrencyGuard,
    forks: ForkEngine,
    audit: Arc<dyn AuditSink>,
}

impl Chronicle {
    /// Open storage from configuration and build an engine over it.
    ///
    /// Uses a [`ManualWorldClock`] starting at zero and logs audit records
    /// through `tracing`. Use [`Chronicle::builder`] to supply others.
    pub async fn open(config: &Config) -> Result<Self> {
        let (version_store, branch_store) = init_storage(&config.storage).await?;
        Ok(Self::builder(version_store, branch_store)
            .codec(PayloadCodec::from_config(&config.codec))
            .fork_config(config.fork.clone())
            .build())
    }

    pub fn builder(
        version_store: Arc<dyn VersionStore>,
        branch_store: Arc<dyn BranchStore>,
    ) -> ChronicleBuilder {
        ChronicleBuilder {
            version_store,
            branch_store,
            codec: PayloadCodec::default(),
            clock: Arc::new(ManualWorldClock::default()),
            audit: Arc::new(TracingAuditSink),
            fork: ForkConfig::default(),
        }
    }

    pub fn branch_repository(&self) -> &BranchRepository {
        &self.branches
    }

    pub fn version_repository(&self) -> &VersionRepository {
        &self.versions
    }

    // --- Branches ---

    pub async fn create_branch(&self, new: NewBranch, actor: &str) -> Result<Branch> {
        let branch = self.branches.create(new).await?;
        self.audit
            .record(ChangeRecord::branch(ChangeKind::BranchCreated, &branch, actor));
        Ok(branch)
    }

    pub async fn delete_branch(&self, id: Uuid, actor: &str) -> Result<Branch> {
        let branch = self.branches.soft_delete(id).await?;
        self.audit
            .record(ChangeRecord::branch(ChangeKind::BranchDeleted, &branch, actor));
        Ok(branch)
    }

    /// A live branch, or `NotFound`.
    pub async fn branch(&self, id: Uuid) -> Result<Branch> {
        self.branches.require(id).await
    }

    /// Live branches of a campaign in creation order.
    pub async fn branches(&self, campaign_id: &str) -> Result<Vec<Branch>> {
        self.branches.find_by_campaign(campaign_id).await
    }

    pub async fn hierarchy(&self, campaign_id: &str) -> Result<Vec<BranchNode>> {
        self.branches.get_hierarchy(campaign_id).await
    }

    // --- Versions ---

    /// Record a change to an entity.
    ///
    /// `expected_version` is the logical version the caller last read
    /// (0 for an entity with no history on the branch).
    pub async fn record_change(
        &self,
        key: &TimelineKey,
        expected_version: u32,
        change: Change,
    ) -> Result<Version> {
        self.branches.require(key.branch_id).await?;
        self.guard.check_and_advance(key, expected_version).await?;

        let before = self.versions.current(key).await?;
        let actor = change.created_by.clone();
        let version = self
            .versions
            .append(key, change, Some(expected_version))
            .await?;

        self.audit.record(ChangeRecord::version(
            ChangeKind::Append,
            before.as_ref(),
            &version,
            actor,
        ));
        Ok(version)
    }

    /// Restore a historical version of an entity on the same branch.
    pub async fn restore_version(
        &self,
        key: &TimelineKey,
        expected_version: u32,
        restore: Restore,
    ) -> Result<Version> {
        self.branches.require(key.branch_id).await?;
        self.guard.check_and_advance(key, expected_version).await?;

        let actor = restore.created_by.clone();
        let (version, before) = self
            .versions
            .restore(key, restore, Some(expected_version))
            .await?;

        self.audit.record(ChangeRecord::version(
            ChangeKind::Restore,
            before.as_ref(),
            &version,
            actor,
        ));
        Ok(version)
    }

    /// Fork a branch at `request.cutoff`.
    pub async fn fork(&self, request: ForkRequest) -> Result<ForkOutcome> {
        let actor = request.created_by.clone();
        let outcome = self.forks.fork(request).await?;

        self.audit.record(ChangeRecord::branch(
            ChangeKind::BranchForked,
            &outcome.branch,
            actor.as_str(),
        ));
        for copy in &outcome.copies {
            self.audit.record(ChangeRecord::version(
                ChangeKind::ForkCopy,
                None,
                copy,
                actor.as_str(),
            ));
        }
        Ok(outcome)
    }

    pub async fn current(&self, key: &TimelineKey) -> Result<Option<Version>> {
        self.versions.current(key).await
    }

    pub async fn version(&self, id: Uuid) -> Result<Version> {
        self.versions.get(id).await
    }

    pub async fn version_at(&self, key: &TimelineKey, at: WorldTime) -> Result<Option<Version>> {
        self.versions.version_at(key, at).await
    }

    pub async fn history(&self, key: &TimelineKey, page: Page) -> Result<Vec<Version>> {
        self.versions.history(key, page).await
    }

    pub async fn entities(&self, branch_id: Uuid) -> Result<Vec<EntityRef>> {
        self.versions.list_entities(branch_id).await
    }

    pub async fn diff(&self, a: Uuid, b: Uuid) -> Result<VersionDiff> {
        self.versions.diff(a, b).await
    }

    /// Decoded payload of a version.
    pub fn payload(&self, version: &Version) -> Result<Value> {
        self.versions.payload(version)
    }
}

/// Builder for [`Chronicle`] over explicit stores.
pub struct ChronicleBuilder {
    version_store: Arc<dyn VersionStore>,
    branch_store: Arc<dyn BranchStore>,
    codec: PayloadCodec,
    clock: Arc<dyn WorldClock>,
    audit: Arc<dyn AuditSink>,
    fork: ForkConfig,
}

impl ChronicleBuilder {
    pub fn codec(mut self, codec: PayloadCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn WorldClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn fork_config(mut self, config: ForkConfig) -> Self {
        self.fork = config;
        self
    }

    pub fn build(self) -> Chronicle {
        let branches = BranchRepository::new(self.branch_store);
        let versions = VersionRepository::new(self.version_store.clone(), self.codec, self.clock);
        let guard = ConcurrencyGuard::new(self.version_store);
        let forks = ForkEngine::new(branches.clone(), versions.clone(), self.fork);
        Chronicle {
            branches,
            versions,
            guard,
            forks,
            audit: self.audit,
        }
    }
}
