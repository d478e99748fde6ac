//! Version repository.
//!
//! Wraps a [`VersionStore`] with the payload codec and the world clock to
//! provide entity-level history operations: append, point-in-time lookup,
//! history, diff and restore.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::clock::WorldClock;
use crate::codec::PayloadCodec;
use crate::diff::{diff_payloads, VersionDiff};
use crate::error::{Error, Result};
use crate::model::{Change, EntityRef, NewVersion, Page, Restore, TimelineKey, Version, WorldTime};
use crate::storage::VersionStore;

/// Repository for version timelines.
#[derive(Clone)]
pub struct VersionRepository {
    store: Arc<dyn VersionStore>,
    codec: PayloadCodec,
    clock: Arc<dyn WorldClock>,
}

impl VersionRepository {
    pub fn new(store: Arc<dyn VersionStore>, codec: PayloadCodec, clock: Arc<dyn WorldClock>) -> Self {
        Self {
            store,
            codec,
            clock,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn VersionStore> {
        &self.store
    }

    pub fn codec(&self) -> &PayloadCodec {
        &self.codec
    }

    /// Compress `change` and append it as the new open version of `key`.
    ///
    /// With `expected_version` set the store rejects the append unless the
    /// timeline is still at that logical version.
    pub async fn append(
        &self,
        key: &TimelineKey,
        change: Change,
        expected_version: Option<u32>,
    ) -> Result<Version> {
        let bytes = self.codec.compress(&change.payload)?;
        let mut new = NewVersion::new(bytes, change.valid_from, change.created_by)
            .with_comment(change.comment);
        new.expected_version = expected_version;
        Ok(self.store.append(key, new).await?)
    }

    /// Append an already-compressed copy of `source` onto `key`, recording
    /// where it came from.
    pub async fn copy_from(
        &self,
        key: &TimelineKey,
        source: &Version,
        valid_from: WorldTime,
        created_by: &str,
    ) -> Result<Version> {
        // Decoding first keeps corrupt rows from propagating into the new branch.
        let payload = self.codec.decompress(&source.payload)?;
        let bytes = self.codec.compress(&payload)?;
        let new = NewVersion::new(bytes, valid_from, created_by)
            .with_comment(source.comment.clone())
            .diverged_from(source.id);
        Ok(self.store.append(key, new).await?)
    }

    /// The open version of `key`, if any.
    pub async fn current(&self, key: &TimelineKey) -> Result<Option<Version>> {
        Ok(self.store.current(key).await?)
    }

    /// Fetch a version by id.
    pub async fn get(&self, id: Uuid) -> Result<Version> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Error::version_not_found(id))
    }

    /// The version of `key` valid at world time `at`.
    pub async fn version_at(&self, key: &TimelineKey, at: WorldTime) -> Result<Option<Version>> {
        Ok(self.store.version_at(key, at).await?)
    }

    /// Versions of `key`, newest first.
    pub async fn history(&self, key: &TimelineKey, page: Page) -> Result<Vec<Version>> {
        Ok(self.store.history(key, page).await?)
    }

    /// Every version of `key` in world-time order.
    pub async fn timeline(&self, key: &TimelineKey) -> Result<Vec<Version>> {
        Ok(self.store.timeline(key).await?)
    }

    /// Entities with any history on `branch_id`.
    pub async fn list_entities(&self, branch_id: Uuid) -> Result<Vec<EntityRef>> {
        Ok(self.store.list_entities(branch_id).await?)
    }

    /// Decode a version's payload.
    pub fn payload(&self, version: &Version) -> Result<Value> {
        Ok(self.codec.decompress(&version.payload)?)
    }

    /// Shallow diff from version `a` to version `b`.
    pub async fn diff(&self, a: Uuid, b: Uuid) -> Result<VersionDiff> {
        let before = self.get(a).await?;
        let after = if a == b { before.clone() } else { self.get(b).await? };
        Ok(diff_payloads(&self.payload(&before)?, &self.payload(&after)?))
    }

    /// Re-append the payload of a historical version of `key`.
    ///
    /// Returns the new version together with the version it superseded.
    pub async fn restore(
        &self,
        key: &TimelineKey,
        restore: Restore,
        expected_version: Option<u32>,
    ) -> Result<(Version, Option<Version>)> {
        let source = self.get(restore.version_id).await?;
        if source.timeline() != *key {
            return Err(Error::CrossBranchRestore {
                version_id: source.id,
                timeline: key.clone(),
            });
        }

        let target = restore
            .target
            .unwrap_or_else(|| self.clock.now(key.branch_id));
        let before = self.store.current(key).await?;

        let payload = self.payload(&source)?;
        let comment = restore
            .comment
            .unwrap_or_else(|| format!("Restored from version {}", source.version));
        let change = Change::new(payload, target, restore.created_by).with_comment(comment);

        let restored = self.append(key, change, expected_version).await?;
        debug!(
            timeline = %key,
            from_version = source.version,
            version = restored.version,
            valid_from = %target,
            "restored version"
        );
        Ok((restored, before))
    }
}
