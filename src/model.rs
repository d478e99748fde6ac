//! Core types shared by the storage backends, repositories and engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A point on the in-world clock.
///
/// World-time is independent of wall-clock time. Units are defined by the
/// caller (days, turns, ticks); the engine only relies on ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldTime(pub i64);

impl WorldTime {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for WorldTime {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for WorldTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A named timeline of entity states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: Uuid,
    pub campaign_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Assigned once at creation, never re-parented.
    pub parent_id: Option<Uuid>,
    /// World-time at which this branch split from its parent.
    pub diverged_at: Option<WorldTime>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Branch {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Parameters for creating a branch.
#[derive(Debug, Clone, Default)]
pub struct NewBranch {
    pub campaign_id: String,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub diverged_at: Option<WorldTime>,
}

impl NewBranch {
    /// A root branch with no parent.
    pub fn root(campaign_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// A child branch diverging from `parent_id` at `diverged_at`.
    pub fn child(
        campaign_id: impl Into<String>,
        name: impl Into<String>,
        parent_id: Uuid,
        diverged_at: WorldTime,
    ) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            name: name.into(),
            description: None,
            parent_id: Some(parent_id),
            diverged_at: Some(diverged_at),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A branch with its live descendants nested beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchNode {
    pub branch: Branch,
    pub children: Vec<BranchNode>,
}

impl BranchNode {
    /// Total number of branches in this subtree, including the node itself.
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(BranchNode::subtree_size).sum::<usize>()
    }
}

/// Identifies an entity independent of branch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }

    pub fn on(&self, branch_id: Uuid) -> TimelineKey {
        TimelineKey {
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
            branch_id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}

/// Scope of one version timeline: `(entity_type, entity_id, branch_id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimelineKey {
    pub entity_type: String,
    pub entity_id: String,
    pub branch_id: Uuid,
}

impl TimelineKey {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>, branch_id: Uuid) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            branch_id,
        }
    }

    pub fn entity(&self) -> EntityRef {
        EntityRef::new(self.entity_type.clone(), self.entity_id.clone())
    }
}

impl fmt::Display for TimelineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.entity_type, self.entity_id, self.branch_id)
    }
}

/// One bitemporal snapshot of an entity on a branch.
///
/// Valid over `[valid_from, valid_to)` in world-time; `valid_to = None`
/// marks the open (live) version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: String,
    pub branch_id: Uuid,
    pub version: u32,
    pub valid_from: WorldTime,
    pub valid_to: Option<WorldTime>,
    /// Compressed serialized snapshot.
    pub payload: Vec<u8>,
    pub comment: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// Source version this row was copied from when its branch was forked.
    pub diverged_from_version_id: Option<Uuid>,
}

impl Version {
    pub fn is_open(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Whether `at` falls inside `[valid_from, valid_to)`.
    pub fn contains(&self, at: WorldTime) -> bool {
        at >= self.valid_from && self.valid_to.map_or(true, |to| at < to)
    }

    pub fn timeline(&self) -> TimelineKey {
        TimelineKey::new(self.entity_type.clone(), self.entity_id.clone(), self.branch_id)
    }

    pub fn entity(&self) -> EntityRef {
        EntityRef::new(self.entity_type.clone(), self.entity_id.clone())
    }
}

/// A version to append to a timeline.
///
/// The store assigns `id`, `version` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub payload: Vec<u8>,
    pub valid_from: WorldTime,
    pub created_by: String,
    pub comment: Option<String>,
    pub diverged_from_version_id: Option<Uuid>,
    /// Logical version the caller read; re-checked inside the store transaction.
    pub expected_version: Option<u32>,
}

impl NewVersion {
    pub fn new(payload: Vec<u8>, valid_from: WorldTime, created_by: impl Into<String>) -> Self {
        Self {
            payload,
            valid_from,
            created_by: created_by.into(),
            comment: None,
            diverged_from_version_id: None,
            expected_version: None,
        }
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn diverged_from(mut self, version_id: Uuid) -> Self {
        self.diverged_from_version_id = Some(version_id);
        self
    }

    pub fn expecting(mut self, expected_version: u32) -> Self {
        self.expected_version = Some(expected_version);
        self
    }
}

/// A change to an entity as the caller describes it: an uncompressed payload
/// taking effect at `valid_from`.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub payload: Value,
    pub valid_from: WorldTime,
    pub created_by: String,
    pub comment: Option<String>,
}

impl Change {
    pub fn new(payload: Value, valid_from: WorldTime, created_by: impl Into<String>) -> Self {
        Self {
            payload,
            valid_from,
            created_by: created_by.into(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Re-append a historical version's payload as the new current version.
#[derive(Debug, Clone, PartialEq)]
pub struct Restore {
    pub version_id: Uuid,
    /// World time the restored payload takes effect. `None` asks the world
    /// clock for the branch's "now".
    pub target: Option<WorldTime>,
    pub created_by: String,
    pub comment: Option<String>,
}

impl Restore {
    pub fn new(version_id: Uuid, created_by: impl Into<String>) -> Self {
        Self {
            version_id,
            target: None,
            created_by: created_by.into(),
            comment: None,
        }
    }

    pub fn at(mut self, target: WorldTime) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Pagination for history queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    /// Apply this page to an already-ordered sequence.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}
