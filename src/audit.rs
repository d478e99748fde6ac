//! Audit collaborator.
//!
//! The engine hands a [`ChangeRecord`] to an [`AuditSink`] after every
//! committed mutation. Recording is fire-and-forget: sinks must not block and
//! their failures never reach the caller of the mutation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::model::{Branch, Version};

/// Kind of change being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Append,
    Restore,
    ForkCopy,
    BranchCreated,
    BranchForked,
    BranchDeleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::Append => "append",
            ChangeKind::Restore => "restore",
            ChangeKind::ForkCopy => "fork_copy",
            ChangeKind::BranchCreated => "branch_created",
            ChangeKind::BranchForked => "branch_forked",
            ChangeKind::BranchDeleted => "branch_deleted",
        };
        f.write_str(name)
    }
}

/// One audited change. Entity fields are empty for branch-level changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub branch_id: Uuid,
    pub kind: ChangeKind,
    pub before_version_id: Option<Uuid>,
    pub after_version_id: Option<Uuid>,
    pub actor: String,
    pub at: DateTime<Utc>,
}

impl ChangeRecord {
    /// Record for a version write. `before` is the version it superseded.
    pub fn version(
        kind: ChangeKind,
        before: Option<&Version>,
        after: &Version,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: Some(after.entity_type.clone()),
            entity_id: Some(after.entity_id.clone()),
            branch_id: after.branch_id,
            kind,
            before_version_id: before.map(|v| v.id),
            after_version_id: Some(after.id),
            actor: actor.into(),
            at: Utc::now(),
        }
    }

    /// Record for a branch-level change.
    pub fn branch(kind: ChangeKind, branch: &Branch, actor: impl Into<String>) -> Self {
        Self {
            entity_type: None,
            entity_id: None,
            branch_id: branch.id,
            kind,
            before_version_id: None,
            after_version_id: None,
            actor: actor.into(),
            at: Utc::now(),
        }
    }
}

/// Receives audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: ChangeRecord);
}

/// Emits each record as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: ChangeRecord) {
        info!(
            kind = %record.kind,
            branch_id = %record.branch_id,
            entity_type = record.entity_type.as_deref(),
            entity_id = record.entity_id.as_deref(),
            before = ?record.before_version_id,
            after = ?record.after_version_id,
            actor = %record.actor,
            "audit"
        );
    }
}

/// Forwards records to an unbounded channel, typically drained by a
/// persister task.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    sender: mpsc::UnboundedSender<ChangeRecord>,
}

impl ChannelAuditSink {
    /// Create a sink and the receiver its records arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChangeRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, record: ChangeRecord) {
        if let Err(e) = self.sender.send(record) {
            warn!(kind = %e.0.kind, branch_id = %e.0.branch_id, "audit receiver dropped, record lost");
        }
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _record: ChangeRecord) {}
}
