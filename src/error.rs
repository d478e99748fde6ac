//! Engine error taxonomy.
//!
//! Storage backends report [`StorageError`]; the repositories and engine
//! flatten it into [`Error`] so callers match on one enum.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::codec::CodecError;
use crate::model::{TimelineKey, WorldTime};
use crate::storage::StorageError;

/// What a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Branch,
    Version,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundKind::Branch => f.write_str("Branch"),
            NotFoundKind::Version => f.write_str("Version"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} not found: {id}")]
    NotFound { kind: NotFoundKind, id: Uuid },

    #[error("Branch {branch_id} has {children} live child branch(es)")]
    HasChildren { branch_id: Uuid, children: usize },

    #[error("Overlap violation on {key}: valid_from {valid_from} does not follow open version starting at {open_from}")]
    OverlapViolation {
        key: TimelineKey,
        valid_from: WorldTime,
        open_from: WorldTime,
    },

    /// Optimistic-lock failure. The caller should re-read and retry.
    #[error("Version conflict: expected {expected}, entity at {actual}")]
    Conflict { expected: u32, actual: u32 },

    #[error("Corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("Payload encode failed: {0}")]
    PayloadEncode(String),

    #[error("Fork source branch not found or deleted: {0}")]
    SourceNotFound(Uuid),

    /// A concurrent writer won the race for the same timeline slot.
    #[error("Write conflict on {0}")]
    WriteConflict(TimelineKey),

    #[error("Invalid branch: {0}")]
    InvalidBranch(String),

    #[error("Version {version_id} does not belong to timeline {timeline}")]
    CrossBranchRestore {
        version_id: Uuid,
        timeline: TimelineKey,
    },

    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

impl Error {
    pub fn branch_not_found(id: Uuid) -> Self {
        Error::NotFound {
            kind: NotFoundKind::Branch,
            id,
        }
    }

    pub fn version_not_found(id: Uuid) -> Self {
        Error::NotFound {
            kind: NotFoundKind::Version,
            id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Whether a caller may re-read state and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict { .. } | Error::WriteConflict(_))
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::BranchNotFound(id) => Error::branch_not_found(id),
            StorageError::VersionNotFound(id) => Error::version_not_found(id),
            StorageError::HasChildren {
                branch_id,
                children,
            } => Error::HasChildren {
                branch_id,
                children,
            },
            StorageError::OverlapViolation {
                key,
                valid_from,
                open_from,
            } => Error::OverlapViolation {
                key,
                valid_from,
                open_from,
            },
            StorageError::VersionConflict { expected, actual } => {
                Error::Conflict { expected, actual }
            }
            StorageError::WriteConflict(key) => Error::WriteConflict(key),
            other => Error::Storage(other),
        }
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Corrupt(msg) => Error::CorruptPayload(msg),
            CodecError::Encode(msg) => Error::PayloadEncode(msg),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
