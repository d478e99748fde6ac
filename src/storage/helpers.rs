//! Shared storage helper functions.
//!
//! Timeline rules common to every backend: append validation, version
//! numbering, interval lookup and timestamp encoding.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::model::{NewVersion, TimelineKey, Version, WorldTime};

use super::{Result, StorageError};

/// Logical version of a timeline: the number of its open row, or 0 when the
/// entity has no history on the branch.
pub fn logical_version(open: Option<&Version>) -> u32 {
    open.map(|v| v.version).unwrap_or(0)
}

/// Validate an append against the timeline's open version.
///
/// Returns the version number the new row receives (`max_version + 1`).
pub fn check_append(
    key: &TimelineKey,
    open: Option<&Version>,
    max_version: u32,
    new: &NewVersion,
) -> Result<u32> {
    if let Some(expected) = new.expected_version {
        let actual = logical_version(open);
        if expected != actual {
            return Err(StorageError::VersionConflict { expected, actual });
        }
    }
    if let Some(open) = open {
        if new.valid_from <= open.valid_from {
            return Err(StorageError::OverlapViolation {
                key: key.clone(),
                valid_from: new.valid_from,
                open_from: open.valid_from,
            });
        }
    }
    Ok(max_version + 1)
}

/// Find the version containing `at` in a slice ordered by `valid_from`.
pub fn locate(versions: &[Version], at: WorldTime) -> Option<&Version> {
    let idx = versions.partition_point(|v| v.valid_from <= at);
    if idx == 0 {
        return None;
    }
    let candidate = &versions[idx - 1];
    candidate.contains(at).then_some(candidate)
}

/// Whether versions ordered by `valid_from` form a gapless chain ending in
/// exactly one open version.
pub fn is_contiguous(versions: &[Version]) -> bool {
    let Some(last) = versions.last() else {
        return true;
    };
    if !last.is_open() {
        return false;
    }
    versions
        .windows(2)
        .all(|pair| pair[0].valid_to == Some(pair[1].valid_from) && pair[0].valid_from < pair[1].valid_from)
}

/// Current wall-clock time at the precision every backend can store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Encode a wall-clock timestamp for storage.
///
/// Fixed-width microsecond RFC 3339, so stored strings sort chronologically.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored wall-clock timestamp.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidTimestampFormat(format!("{raw}: {e}")))
}
