//! Shallow payload diff.
//!
//! Only top-level object keys are compared. A non-object payload counts as a
//! single field named `""`, and `null` has no fields at all.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Old and new value of a modified field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Field-level difference between two payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VersionDiff {
    pub added: BTreeMap<String, Value>,
    pub modified: BTreeMap<String, FieldChange>,
    pub removed: BTreeMap<String, Value>,
}

impl VersionDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

fn fields(payload: &Value) -> Map<String, Value> {
    match payload {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert(String::new(), other.clone());
            map
        }
    }
}

/// Diff `before` against `after`.
pub fn diff_payloads(before: &Value, after: &Value) -> VersionDiff {
    let before = fields(before);
    let mut after = fields(after);
    let mut diff = VersionDiff::default();

    for (key, old) in before {
        match after.remove(&key) {
            Some(new) if new == old => {}
            Some(new) => {
                diff.modified.insert(key, FieldChange { old, new });
            }
            None => {
                diff.removed.insert(key, old);
            }
        }
    }
    diff.added.extend(after);
    diff
}
