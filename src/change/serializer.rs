//! Flat wire records for operations
//!
//! Records are JSON objects tagged by `type`:
//!
//! ```text
//! { "type": "create", "path": ["p1"], "value": { "id": "p1", ... } }
//! { "type": "delete", "path": ["p1"], "value": { "id": "p1", ... } }
//! { "type": "set",    "path": ["p1", "content"], "old": ..., "new": ... }
//! { "type": "update", "path": ["p1", "content"], "diff": { "type": "insert-text", ... } }
//! ```

use super::diff::Diff;
use super::error::ChangeError;
use super::operation::{NodeSnapshot, Operation, OperationKind};
use super::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OperationRecord {
    Create {
        #[serde(default)]
        path: Path,
        value: Map<String, Value>,
    },
    Delete {
        #[serde(default)]
        path: Path,
        value: Map<String, Value>,
    },
    Set {
        path: Path,
        #[serde(default)]
        old: Value,
        #[serde(default)]
        new: Value,
    },
    Update {
        path: Path,
        diff: Diff,
    },
}

/// Converts operations to and from their wire records
#[derive(Clone, Copy, Debug, Default)]
pub struct OperationSerializer;

impl OperationSerializer {
    pub fn new() -> Self {
        Self
    }

    pub fn serialize(&self, op: &Operation) -> Result<Value, ChangeError> {
        let record = match op {
            Operation::Create { value } => OperationRecord::Create {
                path: op.path(),
                value: value.properties().clone(),
            },
            Operation::Delete { value } => OperationRecord::Delete {
                path: op.path(),
                value: value.properties().clone(),
            },
            Operation::Set { path, old, new } => OperationRecord::Set {
                path: path.clone(),
                old: old.clone(),
                new: new.clone(),
            },
            Operation::Update { path, diff } => OperationRecord::Update {
                path: path.clone(),
                diff: diff.clone(),
            },
        };
        Ok(serde_json::to_value(record)?)
    }

    /// Rebuild an operation. Unknown kinds are rejected rather than skipped.
    pub fn deserialize(&self, record: &Value) -> Result<Operation, ChangeError> {
        let kind = record
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ChangeError::MalformedOperation("operation record has no type".to_string())
            })?;
        let kind: OperationKind = kind.parse()?;

        let parsed: OperationRecord = serde_json::from_value(record.clone())
            .map_err(|e| ChangeError::MalformedOperation(format!("{} record: {}", kind, e)))?;

        match parsed {
            OperationRecord::Create { path, value } => {
                let value = node_value(path, value, kind)?;
                Ok(Operation::Create { value })
            }
            OperationRecord::Delete { path, value } => {
                let value = node_value(path, value, kind)?;
                Ok(Operation::Delete { value })
            }
            OperationRecord::Set { path, old, new } => Operation::try_set(path, old, new),
            OperationRecord::Update { path, diff } => Operation::try_update(path, diff),
        }
    }

    pub fn serialize_all<'a>(
        &self,
        ops: impl IntoIterator<Item = &'a Operation>,
    ) -> Result<Vec<Value>, ChangeError> {
        ops.into_iter().map(|op| self.serialize(op)).collect()
    }

    /// Rebuild a list of operations. One bad record rejects the whole list.
    pub fn deserialize_all(&self, records: &[Value]) -> Result<Vec<Operation>, ChangeError> {
        records.iter().map(|r| self.deserialize(r)).collect()
    }
}

fn node_value(
    path: Path,
    value: Map<String, Value>,
    kind: OperationKind,
) -> Result<NodeSnapshot, ChangeError> {
    let value = NodeSnapshot::new(value)?;
    if !path.is_empty() && path != Path::node(value.id()) {
        return Err(ChangeError::MalformedOperation(format!(
            "{} path {} does not match node id {}",
            kind,
            path,
            value.id()
        )));
    }
    Ok(value)
}
