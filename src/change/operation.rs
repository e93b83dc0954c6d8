//! The four primitive operations and their structural inverses

use super::diff::Diff;
use super::error::ChangeError;
use super::path::{NodeId, Path, KEY_SEPARATOR};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A full, JSON-compatible snapshot of a node.
///
/// The snapshot always carries an `id`; annotations additionally carry
/// `start`/`end` coordinates of the form `{ "path": [...], "offset": n }`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NodeSnapshot(Map<String, Value>);

impl NodeSnapshot {
    /// Wrap a property map. Fails if there is no string `id`, or if the id
    /// contains the path key separator.
    pub fn new(properties: Map<String, Value>) -> Result<Self, ChangeError> {
        match properties.get("id") {
            Some(Value::String(id)) if id.contains(KEY_SEPARATOR) => {
                Err(ChangeError::MalformedOperation(format!(
                    "node id {:?} must not contain {:?}",
                    id, KEY_SEPARATOR
                )))
            }
            Some(Value::String(id)) if !id.is_empty() => Ok(Self(properties)),
            _ => Err(ChangeError::MalformedOperation(
                "node snapshot requires a non-empty string id".to_string(),
            )),
        }
    }

    /// Wrap a JSON object value
    pub fn from_value(value: Value) -> Result<Self, ChangeError> {
        match value {
            Value::Object(map) => Self::new(map),
            other => Err(ChangeError::MalformedOperation(format!(
                "node snapshot must be an object, got {}",
                other
            ))),
        }
    }

    pub fn id(&self) -> &str {
        // Guaranteed by construction
        self.0.get("id").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn node_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.0.get(property)
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.0
    }

    pub(crate) fn properties_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    /// The `path` of a boundary coordinate (`start` or `end`), if present
    pub fn boundary_path(&self, boundary: &str) -> Option<Path> {
        let segments = self.0.get(boundary)?.get("path")?.as_array()?;
        let segments: Option<Vec<String>> = segments
            .iter()
            .map(|s| match s {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect();
        segments.filter(|s| !s.is_empty()).map(Path::new)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl TryFrom<Value> for NodeSnapshot {
    type Error = ChangeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// Tag identifying an operation's kind on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Delete,
    Set,
    Update,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Delete => "delete",
            OperationKind::Set => "set",
            OperationKind::Update => "update",
        }
    }
}

impl FromStr for OperationKind {
    type Err = ChangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(OperationKind::Create),
            "delete" => Ok(OperationKind::Delete),
            "set" => Ok(OperationKind::Set),
            "update" => Ok(OperationKind::Update),
            other => Err(ChangeError::UnsupportedOperationKind(other.to_string())),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An atomic, invertible mutation of one node's existence or one property.
///
/// Operations are produced by trusted editing code, so the plain
/// constructors panic on malformed input. Use the `try_*` variants for data
/// coming from outside the process.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Introduce a node
    Create { value: NodeSnapshot },

    /// Remove a node; `value` is its full prior snapshot
    Delete { value: NodeSnapshot },

    /// Replace the value at a path
    Set { path: Path, old: Value, new: Value },

    /// Apply an incremental delta at a path
    Update { path: Path, diff: Diff },
}

impl Operation {
    /// Create a node from a JSON object with an `id`
    pub fn create(value: Value) -> Self {
        Self::try_create(value).unwrap_or_else(|e| panic!("{}", e))
    }

    pub fn try_create(value: Value) -> Result<Self, ChangeError> {
        Ok(Operation::Create {
            value: NodeSnapshot::from_value(value)?,
        })
    }

    /// Delete a node given its full prior snapshot
    pub fn delete(value: Value) -> Self {
        Self::try_delete(value).unwrap_or_else(|e| panic!("{}", e))
    }

    pub fn try_delete(value: Value) -> Result<Self, ChangeError> {
        Ok(Operation::Delete {
            value: NodeSnapshot::from_value(value)?,
        })
    }

    /// Replace `old` by `new` at `path`
    pub fn set(path: impl Into<Path>, old: Value, new: Value) -> Self {
        Self::try_set(path, old, new).unwrap_or_else(|e| panic!("{}", e))
    }

    pub fn try_set(path: impl Into<Path>, old: Value, new: Value) -> Result<Self, ChangeError> {
        let path = require_path(path.into(), OperationKind::Set)?;
        Ok(Operation::Set { path, old, new })
    }

    /// Apply `diff` at `path`
    pub fn update(path: impl Into<Path>, diff: Diff) -> Self {
        Self::try_update(path, diff).unwrap_or_else(|e| panic!("{}", e))
    }

    pub fn try_update(path: impl Into<Path>, diff: Diff) -> Result<Self, ChangeError> {
        let path = require_path(path.into(), OperationKind::Update)?;
        if !diff.is_invertible() {
            return Err(ChangeError::MalformedOperation(format!(
                "update at {} carries a diff with no inverse",
                path
            )));
        }
        Ok(Operation::Update { path, diff })
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create { .. } => OperationKind::Create,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Set { .. } => OperationKind::Set,
            Operation::Update { .. } => OperationKind::Update,
        }
    }

    /// The path this operation targets. For create/delete it is the node itself.
    pub fn path(&self) -> Path {
        match self {
            Operation::Create { value } | Operation::Delete { value } => Path::node(value.id()),
            Operation::Set { path, .. } | Operation::Update { path, .. } => path.clone(),
        }
    }

    /// Id of the node this operation touches
    pub fn node_id(&self) -> NodeId {
        match self {
            Operation::Create { value } | Operation::Delete { value } => value.id().to_string(),
            Operation::Set { path, .. } | Operation::Update { path, .. } => {
                path.node_id().unwrap_or_default().to_string()
            }
        }
    }

    /// The node snapshot carried by create/delete
    pub fn value(&self) -> Option<&NodeSnapshot> {
        match self {
            Operation::Create { value } | Operation::Delete { value } => Some(value),
            _ => None,
        }
    }

    /// The structurally inverse operation
    pub fn invert(&self) -> Operation {
        match self {
            Operation::Create { value } => Operation::Delete {
                value: value.clone(),
            },
            Operation::Delete { value } => Operation::Create {
                value: value.clone(),
            },
            Operation::Set { path, old, new } => Operation::Set {
                path: path.clone(),
                old: new.clone(),
                new: old.clone(),
            },
            Operation::Update { path, diff } => Operation::Update {
                path: path.clone(),
                diff: diff.invert(),
            },
        }
    }

    /// An operation that leaves the document unchanged
    pub fn is_noop(&self) -> bool {
        match self {
            Operation::Set { old, new, .. } => old == new,
            Operation::Update { diff, .. } => diff.is_noop(),
            _ => false,
        }
    }

    /// Convert to the flat wire record
    pub fn to_portable(&self) -> Result<Value, ChangeError> {
        super::serializer::OperationSerializer::new().serialize(self)
    }

    /// Rebuild from a wire record
    pub fn from_portable(record: &Value) -> Result<Self, ChangeError> {
        super::serializer::OperationSerializer::new().deserialize(record)
    }
}

fn require_path(path: Path, kind: OperationKind) -> Result<Path, ChangeError> {
    if path.is_empty() {
        return Err(ChangeError::MalformedOperation(format!(
            "{} requires a non-empty path",
            kind
        )));
    }
    Ok(path)
}
