//! Selection snapshots recorded before and after a change

use super::error::ChangeError;
use super::path::{NodeId, Path};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which a snapshot stores its selection on the wire
pub const SELECTION_FIELD: &str = "selection";

/// A cursor or range inside the document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Selection {
    /// A range inside a single text property
    Property {
        path: Path,
        start_offset: usize,
        end_offset: usize,
        #[serde(default)]
        reversed: bool,
    },

    /// A range spanning several nodes of a container
    Container {
        container_path: Path,
        start_path: Path,
        start_offset: usize,
        end_path: Path,
        end_offset: usize,
        #[serde(default)]
        reversed: bool,
    },

    /// A whole node selected
    Node {
        node_id: NodeId,
        #[serde(default)]
        container_path: Option<Path>,
    },
}

impl Selection {
    /// A collapsed cursor inside a text property
    pub fn cursor(path: impl Into<Path>, offset: usize) -> Self {
        Selection::Property {
            path: path.into(),
            start_offset: offset,
            end_offset: offset,
            reversed: false,
        }
    }

    pub fn range(path: impl Into<Path>, start_offset: usize, end_offset: usize) -> Self {
        Selection::Property {
            path: path.into(),
            start_offset,
            end_offset,
            reversed: false,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        match self {
            Selection::Property {
                start_offset,
                end_offset,
                ..
            } => start_offset == end_offset,
            Selection::Container {
                start_path,
                start_offset,
                end_path,
                end_offset,
                ..
            } => start_path == end_path && start_offset == end_offset,
            Selection::Node { .. } => false,
        }
    }

    pub fn to_portable(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_portable(record: &Value) -> Result<Self, ChangeError> {
        let selection: Selection = serde_json::from_value(record.clone())
            .map_err(|e| ChangeError::InvalidSelection(e.to_string()))?;
        selection.validate()?;
        Ok(selection)
    }

    fn validate(&self) -> Result<(), ChangeError> {
        match self {
            Selection::Property {
                path,
                start_offset,
                end_offset,
                ..
            } => {
                if path.is_empty() {
                    return Err(ChangeError::InvalidSelection(
                        "property selection without path".to_string(),
                    ));
                }
                if start_offset > end_offset {
                    return Err(ChangeError::InvalidSelection(format!(
                        "start offset {} after end offset {}",
                        start_offset, end_offset
                    )));
                }
            }
            Selection::Container {
                container_path,
                start_path,
                end_path,
                ..
            } => {
                if container_path.is_empty() || start_path.is_empty() || end_path.is_empty() {
                    return Err(ChangeError::InvalidSelection(
                        "container selection with empty path".to_string(),
                    ));
                }
            }
            Selection::Node { node_id, .. } => {
                if node_id.is_empty() {
                    return Err(ChangeError::InvalidSelection(
                        "node selection without id".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Application state captured before or after a change.
///
/// `fields` holds any caller-defined state; the selection lives in its own
/// typed slot and is written to the wire under [`SELECTION_FIELD`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub selection: Option<Selection>,
    pub fields: Map<String, Value>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_none() && self.fields.is_empty()
    }

    pub fn to_portable(&self) -> Value {
        let mut record = self.fields.clone();
        // A raw entry under the selection key must never reach the wire
        record.remove(SELECTION_FIELD);
        if let Some(selection) = &self.selection {
            record.insert(SELECTION_FIELD.to_string(), selection.to_portable());
        }
        Value::Object(record)
    }

    pub fn from_portable(record: &Value) -> Result<Self, ChangeError> {
        let mut fields = match record {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map.clone(),
            other => {
                return Err(ChangeError::InvalidSelection(format!(
                    "snapshot must be an object, got {}",
                    other
                )))
            }
        };
        let selection = match fields.remove(SELECTION_FIELD) {
            None | Some(Value::Null) => None,
            Some(record) => Some(Selection::from_portable(&record)?),
        };
        Ok(Self { selection, fields })
    }
}
