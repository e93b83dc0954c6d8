//! The Document type: node storage plus operation application

use super::schema::NodeSchema;
use super::DocumentError;
use crate::change::{
    Change, DocumentView, NodeId, NodeInfo, NodeSnapshot, Operation, Path,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// An in-memory graph of nodes keyed by id
#[derive(Clone, Debug)]
pub struct Document {
    schema: NodeSchema,
    nodes: BTreeMap<NodeId, NodeSnapshot>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(NodeSchema::standard())
    }
}

impl PartialEq for Document {
    /// Documents are equal when they hold the same nodes
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl Document {
    /// Create an empty document
    pub fn new(schema: NodeSchema) -> Self {
        Self {
            schema,
            nodes: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &NodeSchema {
        &self.schema
    }

    pub fn get(&self, id: &str) -> Option<&NodeSnapshot> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeSnapshot> {
        self.nodes.values()
    }

    /// Value stored at a path; the bare node path yields nothing
    pub fn get_path(&self, path: &Path) -> Option<&Value> {
        let (id, rest) = path.segments().split_first()?;
        let (property, rest) = rest.split_first()?;
        let mut value = self.nodes.get(id)?.get(property)?;
        for segment in rest {
            value = match value {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(value)
    }

    /// Insert a node directly, bypassing change tracking
    pub fn create(&mut self, value: Value) -> Result<&NodeSnapshot, DocumentError> {
        let node = NodeSnapshot::from_value(value)?;
        let id = node.id().to_string();
        self.insert(node)?;
        self.nodes
            .get(&id)
            .ok_or(DocumentError::NodeNotFound(id))
    }

    /// Apply one primitive operation
    pub fn apply(&mut self, op: &Operation) -> Result<(), DocumentError> {
        match op {
            Operation::Create { value } => self.insert(value.clone()),
            Operation::Delete { value } => {
                let removed = self
                    .nodes
                    .remove(value.id())
                    .ok_or_else(|| DocumentError::NodeNotFound(value.id().to_string()))?;
                if &removed != value {
                    log::warn!("deleted node {} differs from its recorded snapshot", value.id());
                }
                Ok(())
            }
            Operation::Set { path, new, .. } => self.set(path, new.clone()),
            Operation::Update { path, diff } => {
                let target = self.resolve_mut(path)?;
                diff.apply(target)?;
                Ok(())
            }
        }
    }

    /// Apply every operation of a change, then extract its affected sets.
    ///
    /// Atomic: if an operation fails, the operations already applied are
    /// undone in reverse order and the error is returned.
    pub fn apply_change(&mut self, change: &Change) -> Result<(), DocumentError> {
        for (index, op) in change.ops().iter().enumerate() {
            if let Err(err) = self.apply(op) {
                log::warn!(
                    "{} failed at op {} ({}): {}; rolling back",
                    change,
                    index,
                    op.kind(),
                    err
                );
                for done in change.ops()[..index].iter().rev() {
                    if let Err(undo_err) = self.apply(&done.invert()) {
                        log::warn!("rollback of {} on {} failed: {}", done.kind(), done.path(), undo_err);
                    }
                }
                return Err(err);
            }
        }
        change.extract(&*self)?;
        Ok(())
    }

    fn insert(&mut self, node: NodeSnapshot) -> Result<(), DocumentError> {
        if self.nodes.contains_key(node.id()) {
            return Err(DocumentError::NodeExists(node.id().to_string()));
        }
        self.schema.check(&node)?;
        self.nodes.insert(node.id().to_string(), node);
        Ok(())
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Map<String, Value>, DocumentError> {
        self.nodes
            .get_mut(id)
            .map(NodeSnapshot::properties_mut)
            .ok_or_else(|| DocumentError::NodeNotFound(id.to_string()))
    }

    fn resolve_mut(&mut self, path: &Path) -> Result<&mut Value, DocumentError> {
        let invalid = || DocumentError::InvalidPath(path.to_string());
        let (id, rest) = path.segments().split_first().ok_or_else(invalid)?;
        let (property, rest) = rest.split_first().ok_or_else(invalid)?;
        // The id is the node's key in the graph
        if property == "id" {
            return Err(invalid());
        }
        let mut value = self.node_mut(id)?.get_mut(property).ok_or_else(invalid)?;
        for segment in rest {
            value = descend_mut(value, segment).ok_or_else(invalid)?;
        }
        Ok(value)
    }

    /// Write `new` at `path`; a null removes an object property
    fn set(&mut self, path: &Path, new: Value) -> Result<(), DocumentError> {
        let invalid = || DocumentError::InvalidPath(path.to_string());
        let segments = path.segments();
        if segments.len() < 2 || segments[1] == "id" {
            return Err(invalid());
        }
        let (leaf, parent_segments) = segments.split_last().ok_or_else(invalid)?;

        if parent_segments.len() == 1 {
            let node = self.node_mut(&parent_segments[0])?;
            if new.is_null() {
                node.remove(leaf);
            } else {
                node.insert(leaf.clone(), new);
            }
            return Ok(());
        }

        let parent = self.resolve_mut(&Path::new(parent_segments.to_vec()))?;
        match parent {
            Value::Object(map) => {
                if new.is_null() {
                    map.remove(leaf);
                } else {
                    map.insert(leaf.clone(), new);
                }
            }
            Value::Array(items) => {
                let slot = leaf
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(invalid)?;
                *slot = new;
            }
            _ => return Err(invalid()),
        }
        Ok(())
    }
}

fn descend_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

impl DocumentView for Document {
    fn lookup(&self, id: &str) -> Option<NodeInfo> {
        self.nodes.get(id).map(|node| self.schema.classify(node))
    }

    fn container_position(&self, container_path: &Path, node_id: &str) -> Option<usize> {
        self.get_path(container_path)?
            .as_array()?
            .iter()
            .position(|child| child.as_str() == Some(node_id))
    }

    fn container_children(&self, container_path: &Path) -> Option<Vec<NodeId>> {
        self.get_path(container_path)?
            .as_array()?
            .iter()
            .map(|child| child.as_str().map(str::to_string))
            .collect()
    }
}
