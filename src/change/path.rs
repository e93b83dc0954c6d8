//! Addressable paths into the document graph and their canonical keys

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a node in the document graph
pub type NodeId = String;

/// Separator used in canonical path keys
pub const KEY_SEPARATOR: char = '.';

/// A location in the document graph: a node id followed by property segments.
///
/// Sub-indices into arrays are stored as their decimal string form, so
/// `["body", "nodes", "2"]` addresses the third entry of `body.nodes`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<String>);

impl Path {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// A path addressing the node itself
    pub fn node(id: impl Into<NodeId>) -> Self {
        Self(vec![id.into()])
    }

    /// A path addressing a property of a node
    pub fn property(id: impl Into<NodeId>, property: impl Into<String>) -> Self {
        Self(vec![id.into(), property.into()])
    }

    /// Extend the path by one property segment
    pub fn with(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Extend the path by an array index
    pub fn with_index(mut self, index: usize) -> Self {
        self.0.push(index.to_string());
        self
    }

    /// The owning node's id (first segment)
    pub fn node_id(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Canonical string form used as map key
    pub fn key(&self) -> PathKey {
        PathKey(self.0.join(&KEY_SEPARATOR.to_string()))
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for Path {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(segments: [&str; N]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Canonical encoding of a [`Path`]. Two paths are equal iff their keys are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathKey(String);

impl PathKey {
    /// Wrap an already-canonical key string
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Leading node id of the key
    pub fn node_id(&self) -> &str {
        self.0.split(KEY_SEPARATOR).next().unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Path> for PathKey {
    fn from(path: &Path) -> Self {
        path.key()
    }
}

impl From<Path> for PathKey {
    fn from(path: Path) -> Self {
        path.key()
    }
}

impl From<&PathKey> for PathKey {
    fn from(key: &PathKey) -> Self {
        key.clone()
    }
}

impl From<&str> for PathKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for PathKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}
