//! Reference document graph
//!
//! An in-memory node store that applies primitive operations and exposes the
//! read interface the change extractor needs. Real editors supply their own
//! graph; this one backs the history, the CLI and the tests.

mod graph;
mod schema;

pub use graph::Document;
pub use schema::{FieldSpec, NodeCategory, NodeSchema, NodeTypeSpec};

use crate::change::{ChangeError, DiffError, NodeId};
use thiserror::Error;

/// Error types for document operations
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Node already exists: {0}")]
    NodeExists(NodeId),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node {node_id} is missing required property '{property}'")]
    MissingProperty { node_id: NodeId, property: String },

    #[error("Diff error: {0}")]
    Diff(#[from] DiffError),

    #[error("Change error: {0}")]
    Change(#[from] ChangeError),
}
