//! Affected-entity extraction
//!
//! Derives, from a batch of already-applied operations, which nodes were
//! created, which were deleted and which paths became dirty. Edits to
//! annotations are projected onto the text they cover: a property annotation
//! dirties its text property, a container annotation dirties every node of
//! its container between its start and end node.

use super::operation::{NodeSnapshot, Operation};
use super::path::{NodeId, Path, PathKey};
use std::collections::{BTreeMap, BTreeSet};

/// Capability of a node that marks a range of content
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnnotationKind {
    /// Range inside a single text property
    Property { start: Path },

    /// Range across the nodes of a container, from `start[0]` to `end[0]`
    Container {
        container_path: Path,
        start: Path,
        end: Path,
    },
}

/// What the extractor needs to know about a live node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    /// Path of the node's text property, for textual nodes
    pub text_path: Option<Path>,
    pub annotation: Option<AnnotationKind>,
}

impl NodeInfo {
    /// A node that is neither text nor annotation
    pub fn block(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            text_path: None,
            annotation: None,
        }
    }

    /// A textual node whose text lives in `property`
    pub fn text(id: impl Into<NodeId>, property: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            text_path: Some(Path::property(id.clone(), property)),
            id,
            annotation: None,
        }
    }

    pub fn annotation(id: impl Into<NodeId>, kind: AnnotationKind) -> Self {
        Self {
            id: id.into(),
            text_path: None,
            annotation: Some(kind),
        }
    }

    pub fn is_text(&self) -> bool {
        self.text_path.is_some()
    }

    pub fn is_property_annotation(&self) -> bool {
        matches!(self.annotation, Some(AnnotationKind::Property { .. }))
    }

    pub fn is_container_annotation(&self) -> bool {
        matches!(self.annotation, Some(AnnotationKind::Container { .. }))
    }
}

/// Read-only access to the document graph, as seen after a change was applied
pub trait DocumentView {
    /// Look up a live node
    fn lookup(&self, id: &str) -> Option<NodeInfo>;

    /// Index of `node_id` inside the container at `container_path`
    fn container_position(&self, container_path: &Path, node_id: &str) -> Option<usize>;

    /// Ordered child ids of the container at `container_path`
    fn container_children(&self, container_path: &Path) -> Option<Vec<NodeId>>;
}

/// Nodes and paths affected by a change
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Affected {
    pub created: BTreeMap<NodeId, NodeSnapshot>,
    pub deleted: BTreeMap<NodeId, NodeSnapshot>,
    pub updated: BTreeSet<PathKey>,
}

impl Affected {
    /// Whether a path (or canonical key) was marked dirty
    pub fn has_updated(&self, path: impl Into<PathKey>) -> bool {
        self.updated.contains(&path.into())
    }

    pub fn has_deleted(&self, id: &str) -> bool {
        self.deleted.contains_key(id)
    }

    pub fn has_created(&self, id: &str) -> bool {
        self.created.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }
}

/// Run extraction over `ops`. Total: dangling references are never fatal.
pub fn extract(ops: &[Operation], view: &dyn DocumentView) -> Affected {
    let mut affected = Affected::default();
    let mut container_annotations: Vec<(NodeId, AnnotationKind)> = Vec::new();

    for op in ops {
        log::trace!("extracting {} on {}", op.kind(), op.path());
        match op {
            Operation::Create { value } => {
                affected.deleted.remove(value.id());
                affected.created.insert(value.id().to_string(), value.clone());
                mark_boundaries(&mut affected, value);
            }
            Operation::Delete { value } => {
                affected.created.remove(value.id());
                affected.deleted.insert(value.id().to_string(), value.clone());
                mark_boundaries(&mut affected, value);
            }
            Operation::Set { path, .. } | Operation::Update { path, .. } => {
                affected.updated.insert(path.key());
                if let Some(id) = path.node_id() {
                    // Coarse node-level dirtiness alongside the exact path
                    affected.updated.insert(PathKey::from(id));

                    match view.lookup(id).and_then(|node| node.annotation) {
                        Some(AnnotationKind::Property { start }) => {
                            affected.updated.insert(start.key());
                        }
                        Some(kind @ AnnotationKind::Container { .. }) => {
                            container_annotations.push((id.to_string(), kind));
                        }
                        None => {}
                    }
                }
            }
        }
    }

    for (id, kind) in &container_annotations {
        mark_container_span(&mut affected, view, id, kind);
    }

    if !affected.deleted.is_empty() {
        let deleted = &affected.deleted;
        affected
            .updated
            .retain(|key| !deleted.contains_key(key.node_id()));
    }

    log::debug!(
        "extracted {} created, {} deleted, {} updated",
        affected.created.len(),
        affected.deleted.len(),
        affected.updated.len()
    );
    affected
}

/// A created or removed annotation dirties the text it bounds
fn mark_boundaries(affected: &mut Affected, value: &NodeSnapshot) {
    if let Some(start) = value.boundary_path("start") {
        affected.updated.insert(start.key());
    }
    if let Some(end) = value.boundary_path("end") {
        affected.updated.insert(end.key());
    }
}

fn mark_container_span(
    affected: &mut Affected,
    view: &dyn DocumentView,
    annotation_id: &str,
    kind: &AnnotationKind,
) {
    let AnnotationKind::Container {
        container_path,
        start,
        end,
    } = kind
    else {
        return;
    };

    let positions = start
        .node_id()
        .zip(end.node_id())
        .and_then(|(start_id, end_id)| {
            Some((
                view.container_position(container_path, start_id)?,
                view.container_position(container_path, end_id)?,
            ))
        });
    let (Some((start_pos, end_pos)), Some(children)) =
        (positions, view.container_children(container_path))
    else {
        log::debug!(
            "container annotation {} no longer resolves in {}",
            annotation_id,
            container_path
        );
        return;
    };

    for node_id in children
        .iter()
        .skip(start_pos)
        .take((end_pos + 1).saturating_sub(start_pos))
    {
        if affected.deleted.contains_key(node_id) {
            continue;
        }
        let path = view
            .lookup(node_id)
            .and_then(|node| node.text_path)
            .unwrap_or_else(|| Path::node(node_id.clone()));
        affected.updated.insert(path.key());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::diff::Diff;
    use serde_json::json;
    use std::collections::HashMap;

    /// Minimal in-test graph: node capabilities plus one container
    #[derive(Default)]
    struct TestView {
        nodes: HashMap<String, NodeInfo>,
        containers: HashMap<String, Vec<String>>,
    }

    impl TestView {
        fn with_node(mut self, node: NodeInfo) -> Self {
            self.nodes.insert(node.id.clone(), node);
            self
        }

        fn with_container(mut self, path: &str, children: &[&str]) -> Self {
            self.containers
                .insert(path.to_string(), children.iter().map(|s| s.to_string()).collect());
            self
        }
    }

    impl DocumentView for TestView {
        fn lookup(&self, id: &str) -> Option<NodeInfo> {
            self.nodes.get(id).cloned()
        }

        fn container_position(&self, container_path: &Path, node_id: &str) -> Option<usize> {
            self.containers
                .get(container_path.key().as_str())?
                .iter()
                .position(|id| id == node_id)
        }

        fn container_children(&self, container_path: &Path) -> Option<Vec<NodeId>> {
            self.containers.get(container_path.key().as_str()).cloned()
        }
    }

    fn paragraph(id: &str, content: &str) -> serde_json::Value {
        json!({ "id": id, "type": "paragraph", "content": content })
    }

    #[test]
    fn test_create_then_set() {
        let view = TestView::default().with_node(NodeInfo::text("p1", "content"));
        let ops = vec![
            Operation::create(paragraph("p1", "hello")),
            Operation::set(["p1", "content"], json!("hello"), json!("hello world")),
        ];
        let affected = extract(&ops, &view);

        assert!(affected.has_created("p1"));
        assert!(affected.deleted.is_empty());
        assert!(affected.has_updated(&Path::property("p1", "content")));
        assert!(affected.has_updated("p1"));
    }

    #[test]
    fn test_create_delete_cancel() {
        let ops = vec![
            Operation::create(paragraph("x", "v")),
            Operation::delete(paragraph("x", "v")),
        ];
        let affected = extract(&ops, &TestView::default());
        assert!(!affected.has_created("x"));
        assert!(affected.has_deleted("x"));

        let ops = vec![
            Operation::delete(paragraph("x", "v")),
            Operation::create(paragraph("x", "v")),
        ];
        let affected = extract(&ops, &TestView::default());
        assert!(affected.has_created("x"));
        assert!(!affected.has_deleted("x"));
    }

    #[test]
    fn test_deletion_precedes_update() {
        let ops = vec![
            Operation::set(["y", "content"], json!("a"), json!("b")),
            Operation::update(["y", "content"], Diff::insert_text(0, "z")),
            Operation::delete(paragraph("y", "zb")),
        ];
        let affected = extract(&ops, &TestView::default());
        assert!(affected.has_deleted("y"));
        assert!(affected.updated.iter().all(|key| key.node_id() != "y"));
    }

    #[test]
    fn test_annotation_boundaries_on_create() {
        let ops = vec![Operation::create(json!({
            "id": "s1",
            "type": "strong",
            "start": { "path": ["p1", "content"], "offset": 0 },
            "end": { "path": ["p2", "content"], "offset": 2 }
        }))];
        let affected = extract(&ops, &TestView::default());
        assert!(affected.has_updated("p1.content"));
        assert!(affected.has_updated("p2.content"));
    }

    #[test]
    fn test_property_annotation_update() {
        let view = TestView::default().with_node(NodeInfo::annotation(
            "s1",
            AnnotationKind::Property {
                start: Path::property("p1", "content"),
            },
        ));
        let ops = vec![Operation::update(["s1", "start"], Diff::shift(1))];
        let affected = extract(&ops, &view);
        assert!(affected.has_updated("s1.start"));
        assert!(affected.has_updated("s1"));
        assert!(affected.has_updated("p1.content"));
    }

    #[test]
    fn test_container_annotation_span() {
        let view = TestView::default()
            .with_container("body.nodes", &["n1", "n2", "n3", "n4"])
            .with_node(NodeInfo::text("n1", "content"))
            .with_node(NodeInfo::block("n2"))
            .with_node(NodeInfo::text("n3", "content"))
            .with_node(NodeInfo::text("n4", "content"))
            .with_node(NodeInfo::annotation(
                "c1",
                AnnotationKind::Container {
                    container_path: Path::from(["body", "nodes"]),
                    start: Path::property("n1", "content"),
                    end: Path::property("n3", "content"),
                },
            ));
        let ops = vec![Operation::set(["c1", "author"], json!("a"), json!("b"))];
        let affected = extract(&ops, &view);

        assert!(affected.has_updated("n1.content"));
        assert!(affected.has_updated("n2"));
        assert!(affected.has_updated("n3.content"));
        assert!(!affected.has_updated("n4.content"));
        assert!(!affected.has_updated("n4"));
    }

    #[test]
    fn test_container_span_skips_deleted() {
        let view = TestView::default()
            .with_container("body.nodes", &["n1", "n2", "n3"])
            .with_node(NodeInfo::text("n1", "content"))
            .with_node(NodeInfo::text("n3", "content"))
            .with_node(NodeInfo::annotation(
                "c1",
                AnnotationKind::Container {
                    container_path: Path::from(["body", "nodes"]),
                    start: Path::property("n1", "content"),
                    end: Path::property("n3", "content"),
                },
            ));
        let ops = vec![
            Operation::delete(paragraph("n2", "gone")),
            Operation::set(["c1", "author"], json!("a"), json!("b")),
        ];
        let affected = extract(&ops, &view);
        assert!(affected.has_updated("n1.content"));
        assert!(!affected.has_updated("n2"));
        assert!(affected.has_updated("n3.content"));
    }

    #[test]
    fn test_dangling_references_are_not_fatal() {
        let view = TestView::default().with_node(NodeInfo::annotation(
            "c1",
            AnnotationKind::Container {
                container_path: Path::from(["body", "nodes"]),
                start: Path::property("gone", "content"),
                end: Path::property("also-gone", "content"),
            },
        ));
        let ops = vec![
            Operation::set(["c1", "author"], json!(null), json!("x")),
            Operation::set(["missing", "content"], json!(null), json!("x")),
        ];
        let affected = extract(&ops, &view);
        assert!(affected.has_updated("c1.author"));
        assert!(affected.has_updated("missing.content"));
    }
}
