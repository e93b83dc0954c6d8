//! Node type definitions for the reference document graph
//!
//! A schema maps each node type to a category. The category is what the
//! change extractor cares about: whether a node is text, a container, or an
//! annotation bounded by coordinates.

use super::DocumentError;
use crate::change::{AnnotationKind, NodeInfo, NodeSnapshot, Path};
use serde_json::Value;
use std::collections::HashMap;

/// Specification for a node property
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

/// What kind of node a type describes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeCategory {
    /// Opaque block without text (images, figures)
    Block,

    /// Block whose text lives in `text_property`
    Text { text_property: String },

    /// Holds an ordered list of child ids in `children_property`
    Container { children_property: String },

    /// Range inside one text property
    PropertyAnnotation,

    /// Range across several nodes of a container
    ContainerAnnotation,
}

/// Specification for a node type
#[derive(Clone, Debug)]
pub struct NodeTypeSpec {
    pub type_name: String,
    pub category: NodeCategory,
    pub fields: Vec<FieldSpec>,
}

impl NodeTypeSpec {
    pub fn new(type_name: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            type_name: type_name.into(),
            category,
            fields: Vec::new(),
        }
    }

    pub fn text(type_name: impl Into<String>, text_property: impl Into<String>) -> Self {
        let text_property = text_property.into();
        Self::new(
            type_name,
            NodeCategory::Text {
                text_property: text_property.clone(),
            },
        )
        .with_field(FieldSpec::required(text_property))
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

/// Registry of node types
#[derive(Clone, Debug, Default)]
pub struct NodeSchema {
    types: HashMap<String, NodeTypeSpec>,
}

impl NodeSchema {
    /// An empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Paragraphs, headings, a body container, images, inline marks and comments
    pub fn standard() -> Self {
        let mut schema = Self::new();
        schema.register(NodeTypeSpec::text("paragraph", "content"));
        schema.register(
            NodeTypeSpec::text("heading", "content").with_field(FieldSpec::optional("level")),
        );
        schema.register(
            NodeTypeSpec::new(
                "container",
                NodeCategory::Container {
                    children_property: "nodes".to_string(),
                },
            )
            .with_field(FieldSpec::required("nodes")),
        );
        schema.register(
            NodeTypeSpec::new("image", NodeCategory::Block).with_field(FieldSpec::required("src")),
        );
        for mark in ["strong", "emphasis", "link"] {
            schema.register(
                NodeTypeSpec::new(mark, NodeCategory::PropertyAnnotation)
                    .with_field(FieldSpec::required("start"))
                    .with_field(FieldSpec::required("end")),
            );
        }
        schema.register(
            NodeTypeSpec::new("comment", NodeCategory::ContainerAnnotation)
                .with_field(FieldSpec::required("container_path"))
                .with_field(FieldSpec::required("start"))
                .with_field(FieldSpec::required("end")),
        );
        schema
    }

    pub fn register(&mut self, spec: NodeTypeSpec) {
        self.types.insert(spec.type_name.clone(), spec);
    }

    pub fn spec(&self, type_name: &str) -> Option<&NodeTypeSpec> {
        self.types.get(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Check that a snapshot names a known type and has its required fields
    pub fn check(&self, node: &NodeSnapshot) -> Result<&NodeTypeSpec, DocumentError> {
        let type_name = node.node_type().unwrap_or_default();
        let spec = self
            .spec(type_name)
            .ok_or_else(|| DocumentError::UnknownNodeType(type_name.to_string()))?;
        for field in spec.fields.iter().filter(|f| f.required) {
            if node.get(&field.name).is_none() {
                return Err(DocumentError::MissingProperty {
                    node_id: node.id().to_string(),
                    property: field.name.clone(),
                });
            }
        }
        Ok(spec)
    }

    /// Capabilities of a stored node as seen by the extractor.
    ///
    /// Annotations whose coordinates cannot be read are reported as plain
    /// blocks rather than failing.
    pub fn classify(&self, node: &NodeSnapshot) -> NodeInfo {
        let category = node
            .node_type()
            .and_then(|t| self.spec(t))
            .map(|spec| &spec.category);

        match category {
            Some(NodeCategory::Text { text_property }) => NodeInfo::text(node.id(), text_property.clone()),
            Some(NodeCategory::PropertyAnnotation) => match node.boundary_path("start") {
                Some(start) => NodeInfo::annotation(node.id(), AnnotationKind::Property { start }),
                None => NodeInfo::block(node.id()),
            },
            Some(NodeCategory::ContainerAnnotation) => {
                let container_path = node.get("container_path").and_then(path_from_value);
                match (
                    container_path,
                    node.boundary_path("start"),
                    node.boundary_path("end"),
                ) {
                    (Some(container_path), Some(start), Some(end)) => NodeInfo::annotation(
                        node.id(),
                        AnnotationKind::Container {
                            container_path,
                            start,
                            end,
                        },
                    ),
                    _ => NodeInfo::block(node.id()),
                }
            }
            _ => NodeInfo::block(node.id()),
        }
    }
}

fn path_from_value(value: &Value) -> Option<Path> {
    let segments: Option<Vec<String>> = value
        .as_array()?
        .iter()
        .map(|s| s.as_str().map(str::to_string))
        .collect();
    segments.filter(|s| !s.is_empty()).map(Path::new)
}
