//! Core data structures for the tracked diagram

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compare::TransientFields;

/// Identifier of an opened project/diagram in the storage layer.
pub type ProjectId = i64;

/// Opaque per-entity payload owned by the editor.
pub type Payload = Map<String, Value>;

/// Discriminates what a node represents on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// A network device (server, firewall, switch...).
    Device,
    /// A boundary region that can contain devices and other boundaries.
    Boundary,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Device => "device",
            NodeKind::Boundary => "boundary",
        }
    }
}

/// Canvas position of a node, relative to its parent boundary if it has one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }
}

/// Measured size of a node, filled in by the layout subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

/// A single node in the topology diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    /// Enclosing boundary. Parent chains form a forest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub data: Payload,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, x: f64, y: f64) -> Self {
        Node {
            id: id.into(),
            kind,
            position: Position::new(x, y),
            dimensions: None,
            parent_id: None,
            data: Payload::new(),
        }
    }

    pub fn device(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self::new(id, NodeKind::Device, x, y)
    }

    pub fn boundary(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self::new(id, NodeKind::Boundary, x, y)
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_dimensions(mut self, width: f64, height: f64) -> Self {
        self.dimensions = Some(Dimensions { width, height });
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Same node moved to a new position.
    pub fn moved_to(&self, x: f64, y: f64) -> Self {
        Node {
            position: Position::new(x, y),
            ..self.clone()
        }
    }
}

fn default_edge_kind() -> String {
    "default".to_string()
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Edge style as named by the editor.
    #[serde(rename = "type", default = "default_edge_kind")]
    pub kind: String,
    #[serde(default)]
    pub data: Payload,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Edge {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: default_edge_kind(),
            data: Payload::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Whether either endpoint is the given node.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Anything the engine tracks by id: nodes and edges.
pub trait Entity: Clone + PartialEq + std::fmt::Debug {
    /// Short name used in log lines.
    const LABEL: &'static str;

    fn id(&self) -> &str;

    /// Whether `next` differs from `self` in a way that must be persisted.
    fn meaningfully_differs(&self, next: &Self, transient: &TransientFields) -> bool;
}

impl Entity for Node {
    const LABEL: &'static str = "node";

    fn id(&self) -> &str {
        &self.id
    }

    fn meaningfully_differs(&self, next: &Self, transient: &TransientFields) -> bool {
        crate::compare::node_changed(self, next, transient)
    }
}

impl Entity for Edge {
    const LABEL: &'static str = "edge";

    fn id(&self) -> &str {
        &self.id
    }

    fn meaningfully_differs(&self, next: &Self, transient: &TransientFields) -> bool {
        crate::compare::edge_changed(self, next, transient)
    }
}
