use crate::TaskType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type GraphId = Uuid;
pub type NodeId = Uuid;

/// Authoring-time representation of a workflow: nodes plus edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub id: GraphId,
    pub name: String,
    pub description: Option<String>,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        let id = node.id;
        self.nodes.push(node);
        id
    }

    pub fn connect(
        &mut self,
        source: NodeId,
        source_handle: impl Into<String>,
        target: NodeId,
        target_handle: impl Into<String>,
    ) {
        self.edges.push(Edge::new(
            source,
            source_handle.into(),
            target,
            target_handle.into(),
        ));
    }

    pub fn find_node(&self, id: NodeId) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges whose target is the given node.
    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn has_entry_point(&self) -> bool {
        self.nodes.iter().any(|n| n.task.descriptor().entry_point)
    }
}

/// One step placed on the canvas. The runtime never mutates a node; only
/// AI synthesis rewrites identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub task: TaskType,
    /// Literal input values keyed by input name. Inputs fed by an edge are
    /// resolved from upstream outputs at run time instead.
    #[serde(default)]
    pub inputs: HashMap<String, String>,
    /// Presentation only; the runtime ignores it except for deterministic
    /// tie-breaking in the planner.
    #[serde(default)]
    pub position: Position,
}

impl NodeSpec {
    pub fn new(task: TaskType) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            inputs: HashMap::new(),
            position: Position::default(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }
}

/// Connection from one node's output handle to another node's input handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub source_handle: String,
    pub target: NodeId,
    pub target_handle: String,
}

impl Edge {
    pub fn new(
        source: NodeId,
        source_handle: impl Into<String>,
        target: NodeId,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("edge-{}-{}", source, target),
            source,
            source_handle: source_handle.into(),
            target,
            target_handle: target_handle.into(),
        }
    }
}

/// Node position in the visual editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}
