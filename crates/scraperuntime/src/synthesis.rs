//! Turns model-generated text into a validated workflow graph.
//!
//! The model's output is treated as hostile: prose around the JSON,
//! truncated streams, unknown node ids in edges, and missing handles are
//! all expected. Everything that survives parsing is re-identified with
//! fresh ids and run through the same structural validation as any other
//! graph before it is returned.

use crate::plan::validate_graph;
use scrapecore::{Edge, Graph, NodeId, NodeSpec, Position, SynthesisError, TaskType};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

/// A graph recovered from model output, plus the model's own explanation
/// when it provided one.
#[derive(Debug, Clone)]
pub struct SynthesizedWorkflow {
    pub graph: Graph,
    pub explanation: Option<String>,
}

#[derive(Deserialize)]
struct RawNode {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "type")]
    node_type: Option<String>,
    #[serde(default)]
    data: Option<RawNodeData>,
    #[serde(default)]
    position: Option<Position>,
}

#[derive(Deserialize)]
struct RawNodeData {
    #[serde(default, rename = "type")]
    task: Option<String>,
    #[serde(default)]
    inputs: Option<HashMap<String, Value>>,
}

#[derive(Deserialize)]
struct RawEdge {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default, rename = "sourceHandle")]
    source_handle: Option<String>,
    #[serde(default, rename = "targetHandle")]
    target_handle: Option<String>,
}

/// Parse a model response into a workflow graph.
///
/// With `streaming` set, an unbalanced brace count means the response is
/// still arriving and parsing should be retried on the next chunk rather
/// than reported as a failure.
pub fn parse_workflow_response(
    text: &str,
    streaming: bool,
) -> Result<SynthesizedWorkflow, SynthesisError> {
    if streaming {
        let open = text.matches('{').count();
        let close = text.matches('}').count();
        if open > close {
            return Err(SynthesisError::StillStreaming);
        }
    }

    // Strip surrounding prose and code fences by slicing from the first
    // opening brace to the last closing one.
    let start = text.find('{').ok_or(SynthesisError::NoJsonFound)?;
    let end = text.rfind('}').ok_or(SynthesisError::NoJsonFound)?;
    if end < start {
        return Err(SynthesisError::NoJsonFound);
    }

    let value: Value = serde_json::from_str(&text[start..=end])
        .map_err(|e| SynthesisError::MalformedJson(e.to_string()))?;
    let root = value.as_object().ok_or(SynthesisError::InvalidShape)?;

    let explanation = root
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::to_string);

    // Accept both a bare graph object and one wrapped under "workflow".
    let payload = if root.contains_key("nodes") {
        root
    } else {
        root.get("workflow")
            .and_then(Value::as_object)
            .ok_or(SynthesisError::InvalidShape)?
    };

    let raw_nodes = payload
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or(SynthesisError::InvalidShape)?;
    if raw_nodes.is_empty() {
        return Err(SynthesisError::InvalidShape);
    }
    let raw_edges = payload
        .get("edges")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    // Fresh ids for every node, keeping a map so edges can be rewritten
    // consistently. Model-invented ids never leak into the engine.
    let mut id_map: HashMap<String, NodeId> = HashMap::new();
    let mut nodes = Vec::with_capacity(raw_nodes.len());
    for (index, raw) in raw_nodes.iter().enumerate() {
        let raw: RawNode = serde_json::from_value(raw.clone())
            .map_err(|_| SynthesisError::InvalidShape)?;
        let task_name = raw
            .data
            .as_ref()
            .and_then(|d| d.task.clone())
            .or(raw.node_type)
            .ok_or(SynthesisError::InvalidShape)?;
        let task = TaskType::from_str(&task_name)?;

        let mut node = NodeSpec::new(task);
        if let Some(old_id) = raw.id {
            id_map.insert(old_id, node.id);
        }
        // Missing positions fall back to the declaration order so the
        // row-major tie-break still reflects the model's sequencing.
        node.position = raw.position.unwrap_or(Position {
            x: 0.0,
            y: index as f64 * 150.0,
        });
        if let Some(inputs) = raw.data.and_then(|d| d.inputs) {
            for (name, value) in inputs {
                if let Some(text) = coerce_input(value) {
                    node.inputs.insert(name, text);
                }
            }
        }
        nodes.push(node);
    }

    let edges = rewrite_edges(&raw_edges, &id_map).unwrap_or_else(|| auto_edges(&nodes));

    let mut graph = Graph::new("AI generated workflow");
    graph.nodes = nodes;
    graph.edges = edges;
    validate_graph(&graph)?;

    Ok(SynthesizedWorkflow { graph, explanation })
}

/// Rewrite model edges onto the freshly minted node ids. Any defect in any
/// edge (unknown endpoint, missing handle) discards the whole set in favor
/// of positional auto-chaining.
fn rewrite_edges(raw_edges: &[Value], id_map: &HashMap<String, NodeId>) -> Option<Vec<Edge>> {
    if raw_edges.is_empty() {
        return None;
    }
    let mut edges = Vec::with_capacity(raw_edges.len());
    for raw in raw_edges {
        let raw: RawEdge = serde_json::from_value(raw.clone()).ok()?;
        let source = id_map.get(raw.source.as_deref()?)?;
        let target = id_map.get(raw.target.as_deref()?)?;
        let source_handle = raw.source_handle.filter(|h| !h.is_empty())?;
        let target_handle = raw.target_handle.filter(|h| !h.is_empty())?;
        edges.push(Edge::new(*source, source_handle, *target, target_handle));
    }
    Some(edges)
}

/// Chain nodes in row-major order, first declared output to first
/// non-hidden declared input of the next node.
fn auto_edges(nodes: &[NodeSpec]) -> Vec<Edge> {
    let mut ordered: Vec<&NodeSpec> = nodes.iter().collect();
    ordered.sort_by(|a, b| {
        a.position
            .y
            .partial_cmp(&b.position.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                a.position
                    .x
                    .partial_cmp(&b.position.x)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.id.cmp(&b.id))
    });

    let mut edges = Vec::new();
    for pair in ordered.windows(2) {
        let source_desc = pair[0].task.descriptor();
        let target_desc = pair[1].task.descriptor();
        let output = source_desc.outputs.first();
        let input = target_desc.inputs.iter().find(|p| !p.hide_handle);
        if let (Some(output), Some(input)) = (output, input) {
            edges.push(Edge::new(pair[0].id, output.name, pair[1].id, input.name));
        }
    }
    edges
}

/// Inputs arrive as arbitrary JSON; the engine passes strings between
/// nodes, so scalars are rendered and structured values re-serialized.
fn coerce_input(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => serde_json::to_string(&other).ok(),
    }
}
