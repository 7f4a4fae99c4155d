use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use scrapecore::{Graph, GraphError, NodeId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One topological layer of the plan. Nodes within a phase have no data
/// dependency on each other by construction.
#[derive(Debug, Clone, Serialize)]
pub struct PlanPhase {
    pub number: usize,
    pub nodes: Vec<NodeId>,
}

/// Ordered phases derived from a graph. A pure function of the graph:
/// recomputed on every submission, never persisted on its own.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub phases: Vec<PlanPhase>,
}

impl ExecutionPlan {
    pub fn node_count(&self) -> usize {
        self.phases.iter().map(|p| p.nodes.len()).sum()
    }

    /// Sum of declared credit costs over every planned node.
    pub fn total_credits(&self, graph: &Graph) -> u32 {
        self.phases
            .iter()
            .flat_map(|p| p.nodes.iter())
            .filter_map(|id| graph.find_node(*id))
            .map(|n| n.task.descriptor().credits)
            .sum()
    }
}

/// Run every structural check without producing a plan. Never mutates the
/// graph; validating a valid graph twice returns Ok both times.
pub fn validate_graph(graph: &Graph) -> Result<(), GraphError> {
    build_plan(graph).map(|_| ())
}

/// Compile a graph into topological layers (Kahn's algorithm) after
/// validating it. The same checks guard the editor preview path and the
/// runtime's defensive re-validation of persisted or AI-authored graphs.
pub fn build_plan(graph: &Graph) -> Result<ExecutionPlan, GraphError> {
    validate_edges(graph)?;

    if !graph.has_entry_point() {
        return Err(GraphError::NoEntryPoint);
    }

    let mut dag: DiGraphMap<NodeId, ()> = DiGraphMap::new();
    for node in &graph.nodes {
        dag.add_node(node.id);
    }
    for edge in &graph.edges {
        dag.add_edge(edge.source, edge.target, ());
    }

    let mut indegree: HashMap<NodeId, usize> = graph
        .nodes
        .iter()
        .map(|n| (n.id, dag.neighbors_directed(n.id, Direction::Incoming).count()))
        .collect();
    let mut remaining: HashSet<NodeId> = graph.nodes.iter().map(|n| n.id).collect();

    let mut phases = Vec::new();
    while !remaining.is_empty() {
        let mut ready: Vec<NodeId> = remaining
            .iter()
            .copied()
            .filter(|id| indegree.get(id).copied().unwrap_or(0) == 0)
            .collect();

        if ready.is_empty() {
            // Every remaining node still waits on another remaining node.
            return Err(GraphError::CyclicGraph);
        }

        // Row-major order keeps the plan deterministic for identical graphs.
        ready.sort_by(|a, b| {
            let pa = graph.find_node(*a).map(|n| n.position).unwrap_or_default();
            let pb = graph.find_node(*b).map(|n| n.position).unwrap_or_default();
            pa.y.partial_cmp(&pb.y)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(pa.x.partial_cmp(&pb.x).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.cmp(b))
        });

        for id in &ready {
            remaining.remove(id);
            for successor in dag.neighbors_directed(*id, Direction::Outgoing) {
                if let Some(count) = indegree.get_mut(&successor) {
                    *count = count.saturating_sub(1);
                }
            }
        }

        phases.push(PlanPhase {
            number: phases.len() + 1,
            nodes: ready,
        });
    }

    Ok(ExecutionPlan { phases })
}

fn validate_edges(graph: &Graph) -> Result<(), GraphError> {
    for edge in &graph.edges {
        if edge.source == edge.target {
            return Err(GraphError::SelfConnection {
                edge: edge.id.clone(),
                node: edge.source.to_string(),
            });
        }

        let source = graph
            .find_node(edge.source)
            .ok_or_else(|| GraphError::DanglingEdge {
                edge: edge.id.clone(),
                node: edge.source.to_string(),
            })?;
        let target = graph
            .find_node(edge.target)
            .ok_or_else(|| GraphError::DanglingEdge {
                edge: edge.id.clone(),
                node: edge.target.to_string(),
            })?;

        let source_desc = source.task.descriptor();
        let target_desc = target.task.descriptor();
        let mismatch = || GraphError::TypeMismatch {
            edge: edge.id.clone(),
            output: edge.source_handle.clone(),
            input: edge.target_handle.clone(),
        };

        let output = source_desc.output(&edge.source_handle).ok_or_else(mismatch)?;
        let input = target_desc.input(&edge.target_handle).ok_or_else(mismatch)?;
        if output.param_type != input.param_type {
            return Err(mismatch());
        }
        // Hidden inputs have no handle in the editor; only a literal may
        // feed them.
        if input.hide_handle {
            return Err(GraphError::HiddenInput {
                edge: edge.id.clone(),
                input: edge.target_handle.clone(),
            });
        }
    }
    Ok(())
}
