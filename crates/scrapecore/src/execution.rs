use crate::{GraphId, LogEntry, NodeSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type ExecutionId = Uuid;
pub type PhaseId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseStatus {
    Created,
    Running,
    Completed,
    Failed,
}

impl PhaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseStatus::Completed | PhaseStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionTrigger {
    Manual,
    Scheduled,
}

/// One run of a graph. Created PENDING with all phases pre-created; reaches
/// a terminal state when every phase finishes, any phase fails, or the run
/// is stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub graph_id: GraphId,
    pub status: ExecutionStatus,
    pub trigger: ExecutionTrigger,
    pub credit_budget: u32,
    pub credits_consumed: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn new(graph_id: GraphId, trigger: ExecutionTrigger, credit_budget: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            graph_id,
            status: ExecutionStatus::Pending,
            trigger,
            credit_budget,
            credits_consumed: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// A node materialized within one execution, at its plan layer. Status
/// transitions are owned exclusively by the task runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPhase {
    pub id: PhaseId,
    pub execution_id: ExecutionId,
    /// Plan layer this node belongs to.
    pub number: usize,
    pub name: String,
    pub node: NodeSpec,
    pub status: PhaseStatus,
    pub inputs: HashMap<String, String>,
    pub outputs: HashMap<String, String>,
    pub credits_consumed: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub logs: Vec<LogEntry>,
}

impl ExecutionPhase {
    pub fn new(execution_id: ExecutionId, number: usize, node: NodeSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id,
            number,
            name: node.task.descriptor().label.to_string(),
            node,
            status: PhaseStatus::Created,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            credits_consumed: 0,
            started_at: None,
            completed_at: None,
            logs: Vec::new(),
        }
    }
}
