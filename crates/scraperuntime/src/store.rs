use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scrapecore::{
    Execution, ExecutionId, ExecutionPhase, ExecutionStatus, LogEntry, PhaseId, PhaseStatus,
};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("execution {0} not found")]
    ExecutionNotFound(ExecutionId),

    #[error("phase {0} not found")]
    PhaseNotFound(PhaseId),

    #[error("store backend: {0}")]
    Backend(String),
}

impl From<StoreError> for scrapecore::ExecutionError {
    fn from(e: StoreError) -> Self {
        scrapecore::ExecutionError::Store(e.to_string())
    }
}

/// Partial update applied to one execution phase record.
#[derive(Debug, Default, Clone)]
pub struct PhaseUpdate {
    pub status: Option<PhaseStatus>,
    pub inputs: Option<HashMap<String, String>>,
    pub outputs: Option<HashMap<String, String>>,
    pub credits_consumed: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// An execution together with its phases, ordered by plan layer.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub execution: Execution,
    pub phases: Vec<ExecutionPhase>,
}

/// Boundary to the persistence layer. The engine only ever talks to this
/// trait; the real backing store lives in the surrounding system.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persist a new execution along with one pre-created phase record per
    /// planned node, all in CREATED status.
    async fn create_execution(
        &self,
        execution: Execution,
        phases: Vec<ExecutionPhase>,
    ) -> Result<(), StoreError>;

    async fn set_execution_status(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Debit applied in phase-completion order so the stored total always
    /// reflects exactly the work completed so far.
    async fn add_execution_credits(&self, id: ExecutionId, credits: u32) -> Result<(), StoreError>;

    async fn update_phase(&self, id: PhaseId, update: PhaseUpdate) -> Result<(), StoreError>;

    /// Durable log write path, independent of the live broadcast hub.
    async fn append_log(&self, phase: PhaseId, entry: LogEntry) -> Result<(), StoreError>;

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, StoreError>;

    /// Connection keep-alive used during long executions so a slow step
    /// does not starve the backend's pool timeout. No-op for in-memory.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// In-memory store used by the CLI, tests, and single-process deployments.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    executions: HashMap<ExecutionId, Execution>,
    phases: HashMap<PhaseId, ExecutionPhase>,
    // Phase ids per execution, in plan order.
    phase_order: HashMap<ExecutionId, Vec<PhaseId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(
        &self,
        execution: Execution,
        phases: Vec<ExecutionPhase>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let order = phases.iter().map(|p| p.id).collect();
        inner.phase_order.insert(execution.id, order);
        for phase in phases {
            inner.phases.insert(phase.id, phase);
        }
        inner.executions.insert(execution.id, execution);
        Ok(())
    }

    async fn set_execution_status(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let execution = inner
            .executions
            .get_mut(&id)
            .ok_or(StoreError::ExecutionNotFound(id))?;
        execution.status = status;
        if started_at.is_some() {
            execution.started_at = started_at;
        }
        if completed_at.is_some() {
            execution.completed_at = completed_at;
        }
        Ok(())
    }

    async fn add_execution_credits(&self, id: ExecutionId, credits: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let execution = inner
            .executions
            .get_mut(&id)
            .ok_or(StoreError::ExecutionNotFound(id))?;
        execution.credits_consumed += credits;
        Ok(())
    }

    async fn update_phase(&self, id: PhaseId, update: PhaseUpdate) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let phase = inner.phases.get_mut(&id).ok_or(StoreError::PhaseNotFound(id))?;
        if let Some(status) = update.status {
            phase.status = status;
        }
        if let Some(inputs) = update.inputs {
            phase.inputs = inputs;
        }
        if let Some(outputs) = update.outputs {
            phase.outputs = outputs;
        }
        if let Some(credits) = update.credits_consumed {
            phase.credits_consumed = credits;
        }
        if update.started_at.is_some() {
            phase.started_at = update.started_at;
        }
        if update.completed_at.is_some() {
            phase.completed_at = update.completed_at;
        }
        Ok(())
    }

    async fn append_log(&self, phase: PhaseId, entry: LogEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let phase = inner
            .phases
            .get_mut(&phase)
            .ok_or(StoreError::PhaseNotFound(phase))?;
        phase.logs.push(entry);
        Ok(())
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, StoreError> {
        let inner = self.inner.read().await;
        let Some(execution) = inner.executions.get(&id) else {
            return Ok(None);
        };
        let phases = inner
            .phase_order
            .get(&id)
            .map(|order| {
                order
                    .iter()
                    .filter_map(|pid| inner.phases.get(pid).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(ExecutionRecord {
            execution: execution.clone(),
            phases,
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Boundary to the secrets backend: steps that call external services look
/// up decrypted credentials by name.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, name: &str) -> Option<String>;
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, name: impl Into<String>, secret: impl Into<String>) {
        self.secrets.write().await.insert(name.into(), secret.into());
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, name: &str) -> Option<String> {
        self.secrets.read().await.get(name).cloned()
    }
}
