use crate::executor::{ExecutionOutcome, ExecutorConfig, WorkflowExecutor};
use crate::store::{CredentialStore, ExecutionRecord, ExecutionStore, PhaseUpdate};
use crate::{build_plan, ExecutionPlan, TaskDispatcher};
use chrono::Utc;
use scrapecore::{
    EngineError, Execution, ExecutionError, ExecutionId, ExecutionPhase, ExecutionStatus,
    ExecutionTrigger, Graph, LogEntry, LogHub, LogLevel, PhaseStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub step_timeout: Duration,
    pub keepalive_interval: Duration,
    /// Budget applied when a caller does not pass one explicitly.
    pub default_credit_budget: u32,
    /// Per-phase broadcast channel capacity in the live log hub.
    pub hub_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(120),
            keepalive_interval: Duration::from_secs(30),
            default_credit_budget: 100,
            hub_capacity: 256,
        }
    }
}

/// Front door of the engine: compiles graphs into plans, creates execution
/// records, spawns executors, and tracks cancellation tokens for the
/// executions currently in flight in this process.
pub struct WorkflowRuntime {
    store: Arc<dyn ExecutionStore>,
    credentials: Arc<dyn CredentialStore>,
    dispatcher: Arc<dyn TaskDispatcher>,
    hub: Arc<LogHub>,
    config: RuntimeConfig,
    running: Arc<RwLock<HashMap<ExecutionId, CancellationToken>>>,
}

impl WorkflowRuntime {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        credentials: Arc<dyn CredentialStore>,
        dispatcher: Arc<dyn TaskDispatcher>,
        config: RuntimeConfig,
    ) -> Self {
        let hub = Arc::new(LogHub::new(config.hub_capacity));
        Self {
            store,
            credentials,
            dispatcher,
            hub,
            config,
            running: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The live log hub, shared with whatever transport streams phase logs
    /// out of the process.
    pub fn hub(&self) -> Arc<LogHub> {
        self.hub.clone()
    }

    pub fn store(&self) -> Arc<dyn ExecutionStore> {
        self.store.clone()
    }

    /// Compile without running. Used by the editor's plan preview.
    pub fn plan(&self, graph: &Graph) -> Result<ExecutionPlan, EngineError> {
        Ok(build_plan(graph)?)
    }

    /// Validate, persist, and start an execution in the background.
    /// Returns as soon as the execution record exists; progress is observed
    /// through the store and the log hub.
    pub async fn start(
        &self,
        graph: Graph,
        trigger: ExecutionTrigger,
        credit_budget: Option<u32>,
    ) -> Result<ExecutionId, EngineError> {
        let (execution, phases) = self.prepare(&graph, trigger, credit_budget)?;
        let execution_id = execution.id;

        self.store
            .create_execution(execution.clone(), phases.clone())
            .await
            .map_err(ExecutionError::from)?;

        let token = CancellationToken::new();
        self.running
            .write()
            .await
            .insert(execution_id, token.clone());

        let executor = self.executor();
        let running = self.running.clone();
        tokio::spawn(async move {
            let outcome = executor.run(execution, graph, phases, token).await;
            running.write().await.remove(&outcome.execution_id);
        });

        Ok(execution_id)
    }

    /// Validate, persist, and run an execution inline. Used by the CLI and
    /// by tests that want the outcome without polling.
    pub async fn run_to_completion(
        &self,
        graph: Graph,
        trigger: ExecutionTrigger,
        credit_budget: Option<u32>,
    ) -> Result<ExecutionOutcome, EngineError> {
        let (execution, phases) = self.prepare(&graph, trigger, credit_budget)?;
        let execution_id = execution.id;

        self.store
            .create_execution(execution.clone(), phases.clone())
            .await
            .map_err(ExecutionError::from)?;

        let token = CancellationToken::new();
        self.running
            .write()
            .await
            .insert(execution_id, token.clone());

        let outcome = self.executor().run(execution, graph, phases, token).await;
        self.running.write().await.remove(&execution_id);
        Ok(outcome)
    }

    /// Request a stop. Idempotent: stopping an already-terminal execution
    /// is a no-op that reports its final status. A live execution is
    /// cancelled cooperatively at its next phase boundary; an orphaned
    /// non-terminal record (no in-process task) is failed directly.
    pub async fn stop(&self, id: ExecutionId) -> Result<ExecutionStatus, EngineError> {
        let record = self
            .store
            .get_execution(id)
            .await
            .map_err(ExecutionError::from)?
            .ok_or_else(|| ExecutionError::NotFound(id.to_string()))?;

        if record.execution.status.is_terminal() {
            return Ok(record.execution.status);
        }

        if let Some(token) = self.running.read().await.get(&id) {
            token.cancel();
            return Ok(record.execution.status);
        }

        // No live task owns this execution, so transition it here.
        self.abandon(record).await?;
        Ok(ExecutionStatus::Failed)
    }

    pub async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>, EngineError> {
        Ok(self
            .store
            .get_execution(id)
            .await
            .map_err(ExecutionError::from)?)
    }

    fn prepare(
        &self,
        graph: &Graph,
        trigger: ExecutionTrigger,
        credit_budget: Option<u32>,
    ) -> Result<(Execution, Vec<ExecutionPhase>), EngineError> {
        let plan = build_plan(graph)?;
        let budget = credit_budget.unwrap_or(self.config.default_credit_budget);
        let execution = Execution::new(graph.id, trigger, budget);

        let mut phases = Vec::with_capacity(plan.node_count());
        for plan_phase in &plan.phases {
            for node_id in &plan_phase.nodes {
                // Every planned node came from the graph.
                if let Some(node) = graph.find_node(*node_id) {
                    phases.push(ExecutionPhase::new(
                        execution.id,
                        plan_phase.number,
                        node.clone(),
                    ));
                }
            }
        }
        Ok((execution, phases))
    }

    fn executor(&self) -> WorkflowExecutor {
        WorkflowExecutor::new(
            self.store.clone(),
            self.credentials.clone(),
            self.dispatcher.clone(),
            self.hub.clone(),
            ExecutorConfig {
                step_timeout: self.config.step_timeout,
                keepalive_interval: self.config.keepalive_interval,
            },
        )
    }

    async fn abandon(&self, record: ExecutionRecord) -> Result<(), ExecutionError> {
        let now = Utc::now();
        let mut logged = false;
        for phase in &record.phases {
            if phase.status.is_terminal() {
                continue;
            }
            if !logged {
                let entry = LogEntry::new(LogLevel::Error, "Execution stopped by user");
                self.store.append_log(phase.id, entry).await?;
                logged = true;
            }
            self.store
                .update_phase(
                    phase.id,
                    PhaseUpdate {
                        status: Some(PhaseStatus::Failed),
                        completed_at: Some(now),
                        ..Default::default()
                    },
                )
                .await?;
        }
        self.store
            .set_execution_status(record.execution.id, ExecutionStatus::Failed, None, Some(now))
            .await?;
        Ok(())
    }
}
