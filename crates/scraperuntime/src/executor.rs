use crate::{
    CredentialStore, Environment, ExecutionStore, PhaseUpdate, StepContext, TaskDispatcher,
};
use chrono::Utc;
use scrapecore::{
    Execution, ExecutionError, ExecutionId, ExecutionPhase, ExecutionStatus, Graph, LogCollector,
    LogEntry, LogHub, NodeSpec, PhaseId, PhaseStatus,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound on a single step call, including its external requests.
    /// A timeout counts as that step's failure and triggers the cascade.
    pub step_timeout: Duration,
    /// Interval of the store keep-alive ping that runs for the duration of
    /// an execution.
    pub keepalive_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(120),
            keepalive_interval: Duration::from_secs(30),
        }
    }
}

/// Final report of one execution run.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
    pub credits_consumed: u32,
    pub failure: Option<ExecutionError>,
}

/// Runs the phases of one execution strictly in plan order against a
/// shared environment. Owns every phase status transition.
pub struct WorkflowExecutor {
    store: Arc<dyn ExecutionStore>,
    credentials: Arc<dyn CredentialStore>,
    dispatcher: Arc<dyn TaskDispatcher>,
    hub: Arc<LogHub>,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        credentials: Arc<dyn CredentialStore>,
        dispatcher: Arc<dyn TaskDispatcher>,
        hub: Arc<LogHub>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            credentials,
            dispatcher,
            hub,
            config,
        }
    }

    /// Execute all phases. `phases` must be ordered by plan layer, which is
    /// how the runtime creates them. The cancellation token is checked at
    /// phase boundaries only: an in-flight step is allowed to finish so the
    /// shared automation session is never abandoned mid-operation.
    pub async fn run(
        &self,
        execution: Execution,
        graph: Graph,
        phases: Vec<ExecutionPhase>,
        cancel: CancellationToken,
    ) -> ExecutionOutcome {
        let execution_id = execution.id;
        tracing::info!(%execution_id, "starting workflow execution");

        if let Err(e) = self
            .store
            .set_execution_status(execution_id, ExecutionStatus::Running, Some(Utc::now()), None)
            .await
        {
            return ExecutionOutcome {
                execution_id,
                status: ExecutionStatus::Failed,
                credits_consumed: 0,
                failure: Some(e.into()),
            };
        }

        // Keep the persistence connection warm while a slow step runs.
        let keepalive = {
            let store = self.store.clone();
            let interval = self.config.keepalive_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(e) = store.ping().await {
                        tracing::warn!("store keep-alive failed: {e}");
                    }
                }
            })
        };

        // Live log path: collectors push onto this channel, the forwarder
        // fans out to the hub and appends to the durable store in emission
        // order.
        let (log_tx, mut log_rx) = mpsc::unbounded_channel::<(PhaseId, LogEntry)>();
        let forwarder = {
            let hub = self.hub.clone();
            let store = self.store.clone();
            tokio::spawn(async move {
                while let Some((phase, entry)) = log_rx.recv().await {
                    hub.publish(phase, entry.clone()).await;
                    if let Err(e) = store.append_log(phase, entry).await {
                        tracing::warn!("failed to persist log entry: {e}");
                    }
                }
            })
        };

        let mut env = Environment::new(execution.credit_budget);
        let mut completed: HashSet<PhaseId> = HashSet::new();
        let mut failed_phase: Option<PhaseId> = None;
        let mut failure: Option<ExecutionError> = None;

        for phase in &phases {
            if cancel.is_cancelled() {
                let logs = LogCollector::new(phase.id, Some(log_tx.clone()));
                logs.error("Execution stopped by user");
                failure = Some(ExecutionError::Stopped);
                break;
            }

            match self
                .run_phase(execution_id, phase, &graph, &mut env, &log_tx)
                .await
            {
                Ok(()) => {
                    completed.insert(phase.id);
                }
                Err(e) => {
                    failed_phase = Some(phase.id);
                    failure = Some(e);
                    break;
                }
            }
        }

        // Cascading abort: any failure (or stop) marks every remaining
        // non-terminal phase FAILED; nothing further starts.
        if failure.is_some() {
            for phase in &phases {
                if completed.contains(&phase.id) || failed_phase == Some(phase.id) {
                    continue;
                }
                let update = PhaseUpdate {
                    status: Some(PhaseStatus::Failed),
                    completed_at: Some(Utc::now()),
                    ..Default::default()
                };
                if let Err(e) = self.store.update_phase(phase.id, update).await {
                    tracing::warn!("failed to mark phase {} aborted: {e}", phase.id);
                }
            }
        }

        // Release the automation session on every exit path. A release
        // failure is logged against the last touched phase and never
        // replaces the original cause.
        let teardown_phase = failed_phase.or_else(|| phases.last().map(|p| p.id));
        if let Some(phase_id) = teardown_phase {
            let logs = LogCollector::new(phase_id, Some(log_tx.clone()));
            env.teardown(&logs).await;
        }

        let status = if failure.is_some() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };
        if let Err(e) = self
            .store
            .set_execution_status(execution_id, status, None, Some(Utc::now()))
            .await
        {
            tracing::error!("failed to finalize execution {execution_id}: {e}");
        }

        keepalive.abort();
        // Dropping the sender ends the forwarder loop once the backlog is
        // flushed to the hub and the store.
        drop(log_tx);
        let _ = forwarder.await;

        tracing::info!(%execution_id, ?status, credits = env.credits_consumed(), "execution finished");
        ExecutionOutcome {
            execution_id,
            status,
            credits_consumed: env.credits_consumed(),
            failure,
        }
    }

    async fn run_phase(
        &self,
        execution_id: ExecutionId,
        phase: &ExecutionPhase,
        graph: &Graph,
        env: &mut Environment,
        log_tx: &mpsc::UnboundedSender<(PhaseId, LogEntry)>,
    ) -> Result<(), ExecutionError> {
        let logs = LogCollector::new(phase.id, Some(log_tx.clone()));
        let node = &phase.node;
        let descriptor = node.task.descriptor();

        self.store
            .update_phase(
                phase.id,
                PhaseUpdate {
                    status: Some(PhaseStatus::Running),
                    started_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;
        logs.info(format!("Starting {}", descriptor.label));

        let inputs = match resolve_inputs(node, graph, env) {
            Ok(inputs) => inputs,
            Err(e) => {
                logs.error(e.to_string());
                self.fail_phase(phase.id, None).await;
                return Err(e);
            }
        };

        // Prepaid budget: the check happens before the step runs, the debit
        // only after it succeeds.
        let cost = descriptor.credits;
        if env.remaining_credits() < cost {
            let e = ExecutionError::InsufficientCredits {
                required: cost,
                remaining: env.remaining_credits(),
            };
            logs.error(e.to_string());
            self.fail_phase(phase.id, Some(inputs)).await;
            return Err(e);
        }

        let step = StepContext {
            node,
            inputs: &inputs,
            env: &mut *env,
            logs: &logs,
            credentials: self.credentials.as_ref(),
        };
        let result =
            tokio::time::timeout(self.config.step_timeout, self.dispatcher.run(node.task, step))
                .await;

        let outputs = match result {
            Err(_) => {
                let e = ExecutionError::StepTimeout(self.config.step_timeout.as_secs());
                logs.error(e.to_string());
                self.fail_phase(phase.id, Some(inputs)).await;
                return Err(e);
            }
            Ok(Err(step_err)) => {
                let e = ExecutionError::StepFailed(step_err.to_string());
                logs.error(e.to_string());
                self.fail_phase(phase.id, Some(inputs)).await;
                return Err(e);
            }
            Ok(Ok(outputs)) => outputs,
        };

        env.record_outputs(node.id, outputs.clone());
        env.debit(cost);
        self.store.add_execution_credits(execution_id, cost).await?;
        self.store
            .update_phase(
                phase.id,
                PhaseUpdate {
                    status: Some(PhaseStatus::Completed),
                    inputs: Some(inputs),
                    outputs: Some(outputs),
                    credits_consumed: Some(cost),
                    completed_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;
        logs.success(format!("{} completed", descriptor.label));
        Ok(())
    }

    async fn fail_phase(&self, phase: PhaseId, inputs: Option<HashMap<String, String>>) {
        let update = PhaseUpdate {
            status: Some(PhaseStatus::Failed),
            inputs,
            completed_at: Some(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = self.store.update_phase(phase, update).await {
            tracing::warn!("failed to mark phase {phase} failed: {e}");
        }
    }
}

/// Resolve a node's declared inputs: an incoming edge reads the upstream
/// output from the environment, otherwise the node's own literal value is
/// used. Empty literals count as unset, matching how the editor stores
/// untouched fields.
fn resolve_inputs(
    node: &NodeSpec,
    graph: &Graph,
    env: &Environment,
) -> Result<HashMap<String, String>, ExecutionError> {
    let descriptor = node.task.descriptor();
    let mut resolved = HashMap::new();

    for param in &descriptor.inputs {
        if let Some(edge) = graph
            .incoming(node.id)
            .find(|e| e.target_handle == param.name)
        {
            match env.output(edge.source, &edge.source_handle) {
                Some(value) => {
                    resolved.insert(param.name.to_string(), value.to_string());
                    continue;
                }
                None => {
                    return Err(ExecutionError::MissingUpstreamOutput {
                        node: edge.source.to_string(),
                        handle: edge.source_handle.clone(),
                    })
                }
            }
        }

        match node.inputs.get(param.name) {
            Some(literal) if !literal.is_empty() => {
                resolved.insert(param.name.to_string(), literal.clone());
            }
            _ if param.required => {
                return Err(ExecutionError::MissingRequiredInput(param.name.to_string()))
            }
            _ => {}
        }
    }

    Ok(resolved)
}
