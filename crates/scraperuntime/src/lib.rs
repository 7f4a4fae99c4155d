//! Workflow execution runtime
//!
//! Compiles workflow graphs into phase plans, runs them one phase at a
//! time against a shared per-execution environment, and streams phase
//! logs live while persisting every status transition through the
//! execution store.

mod dispatch;
mod environment;
mod executor;
mod plan;
mod runtime;
mod store;
mod synthesis;

pub use dispatch::{StepContext, StepError, StepOutputs, TaskDispatcher};
pub use environment::Environment;
pub use executor::{ExecutionOutcome, ExecutorConfig, WorkflowExecutor};
pub use plan::{build_plan, validate_graph, ExecutionPlan, PlanPhase};
pub use runtime::{RuntimeConfig, WorkflowRuntime};
pub use store::{
    CredentialStore, ExecutionRecord, ExecutionStore, MemoryCredentialStore, MemoryStore,
    PhaseUpdate, StoreError,
};
pub use synthesis::{parse_workflow_response, SynthesizedWorkflow};
