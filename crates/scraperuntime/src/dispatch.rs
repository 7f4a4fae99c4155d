use crate::{CredentialStore, Environment};
use async_trait::async_trait;
use scrapecore::{DriverError, LogCollector, NodeSpec, TaskType};
use std::collections::HashMap;
use thiserror::Error;

/// Failure of a single step. Translated by the executor into the phase's
/// FAILED transition; never allowed to panic across the dispatch boundary.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("{0}")]
    Failed(String),

    #[error("missing input '{0}'")]
    MissingInput(String),

    #[error("credential '{0}' not found")]
    MissingCredential(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Outputs produced by a successful step, keyed by output handle name.
pub type StepOutputs = HashMap<String, String>;

/// Everything a step implementation may touch: its node, the resolved
/// inputs, the shared environment, the log sink, and the credential
/// boundary.
pub struct StepContext<'a> {
    pub node: &'a NodeSpec,
    pub inputs: &'a HashMap<String, String>,
    pub env: &'a mut Environment,
    pub logs: &'a LogCollector,
    pub credentials: &'a dyn CredentialStore,
}

impl StepContext<'_> {
    pub fn input(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).map(String::as_str)
    }

    pub fn require_input(&self, name: &str) -> Result<&str, StepError> {
        self.input(name)
            .ok_or_else(|| StepError::MissingInput(name.to_string()))
    }
}

/// Single dispatch table mapping task variant to handler, implemented
/// exhaustively by the task library and injected into the executor.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn run(&self, task: TaskType, step: StepContext<'_>) -> Result<StepOutputs, StepError>;
}
