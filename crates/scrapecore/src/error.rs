use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Structural problems in a workflow graph. These are always caught before
/// execution begins and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("workflow has no entry point task")]
    NoEntryPoint,

    #[error("edge {edge} references missing node {node}")]
    DanglingEdge { edge: String, node: String },

    #[error("edge {edge} connects node {node} to itself")]
    SelfConnection { edge: String, node: String },

    #[error("edge {edge}: output '{output}' is not compatible with input '{input}'")]
    TypeMismatch {
        edge: String,
        output: String,
        input: String,
    },

    #[error("edge {edge}: input '{input}' only accepts a literal value")]
    HiddenInput { edge: String, input: String },

    #[error("workflow contains a cycle")]
    CyclicGraph,
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("execution not found: {0}")]
    NotFound(String),

    #[error("insufficient credits: phase costs {required}, {remaining} remaining")]
    InsufficientCredits { required: u32, remaining: u32 },

    #[error("missing required input '{0}'")]
    MissingRequiredInput(String),

    #[error("output '{handle}' of upstream node {node} was never produced")]
    MissingUpstreamOutput { node: String, handle: String },

    #[error("step failed: {0}")]
    StepFailed(String),

    #[error("step timed out after {0}s")]
    StepTimeout(u64),

    #[error("execution stopped by user")]
    Stopped,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("store error: {0}")]
    Store(String),
}

/// Failures while recovering a workflow from free-form AI text. Recovered
/// locally by the caller; "no workflow produced" is a valid outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("response is still streaming")]
    StillStreaming,

    #[error("no JSON object found in response")]
    NoJsonFound,

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("response JSON does not describe a workflow")]
    InvalidShape,

    #[error("synthesized workflow is invalid: {0}")]
    Invalid(#[from] GraphError),
}

#[derive(Error, Debug, Clone)]
pub enum DriverError {
    #[error("browser session not initialized")]
    NoSession,

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("driver error: {0}")]
    Other(String),
}
