//! Core abstractions for the scrape workflow engine
//!
//! This crate provides the fundamental types every other component depends
//! on: the task catalog, the node/edge graph model, execution records, log
//! types, the live log broadcast hub, and the browser-session seam.

mod driver;
mod error;
mod execution;
mod graph;
mod hub;
mod logs;
mod task;

pub use driver::BrowserSession;
pub use error::{DriverError, EngineError, ExecutionError, GraphError, SynthesisError};
pub use execution::{
    Execution, ExecutionId, ExecutionPhase, ExecutionStatus, ExecutionTrigger, PhaseId,
    PhaseStatus,
};
pub use graph::{Edge, Graph, GraphId, NodeId, NodeSpec, Position};
pub use hub::LogHub;
pub use logs::{LogCollector, LogEntry, LogLevel};
pub use task::{ParamType, TaskDescriptor, TaskParam, TaskType};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
