use crate::PhaseId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One user-visible log line, owned by a phase. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Log sink handed to step implementations through the environment.
///
/// A thin handle onto the execution's log channel: entries are forwarded
/// as they occur, and the forwarder on the other end fans them out to live
/// observers and the durable phase record. Without a sender attached
/// (pure unit tests) logging is a no-op.
#[derive(Clone)]
pub struct LogCollector {
    phase: PhaseId,
    stream: Option<mpsc::UnboundedSender<(PhaseId, LogEntry)>>,
}

impl LogCollector {
    pub fn new(phase: PhaseId, stream: Option<mpsc::UnboundedSender<(PhaseId, LogEntry)>>) -> Self {
        Self { phase, stream }
    }

    pub fn phase(&self) -> PhaseId {
        self.phase
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if let Some(stream) = &self.stream {
            // Receiver gone means the run is already tearing down.
            let _ = stream.send((self.phase, LogEntry::new(level, message)));
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }
}
