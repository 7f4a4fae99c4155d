use scrapecore::{BrowserSession, DriverError, LogCollector, NodeId};
use std::collections::HashMap;

/// Per-execution mutable context: the shared automation session, the
/// write-once output map, and the credit counter. Lives exactly as long
/// as one execution and is torn down on every exit path.
pub struct Environment {
    session: Option<Box<dyn BrowserSession>>,
    outputs: HashMap<NodeId, HashMap<String, String>>,
    credit_budget: u32,
    credits_consumed: u32,
}

impl Environment {
    pub fn new(credit_budget: u32) -> Self {
        Self {
            session: None,
            outputs: HashMap::new(),
            credit_budget,
            credits_consumed: 0,
        }
    }

    /// Install a new automation session, closing any previous one. The
    /// session has a single owner at a time; steps borrow it through
    /// [`Environment::session_mut`] rather than holding it.
    pub async fn replace_session(&mut self, session: Box<dyn BrowserSession>) {
        if let Some(mut old) = self.session.replace(session) {
            if let Err(e) = old.close().await {
                tracing::warn!("failed to close previous browser session: {e}");
            }
        }
    }

    pub fn session_mut(&mut self) -> Result<&mut dyn BrowserSession, DriverError> {
        match self.session.as_mut() {
            Some(session) => Ok(session.as_mut()),
            None => Err(DriverError::NoSession),
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Record a node's produced outputs. Each node runs at most once per
    /// execution, so keys are write-once.
    pub fn record_outputs(&mut self, node: NodeId, outputs: HashMap<String, String>) {
        debug_assert!(!self.outputs.contains_key(&node));
        self.outputs.insert(node, outputs);
    }

    pub fn output(&self, node: NodeId, handle: &str) -> Option<&str> {
        self.outputs.get(&node)?.get(handle).map(String::as_str)
    }

    pub fn node_outputs(&self, node: NodeId) -> Option<&HashMap<String, String>> {
        self.outputs.get(&node)
    }

    pub fn remaining_credits(&self) -> u32 {
        self.credit_budget.saturating_sub(self.credits_consumed)
    }

    pub fn credits_consumed(&self) -> u32 {
        self.credits_consumed
    }

    pub fn debit(&mut self, credits: u32) {
        self.credits_consumed += credits;
    }

    /// Release the automation session. Best-effort: a failure here is
    /// logged and must never mask the error that ended the execution.
    pub async fn teardown(&mut self, logs: &LogCollector) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                logs.warning(format!("failed to release browser session: {e}"));
                tracing::warn!("browser session release failed: {e}");
            }
        }
    }
}
