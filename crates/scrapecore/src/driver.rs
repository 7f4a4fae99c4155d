use crate::DriverError;
use async_trait::async_trait;
use std::time::Duration;

/// Minimal capability set a step needs from the shared automation session.
///
/// The session is exclusively owned by the environment: at most one step
/// operates on it at a time, and it is handed off phase to phase. Concrete
/// drivers live outside the core crate; the executor and the task library
/// only ever see this trait.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn click(&mut self, selector: &str) -> Result<(), DriverError>;

    /// Wait until an element matching the selector appears (or, with
    /// `visible` false, disappears), bounded by `timeout`.
    async fn wait_for(
        &mut self,
        selector: &str,
        visible: bool,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Bring an element matching the selector into the viewport.
    async fn scroll_to(&mut self, selector: &str) -> Result<(), DriverError>;

    /// Full HTML of the current page.
    async fn content(&mut self) -> Result<String, DriverError>;

    /// Release the page and the underlying driver. Best-effort; callers
    /// log failures and never escalate them over an original error.
    async fn close(&mut self) -> Result<(), DriverError>;
}
