//! Built-in task library
//!
//! One handler per task type, dispatched exhaustively so a new catalog
//! variant will not compile until it has a handler here.

mod browser;
mod deliver;
mod export;
mod extract;
mod json;

pub use browser::ChromeSession;

use async_trait::async_trait;
use scrapecore::TaskType;
use scraperuntime::{StepContext, StepError, StepOutputs, TaskDispatcher};

/// Where "Extract data with AI" sends its chat-completion requests.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub endpoint: String,
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
        }
    }
}

/// The production dispatcher: drives a real headless browser and real
/// HTTP endpoints. Tests substitute their own [`TaskDispatcher`].
pub struct TaskRunner {
    http: reqwest::Client,
    ai: AiConfig,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::with_ai(AiConfig::default())
    }

    pub fn with_ai(ai: AiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            ai,
        }
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskDispatcher for TaskRunner {
    async fn run(&self, task: TaskType, step: StepContext<'_>) -> Result<StepOutputs, StepError> {
        match task {
            TaskType::LaunchBrowser => browser::launch_browser(step).await,
            TaskType::NavigateUrl => browser::navigate_url(step).await,
            TaskType::PageToHtml => browser::page_to_html(step).await,
            TaskType::FillInput => browser::fill_input(step).await,
            TaskType::ClickElement => browser::click_element(step).await,
            TaskType::WaitForElement => browser::wait_for_element(step).await,
            TaskType::ScrollToElement => browser::scroll_to_element(step).await,
            TaskType::ExtractTextFromElement => extract::extract_text(step),
            TaskType::ExtractDataWithAi => {
                extract::extract_with_ai(&self.http, &self.ai, step).await
            }
            TaskType::TranslateText => extract::translate_text(&self.http, &self.ai, step).await,
            TaskType::ReadPropertyFromJson => json::read_property(step),
            TaskType::AddPropertyToJson => json::add_property(step),
            TaskType::DeliverViaWebhook => deliver::via_webhook(&self.http, step).await,
            TaskType::ExportToCsv => export::to_csv(step),
        }
    }
}

pub(crate) fn single(name: &str, value: String) -> StepOutputs {
    StepOutputs::from([(name.to_string(), value)])
}

/// Marker output for tasks that hand the shared browser session onward.
/// The session itself lives in the environment, never in the value map.
pub(crate) fn page_output() -> StepOutputs {
    single("Web page", String::new())
}

/// ".btn btn-primary" is a common authoring mistake for ".btn.btn-primary";
/// rewrite space-separated class lists into a compound class selector.
pub(crate) fn clean_selector(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('.') && trimmed.contains(' ') {
        let classes: Vec<&str> = trimmed
            .trim_start_matches('.')
            .split_whitespace()
            .filter(|c| !c.is_empty())
            .collect();
        return format!(".{}", classes.join("."));
    }
    trimmed.to_string()
}
