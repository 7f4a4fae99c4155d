use crate::GraphError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of task kinds the engine knows how to run.
///
/// Adding a task type is a code change: descriptors and step handlers are
/// matched exhaustively, so a new variant will not compile until both the
/// catalog and the dispatcher cover it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    LaunchBrowser,
    NavigateUrl,
    PageToHtml,
    ExtractTextFromElement,
    FillInput,
    ClickElement,
    WaitForElement,
    ScrollToElement,
    ReadPropertyFromJson,
    AddPropertyToJson,
    DeliverViaWebhook,
    ExtractDataWithAi,
    TranslateText,
    ExportToCsv,
}

impl TaskType {
    pub const ALL: [TaskType; 14] = [
        TaskType::LaunchBrowser,
        TaskType::NavigateUrl,
        TaskType::PageToHtml,
        TaskType::ExtractTextFromElement,
        TaskType::FillInput,
        TaskType::ClickElement,
        TaskType::WaitForElement,
        TaskType::ScrollToElement,
        TaskType::ReadPropertyFromJson,
        TaskType::AddPropertyToJson,
        TaskType::DeliverViaWebhook,
        TaskType::ExtractDataWithAi,
        TaskType::TranslateText,
        TaskType::ExportToCsv,
    ];

    /// Wire identifier used by the editor and AI payloads.
    pub fn id(&self) -> &'static str {
        match self {
            TaskType::LaunchBrowser => "LAUNCH_BROWSER",
            TaskType::NavigateUrl => "NAVIGATE_URL",
            TaskType::PageToHtml => "PAGE_TO_HTML",
            TaskType::ExtractTextFromElement => "EXTRACT_TEXT_FROM_ELEMENT",
            TaskType::FillInput => "FILL_INPUT",
            TaskType::ClickElement => "CLICK_ELEMENT",
            TaskType::WaitForElement => "WAIT_FOR_ELEMENT",
            TaskType::ScrollToElement => "SCROLL_TO_ELEMENT",
            TaskType::ReadPropertyFromJson => "READ_PROPERTY_FROM_JSON",
            TaskType::AddPropertyToJson => "ADD_PROPERTY_TO_JSON",
            TaskType::DeliverViaWebhook => "DELIVER_VIA_WEBHOOK",
            TaskType::ExtractDataWithAi => "EXTRACT_DATA_WITH_AI",
            TaskType::TranslateText => "TRANSLATE_TEXT",
            TaskType::ExportToCsv => "EXPORT_TO_CSV",
        }
    }

    /// Catalog entry for this task type.
    pub fn descriptor(&self) -> TaskDescriptor {
        match self {
            TaskType::LaunchBrowser => TaskDescriptor {
                task_type: *self,
                label: "Launch Browser",
                inputs: vec![TaskParam::required("Website Url", ParamType::String).hidden()],
                outputs: vec![TaskParam::output("Web page", ParamType::BrowserInstance)],
                credits: 5,
                entry_point: true,
            },
            TaskType::NavigateUrl => TaskDescriptor {
                task_type: *self,
                label: "Navigate to URL",
                inputs: vec![
                    TaskParam::required("Web page", ParamType::BrowserInstance),
                    TaskParam::required("Url", ParamType::String),
                ],
                outputs: vec![TaskParam::output("Web page", ParamType::BrowserInstance)],
                credits: 2,
                entry_point: false,
            },
            TaskType::PageToHtml => TaskDescriptor {
                task_type: *self,
                label: "Get HTML from page",
                inputs: vec![TaskParam::required("Web page", ParamType::BrowserInstance)],
                outputs: vec![
                    TaskParam::output("Html", ParamType::String),
                    TaskParam::output("Web page", ParamType::BrowserInstance),
                ],
                credits: 2,
                entry_point: false,
            },
            TaskType::ExtractTextFromElement => TaskDescriptor {
                task_type: *self,
                label: "Extract text from element",
                inputs: vec![
                    TaskParam::required("Html", ParamType::String),
                    TaskParam::required("Selector", ParamType::String),
                ],
                outputs: vec![TaskParam::output("Extracted text", ParamType::String)],
                credits: 2,
                entry_point: false,
            },
            TaskType::FillInput => TaskDescriptor {
                task_type: *self,
                label: "Fill input",
                inputs: vec![
                    TaskParam::required("Web page", ParamType::BrowserInstance),
                    TaskParam::required("Selector", ParamType::String),
                    TaskParam::required("Value", ParamType::String),
                ],
                outputs: vec![TaskParam::output("Web page", ParamType::BrowserInstance)],
                credits: 1,
                entry_point: false,
            },
            TaskType::ClickElement => TaskDescriptor {
                task_type: *self,
                label: "Click element",
                inputs: vec![
                    TaskParam::required("Web page", ParamType::BrowserInstance),
                    TaskParam::required("Selector", ParamType::String),
                ],
                outputs: vec![TaskParam::output("Web page", ParamType::BrowserInstance)],
                credits: 1,
                entry_point: false,
            },
            TaskType::WaitForElement => TaskDescriptor {
                task_type: *self,
                label: "Wait for element",
                inputs: vec![
                    TaskParam::required("Web page", ParamType::BrowserInstance),
                    TaskParam::required("Selector", ParamType::String),
                    TaskParam::required("Visibility", ParamType::Select),
                ],
                outputs: vec![TaskParam::output("Web page", ParamType::BrowserInstance)],
                credits: 1,
                entry_point: false,
            },
            TaskType::ScrollToElement => TaskDescriptor {
                task_type: *self,
                label: "Scroll to element",
                inputs: vec![
                    TaskParam::required("Web page", ParamType::BrowserInstance),
                    TaskParam::required("Selector", ParamType::String),
                ],
                outputs: vec![TaskParam::output("Web page", ParamType::BrowserInstance)],
                credits: 1,
                entry_point: false,
            },
            TaskType::ReadPropertyFromJson => TaskDescriptor {
                task_type: *self,
                label: "Read property from JSON",
                inputs: vec![
                    TaskParam::required("JSON", ParamType::String),
                    TaskParam::required("Property name", ParamType::String),
                ],
                outputs: vec![TaskParam::output("Property value", ParamType::String)],
                credits: 1,
                entry_point: false,
            },
            TaskType::AddPropertyToJson => TaskDescriptor {
                task_type: *self,
                label: "Add property to JSON",
                inputs: vec![
                    TaskParam::required("JSON", ParamType::String),
                    TaskParam::required("Property name", ParamType::String),
                    TaskParam::required("Property value", ParamType::String),
                ],
                outputs: vec![TaskParam::output("Updated JSON", ParamType::String)],
                credits: 1,
                entry_point: false,
            },
            TaskType::DeliverViaWebhook => TaskDescriptor {
                task_type: *self,
                label: "Deliver via webhook",
                inputs: vec![
                    TaskParam::required("Target URL", ParamType::String),
                    TaskParam::required("Body", ParamType::String),
                ],
                outputs: vec![],
                credits: 1,
                entry_point: false,
            },
            TaskType::ExtractDataWithAi => TaskDescriptor {
                task_type: *self,
                label: "Extract data with AI",
                inputs: vec![
                    TaskParam::required("Content", ParamType::String),
                    TaskParam::required("Credentials", ParamType::Credential).hidden(),
                    TaskParam::required("Prompt", ParamType::String),
                ],
                outputs: vec![TaskParam::output("Extracted data", ParamType::String)],
                credits: 4,
                entry_point: false,
            },
            TaskType::TranslateText => TaskDescriptor {
                task_type: *self,
                label: "Translate text",
                inputs: vec![
                    TaskParam::required("Text", ParamType::String),
                    TaskParam::required("Target language", ParamType::String),
                    TaskParam::required("Credentials", ParamType::Credential).hidden(),
                ],
                outputs: vec![TaskParam::output("Translated text", ParamType::String)],
                credits: 3,
                entry_point: false,
            },
            TaskType::ExportToCsv => TaskDescriptor {
                task_type: *self,
                label: "Export to CSV",
                inputs: vec![
                    TaskParam::required("Data", ParamType::String),
                    TaskParam::optional("Include metadata", ParamType::Select),
                ],
                outputs: vec![TaskParam::output("Csv", ParamType::String)],
                credits: 2,
                entry_point: false,
            },
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TaskType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .iter()
            .copied()
            .find(|t| t.id() == s)
            .ok_or_else(|| GraphError::UnknownTaskType(s.to_string()))
    }
}

/// Declared type of a task input or output handle. Edges may only connect
/// handles with equal param types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamType {
    String,
    BrowserInstance,
    Select,
    Credential,
}

/// Named, typed input or output slot on a task descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct TaskParam {
    pub name: &'static str,
    pub param_type: ParamType,
    pub required: bool,
    /// Hidden handles accept only literal values, never a graph connection.
    pub hide_handle: bool,
}

impl TaskParam {
    fn new(name: &'static str, param_type: ParamType, required: bool) -> Self {
        Self {
            name,
            param_type,
            required,
            hide_handle: false,
        }
    }

    pub fn required(name: &'static str, param_type: ParamType) -> Self {
        Self::new(name, param_type, true)
    }

    pub fn optional(name: &'static str, param_type: ParamType) -> Self {
        Self::new(name, param_type, false)
    }

    pub fn output(name: &'static str, param_type: ParamType) -> Self {
        Self::new(name, param_type, false)
    }

    pub fn hidden(mut self) -> Self {
        self.hide_handle = true;
        self
    }
}

/// Catalog entry: everything the planner and runtime need to know about a
/// task type. Immutable at process start.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDescriptor {
    pub task_type: TaskType,
    pub label: &'static str,
    pub inputs: Vec<TaskParam>,
    pub outputs: Vec<TaskParam>,
    pub credits: u32,
    pub entry_point: bool,
}

impl TaskDescriptor {
    pub fn input(&self, name: &str) -> Option<&TaskParam> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&TaskParam> {
        self.outputs.iter().find(|p| p.name == name)
    }
}
