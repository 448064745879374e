//! Report model written to the results directory
//!
//! Field names follow the Allure results format so the generated files can be
//! fed straight into `allure generate`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Outcome of a test or step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
    Broken,
    Skipped,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Passed => write!(f, "passed"),
            Status::Failed => write!(f, "failed"),
            Status::Broken => write!(f, "broken"),
            Status::Skipped => write!(f, "skipped"),
        }
    }
}

/// Lifecycle stage of a report item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Scheduled,
    Running,
    Finished,
    Pending,
    Interrupted,
}

impl Default for Stage {
    fn default() -> Self {
        Self::Scheduled
    }
}

/// Test severity as understood by the report UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocker,
    Critical,
    Normal,
    Minor,
    Trivial,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Blocker => "blocker",
            Severity::Critical => "critical",
            Severity::Normal => "normal",
            Severity::Minor => "minor",
            Severity::Trivial => "trivial",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blocker" => Ok(Severity::Blocker),
            "critical" => Ok(Severity::Critical),
            "normal" => Ok(Severity::Normal),
            "minor" => Ok(Severity::Minor),
            "trivial" => Ok(Severity::Trivial),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Business priority of a test, rendered as a custom label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Highest,
    High,
    Medium,
    Low,
    Lowest,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Highest => "highest",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Lowest => "lowest",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "highest" => Ok(Priority::Highest),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            "lowest" => Ok(Priority::Lowest),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// Label names the report UI groups by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelName {
    ParentSuite,
    Suite,
    SubSuite,
    Epic,
    Feature,
    Story,
    Severity,
    Priority,
}

impl LabelName {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelName::ParentSuite => "parentSuite",
            LabelName::Suite => "suite",
            LabelName::SubSuite => "subSuite",
            LabelName::Epic => "epic",
            LabelName::Feature => "feature",
            LabelName::Story => "story",
            LabelName::Severity => "severity",
            LabelName::Priority => "Priority",
        }
    }
}

impl std::fmt::Display for LabelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub url: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// A file attached to a test or step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub source: String,
}

/// Content types the relay knows how to attach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Png,
    Jpeg,
    Text,
    Json,
    Html,
    Csv,
    Xml,
}

impl ContentType {
    /// MIME type recorded in the report
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Png => "image/png",
            ContentType::Jpeg => "image/jpeg",
            ContentType::Text => "text/plain",
            ContentType::Json => "application/json",
            ContentType::Html => "text/html",
            ContentType::Csv => "text/csv",
            ContentType::Xml => "application/xml",
        }
    }

    /// File extension used for attachment files
    pub fn extension(&self) -> &'static str {
        match self {
            ContentType::Png => "png",
            ContentType::Jpeg => "jpg",
            ContentType::Text => "txt",
            ContentType::Json => "json",
            ContentType::Html => "html",
            ContentType::Csv => "csv",
            ContentType::Xml => "xml",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    #[serde(default)]
    pub flaky: bool,
    #[serde(default)]
    pub known: bool,
    #[serde(default)]
    pub muted: bool,
}

/// A finished step inside a test result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default)]
    pub status_details: StatusDetails,
    pub stage: Stage,
    #[serde(default)]
    pub steps: Vec<StepResult>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub start: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
}

/// One `<uuid>-result.json` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub uuid: String,
    pub history_id: String,
    pub full_name: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default)]
    pub status_details: StatusDetails,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_html: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepResult>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub links: Vec<Link>,
    pub start: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
}

impl TestResult {
    /// Values of every label with the given name, in insertion order
    pub fn label_values(&self, name: LabelName) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|l| l.name == name.as_str())
            .map(|l| l.value.as_str())
            .collect()
    }

    /// Value of the first parameter with the given name
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

/// One `<uuid>-container.json` entry, grouping the tests of a fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultContainer {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<String>,
    pub start: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
}

/// Entry of `categories.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_regex: Option<String>,
    #[serde(default)]
    pub matched_statuses: Vec<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flaky: Option<bool>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            message_regex: None,
            trace_regex: None,
            matched_statuses: Vec::new(),
            flaky: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.matched_statuses.push(status);
        self
    }

    pub fn with_message_regex(mut self, regex: impl Into<String>) -> Self {
        self.message_regex = Some(regex.into());
        self
    }
}
