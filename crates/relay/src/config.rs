//! Reporter configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{RelayError, RelayResult};
use crate::model::{Category, Priority, Severity, Status};

/// Reporter configuration, loaded once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Directory the result files are written to
    pub result_dir: PathBuf,

    /// Directory step attachments are copied into before being reported
    pub files_dir: PathBuf,

    /// Take a screenshot for every recorded step
    pub enable_screenshots: bool,

    /// Remove previous results before the first write
    pub clean_results: bool,

    /// Optional JSON file with category definitions
    pub categories_path: Option<PathBuf>,

    /// Metadata defaults
    pub meta: MetaConfig,

    /// Display strings
    pub labels: LabelConfig,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            result_dir: PathBuf::from("allure/allure-results"),
            files_dir: PathBuf::from("allure/files"),
            enable_screenshots: true,
            clean_results: false,
            categories_path: None,
            meta: MetaConfig::default(),
            labels: LabelConfig::default(),
        }
    }
}

/// Defaults applied when a test carries no value of its own
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaConfig {
    pub severity: Severity,
    pub priority: Priority,

    /// Base URL the issue tracker ids are appended to
    pub issue_url: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            severity: Severity::Normal,
            priority: Priority::Medium,
            issue_url: "https://jira.example.com/browse/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub issue: String,
    pub epic: String,
    pub story: String,
    pub flaky: String,
    pub screenshot_manual: String,
    pub screenshot_on_fail: String,
    pub default_step_name: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            issue: "Jira Issue".to_string(),
            epic: "Epic".to_string(),
            story: "Story".to_string(),
            flaky: "Flaky test".to_string(),
            screenshot_manual: "Screenshot taken manually".to_string(),
            screenshot_on_fail: "Screenshot taken on fail".to_string(),
            default_step_name: "Test step".to_string(),
        }
    }
}

impl ReporterConfig {
    /// Load configuration from file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> RelayResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            debug!("Loaded reporter config from {}", path.display());
            Ok(config)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> RelayResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Categories written next to the results
    pub fn categories(&self) -> RelayResult<Vec<Category>> {
        match &self.categories_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                serde_json::from_str(&content).map_err(|e| {
                    RelayError::InvalidConfig(format!("{}: {}", path.display(), e))
                })
            }
            None => Ok(default_categories()),
        }
    }
}

fn default_categories() -> Vec<Category> {
    vec![
        Category::new("Ignored tests").with_status(Status::Skipped),
        Category::new("Product defects").with_status(Status::Failed),
        Category::new("Test defects").with_status(Status::Broken),
        Category::new("Before hook failures")
            .with_status(Status::Failed)
            .with_message_regex(".*Error in test.before hook.*"),
    ]
}
