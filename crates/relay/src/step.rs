//! Test steps recorded through the runner's metadata side-channel
//!
//! The runner offers no step API, so test code records each step into the
//! test's metadata under `steps`. The reporter later reads them back, merges
//! repeated steps and pairs them with the screenshots the runner collected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::{LabelConfig, ReporterConfig};
use crate::error::{RelayError, RelayResult};
use crate::model::ContentType;

/// Metadata key the steps are stored under
pub const STEPS_KEY: &str = "steps";

/// A file produced by test code for a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAttachment {
    pub name: String,
    pub content_type: ContentType,

    /// Bytes to write; only present until the attachment is registered
    #[serde(skip)]
    pub content: Vec<u8>,

    /// Where the content was written
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StepAttachment {
    pub fn new(name: impl Into<String>, content_type: ContentType, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type,
            content,
            path: None,
        }
    }
}

/// One logical test step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestStep {
    pub name: String,
    pub screenshot_amount: u32,
    pub attachments: Vec<StepAttachment>,
}

impl TestStep {
    /// Create a step, using the configured placeholder when no name is given
    pub fn new(name: Option<&str>, labels: &LabelConfig) -> Self {
        let name = match name {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => labels.default_step_name.clone(),
        };

        Self {
            name,
            screenshot_amount: 0,
            attachments: Vec::new(),
        }
    }

    pub fn register_screenshot(&mut self) {
        self.screenshot_amount = self.screenshot_amount.saturating_add(1);
    }

    /// Write the attachment content below `files_dir` and keep a reference to it.
    ///
    /// A failed write is logged and the attachment dropped.
    pub fn register_attachment(&mut self, mut attachment: StepAttachment, files_dir: &Path) {
        match write_attachment_file(&attachment, files_dir) {
            Ok(path) => {
                debug!("Stored step attachment {} at {}", attachment.name, path.display());
                attachment.path = Some(path);
                attachment.content.clear();
                self.attachments.push(attachment);
            }
            Err(e) => warn!("Could not store attachment {}: {}", attachment.name, e),
        }
    }

    /// Fold `other` into this step if both carry the same name
    pub fn merge_on_same_name(&mut self, other: &TestStep) -> bool {
        if self.name != other.name {
            return false;
        }
        self.screenshot_amount = self.screenshot_amount.saturating_add(other.screenshot_amount);
        self.attachments.extend(other.attachments.iter().cloned());
        true
    }
}

fn write_attachment_file(attachment: &StepAttachment, files_dir: &Path) -> RelayResult<PathBuf> {
    let now = chrono::Utc::now();
    let dir = files_dir.join(now.format("%Y-%m-%d").to_string());
    std::fs::create_dir_all(&dir)?;

    let file_name = format!(
        "{}_{}.{}",
        attachment.name,
        now.timestamp_millis(),
        attachment.content_type.extension()
    );
    let path = dir.join(file_name);
    std::fs::write(&path, &attachment.content).map_err(|e| RelayError::Attachment {
        name: attachment.name.clone(),
        reason: e.to_string(),
    })?;
    Ok(path)
}

/// Merge steps sharing a name, keeping first-seen order.
///
/// Unnamed steps are dropped.
pub fn merge_steps(steps: &[TestStep]) -> Vec<TestStep> {
    let mut merged: Vec<TestStep> = Vec::new();

    for step in steps {
        if step.name.is_empty() {
            continue;
        }
        let exists = merged.iter_mut().any(|m| m.merge_on_same_name(step));
        if !exists {
            merged.push(step.clone());
        }
    }

    merged
}

/// Record a step into a test's metadata object.
///
/// Attachments are written to the configured files directory and one
/// screenshot is counted when screenshots are enabled. The caller is
/// expected to take that screenshot through the runner.
pub fn record_step(
    meta: &mut Map<String, Value>,
    name: &str,
    attachments: Vec<StepAttachment>,
    config: &ReporterConfig,
) -> RelayResult<TestStep> {
    let mut step = TestStep::new(Some(name), &config.labels);
    for attachment in attachments {
        step.register_attachment(attachment, &config.files_dir);
    }
    if config.enable_screenshots {
        step.register_screenshot();
    }

    let entry = meta
        .entry(STEPS_KEY.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    match entry {
        Value::Array(steps) => steps.push(serde_json::to_value(&step)?),
        other => {
            return Err(RelayError::InvalidMetadata(format!(
                "`{}` must be a list, found {}",
                STEPS_KEY, other
            )))
        }
    }

    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn step(name: &str, screenshots: u32) -> TestStep {
        TestStep {
            name: name.to_string(),
            screenshot_amount: screenshots,
            attachments: vec![],
        }
    }

    #[test]
    fn test_default_name() {
        let labels = LabelConfig::default();
        assert_eq!(TestStep::new(None, &labels).name, "Test step");
        assert_eq!(TestStep::new(Some(""), &labels).name, "Test step");
        assert_eq!(TestStep::new(Some("Open cart"), &labels).name, "Open cart");
    }

    #[test]
    fn test_merge_sums_screenshots_in_first_seen_order() {
        let merged = merge_steps(&[step("A", 1), step("B", 2), step("A", 1)]);
        assert_eq!(merged, vec![step("A", 2), step("B", 2)]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let input = [step("Login", 1), step("Search", 0), step("Login", 2), step("Pay", 3)];
        let once = merge_steps(&input);
        let twice = merge_steps(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_saturates_screenshot_count() {
        let merged = merge_steps(&[step("A", u32::MAX), step("A", 1)]);
        assert_eq!(merged, vec![step("A", u32::MAX)]);
    }

    #[test]
    fn test_merge_skips_unnamed() {
        let merged = merge_steps(&[step("", 4), step("A", 1)]);
        assert_eq!(merged, vec![step("A", 1)]);
    }

    #[test]
    fn test_register_attachment_writes_file() {
        let tmp = TempDir::new().unwrap();
        let mut s = step("Upload", 0);
        s.register_attachment(
            StepAttachment::new("invoice", ContentType::Text, b"total: 10".to_vec()),
            tmp.path(),
        );

        assert_eq!(s.attachments.len(), 1);
        let path = s.attachments[0].path.clone().unwrap();
        assert!(path.starts_with(tmp.path()));
        assert_eq!(path.extension().unwrap(), "txt");
        assert_eq!(std::fs::read(&path).unwrap(), b"total: 10");
    }

    #[test]
    fn test_register_attachment_failure_is_swallowed() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let mut s = step("Upload", 0);
        s.register_attachment(
            StepAttachment::new("invoice", ContentType::Text, b"x".to_vec()),
            &blocker,
        );
        assert!(s.attachments.is_empty());
    }

    #[test]
    fn test_record_step_appends_to_meta() {
        let tmp = TempDir::new().unwrap();
        let config = ReporterConfig {
            files_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let mut meta = Map::new();

        record_step(&mut meta, "Open page", vec![], &config).unwrap();
        record_step(&mut meta, "Fill form", vec![], &config).unwrap();

        let steps: Vec<TestStep> = serde_json::from_value(meta[STEPS_KEY].clone()).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].name, "Fill form");
        assert_eq!(steps[1].screenshot_amount, 1);
    }

    #[test]
    fn test_record_step_without_screenshots() {
        let config = ReporterConfig {
            enable_screenshots: false,
            ..Default::default()
        };
        let mut meta = Map::new();
        let recorded = record_step(&mut meta, "Open page", vec![], &config).unwrap();
        assert_eq!(recorded.screenshot_amount, 0);
    }

    #[test]
    fn test_record_step_rejects_non_list() {
        let mut meta = Map::new();
        meta.insert(STEPS_KEY.to_string(), Value::String("oops".to_string()));
        let result = record_step(&mut meta, "x", vec![], &ReporterConfig::default());
        assert!(matches!(result, Err(RelayError::InvalidMetadata(_))));
    }
}
