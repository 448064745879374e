//! Reporter façade driven by the runner's lifecycle callbacks
//!
//! The runner executes fixtures one after another even when tests inside a
//! fixture run concurrently in several browsers, so a single open group is
//! tracked at a time. Tests are told apart by name only.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ReporterConfig;
use crate::error::{RelayError, RelayResult};
use crate::errors::{append_line, merge_errors, strip_ansi, TestError};
use crate::metadata::{MetaScope, Metadata};
use crate::model::{ContentType, Stage, Status};
use crate::runner::{ErrorFormatter, Screenshot, TestRunInfo};
use crate::runtime::{AllureGroup, AllureRuntime, AllureTest, ExecutableItem};
use crate::step::{merge_steps, StepAttachment, TestStep};
use crate::writer::ResultsWriter;

/// Lifecycle state shared by the callbacks of one run
#[derive(Debug, Default)]
pub struct Session {
    group: Option<AllureGroup>,
    group_metadata: Option<Metadata>,
    tests: HashMap<String, AllureTest>,
}

impl Session {
    pub fn has_active_group(&self) -> bool {
        self.group.is_some()
    }

    /// Whether a test with this name has started and not ended yet
    pub fn is_running(&self, name: &str) -> bool {
        self.tests.contains_key(name)
    }
}

/// Counts of reported tests by outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub broken: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Passed => self.passed += 1,
            Status::Failed => self.failed += 1,
            Status::Broken => self.broken += 1,
            Status::Skipped => self.skipped += 1,
        }
    }
}

/// Translates runner events into report items
pub struct AllureReporter<W: ResultsWriter> {
    runtime: AllureRuntime<W>,
    config: ReporterConfig,
    user_agents: Vec<String>,
    session: Session,
    summary: RunSummary,
}

impl<W: ResultsWriter> AllureReporter<W> {
    pub fn new(config: ReporterConfig, writer: W) -> Self {
        Self {
            runtime: AllureRuntime::new(writer),
            config,
            user_agents: Vec::new(),
            session: Session::default(),
            summary: RunSummary::default(),
        }
    }

    /// User agents of every browser taking part in the run
    pub fn set_user_agents(&mut self, user_agents: Vec<String>) {
        self.user_agents = user_agents;
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn writer(&self) -> &W {
        self.runtime.writer()
    }

    pub fn into_writer(self) -> W {
        self.runtime.into_writer()
    }

    /// Write categories and environment info
    pub fn set_globals(&mut self) -> RelayResult<()> {
        let categories = self.config.categories()?;
        self.runtime.write_categories(&categories)?;

        if !self.user_agents.is_empty() {
            let mut environment = IndexMap::new();
            environment.insert("Browsers".to_string(), self.user_agents.join(","));
            self.runtime.write_environment(&environment)?;
        }
        Ok(())
    }

    /// Open a fixture. A fixture still open is closed first.
    pub fn start_group(&mut self, name: &str, meta: &Value) -> RelayResult<()> {
        let metadata = Metadata::from_value(meta, MetaScope::Group)?;
        self.end_group()?;

        info!("Starting fixture {}", name);
        self.session.group = Some(self.runtime.start_group(name));
        self.session.group_metadata = Some(metadata);
        Ok(())
    }

    /// Close the open fixture, if any
    pub fn end_group(&mut self) -> RelayResult<()> {
        if let Some(group) = self.session.group.take() {
            debug!("Closing fixture {}", group.name());
            self.runtime.end_group(group)?;
        }
        Ok(())
    }

    /// Start a test in the open fixture
    pub fn start_test(&mut self, name: &str, _meta: &Value) -> RelayResult<()> {
        let group = self.session.group.as_mut().ok_or(RelayError::NoActiveSuite)?;

        let mut test = group.start_test(name);
        test.set_full_name(format!("{} : {}", group.name(), name));
        test.set_history_id(Uuid::new_v4().to_string());
        test.set_stage(Stage::Running);

        debug!("Starting test {}", name);
        if self.session.tests.insert(name.to_string(), test).is_some() {
            warn!("Test {} was already running; replacing it", name);
        }
        Ok(())
    }

    /// Finish a test and write its result.
    ///
    /// A test that was never started is started first.
    pub fn end_test(
        &mut self,
        name: &str,
        run_info: &TestRunInfo,
        meta: &Value,
        formatter: &dyn ErrorFormatter,
    ) -> RelayResult<()> {
        let mut metadata = Metadata::from_value(meta, MetaScope::Test)?;
        if !self.session.is_running(name) {
            debug!("Test {} ended without a start event", name);
            self.start_test(name, meta)?;
        }
        let group_metadata = self.session.group_metadata.clone().ok_or_else(|| {
            RelayError::InvalidMetadata("group metadata is not a valid Metadata object".to_string())
        })?;
        // nothing below fails before the result is written
        let mut test = self.session.tests.remove(name).ok_or(RelayError::NoActiveSuite)?;

        for browser in &run_info.browsers {
            metadata.add_user_agent(&browser.pretty_user_agent);
            metadata.add_other_meta("browser", &browser.pretty_user_agent);
        }

        let mut messages = String::new();
        let mut details = String::new();

        if run_info.skipped {
            test.set_status(Status::Skipped);
        } else if run_info.has_errors() {
            test.set_status(Status::Failed);
            let errors = run_info
                .errs
                .iter()
                .map(|err| TestError::from_runner(err, &strip_ansi(&formatter.format_error(err))))
                .collect();
            describe_errors(&merge_errors(errors), &mut messages, &mut details);
        } else {
            test.set_status(Status::Passed);
        }

        for warning in &run_info.warnings {
            append_line(&mut messages, warning);
        }

        if run_info.unstable {
            metadata.set_flaky();
        }
        metadata.apply_to_test(&mut test, Some(&group_metadata), &self.config)?;
        if metadata.flaky {
            append_line(&mut messages, &self.config.labels.flaky);
        }

        match metadata.steps() {
            Some(steps) => self.add_steps_with_attachments(&mut test, run_info, steps),
            None => self.add_screenshot_attachments(&mut test, &run_info.screenshots),
        }

        if !messages.is_empty() {
            test.set_details_message(messages);
        }
        if !details.is_empty() {
            test.set_details_trace(details);
        }
        test.set_stage(Stage::Finished);

        let status = test.status().unwrap_or(Status::Broken);
        self.runtime.end_test(test)?;
        self.summary.record(status);
        info!("Reported {} ({})", name, status);
        Ok(())
    }

    /// Turn merged steps into report steps and hand each its screenshots.
    ///
    /// The runner keeps no link between a screenshot and the step that took
    /// it. Both lists are chronological, so step `i` owns the next
    /// `screenshot_amount` entries of the flat screenshot list.
    fn add_steps_with_attachments(&mut self, test: &mut AllureTest, run_info: &TestRunInfo, steps: &[TestStep]) {
        let merged = merge_steps(steps);
        let last = merged.len().saturating_sub(1);
        let mut cursor: usize = 0;

        for (i, step) in merged.iter().enumerate() {
            let mut report_step = test.start_step(&step.name);

            let available = run_info.screenshots.len();
            let wanted = cursor.saturating_add(step.screenshot_amount as usize);
            let end = wanted.min(available);
            if wanted > available {
                warn!(
                    "Step {} expects {} screenshot(s), only {} left",
                    step.name,
                    step.screenshot_amount,
                    available - cursor
                );
            }
            for screenshot in &run_info.screenshots[cursor..end] {
                self.add_screenshot_attachment(&mut report_step, screenshot);
            }
            cursor = end;
            for attachment in &step.attachments {
                self.add_step_attachment(&mut report_step, attachment);
            }

            // a step before the last cannot have failed, or the test would have stopped there
            if i == last {
                report_step.set_status(test.status());
            } else {
                report_step.set_status(Some(Status::Passed));
            }
            test.add_step(report_step.end());
        }
    }

    fn add_screenshot_attachments(&mut self, test: &mut AllureTest, screenshots: &[Screenshot]) {
        for screenshot in screenshots {
            self.add_screenshot_attachment(test, screenshot);
        }
    }

    fn add_screenshot_attachment(&mut self, item: &mut impl ExecutableItem, screenshot: &Screenshot) {
        let Some(path) = &screenshot.screenshot_path else {
            return;
        };
        let Ok(content) = std::fs::read(path) else {
            debug!("Screenshot {} is not readable, skipping", path.display());
            return;
        };

        let labels = &self.config.labels;
        let mut name = if screenshot.taken_on_fail {
            labels.screenshot_on_fail.clone()
        } else {
            labels.screenshot_manual.clone()
        };
        // tell browsers apart when several ran the same test
        if self.user_agents.len() > 1 {
            if let Some(user_agent) = &screenshot.user_agent {
                name = format!("{} - {}", name, user_agent);
            }
        }

        match self.runtime.write_attachment(&content, ContentType::Png) {
            Ok(source) => item.add_attachment(&name, ContentType::Png, &source),
            Err(e) => warn!("Could not write screenshot {}: {}", path.display(), e),
        }
    }

    fn add_step_attachment(&mut self, item: &mut impl ExecutableItem, attachment: &StepAttachment) {
        let Some(path) = &attachment.path else {
            return;
        };
        let Ok(content) = std::fs::read(path) else {
            debug!("Attachment {} is not readable, skipping", path.display());
            return;
        };

        match self.runtime.write_attachment(&content, attachment.content_type) {
            Ok(source) => item.add_attachment(&attachment.name, attachment.content_type, &source),
            Err(e) => warn!("Could not write attachment {}: {}", attachment.name, e),
        }
    }
}

fn describe_errors(errors: &[TestError], messages: &mut String, details: &mut String) {
    for error in errors {
        append_line(messages, &error.message_line());

        match &error.pretty {
            Some(pretty) => append_line(details, pretty),
            None => {
                if let Some(callsite) = &error.callsite {
                    if let Some(filename) = &callsite.filename {
                        append_line(details, &format!("File name: {}", filename));
                    }
                    if let Some(line) = callsite.line_num {
                        append_line(details, &format!("Line number: {}", line));
                    }
                }
                if let Some(user_agent) = &error.user_agent {
                    append_line(details, &format!("User Agent(s): {}", user_agent));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::Callsite;

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        summary.record(Status::Passed);
        summary.record(Status::Failed);
        summary.record(Status::Skipped);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_describe_errors_falls_back_to_callsite() {
        let errors = vec![
            TestError {
                title: "AssertionError: a".to_string(),
                pretty: Some("\n\nstack".to_string()),
                ..Default::default()
            },
            TestError {
                title: "Unhandled Exception: b".to_string(),
                code: Some("E2".to_string()),
                callsite: Some(Callsite {
                    filename: Some("cart.js".to_string()),
                    line_num: Some(7),
                }),
                user_agent: Some("Chrome, Firefox".to_string()),
                ..Default::default()
            },
        ];

        let mut messages = String::new();
        let mut details = String::new();
        describe_errors(&errors, &mut messages, &mut details);

        assert_eq!(messages, "AssertionError: a\nE2 - Unhandled Exception: b");
        assert_eq!(
            details,
            "\n\nstack\nFile name: cart.js\nLine number: 7\nUser Agent(s): Chrome, Firefox"
        );
    }
}
