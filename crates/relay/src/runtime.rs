//! Report runtime: group, test and step handles
//!
//! Handles are plain owned values. A test handle is built up while the test
//! runs and handed back to [`AllureRuntime::end_test`] to be written.

use indexmap::IndexMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::RelayResult;
use crate::model::{
    Attachment, Category, ContentType, Label, LabelName, Parameter, Stage, Status,
    StatusDetails, StepResult, TestResult, TestResultContainer,
};
use crate::writer::ResultsWriter;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Anything that can carry attachments
pub trait ExecutableItem {
    fn add_attachment(&mut self, name: &str, content_type: ContentType, source: &str);
}

/// Entry point for creating report items
pub struct AllureRuntime<W: ResultsWriter> {
    writer: W,
}

impl<W: ResultsWriter> AllureRuntime<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    pub fn start_group(&self, name: &str) -> AllureGroup {
        AllureGroup {
            container: TestResultContainer {
                uuid: Uuid::new_v4().to_string(),
                name: name.to_string(),
                children: Vec::new(),
                start: now_millis(),
                stop: None,
            },
        }
    }

    /// Close a group and write its container
    pub fn end_group(&mut self, mut group: AllureGroup) -> RelayResult<()> {
        group.container.stop = Some(now_millis());
        debug!("Ending group {} with {} test(s)", group.container.name, group.container.children.len());
        self.writer.write_container(&group.container)
    }

    /// Close a test and write its result
    pub fn end_test(&mut self, mut test: AllureTest) -> RelayResult<()> {
        test.result.stop = Some(now_millis());
        debug!("Ending test {}", test.result.name);
        self.writer.write_result(&test.result)
    }

    /// Store attachment bytes and return the source name to reference them by
    pub fn write_attachment(&mut self, content: &[u8], content_type: ContentType) -> RelayResult<String> {
        let source = format!("{}-attachment.{}", Uuid::new_v4(), content_type.extension());
        self.writer.write_attachment(&source, content)?;
        Ok(source)
    }

    pub fn write_categories(&mut self, categories: &[Category]) -> RelayResult<()> {
        self.writer.write_categories(categories)
    }

    pub fn write_environment(&mut self, environment: &IndexMap<String, String>) -> RelayResult<()> {
        self.writer.write_environment(environment)
    }
}

/// An open fixture
#[derive(Debug, Clone)]
pub struct AllureGroup {
    container: TestResultContainer,
}

impl AllureGroup {
    pub fn name(&self) -> &str {
        &self.container.name
    }

    /// Start a test belonging to this group
    pub fn start_test(&mut self, name: &str) -> AllureTest {
        let uuid = Uuid::new_v4().to_string();
        self.container.children.push(uuid.clone());

        AllureTest {
            result: TestResult {
                uuid,
                history_id: String::new(),
                full_name: String::new(),
                name: name.to_string(),
                status: None,
                status_details: StatusDetails::default(),
                stage: Stage::Scheduled,
                description: None,
                description_html: None,
                steps: Vec::new(),
                attachments: Vec::new(),
                parameters: Vec::new(),
                labels: Vec::new(),
                links: Vec::new(),
                start: now_millis(),
                stop: None,
            },
        }
    }
}

/// An open test
#[derive(Debug, Clone)]
pub struct AllureTest {
    result: TestResult,
}

impl AllureTest {
    pub fn result(&self) -> &TestResult {
        &self.result
    }

    pub fn status(&self) -> Option<Status> {
        self.result.status
    }

    pub fn set_status(&mut self, status: Status) {
        self.result.status = Some(status);
    }

    pub fn set_stage(&mut self, stage: Stage) {
        self.result.stage = stage;
    }

    pub fn set_full_name(&mut self, full_name: String) {
        self.result.full_name = full_name;
    }

    pub fn set_history_id(&mut self, history_id: String) {
        self.result.history_id = history_id;
    }

    pub fn set_description_html(&mut self, html: String) {
        self.result.description_html = Some(html);
    }

    pub fn set_details_message(&mut self, message: String) {
        self.result.status_details.message = Some(message);
    }

    pub fn set_details_trace(&mut self, trace: String) {
        self.result.status_details.trace = Some(trace);
    }

    pub fn set_flaky(&mut self, flaky: bool) {
        self.result.status_details.flaky = flaky;
    }

    pub fn add_label(&mut self, name: LabelName, value: &str) {
        self.result.labels.push(Label {
            name: name.as_str().to_string(),
            value: value.to_string(),
        });
    }

    pub fn add_parameter(&mut self, name: &str, value: &str) {
        self.result.parameters.push(Parameter {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn start_step(&self, name: &str) -> AllureStep {
        AllureStep {
            result: StepResult {
                name: name.to_string(),
                status: None,
                status_details: StatusDetails::default(),
                stage: Stage::Running,
                steps: Vec::new(),
                attachments: Vec::new(),
                parameters: Vec::new(),
                start: now_millis(),
                stop: None,
            },
        }
    }

    /// Attach a finished step
    pub fn add_step(&mut self, step: StepResult) {
        self.result.steps.push(step);
    }
}

impl ExecutableItem for AllureTest {
    fn add_attachment(&mut self, name: &str, content_type: ContentType, source: &str) {
        self.result.attachments.push(Attachment {
            name: name.to_string(),
            content_type: content_type.mime().to_string(),
            source: source.to_string(),
        });
    }
}

/// An open step
#[derive(Debug, Clone)]
pub struct AllureStep {
    result: StepResult,
}

impl AllureStep {
    pub fn set_status(&mut self, status: Option<Status>) {
        self.result.status = status;
    }

    /// Finish the step
    pub fn end(mut self) -> StepResult {
        self.result.stage = Stage::Finished;
        self.result.stop = Some(now_millis());
        self.result
    }
}

impl ExecutableItem for AllureStep {
    fn add_attachment(&mut self, name: &str, content_type: ContentType, source: &str) {
        self.result.attachments.push(Attachment {
            name: name.to_string(),
            content_type: content_type.mime().to_string(),
            source: source.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::MemoryWriter;

    #[test]
    fn test_group_tracks_children() {
        let mut runtime = AllureRuntime::new(MemoryWriter::new());
        let mut group = runtime.start_group("Checkout");
        let first = group.start_test("pays by card");
        let second = group.start_test("pays by invoice");

        runtime.end_test(first).unwrap();
        runtime.end_test(second).unwrap();
        runtime.end_group(group).unwrap();

        let writer = runtime.writer();
        assert_eq!(writer.results.len(), 2);
        assert_eq!(writer.containers.len(), 1);
        assert_eq!(writer.containers[0].children.len(), 2);
        assert!(writer.containers[0].children.contains(&writer.results[0].uuid));
        assert!(writer.results.iter().all(|r| r.stop.is_some()));
    }

    #[test]
    fn test_step_end_finishes_stage() {
        let runtime = AllureRuntime::new(MemoryWriter::new());
        let mut group = runtime.start_group("g");
        let mut test = group.start_test("t");
        let mut step = test.start_step("open page");
        step.add_attachment("shot", ContentType::Png, "a-attachment.png");
        step.set_status(Some(Status::Passed));
        test.add_step(step.end());

        let step = &test.result().steps[0];
        assert_eq!(step.stage, Stage::Finished);
        assert_eq!(step.attachments[0].content_type, "image/png");
    }

    #[test]
    fn test_write_attachment_uses_extension() {
        let mut runtime = AllureRuntime::new(MemoryWriter::new());
        let source = runtime.write_attachment(b"png-bytes", ContentType::Png).unwrap();
        assert!(source.ends_with("-attachment.png"));
        assert_eq!(runtime.writer().attachments[&source], b"png-bytes".to_vec());
    }
}
