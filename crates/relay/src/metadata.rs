//! Test and fixture metadata
//!
//! Metadata arrives as an untyped JSON object. Known keys are validated into
//! typed fields; any other string value is kept as a free-form parameter.
//! Values that fail validation are ignored rather than rejected, matching how
//! the runner passes user-written metadata through untouched.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ReporterConfig;
use crate::error::{RelayError, RelayResult};
use crate::model::{LabelName, Priority, Severity};
use crate::runtime::AllureTest;
use crate::step::{TestStep, STEPS_KEY};

static BRACKET_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.*?)\]").expect("valid regex"));

const EPIC_ICON: &str = "bolt";
const STORY_ICON: &str = "bookmark";
const ISSUE_ICON: &str = "check-square";

/// Where a metadata object was supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaScope {
    /// Fixture level, supplied when a group starts
    Group,
    /// Test level, supplied when a test ends
    Test,
}

/// Keys with a dedicated meaning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaKey {
    Severity,
    Priority,
    Description,
    Issue,
    Suite,
    Epic,
    Story,
    Feature,
    Flaky,
    Steps,
    UserStory,
    TestCase,
}

impl MetaKey {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "severity" => Some(MetaKey::Severity),
            "priority" => Some(MetaKey::Priority),
            "description" => Some(MetaKey::Description),
            "issue" => Some(MetaKey::Issue),
            "suite" => Some(MetaKey::Suite),
            "epic" => Some(MetaKey::Epic),
            "story" => Some(MetaKey::Story),
            "feature" => Some(MetaKey::Feature),
            "flaky" => Some(MetaKey::Flaky),
            STEPS_KEY => Some(MetaKey::Steps),
            "user_story" => Some(MetaKey::UserStory),
            "test_case" => Some(MetaKey::TestCase),
            _ => None,
        }
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Id between the first pair of square brackets, e.g. `JIRA-1` in `Checkout [JIRA-1]`
pub fn extract_bracket_id(text: &str) -> Option<&str> {
    BRACKET_ID
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Descriptive fields of a test or fixture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub severity: Option<Severity>,
    pub priority: Option<Priority>,
    pub description: String,
    pub issue: Option<String>,
    pub parent_suite: Option<String>,
    pub suite: Option<String>,
    pub sub_suite: Option<String>,
    pub epic: Option<String>,
    pub story: Option<String>,
    pub feature: Option<String>,
    pub flaky: bool,
    pub steps: Option<Vec<TestStep>>,
    pub user_story: Option<String>,
    pub test_case: Option<String>,

    /// Free-form string values, reported as parameters
    pub other_meta: IndexMap<String, String>,

    links: Vec<String>,
    user_agents: Vec<String>,
}

impl Metadata {
    /// Build from the object the runner passed along.
    ///
    /// `null` yields empty metadata; any other non-object value is rejected.
    pub fn from_value(value: &Value, scope: MetaScope) -> RelayResult<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self::from_map(map, scope)),
            other => Err(RelayError::InvalidMetadata(format!(
                "expected an object, found {}",
                other
            ))),
        }
    }

    pub fn from_map(map: &Map<String, Value>, scope: MetaScope) -> Self {
        let mut meta = Self::default();

        for (key, value) in map {
            match MetaKey::parse(key) {
                Some(known) => meta.apply_known(known, value, scope),
                None => {
                    if let Some(s) = non_empty_str(value) {
                        meta.other_meta.insert(key.clone(), s);
                    }
                }
            }
        }

        meta
    }

    fn apply_known(&mut self, key: MetaKey, value: &Value, scope: MetaScope) {
        match key {
            MetaKey::Severity => {
                self.severity = non_empty_str(value).and_then(|s| s.parse().ok());
            }
            MetaKey::Priority => {
                self.priority = non_empty_str(value).and_then(|s| s.parse().ok());
            }
            MetaKey::Description => {
                if let Some(s) = non_empty_str(value) {
                    self.description = s;
                }
            }
            MetaKey::Issue => self.issue = non_empty_str(value),
            MetaKey::Suite => match scope {
                MetaScope::Test => self.sub_suite = non_empty_str(value),
                MetaScope::Group => self.parent_suite = non_empty_str(value),
            },
            MetaKey::Epic => self.epic = non_empty_str(value),
            MetaKey::Story => self.story = non_empty_str(value),
            MetaKey::Feature => self.feature = non_empty_str(value),
            MetaKey::Flaky => {
                if let Value::Bool(b) = value {
                    self.flaky = *b;
                }
            }
            MetaKey::Steps => self.steps = parse_steps(value),
            MetaKey::UserStory => self.user_story = non_empty_str(value),
            MetaKey::TestCase => self.test_case = non_empty_str(value),
        }
    }

    pub fn set_flaky(&mut self) {
        self.flaky = true;
    }

    pub fn add_description(&mut self, text: &str) {
        self.description.push_str(text);
    }

    pub fn add_other_meta(&mut self, key: &str, value: &str) {
        self.other_meta.insert(key.to_string(), value.to_string());
    }

    /// Record the user agents the test ran in; shown below the description
    pub fn add_user_agent(&mut self, user_agent: &str) {
        self.user_agents.push(user_agent.to_string());
    }

    /// Queue a link for the description's link section
    pub fn add_link(&mut self, url: &str, text: &str, icon: &str) {
        self.links.push(format!(
            "<a class='link' href='{}' target='_blank'><i class='fa fa-{}'></i> {}</a>",
            url, icon, text
        ));
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// Steps recorded by test code, if any were
    pub fn steps(&self) -> Option<&[TestStep]> {
        self.steps.as_deref().filter(|s| !s.is_empty())
    }

    /// Fill unset fields from fixture-level metadata. Local values win.
    pub fn merge(&mut self, group: &Metadata) {
        fn fill<T: Clone>(local: &mut Option<T>, group: &Option<T>) {
            if local.is_none() {
                local.clone_from(group);
            }
        }

        fill(&mut self.severity, &group.severity);
        fill(&mut self.priority, &group.priority);
        if self.description.is_empty() {
            self.description.clone_from(&group.description);
        }
        fill(&mut self.issue, &group.issue);
        // sub suite is test-level only
        fill(&mut self.parent_suite, &group.parent_suite);
        fill(&mut self.suite, &group.suite);
        fill(&mut self.epic, &group.epic);
        fill(&mut self.story, &group.story);
        fill(&mut self.feature, &group.feature);
        fill(&mut self.user_story, &group.user_story);
        fill(&mut self.test_case, &group.test_case);
        if group.flaky {
            self.flaky = true;
        }
        for (key, value) in &group.other_meta {
            if !self.other_meta.contains_key(key) {
                self.other_meta.insert(key.clone(), value.clone());
            }
        }
    }

    /// Merge with the fixture metadata and write the result onto a test.
    ///
    /// Fails when no fixture metadata is available to merge with.
    pub fn apply_to_test(
        &mut self,
        test: &mut AllureTest,
        group: Option<&Metadata>,
        config: &ReporterConfig,
    ) -> RelayResult<()> {
        let group = group.ok_or_else(|| {
            RelayError::InvalidMetadata("group metadata is not a valid Metadata object".to_string())
        })?;
        self.merge(group);

        let severity = self.severity.unwrap_or(config.meta.severity);
        test.add_label(LabelName::Severity, severity.as_str());
        let priority = self.priority.unwrap_or(config.meta.priority);
        test.add_label(LabelName::Priority, priority.as_str());

        if let Some(parent_suite) = &self.parent_suite {
            test.add_label(LabelName::ParentSuite, parent_suite);
        }
        if let Some(suite) = &self.suite {
            test.add_label(LabelName::Suite, suite);
        }
        if let Some(sub_suite) = &self.sub_suite {
            test.add_label(LabelName::SubSuite, sub_suite);
        }

        self.apply_tracker_fields(test, config);

        if self.flaky {
            test.add_parameter(&config.labels.flaky, "true");
            test.set_flaky(true);
        }

        if let Some(html) = self.description_html() {
            test.set_description_html(html);
        }

        for (key, value) in &self.other_meta {
            test.add_parameter(key, value);
        }

        Ok(())
    }

    /// Epic/feature/story labels plus the issue-tracker links derived from them
    fn apply_tracker_fields(&mut self, test: &mut AllureTest, config: &ReporterConfig) {
        let base = config.meta.issue_url.clone();
        let labels = &config.labels;

        if let Some(epic) = self.epic.clone() {
            test.add_label(LabelName::Epic, &epic);
            if let Some(id) = extract_bracket_id(&epic) {
                self.add_link(&format!("{}{}", base, id), &format!("{}: {}", labels.epic, id), EPIC_ICON);
            }
        }
        if let Some(feature) = &self.feature {
            test.add_label(LabelName::Feature, feature);
        }
        if let Some(story) = self.story.clone() {
            test.add_label(LabelName::Story, &story);
            if let Some(id) = extract_bracket_id(&story) {
                self.add_link(&format!("{}{}", base, id), &format!("{}: {}", labels.story, id), STORY_ICON);
            }
        } else if let Some(user_story) = self.user_story.clone() {
            self.add_link(
                &format!("{}{}", base, user_story),
                &format!("{}: {}", labels.story, user_story),
                STORY_ICON,
            );
        }

        if let Some(issue) = self.issue.clone() {
            for id in issue.split(',') {
                self.add_link(&format!("{}{}", base, id), &format!("{}: {}", labels.issue, id), ISSUE_ICON);
            }
        } else if let Some(test_case) = self.test_case.clone() {
            self.add_link(
                &format!("{}{}", base, test_case),
                &format!("{}: {}", labels.issue, test_case),
                ISSUE_ICON,
            );
        }
    }

    /// Description as HTML, with priority and link sections appended
    pub fn description_html(&self) -> Option<String> {
        let mut source = self.description.clone();
        if !self.user_agents.is_empty() {
            source.push_str("<br/><strong>User Agent:</strong> ");
            source.push_str(&self.user_agents.join(", "));
        }
        if source.is_empty() && self.links.is_empty() && self.priority.is_none() {
            return None;
        }

        let mut html = source.split('\n').collect::<Vec<_>>().join("<br/>");
        html.push_str("<br/>");
        if let Some(priority) = self.priority {
            html.push_str(&format!(
                "<br/><strong>{}</strong>: {}",
                LabelName::Priority,
                priority.as_str()
            ));
        }
        html.push_str("<h3 class='pane__section-title'>Links</h3>");
        for link in &self.links {
            html.push_str(link);
            html.push_str("<br/>");
        }
        Some(html)
    }
}

fn parse_steps(value: &Value) -> Option<Vec<TestStep>> {
    let Value::Array(items) = value else {
        debug!("Ignoring non-list steps metadata");
        return None;
    };

    let steps = items
        .iter()
        .filter_map(|item| match serde_json::from_value::<TestStep>(item.clone()) {
            Ok(step) => Some(step),
            Err(e) => {
                debug!("Ignoring malformed step: {}", e);
                None
            }
        })
        .collect();
    Some(steps)
}
