//! Objects handed over by the test runner
//!
//! Field names mirror the runner's own JSON so run-info payloads can be
//! deserialized as-is.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one test as reported by the runner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestRunInfo {
    pub errs: Vec<RunnerError>,
    pub warnings: Vec<String>,
    pub skipped: bool,

    /// Set when the runner detected a nondeterministic outcome
    pub unstable: bool,

    /// Screenshots in the order they were taken
    pub screenshots: Vec<Screenshot>,
    pub browsers: Vec<BrowserInfo>,
}

impl TestRunInfo {
    pub fn has_errors(&self) -> bool {
        !self.errs.is_empty()
    }
}

/// Raw error object from the runner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerError {
    pub code: Option<String>,
    pub user_agent: Option<String>,
    pub callsite: Option<Callsite>,
    pub err_msg: Option<String>,

    /// Error text as rendered by the runner's own formatter, if it was captured
    pub formatted: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Callsite {
    pub filename: Option<String>,
    pub line_num: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Screenshot {
    pub screenshot_path: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub taken_on_fail: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserInfo {
    pub name: Option<String>,
    pub alias: Option<String>,
    pub pretty_user_agent: String,
}

/// Renders a runner error into the text the error parser understands
pub trait ErrorFormatter {
    fn format_error(&self, err: &RunnerError) -> String;
}

/// Uses the runner's pre-rendered text, falling back to the raw message
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainErrorFormatter;

impl ErrorFormatter for PlainErrorFormatter {
    fn format_error(&self, err: &RunnerError) -> String {
        if let Some(formatted) = &err.formatted {
            return formatted.clone();
        }
        match (&err.err_msg, &err.code) {
            (Some(msg), _) => msg.clone(),
            (None, Some(code)) => code.clone(),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_info() {
        let json = r#"{
            "errs": [{"code": "E53", "userAgent": "Chrome 120", "callsite": {"filename": "login.js", "lineNum": 12}}],
            "warnings": ["slow selector"],
            "skipped": false,
            "unstable": true,
            "screenshots": [{"screenshotPath": "/tmp/1.png", "takenOnFail": true, "userAgent": "Chrome 120"}],
            "browsers": [{"name": "chrome", "prettyUserAgent": "Chrome 120 / Linux"}],
            "durationMs": 1500
        }"#;

        let info: TestRunInfo = serde_json::from_str(json).unwrap();
        assert!(info.has_errors());
        assert!(info.unstable);
        assert_eq!(info.errs[0].callsite.as_ref().unwrap().line_num, Some(12));
        assert!(info.screenshots[0].taken_on_fail);
        assert_eq!(info.browsers[0].pretty_user_agent, "Chrome 120 / Linux");
    }

    #[test]
    fn test_plain_formatter_prefers_rendered_text() {
        let err = RunnerError {
            formatted: Some("AssertionError: nope\n\nat line 1".to_string()),
            err_msg: Some("nope".to_string()),
            ..Default::default()
        };
        assert_eq!(PlainErrorFormatter.format_error(&err), "AssertionError: nope\n\nat line 1");

        let bare = RunnerError {
            code: Some("E1".to_string()),
            ..Default::default()
        };
        assert_eq!(PlainErrorFormatter.format_error(&bare), "E1");
    }
}
