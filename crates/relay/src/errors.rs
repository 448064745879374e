//! Runner error text parsing and error merging
//!
//! The runner renders errors as free text. Classification and slicing below
//! reproduce the exact offsets the runner's message shapes require, including
//! the JavaScript `substring` clamping rules, so a change in the upstream
//! format only has to be handled here.

use crate::runner::{Callsite, RunnerError};

const PARAGRAPH_BREAK: &str = "\n\n";

/// Kind of failure a rendered error describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Assertion,
    BeforeHook,
    UnhandledException,
}

impl ErrorKind {
    /// Marker text the runner puts into the rendered error
    pub fn marker(&self) -> &'static str {
        match self {
            ErrorKind::Assertion => "AssertionError",
            ErrorKind::BeforeHook => "- Error in test.before hook -\n",
            ErrorKind::UnhandledException => "Unhandled Exception",
        }
    }

    /// Offset of the message inside the rendered text
    fn message_offset(&self) -> isize {
        match self {
            // skip the ": " after the marker
            ErrorKind::Assertion => self.marker().len() as isize + 2,
            ErrorKind::BeforeHook => self.marker().len() as isize,
            ErrorKind::UnhandledException => 0,
        }
    }

    fn classify(text: &str) -> Self {
        if text.contains(ErrorKind::Assertion.marker()) {
            ErrorKind::Assertion
        } else if text.contains(ErrorKind::BeforeHook.marker()) {
            ErrorKind::BeforeHook
        } else {
            ErrorKind::UnhandledException
        }
    }
}

/// Result of parsing one rendered error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedError {
    pub kind: ErrorKind,
    pub message: String,
    pub pretty: String,
}

impl ParsedError {
    pub fn title(&self) -> String {
        format!("{}: {}", self.kind.marker(), self.message)
    }
}

/// Remove ANSI color and control sequences from runner output
pub fn strip_ansi(text: &str) -> String {
    String::from_utf8_lossy(&strip_ansi_escapes::strip(text.as_bytes())).into_owned()
}

/// Classify a rendered error and split it into message and trace
pub fn parse_error_text(text: &str) -> ParsedError {
    let kind = ErrorKind::classify(text);
    let break_at = text.find(PARAGRAPH_BREAK).map_or(-1, |i| i as isize);

    ParsedError {
        kind,
        message: js_substring(text, kind.message_offset(), Some(break_at)).to_string(),
        pretty: js_substring(text, break_at, None).to_string(),
    }
}

/// `String.prototype.substring` over byte offsets: bounds clamp into the
/// string and are swapped when reversed.
fn js_substring(text: &str, start: isize, end: Option<isize>) -> &str {
    let len = text.len() as isize;
    let clamp = |i: isize| i.clamp(0, len) as usize;

    let mut from = clamp(start);
    let mut to = end.map_or(text.len(), clamp);
    if from > to {
        std::mem::swap(&mut from, &mut to);
    }

    text.get(floor_char_boundary(text, from)..floor_char_boundary(text, to))
        .unwrap_or_default()
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// An error ready to be reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestError {
    pub title: String,
    pub pretty: Option<String>,
    pub code: Option<String>,
    pub callsite: Option<Callsite>,

    /// Comma separated list of the user agents the error occurred in
    pub user_agent: Option<String>,
}

impl TestError {
    /// Build from a runner error and its stripped, rendered text
    pub fn from_runner(err: &RunnerError, rendered: &str) -> Self {
        let parsed = parse_error_text(rendered);
        Self {
            title: parsed.title(),
            pretty: Some(parsed.pretty).filter(|p| !p.is_empty()),
            code: err.code.clone(),
            callsite: err.callsite.clone(),
            user_agent: err.user_agent.clone(),
        }
    }

    /// Title line shown in the status message
    pub fn message_line(&self) -> String {
        match &self.code {
            Some(code) => format!("{} - {}", code, self.title),
            None => self.title.clone(),
        }
    }

    fn absorb_user_agent(&mut self, user_agent: &str) {
        match &mut self.user_agent {
            Some(existing) => {
                if !existing.split(", ").any(|ua| ua == user_agent) {
                    existing.push_str(", ");
                    existing.push_str(user_agent);
                }
            }
            None => self.user_agent = Some(user_agent.to_string()),
        }
    }
}

/// Merge errors sharing a title, keeping first-seen order
pub fn merge_errors(errors: Vec<TestError>) -> Vec<TestError> {
    let mut merged: Vec<TestError> = Vec::new();

    for error in errors {
        if error.title.is_empty() {
            continue;
        }
        match merged.iter_mut().find(|m| m.title == error.title) {
            Some(existing) => {
                if let Some(ua) = &error.user_agent {
                    existing.absorb_user_agent(ua);
                }
            }
            None => merged.push(error),
        }
    }

    merged
}

/// Append a line, separating it from existing text with a newline
pub(crate) fn append_line(text: &mut String, line: &str) {
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn error(title: &str, ua: Option<&str>) -> TestError {
        TestError {
            title: title.to_string(),
            user_agent: ua.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_assertion_error() {
        let parsed = parse_error_text("AssertionError: expected true\n\ndetails...");
        assert_eq!(parsed.kind, ErrorKind::Assertion);
        assert_eq!(parsed.message, "expected true");
        assert_eq!(parsed.title(), "AssertionError: expected true");
        assert_eq!(parsed.pretty, "\n\ndetails...");
    }

    #[test]
    fn test_before_hook_error() {
        let text = "- Error in test.before hook -\nCannot find element\n\nBrowser: Chrome";
        let parsed = parse_error_text(text);
        assert_eq!(parsed.kind, ErrorKind::BeforeHook);
        assert_eq!(parsed.message, "Cannot find element");
        assert_eq!(parsed.pretty, "\n\nBrowser: Chrome");
    }

    #[test]
    fn test_unhandled_exception() {
        let parsed = parse_error_text("TypeError: x is undefined\n\nat page.js:3");
        assert_eq!(parsed.kind, ErrorKind::UnhandledException);
        assert_eq!(parsed.title(), "Unhandled Exception: TypeError: x is undefined");
        assert_eq!(parsed.pretty, "\n\nat page.js:3");
    }

    #[rstest]
    #[case::assertion_without_break("AssertionError: short", "AssertionError: ", "AssertionError: short")]
    #[case::unhandled_without_break("plain failure", "", "plain failure")]
    fn test_missing_paragraph_break(#[case] text: &str, #[case] message: &str, #[case] pretty: &str) {
        // no break means an end index of -1, which substring clamps and swaps
        let parsed = parse_error_text(text);
        assert_eq!(parsed.message, message);
        assert_eq!(parsed.pretty, pretty);
    }

    #[test]
    fn test_assertion_marker_late_in_text() {
        let parsed = parse_error_text("Step failed\n\nAssertionError: boom");
        assert_eq!(parsed.kind, ErrorKind::Assertion);
        // start 16 lies past the break at 11, so the bounds swap
        assert_eq!(parsed.message, "\n\nAss");
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\u{1b}[31mAssertionError\u{1b}[39m: x"), "AssertionError: x");
    }

    #[test]
    fn test_merge_unions_user_agents_in_order() {
        let merged = merge_errors(vec![
            error("AssertionError: a", Some("Chrome")),
            error("AssertionError: b", Some("Chrome")),
            error("AssertionError: a", Some("Firefox")),
            error("AssertionError: a", Some("Chrome")),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title, "AssertionError: a");
        assert_eq!(merged[0].user_agent.as_deref(), Some("Chrome, Firefox"));
        assert_eq!(merged[1].user_agent.as_deref(), Some("Chrome"));
    }

    #[test]
    fn test_merge_skips_untitled() {
        let merged = merge_errors(vec![error("", Some("Chrome")), error("x", None)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "x");
    }

    #[test]
    fn test_message_line_includes_code() {
        let mut err = error("AssertionError: a", None);
        assert_eq!(err.message_line(), "AssertionError: a");
        err.code = Some("E53".to_string());
        assert_eq!(err.message_line(), "E53 - AssertionError: a");
    }

    #[test]
    fn test_append_line() {
        let mut text = String::new();
        append_line(&mut text, "first");
        append_line(&mut text, "second");
        assert_eq!(text, "first\nsecond");
    }
}
