//! Runner event stream
//!
//! The runner side emits one JSON object per line, tagged by `event`.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::io::BufRead;

use allure_relay::runner::RunnerError;
use allure_relay::{ErrorFormatter, TestRunInfo};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RunnerEvent {
    TaskStart {
        #[serde(default, rename = "userAgents")]
        user_agents: Vec<String>,
    },
    FixtureStart {
        name: String,
        #[serde(default)]
        meta: Value,
    },
    TestStart {
        name: String,
        #[serde(default)]
        meta: Value,
    },
    TestDone {
        name: String,
        #[serde(default, rename = "runInfo")]
        run_info: TestRunInfo,
        #[serde(default)]
        meta: Value,
    },
    TaskDone,
}

/// Parse every non-blank line of the stream
pub fn read_events(reader: impl BufRead) -> Result<Vec<RunnerEvent>> {
    let mut events = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read event line {}", index + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid event on line {}", index + 1))?;
        events.push(event);
    }

    Ok(events)
}

/// Formats errors from the text the runner rendered into the event.
///
/// Errors without rendered text fall back to the raw message, shaped the way
/// the runner renders them so the parser still finds a title.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventErrorFormatter;

impl ErrorFormatter for EventErrorFormatter {
    fn format_error(&self, err: &RunnerError) -> String {
        if let Some(formatted) = &err.formatted {
            return formatted.clone();
        }
        let message = err
            .err_msg
            .clone()
            .or_else(|| err.code.clone())
            .unwrap_or_default();
        match &err.user_agent {
            Some(user_agent) => format!("{}\n\nBrowser: {}", message, user_agent),
            None => format!("{}\n\n", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_events() {
        let input = r#"
{"event": "taskStart", "userAgents": ["Chrome 120", "Firefox 121"]}
{"event": "fixtureStart", "name": "Checkout", "meta": {"suite": "Shop"}}

{"event": "testStart", "name": "pays"}
{"event": "testDone", "name": "pays", "runInfo": {"skipped": true}, "meta": {"severity": "critical"}}
{"event": "taskDone"}
"#;
        let events = read_events(input.as_bytes()).unwrap();
        assert_eq!(events.len(), 5);
        assert!(matches!(&events[0], RunnerEvent::TaskStart { user_agents } if user_agents.len() == 2));
        assert!(matches!(&events[3], RunnerEvent::TestDone { run_info, .. } if run_info.skipped));
        assert!(matches!(events[4], RunnerEvent::TaskDone));
    }

    #[test]
    fn test_invalid_line_is_reported() {
        let err = read_events("{\"event\": \"taskDone\"}\nnot json\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_formatter_fallback_keeps_paragraph_break() {
        let err = RunnerError {
            err_msg: Some("AssertionError: expected 1 to equal 2".to_string()),
            user_agent: Some("Chrome 120".to_string()),
            ..Default::default()
        };
        assert_eq!(
            EventErrorFormatter.format_error(&err),
            "AssertionError: expected 1 to equal 2\n\nBrowser: Chrome 120"
        );
    }
}
