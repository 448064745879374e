//! Report Command
//!
//! Replays a runner event stream through the reporter.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Color;
use serde::Serialize;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{debug, info};

use allure_relay::{AllureReporter, FileSystemWriter, ReporterConfig, ResultsWriter, RunSummary};

use crate::events::{read_events, EventErrorFormatter, RunnerEvent};
use crate::output::{print_row, print_warning, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ReportArgs {
    /// JSON Lines file of runner events, `-` for stdin
    #[arg(short, long, default_value = "-")]
    pub events: PathBuf,

    /// Remove previous results before writing
    #[arg(long)]
    pub clean: bool,
}

/// Run summary for display
#[derive(Serialize)]
pub struct SummaryRow {
    #[serde(flatten)]
    pub summary: RunSummary,
    pub results_dir: String,
}

impl TableDisplay for SummaryRow {
    fn headers() -> Vec<&'static str> {
        vec!["Total", "Passed", "Failed", "Broken", "Skipped", "Results"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.summary.total.to_string(),
            self.summary.passed.to_string(),
            self.summary.failed.to_string(),
            self.summary.broken.to_string(),
            self.summary.skipped.to_string(),
            self.results_dir.clone(),
        ]
    }

    fn highlight(&self, index: usize) -> Option<Color> {
        match index {
            1 if self.summary.passed > 0 => Some(Color::Green),
            2 if self.summary.failed > 0 => Some(Color::Red),
            3 if self.summary.broken > 0 => Some(Color::Yellow),
            _ => None,
        }
    }
}

pub fn execute(args: ReportArgs, config: ReporterConfig, format: OutputFormat) -> Result<()> {
    let events = if args.events.as_os_str() == "-" {
        read_events(std::io::stdin().lock())?
    } else {
        let file = std::fs::File::open(&args.events)
            .with_context(|| format!("Failed to open {}", args.events.display()))?;
        read_events(BufReader::new(file))?
    };
    debug!("Read {} event(s)", events.len());

    let results_dir = config.result_dir.clone();
    let writer = FileSystemWriter::new(&results_dir, args.clean || config.clean_results)
        .with_context(|| format!("Failed to prepare {}", results_dir.display()))?;
    let mut reporter = AllureReporter::new(config, writer);

    let finished = replay(&mut reporter, events)?;
    if !finished {
        print_warning("Event stream ended without taskDone; closing the run");
        finish(&mut reporter)?;
    }

    print_row(
        &SummaryRow {
            summary: reporter.summary().clone(),
            results_dir: results_dir.display().to_string(),
        },
        format,
    );
    Ok(())
}

/// Feed events to the reporter. Returns whether the task completed.
pub fn replay<W: ResultsWriter>(reporter: &mut AllureReporter<W>, events: Vec<RunnerEvent>) -> Result<bool> {
    for event in events {
        match event {
            RunnerEvent::TaskStart { user_agents } => {
                info!("Run started in {} browser(s)", user_agents.len());
                reporter.set_user_agents(user_agents);
            }
            RunnerEvent::FixtureStart { name, meta } => {
                reporter
                    .start_group(&name, &meta)
                    .with_context(|| format!("Fixture {}", name))?;
            }
            RunnerEvent::TestStart { name, meta } => {
                reporter
                    .start_test(&name, &meta)
                    .with_context(|| format!("Test {}", name))?;
            }
            RunnerEvent::TestDone { name, run_info, meta } => {
                reporter
                    .end_test(&name, &run_info, &meta, &EventErrorFormatter)
                    .with_context(|| format!("Test {}", name))?;
            }
            RunnerEvent::TaskDone => {
                finish(reporter)?;
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn finish<W: ResultsWriter>(reporter: &mut AllureReporter<W>) -> Result<()> {
    reporter.end_group()?;
    reporter.set_globals().context("Failed to write categories and environment")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use allure_relay::MemoryWriter;

    #[test]
    fn test_replay_full_task() {
        let input = r#"
{"event": "taskStart", "userAgents": ["Chrome 120"]}
{"event": "fixtureStart", "name": "Checkout", "meta": {"epic": "Shop [EP-1]"}}
{"event": "testStart", "name": "pays"}
{"event": "testDone", "name": "pays", "runInfo": {"errs": [{"errMsg": "AssertionError: no total"}]}}
{"event": "testDone", "name": "refunds", "runInfo": {}}
{"event": "taskDone"}
"#;
        let events = read_events(input.as_bytes()).unwrap();
        let mut reporter = AllureReporter::new(ReporterConfig::default(), MemoryWriter::new());

        assert!(replay(&mut reporter, events).unwrap());

        let summary = reporter.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.passed, 1);

        let writer = reporter.writer();
        assert_eq!(writer.containers.len(), 1);
        assert_eq!(writer.environment["Browsers"], "Chrome 120");
        assert!(!writer.categories.is_empty());
        let pays = writer.result("pays").unwrap();
        assert_eq!(
            pays.status_details.message.as_deref(),
            Some("AssertionError: no total")
        );
    }

    #[test]
    fn test_replay_test_before_fixture_fails() {
        let events = read_events(r#"{"event": "testStart", "name": "early"}"#.as_bytes()).unwrap();
        let mut reporter = AllureReporter::new(ReporterConfig::default(), MemoryWriter::new());
        let err = replay(&mut reporter, events).unwrap_err();
        assert!(format!("{:#}", err).contains("No active suite"));
    }

    #[test]
    fn test_replay_without_task_done() {
        let events = read_events(r#"{"event": "fixtureStart", "name": "Open"}"#.as_bytes()).unwrap();
        let mut reporter = AllureReporter::new(ReporterConfig::default(), MemoryWriter::new());
        assert!(!replay(&mut reporter, events).unwrap());
        assert!(reporter.session().has_active_group());
    }
}
