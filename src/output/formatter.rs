//! Output formatters for batch reports
//!
//! Provides Table, JSON, CSV, and summary output formats, plus single-line
//! rendering of live events.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::executor::Event;
use crate::models::{BatchReport, TestSnapshot, TestStatus, UnitSnapshot};

const RESET: &str = "\x1b[0m";

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// One CSV row per test
#[derive(Serialize)]
struct CsvRow<'a> {
    suite: &'a str,
    test: &'a str,
    status: &'a str,
    duration_ms: Option<f64>,
    assertions: usize,
    error_message: &'a str,
}

/// Report formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format a single test line
    pub fn format_test(&self, test: &TestSnapshot) -> String {
        let duration = test
            .duration_ms
            .map(|ms| format!("{ms:>8.1}ms"))
            .unwrap_or_else(|| format!("{:>10}", "-"));

        let mut line = format!(
            "{} {:40} [{}]",
            self.status(test.status),
            test.name,
            duration
        );
        if !test.error_message.is_empty() {
            line.push_str(&format!("\n      {}", test.error_message));
        }
        line
    }

    fn status(&self, status: TestStatus) -> String {
        let text = format!("{} {:7}", status.symbol(), status);
        if self.colorize {
            format!("{}{}{}", status.color(), text, RESET)
        } else {
            text
        }
    }

    /// Format a finished batch
    pub fn format_report(&self, report: &BatchReport) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.format_report_table(report)),
            OutputFormat::Json => {
                serde_json::to_string(report).context("Failed to serialize report")
            }
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(report).context("Failed to serialize report")
            }
            OutputFormat::Csv => self.format_report_csv(report),
            OutputFormat::Summary => Ok(self.format_report_brief(report)),
        }
    }

    fn format_report_table(&self, report: &BatchReport) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  Batch {:4} - {:46} ║\n",
            report.batch,
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        for unit in &report.units {
            match unit {
                UnitSnapshot::Test(test) => {
                    output.push_str(&format!("  {}\n", self.format_test(test)));
                }
                UnitSnapshot::Suite(suite) => {
                    output.push_str(&format!("  {}\n", suite.name));
                    if let Some(error) = &suite.error {
                        let error = format!("! suite body panicked: {error}");
                        if self.colorize {
                            output.push_str(&format!("    \x1b[31m{error}{RESET}\n"));
                        } else {
                            output.push_str(&format!("    {error}\n"));
                        }
                    }
                    for test in &suite.tests {
                        output.push_str(&format!("    {}\n", self.format_test(test)));
                    }
                }
            }
        }

        output.push_str("────────────────────────────────────────────────────────────────\n");

        let pass_str = if self.colorize {
            format!("\x1b[32m{}{RESET}", report.passed)
        } else {
            report.passed.to_string()
        };
        let fail_str = if self.colorize && report.failed > 0 {
            format!("\x1b[31m{}{RESET}", report.failed)
        } else {
            report.failed.to_string()
        };

        output.push_str(&format!(
            "  Total: {} | Pass: {} | Fail: {} | Timeout: {} | Skip: {} | Error: {}\n",
            report.total, pass_str, fail_str, report.timed_out, report.skipped, report.errors
        ));
        output.push_str(&format!(
            "  Pass Rate: {:5.1}% | Duration: {:.1}ms\n",
            report.pass_rate(),
            report.elapsed_ms
        ));

        output
    }

    fn format_report_csv(&self, report: &BatchReport) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for test in report.tests() {
            writer
                .serialize(CsvRow {
                    suite: test.suite.as_deref().unwrap_or(""),
                    test: &test.name,
                    status: test.status.label(),
                    duration_ms: test.duration_ms,
                    assertions: test.assertions,
                    error_message: &test.error_message,
                })
                .context("Failed to write CSV row")?;
        }
        let bytes = writer.into_inner().context("Failed to flush CSV output")?;
        String::from_utf8(bytes).context("CSV output is not valid UTF-8")
    }

    fn format_report_brief(&self, report: &BatchReport) -> String {
        format!(
            "Batch {}: {}/{} passed ({:.1}%), {} failed, {} timed out, {} skipped in {:.1}ms",
            report.batch,
            report.passed,
            report.total,
            report.pass_rate(),
            report.failed,
            report.timed_out,
            report.skipped,
            report.elapsed_ms
        )
    }

    /// Render a live event as a single line; pending transitions are omitted
    pub fn format_event(&self, event: &Event) -> Option<String> {
        match event {
            Event::BatchStarted { batch, units } => {
                Some(format!("▶ batch {batch} started ({units} units)"))
            }
            Event::SuiteMaterialized { suite, tests } => {
                Some(format!("  {suite}: {} tests registered", tests.len()))
            }
            Event::TestUpdated(test) if test.status.is_settled() => {
                let name = match &test.suite {
                    Some(suite) => format!("{suite} › {}", test.name),
                    None => test.name.clone(),
                };
                Some(format!("  {} {}", self.status(test.status), name))
            }
            Event::TestUpdated(_) => None,
            Event::BatchFinished(report) => Some(format!("■ {}", self.format_report_brief(report))),
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SuiteSnapshot;
    use chrono::Utc;
    use std::time::Duration;

    fn snapshot(name: &str, suite: Option<&str>, status: TestStatus, error: &str) -> TestSnapshot {
        TestSnapshot {
            name: name.to_string(),
            suite: suite.map(str::to_string),
            status,
            duration_ms: Some(1.5),
            error_message: error.to_string(),
            assertions: 1,
        }
    }

    fn report() -> BatchReport {
        BatchReport::new(
            1,
            Utc::now(),
            Duration::from_millis(12),
            vec![
                UnitSnapshot::Test(snapshot("adds", None, TestStatus::Passed, "")),
                UnitSnapshot::Suite(SuiteSnapshot {
                    name: "math".to_string(),
                    error: None,
                    tests: vec![snapshot(
                        "bad",
                        Some("math"),
                        TestStatus::Failed,
                        "expected 4 to be 5, \"quoted\"",
                    )],
                }),
            ],
        )
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(
            OutputFormat::from_str("json-pretty"),
            Some(OutputFormat::JsonPretty)
        );
        assert_eq!(OutputFormat::from_str("unknown"), None);
    }

    #[test]
    fn test_table_without_color() {
        let formatter = ResultFormatter::new(OutputFormat::Table).no_color();
        assert_eq!(formatter.format(), OutputFormat::Table);
        let output = formatter.format_report(&report()).unwrap();

        assert!(!output.contains('\x1b'));
        assert!(output.contains("✓ PASS"));
        assert!(output.contains("✗ FAIL"));
        assert!(output.contains("expected 4 to be 5"));
        assert!(output.contains("Total: 2 | Pass: 1 | Fail: 1"));
    }

    #[test]
    fn test_table_with_color() {
        let output = ResultFormatter::default().format_report(&report()).unwrap();
        assert!(output.contains("\x1b[32m"));
    }

    #[test]
    fn test_json() {
        let output = ResultFormatter::new(OutputFormat::Json)
            .format_report(&report())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["passed"], 1);
        assert_eq!(value["units"][1]["kind"], "suite");
        assert_eq!(value["units"][1]["tests"][0]["status"], "failed");
    }

    #[test]
    fn test_csv_quotes_messages() {
        let output = ResultFormatter::new(OutputFormat::Csv)
            .format_report(&report())
            .unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(
            lines[0],
            "suite,test,status,duration_ms,assertions,error_message"
        );
        assert_eq!(lines[1], ",adds,Passed,1.5,1,");
        assert_eq!(
            lines[2],
            "math,bad,Failed,1.5,1,\"expected 4 to be 5, \"\"quoted\"\"\""
        );
    }

    #[test]
    fn test_summary() {
        let output = ResultFormatter::new(OutputFormat::Summary)
            .format_report(&report())
            .unwrap();
        assert!(output.starts_with("Batch 1: 1/2 passed (50.0%)"));
    }

    #[test]
    fn test_format_event() {
        let formatter = ResultFormatter::default().no_color();

        let pending = snapshot("adds", None, TestStatus::Pending, "");
        assert_eq!(formatter.format_event(&Event::TestUpdated(pending)), None);

        let failed = snapshot("bad", Some("math"), TestStatus::Failed, "");
        let line = formatter.format_event(&Event::TestUpdated(failed)).unwrap();
        assert!(line.contains("math › bad"));
        assert!(line.contains("FAIL"));

        let started = Event::BatchStarted { batch: 3, units: 2 };
        assert_eq!(
            formatter.format_event(&started).as_deref(),
            Some("▶ batch 3 started (2 units)")
        );
    }
}
