//! Snapshots and batch reports
//!
//! Read-only views of units, handed to reporters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::TestStatus;

/// Point-in-time view of a test unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestSnapshot {
    pub name: String,
    pub suite: Option<String>,
    pub status: TestStatus,
    pub duration_ms: Option<f64>,
    pub error_message: String,
    pub assertions: usize,
}

impl fmt::Display for TestSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.status.symbol())?;
        if let Some(suite) = &self.suite {
            write!(f, "{suite} › ")?;
        }
        write!(f, "{}", self.name)?;
        match self.duration_ms {
            Some(ms) => write!(f, " [{ms:.1}ms]")?,
            None => write!(f, " [?ms]")?,
        }
        if !self.error_message.is_empty() {
            write!(f, " - {}", self.error_message)?;
        }
        Ok(())
    }
}

/// Point-in-time view of a suite unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuiteSnapshot {
    pub name: String,
    /// Set when the suite body itself panicked while registering tests
    pub error: Option<String>,
    pub tests: Vec<TestSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UnitSnapshot {
    Test(TestSnapshot),
    Suite(SuiteSnapshot),
}

impl UnitSnapshot {
    pub fn name(&self) -> &str {
        match self {
            UnitSnapshot::Test(test) => &test.name,
            UnitSnapshot::Suite(suite) => &suite.name,
        }
    }
}

/// Summary of one batch run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch: u64,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub skipped: usize,
    /// Suites whose body panicked
    pub errors: usize,
    pub elapsed_ms: f64,
    pub units: Vec<UnitSnapshot>,
}

impl BatchReport {
    pub fn new(
        batch: u64,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        units: Vec<UnitSnapshot>,
    ) -> Self {
        let mut report = Self {
            batch,
            started_at,
            total: 0,
            passed: 0,
            failed: 0,
            timed_out: 0,
            skipped: 0,
            errors: 0,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            units,
        };

        report.errors = report
            .units
            .iter()
            .filter(|u| matches!(u, UnitSnapshot::Suite(s) if s.error.is_some()))
            .count();

        let statuses: Vec<TestStatus> = report.tests().map(|t| t.status).collect();
        report.total = statuses.len();
        report.passed = statuses.iter().filter(|s| **s == TestStatus::Passed).count();
        report.failed = statuses.iter().filter(|s| **s == TestStatus::Failed).count();
        report.timed_out = statuses.iter().filter(|s| **s == TestStatus::Timeout).count();
        report.skipped = statuses.iter().filter(|s| **s == TestStatus::Skipped).count();

        report
    }

    /// Every test of the batch, suite members flattened in execution order
    pub fn tests(&self) -> impl Iterator<Item = &TestSnapshot> {
        self.units.iter().flat_map(|unit| match unit {
            UnitSnapshot::Test(test) => std::slice::from_ref(test).iter(),
            UnitSnapshot::Suite(suite) => suite.tests.iter(),
        })
    }

    pub fn pass_rate(&self) -> f64 {
        let ran = self.total - self.skipped;
        if ran == 0 {
            0.0
        } else {
            (self.passed as f64 / ran as f64) * 100.0
        }
    }

    /// No failures, timeouts or suite errors
    pub fn is_successful(&self) -> bool {
        self.failed == 0 && self.timed_out == 0 && self.errors == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch {}", self.batch)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for unit in &self.units {
            match unit {
                UnitSnapshot::Test(test) => writeln!(f, "  {test}")?,
                UnitSnapshot::Suite(suite) => {
                    writeln!(f, "  {}", suite.name)?;
                    if let Some(error) = &suite.error {
                        writeln!(f, "    ! {error}")?;
                    }
                    for test in &suite.tests {
                        writeln!(f, "    {test}")?;
                    }
                }
            }
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Timeout: {} | Skip: {} | Error: {}",
            self.total, self.passed, self.failed, self.timed_out, self.skipped, self.errors
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {:.1}ms",
            self.pass_rate(),
            self.elapsed_ms
        )
    }
}
