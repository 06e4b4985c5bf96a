//! Test status state machine values
//!
//! Display metadata is an exhaustive match per variant, so adding a status
//! without deciding how it renders is a compile error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a test unit.
///
/// `Initial -> Pending -> {Passed | Failed | Timeout}`. `Skipped` is only
/// reached by an external decision taken before the unit runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    #[default]
    Initial,
    Pending,
    Passed,
    Failed,
    Skipped,
    Timeout,
}

impl TestStatus {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            TestStatus::Initial => "Initial",
            TestStatus::Pending => "Pending",
            TestStatus::Passed => "Passed",
            TestStatus::Failed => "Failed",
            TestStatus::Skipped => "Skipped",
            TestStatus::Timeout => "Timeout",
        }
    }

    /// Class name for markup renderers
    pub fn css_class(&self) -> &'static str {
        match self {
            TestStatus::Initial => "test-status initial",
            TestStatus::Pending => "test-status pending",
            TestStatus::Passed => "test-status passed",
            TestStatus::Failed => "test-status failed",
            TestStatus::Skipped => "test-status skipped",
            TestStatus::Timeout => "test-status timeout",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Initial => "·",
            TestStatus::Pending => "…",
            TestStatus::Passed => "✓",
            TestStatus::Failed => "✗",
            TestStatus::Skipped => "○",
            TestStatus::Timeout => "⏱",
        }
    }

    /// ANSI color code used by the console formatter
    pub fn color(&self) -> &'static str {
        match self {
            TestStatus::Initial | TestStatus::Pending => "\x1b[90m",
            TestStatus::Passed => "\x1b[32m",
            TestStatus::Failed | TestStatus::Timeout => "\x1b[31m",
            TestStatus::Skipped => "\x1b[33m",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestStatus::Passed)
    }

    /// Outcome of a completed run
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            TestStatus::Passed | TestStatus::Failed | TestStatus::Timeout
        )
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Initial => write!(f, "INITIAL"),
            TestStatus::Pending => write!(f, "PENDING"),
            TestStatus::Passed => write!(f, "PASS"),
            TestStatus::Failed => write!(f, "FAIL"),
            TestStatus::Skipped => write!(f, "SKIP"),
            TestStatus::Timeout => write!(f, "TIMEOUT"),
        }
    }
}
