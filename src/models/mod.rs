//! Data models shared between the engine and reporters

mod report;
mod status;

pub use report::{BatchReport, SuiteSnapshot, TestSnapshot, UnitSnapshot};
pub use status::TestStatus;
