//! Output formatting module
//!
//! Renders batch reports and live events for the console.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
