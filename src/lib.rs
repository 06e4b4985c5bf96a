//! litmus - debounced test runner with Jest-style matchers
//!
//! Tests and suites are registered on a [`Session`]. Every registration
//! re-arms a short debounce timer; once registrations go quiet, all units run
//! as one batch, sequentially and in registration order, and a
//! [`BatchReport`] becomes available.
//!
//! ```no_run
//! use litmus::{expect, Session};
//! use litmus::config::SessionConfig;
//!
//! # async fn demo() {
//! let session = Session::new(SessionConfig::default());
//!
//! session.test("adds", || expect(2 + 2).to_be(4));
//! session.describe("strings", |s| {
//!     s.test("concat", || expect(format!("{}{}", "a", "b")).to_equal("ab"));
//! });
//!
//! let report = session.settled().await;
//! assert!(report.is_successful());
//! # }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod matchers;
pub mod models;
pub mod output;
pub mod samples;
pub mod utils;

pub use error::Failure;
pub use executor::{
    CoalescingTrigger, Event, IntoTestBody, Session, SuiteScope, SuiteUnit, TestUnit, Unit,
    WeakSession,
};
pub use matchers::{expect, Expect, Expectation, Identical, Invocable, Settle};
pub use models::{BatchReport, SuiteSnapshot, TestSnapshot, TestStatus, UnitSnapshot};
