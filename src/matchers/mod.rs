//! Assertion matchers
//!
//! `expect(actual)` wraps a value in an [`Expectation`]; each matcher
//! returns `Ok(())` when the expectation holds and a [`Failure`] naming the
//! actual and expected values otherwise. `not()` inverts every matcher.
//!
//! ```
//! use litmus::expect;
//!
//! # fn main() -> Result<(), litmus::Failure> {
//! expect(2 + 2).to_be(4)?;
//! expect(2 + 2).not().to_be(5)?;
//! expect(vec![1, 2]).to_equal([1, 2])?;
//! expect(|| -> Result<(), String> { Err("boom".into()) }).to_throw()?;
//! # Ok(())
//! # }
//! ```

mod identity;
mod invoke;
mod structural;

pub use identity::Identical;
pub use invoke::{Invocable, Settle};
pub use structural::{to_structure, MAX_DEPTH};

pub(crate) use invoke::panic_message;

use serde::Serialize;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::Failure;

/// Wrap a value for assertion
pub fn expect<T>(actual: T) -> Expectation<T> {
    Expectation {
        actual,
        negated: false,
        counter: None,
    }
}

/// Assertion factory handed to a test body.
///
/// Every expectation created through it is counted, so the owning test unit
/// can report how many assertions its last run evaluated.
#[derive(Clone, Debug, Default)]
pub struct Expect {
    evaluated: Arc<AtomicUsize>,
}

impl Expect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a value for assertion
    pub fn that<T>(&self, actual: T) -> Expectation<T> {
        Expectation {
            actual,
            negated: false,
            counter: Some(Arc::clone(&self.evaluated)),
        }
    }

    /// Number of matcher evaluations so far
    pub fn evaluated(&self) -> usize {
        self.evaluated.load(Ordering::Relaxed)
    }
}

/// A value under assertion
#[derive(Debug)]
pub struct Expectation<T> {
    actual: T,
    negated: bool,
    counter: Option<Arc<AtomicUsize>>,
}

impl<T> Expectation<T> {
    /// Invert the polarity of the following matcher
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self {
            negated: !self.negated,
            ..self
        }
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    fn record(&self) {
        if let Some(counter) = &self.counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// `holds` is the outcome of the positive condition. `describe` receives
    /// the negation flag and renders the condition that was expected.
    fn verdict(&self, holds: bool, describe: impl FnOnce(bool) -> String) -> Result<(), Failure> {
        self.record();
        if holds != self.negated {
            Ok(())
        } else {
            Err(Failure::Assertion(describe(self.negated)))
        }
    }
}

fn polarity(negated: bool) -> &'static str {
    if negated {
        " not"
    } else {
        ""
    }
}

impl<T: Identical + Debug> Expectation<T> {
    /// Strict identity: values for primitives, addresses for shared pointers
    pub fn to_be(&self, expected: T) -> Result<(), Failure> {
        let holds = self.actual.is_identical(&expected);
        self.verdict(holds, |negated| {
            format!(
                "expected {:?}{} to be {:?}",
                self.actual,
                polarity(negated),
                expected
            )
        })
    }
}

impl<T: Serialize> Expectation<T> {
    /// Structural equality of the serialized forms
    pub fn to_equal<U: Serialize>(&self, expected: U) -> Result<(), Failure> {
        self.compare_structure(&expected, "equal")
    }

    /// Structural equality between values of the same type
    pub fn to_strict_equal(&self, expected: T) -> Result<(), Failure> {
        self.compare_structure(&expected, "strictly equal")
    }

    fn compare_structure<U: Serialize>(&self, expected: &U, relation: &str) -> Result<(), Failure> {
        let actual = structural::to_structure(&self.actual);
        let expected = structural::to_structure(expected);
        let (actual, expected) = match (actual, expected) {
            (Ok(a), Ok(e)) => (a, e),
            (Err(e), _) | (_, Err(e)) => {
                self.record();
                return Err(e);
            }
        };

        self.verdict(actual == expected, |negated| {
            format!(
                "expected {}{} to {} {}",
                structural::render(&actual),
                polarity(negated),
                relation,
                structural::render(&expected)
            )
        })
    }
}

impl<T: Invocable> Expectation<T> {
    /// The value must be a function that panics or returns `Err` when called
    pub fn to_throw(&self) -> Result<(), Failure> {
        match self.actual.invoke() {
            Ok(thrown) => {
                let detail = thrown.clone();
                self.verdict(thrown.is_some(), |negated| {
                    if negated {
                        format!(
                            "expected function not to throw, but it threw: {}",
                            detail.unwrap_or_default()
                        )
                    } else {
                        "expected function to throw, but it returned normally".to_string()
                    }
                })
            }
            Err(reason) => {
                self.record();
                Err(Failure::Misuse(reason))
            }
        }
    }
}
