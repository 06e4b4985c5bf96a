//! Error types raised by matchers
//!
//! A [`Failure`] is what an assertion hands back to the test body. Bodies
//! usually propagate it with `?`, and the owning test unit turns it into a
//! failed status.

use thiserror::Error;

/// Assertion outcome reported by the matcher engine
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Failure {
    /// The actual value did not satisfy the expectation
    #[error("{0}")]
    Assertion(String),

    /// The matcher was applied to a value it cannot operate on
    #[error("{0}")]
    Misuse(String),

    /// A value could not be serialized for structural comparison
    #[error("cannot compare structurally: {0}")]
    Serialization(String),
}

impl Failure {
    pub fn is_assertion(&self) -> bool {
        matches!(self, Failure::Assertion(_))
    }

    pub fn is_misuse(&self) -> bool {
        matches!(self, Failure::Misuse(_))
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self, Failure::Serialization(_))
    }
}
