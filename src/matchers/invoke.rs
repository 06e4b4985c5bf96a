//! Invocation support for `to_throw` and test bodies
//!
//! A callable "throws" when it panics or returns `Err(_)`. [`Settle`] maps a
//! body's return value to that notion, [`Invocable`] decides whether a value
//! can be called at all.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Return values a test body or `to_throw` closure may produce
pub trait Settle {
    /// `Err` carries the message of the error that was raised
    fn settle(self) -> Result<(), String>;
}

impl Settle for () {
    fn settle(self) -> Result<(), String> {
        Ok(())
    }
}

impl<T, E: fmt::Display> Settle for Result<T, E> {
    fn settle(self) -> Result<(), String> {
        self.map(|_| ()).map_err(|e| e.to_string())
    }
}

/// Values that `to_throw` may be applied to
pub trait Invocable {
    /// Call the value once.
    ///
    /// `Ok(Some(message))` if it threw, `Ok(None)` if it returned normally,
    /// `Err(reason)` if the value cannot be invoked.
    fn invoke(&self) -> Result<Option<String>, String>;
}

impl<F, R> Invocable for F
where
    F: Fn() -> R,
    R: Settle,
{
    fn invoke(&self) -> Result<Option<String>, String> {
        match panic::catch_unwind(AssertUnwindSafe(self)) {
            Ok(returned) => Ok(returned.settle().err()),
            Err(payload) => Ok(Some(panic_message(payload.as_ref()))),
        }
    }
}

impl<F, R> Invocable for Option<F>
where
    F: Fn() -> R,
    R: Settle,
{
    fn invoke(&self) -> Result<Option<String>, String> {
        match self {
            Some(f) => f.invoke(),
            None => Err("to_throw() expects a function, received None".to_string()),
        }
    }
}

impl Invocable for &str {
    fn invoke(&self) -> Result<Option<String>, String> {
        Err(format!(
            "to_throw() expects a function, received the string {self:?}"
        ))
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle() {
        assert_eq!(().settle(), Ok(()));
        assert_eq!(Ok::<u8, String>(1).settle(), Ok(()));
        assert_eq!(
            Err::<(), _>("boom".to_string()).settle(),
            Err("boom".to_string())
        );
    }

    #[test]
    fn test_invoke_closures() {
        let quiet = || ();
        assert_eq!(quiet.invoke(), Ok(None));

        let erring = || Err::<(), _>("bad input");
        assert_eq!(erring.invoke(), Ok(Some("bad input".to_string())));

        let panicking = || -> () { panic!("exploded") };
        assert_eq!(panicking.invoke(), Ok(Some("exploded".to_string())));
    }

    #[test]
    fn test_invoke_non_functions() {
        let missing: Option<fn()> = None;
        assert!(missing.invoke().unwrap_err().contains("None"));

        let present: Option<fn()> = Some(|| ());
        assert_eq!(present.invoke(), Ok(None));

        assert!("not callable".invoke().unwrap_err().contains("string"));
    }
}
