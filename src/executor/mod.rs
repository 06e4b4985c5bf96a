//! Test execution engine
//!
//! Test and suite units, the coalescing trigger that batches registrations,
//! and the session that runs batches one at a time.

mod body;
mod events;
mod session;
mod suite;
mod trigger;
mod unit;

pub use body::{Async, AsyncWithExpect, Blocking, BlockingWithExpect, BodyFuture, IntoTestBody};
pub use events::Event;
pub use session::{Session, Unit, WeakSession};
pub use suite::{SuiteScope, SuiteUnit};
pub use trigger::CoalescingTrigger;
pub use unit::TestUnit;
