//! State-change notifications for reporters

use tokio::sync::broadcast;

use crate::models::{BatchReport, TestSnapshot};

/// Published on every unit transition and batch boundary
#[derive(Clone, Debug)]
pub enum Event {
    /// A test changed status or finished a run
    TestUpdated(TestSnapshot),
    /// A suite body ran and produced these tests, in order
    SuiteMaterialized { suite: String, tests: Vec<String> },
    BatchStarted { batch: u64, units: usize },
    BatchFinished(BatchReport),
}

pub(crate) type EventSender = broadcast::Sender<Event>;

/// Publish without caring whether anyone is listening
pub(crate) fn publish(events: &EventSender, event: Event) {
    let _ = events.send(event);
}
