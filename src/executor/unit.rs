//! Test unit
//!
//! One registered test case and its status state machine.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinError;
use tracing::{debug, warn};

use super::body::{Body, IntoTestBody};
use super::events::{publish, Event, EventSender};
use crate::matchers::{panic_message, Expect};
use crate::models::{TestSnapshot, TestStatus};
use crate::utils::{as_millis_f64, Timer};

const DETACHED_EVENT_CAPACITY: usize = 64;

/// Settings a unit inherits from whoever registered it
#[derive(Clone, Debug)]
pub(crate) struct UnitContext {
    pub events: EventSender,
    pub timeout: Option<Duration>,
    pub filter: Option<String>,
}

impl UnitContext {
    /// Context for units created outside a session
    pub fn detached() -> Self {
        let (events, _) = broadcast::channel(DETACHED_EVENT_CAPACITY);
        Self {
            events,
            timeout: None,
            filter: None,
        }
    }

    fn excludes(&self, name: &str, suite: Option<&str>) -> bool {
        match &self.filter {
            Some(pattern) => {
                !name.contains(pattern.as_str())
                    && !suite.is_some_and(|s| s.contains(pattern.as_str()))
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct TestRecord {
    status: TestStatus,
    duration: Option<Duration>,
    error_message: String,
    assertions: usize,
    timeout: Option<Duration>,
}

struct TestInner {
    name: String,
    suite: Option<String>,
    body: Body,
    record: RwLock<TestRecord>,
    events: EventSender,
}

/// Handle to a registered test case.
///
/// Clones share the same state; reporters can read status while the test
/// runs.
#[derive(Clone)]
pub struct TestUnit {
    inner: Arc<TestInner>,
}

enum Outcome {
    Passed,
    Failed(String),
    TimedOut(Duration),
}

impl Outcome {
    fn from_join(joined: Result<Result<(), String>, JoinError>) -> Self {
        match joined {
            Ok(Ok(())) => Outcome::Passed,
            Ok(Err(message)) => Outcome::Failed(message),
            Err(e) if e.is_panic() => Outcome::Failed(panic_message(e.into_panic().as_ref())),
            Err(_) => Outcome::Failed("test body was cancelled".to_string()),
        }
    }
}

impl TestUnit {
    /// Create a standalone test unit, not attached to any session
    pub fn new<M>(name: impl Into<String>, body: impl IntoTestBody<M>) -> Self {
        Self::build(name.into(), None, body.into_body(), &UnitContext::detached())
    }

    pub(crate) fn build(
        name: String,
        suite: Option<String>,
        body: Body,
        context: &UnitContext,
    ) -> Self {
        let status = if context.excludes(&name, suite.as_deref()) {
            TestStatus::Skipped
        } else {
            TestStatus::Initial
        };

        Self {
            inner: Arc::new(TestInner {
                name,
                suite,
                body,
                record: RwLock::new(TestRecord {
                    status,
                    timeout: context.timeout,
                    ..TestRecord::default()
                }),
                events: context.events.clone(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn suite(&self) -> Option<&str> {
        self.inner.suite.as_deref()
    }

    pub fn status(&self) -> TestStatus {
        self.inner.record.read().status
    }

    pub fn duration_ms(&self) -> Option<f64> {
        self.inner.record.read().duration.map(as_millis_f64)
    }

    pub fn error_message(&self) -> String {
        self.inner.record.read().error_message.clone()
    }

    /// Matcher evaluations made through the factory during the last run
    pub fn assertions(&self) -> usize {
        self.inner.record.read().assertions
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.record.read().timeout
    }

    /// Limit how long a run may take before it is abandoned as timed out
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        self.inner.record.write().timeout = timeout;
    }

    pub fn snapshot(&self) -> TestSnapshot {
        let record = self.inner.record.read();
        self.snapshot_of(&record)
    }

    fn snapshot_of(&self, record: &TestRecord) -> TestSnapshot {
        TestSnapshot {
            name: self.inner.name.clone(),
            suite: self.inner.suite.clone(),
            status: record.status,
            duration_ms: record.duration.map(as_millis_f64),
            error_message: record.error_message.clone(),
            assertions: record.assertions,
        }
    }

    /// Exclude the test from future runs. Only possible before it has run.
    pub fn mark_skipped(&self) -> bool {
        let skipped = self.update(|record| {
            if record.status == TestStatus::Initial {
                record.status = TestStatus::Skipped;
                true
            } else {
                false
            }
        });
        if skipped {
            debug!("Marked {} as skipped", self);
        }
        skipped
    }

    /// Mutate the record and publish the resulting snapshot
    fn update<T>(&self, change: impl FnOnce(&mut TestRecord) -> T) -> T {
        let (result, snapshot) = {
            let mut record = self.inner.record.write();
            let result = change(&mut record);
            (result, self.snapshot_of(&record))
        };
        publish(&self.inner.events, Event::TestUpdated(snapshot));
        result
    }

    /// Run the body once and record its outcome.
    ///
    /// Never panics: errors and panics raised by the body become a failed
    /// status. A skipped unit is left untouched.
    pub async fn run(&self) {
        if self.status() == TestStatus::Skipped {
            debug!("Skipping {}", self);
            return;
        }

        let timer = Timer::start(self.to_string());
        let timeout = self.update(|record| {
            record.status = TestStatus::Pending;
            record.duration = None;
            record.error_message.clear();
            record.assertions = 0;
            record.timeout
        });
        debug!("Running {}", self);

        let expect = Expect::new();
        let mut task = tokio::spawn((self.inner.body)(expect.clone()));

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => Outcome::from_join(joined),
                // dropping the handle detaches the task; its result is ignored
                Err(_) => Outcome::TimedOut(limit),
            },
            None => Outcome::from_join(task.await),
        };

        let elapsed = timer.stop();
        let assertions = expect.evaluated();

        match &outcome {
            Outcome::Passed => debug!("{} passed in {:.1}ms", self, as_millis_f64(elapsed)),
            Outcome::Failed(message) => debug!("{} failed: {}", self, message),
            Outcome::TimedOut(limit) => warn!(
                "{} timed out after {}ms, abandoning its body",
                self,
                limit.as_millis()
            ),
        }

        self.update(|record| {
            record.duration = Some(elapsed);
            record.assertions = assertions;
            record.status = match outcome {
                Outcome::Passed => TestStatus::Passed,
                Outcome::Failed(message) => {
                    record.error_message = message;
                    TestStatus::Failed
                }
                Outcome::TimedOut(_) => TestStatus::Timeout,
            };
        });
    }
}

impl fmt::Display for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.suite {
            Some(suite) => write!(f, "'{} › {}'", suite, self.inner.name),
            None => write!(f, "'{}'", self.inner.name),
        }
    }
}

impl fmt::Debug for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestUnit")
            .field("name", &self.inner.name)
            .field("suite", &self.inner.suite)
            .field("record", &*self.inner.record.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Failure;
    use crate::matchers::expect;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_passing_test() {
        let unit = TestUnit::new("adds", || expect(2 + 2).to_be(4));
        assert_eq!(unit.status(), TestStatus::Initial);
        assert_eq!(unit.duration_ms(), None);

        unit.run().await;

        assert_eq!(unit.status(), TestStatus::Passed);
        assert_eq!(unit.error_message(), "");
        assert!(unit.duration_ms().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_failing_test() {
        let unit = TestUnit::new("bad", || expect(2 + 2).to_be(5));
        unit.run().await;

        assert_eq!(unit.status(), TestStatus::Failed);
        let message = unit.error_message();
        assert!(message.contains('4'));
        assert!(message.contains('5'));
    }

    #[tokio::test]
    async fn test_async_test_waits_for_settlement() {
        let unit = TestUnit::new("async ok", || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            expect(1).to_be(1)
        });
        unit.run().await;

        assert_eq!(unit.status(), TestStatus::Passed);
        assert!(unit.duration_ms().unwrap() >= 10.0);
    }

    #[tokio::test]
    async fn test_async_rejection_fails() {
        let unit = TestUnit::new("async bad", || async {
            tokio::task::yield_now().await;
            Err::<(), _>("connection refused")
        });
        unit.run().await;

        assert_eq!(unit.status(), TestStatus::Failed);
        assert_eq!(unit.error_message(), "connection refused");
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        let unit = TestUnit::new("panics", || -> () { panic!("fixture exploded") });
        unit.run().await;

        assert_eq!(unit.status(), TestStatus::Failed);
        assert_eq!(unit.error_message(), "fixture exploded");
    }

    #[tokio::test]
    async fn test_misuse_routes_through_failed() {
        let unit = TestUnit::new("misuse", || expect("oops").to_throw());
        unit.run().await;

        assert_eq!(unit.status(), TestStatus::Failed);
        assert!(unit.error_message().contains("expects a function"));
    }

    #[tokio::test]
    async fn test_timeout_wins_the_race() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let unit = TestUnit::new("slow", move || {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        unit.set_timeout(Some(Duration::from_millis(20)));
        unit.run().await;

        assert_eq!(unit.status(), TestStatus::Timeout);
        assert_eq!(unit.error_message(), "");
        let duration = unit.duration_ms().unwrap();
        assert!((20.0..200.0).contains(&duration));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rerun_resets_error() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let unit = TestUnit::new("flips", move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            expect(attempt).to_be(1)
        });

        unit.run().await;
        assert_eq!(unit.status(), TestStatus::Failed);
        assert!(!unit.error_message().is_empty());

        unit.run().await;
        assert_eq!(unit.status(), TestStatus::Passed);
        assert_eq!(unit.error_message(), "");
    }

    #[tokio::test]
    async fn test_assertions_are_counted() {
        let unit = TestUnit::new("counts", |e: Expect| -> Result<(), Failure> {
            e.that(1).to_be(1)?;
            e.that([1, 2]).to_equal(vec![1, 2])?;
            e.that(|| ()).not().to_throw()
        });
        unit.run().await;

        assert_eq!(unit.status(), TestStatus::Passed);
        assert_eq!(unit.assertions(), 3);
    }

    #[tokio::test]
    async fn test_skipped_unit_is_not_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let unit = TestUnit::new("skipped", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(unit.mark_skipped());
        unit.run().await;

        assert_eq!(unit.status(), TestStatus::Skipped);
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        let ran = TestUnit::new("ran", || ());
        ran.run().await;
        assert!(!ran.mark_skipped());
    }

    #[tokio::test]
    async fn test_transitions_are_published() {
        let context = UnitContext::detached();
        let mut events = context.events.subscribe();
        let unit = TestUnit::build(
            "observed".to_string(),
            None,
            IntoTestBody::into_body(|| expect(true).to_be(true)),
            &context,
        );

        unit.run().await;

        let mut statuses = Vec::new();
        while let Ok(Event::TestUpdated(snapshot)) = events.try_recv() {
            statuses.push(snapshot.status);
        }
        assert_eq!(statuses, [TestStatus::Pending, TestStatus::Passed]);
    }

    #[test]
    fn test_filter_marks_non_matching_tests_skipped() {
        let context = UnitContext {
            filter: Some("math".to_string()),
            ..UnitContext::detached()
        };
        let body = || ();

        let hit = TestUnit::build("adds".into(), Some("math".into()), body.into_body(), &context);
        let miss = TestUnit::build("adds".into(), None, body.into_body(), &context);
        assert_eq!(hit.status(), TestStatus::Initial);
        assert_eq!(miss.status(), TestStatus::Skipped);
    }
}
