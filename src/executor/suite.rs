//! Suite unit
//!
//! A named group of tests. The body is invoked once per run to register the
//! member tests, which then run one after another in registration order.

use parking_lot::RwLock;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::body::IntoTestBody;
use super::events::{publish, Event};
use super::unit::{TestUnit, UnitContext};
use crate::matchers::panic_message;
use crate::models::{SuiteSnapshot, TestStatus};

type SuiteBody = Arc<dyn Fn(&mut SuiteScope) + Send + Sync>;

/// Registration handle passed to a suite body
pub struct SuiteScope {
    suite: String,
    context: UnitContext,
    tests: Vec<TestUnit>,
}

impl SuiteScope {
    fn new(suite: &str, context: UnitContext) -> Self {
        Self {
            suite: suite.to_string(),
            context,
            tests: Vec::new(),
        }
    }

    /// Name of the suite being materialized
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// Register a member test; names need not be unique
    pub fn test<M>(&mut self, name: impl Into<String>, body: impl IntoTestBody<M>) -> TestUnit {
        let unit = TestUnit::build(
            name.into(),
            Some(self.suite.clone()),
            body.into_body(),
            &self.context,
        );
        self.tests.push(unit.clone());
        unit
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

#[derive(Default)]
struct SuiteRecord {
    tests: Vec<TestUnit>,
    error: Option<String>,
}

struct SuiteInner {
    name: String,
    body: SuiteBody,
    context: UnitContext,
    record: RwLock<SuiteRecord>,
}

/// Handle to a registered suite
#[derive(Clone)]
pub struct SuiteUnit {
    inner: Arc<SuiteInner>,
}

impl SuiteUnit {
    /// Create a standalone suite, not attached to any session
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&mut SuiteScope) + Send + Sync + 'static,
    ) -> Self {
        Self::build(name.into(), Arc::new(body), UnitContext::detached())
    }

    pub(crate) fn build(name: String, body: SuiteBody, context: UnitContext) -> Self {
        Self {
            inner: Arc::new(SuiteInner {
                name,
                body,
                context,
                record: RwLock::new(SuiteRecord::default()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Member tests from the most recent materialization
    pub fn tests(&self) -> Vec<TestUnit> {
        self.inner.record.read().tests.clone()
    }

    /// Panic message if the body failed while registering tests
    pub fn error(&self) -> Option<String> {
        self.inner.record.read().error.clone()
    }

    pub fn snapshot(&self) -> SuiteSnapshot {
        let record = self.inner.record.read();
        SuiteSnapshot {
            name: self.inner.name.clone(),
            error: record.error.clone(),
            tests: record.tests.iter().map(TestUnit::snapshot).collect(),
        }
    }

    /// Invoke the body once, replacing the previous member list
    fn materialize(&self) -> Vec<TestUnit> {
        let mut scope = SuiteScope::new(&self.inner.name, self.inner.context.clone());
        let body = &self.inner.body;

        let error = panic::catch_unwind(AssertUnwindSafe(|| body(&mut scope)))
            .err()
            .map(|payload| panic_message(payload.as_ref()));
        if let Some(message) = &error {
            error!(
                "Suite '{}' panicked while registering tests: {}",
                self.inner.name, message
            );
        }

        debug!("Suite '{}' registered {} tests", scope.suite(), scope.len());
        let tests = scope.tests;
        {
            let mut record = self.inner.record.write();
            record.tests = tests.clone();
            record.error = error;
        }

        publish(
            &self.inner.context.events,
            Event::SuiteMaterialized {
                suite: self.inner.name.clone(),
                tests: tests.iter().map(|t| t.name().to_string()).collect(),
            },
        );

        tests
    }

    /// Materialize and run every member test sequentially.
    ///
    /// A failing test never stops the ones after it.
    pub async fn run(&self) {
        let tests = self.materialize();
        info!("Running suite '{}' ({} tests)", self.inner.name, tests.len());

        for test in &tests {
            test.run().await;
        }

        let failed = tests
            .iter()
            .filter(|t| matches!(t.status(), TestStatus::Failed | TestStatus::Timeout))
            .count();
        debug!(
            "Suite '{}' finished: {}/{} failed",
            self.inner.name,
            failed,
            tests.len()
        );
    }
}

impl fmt::Debug for SuiteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.inner.record.read();
        f.debug_struct("SuiteUnit")
            .field("name", &self.inner.name)
            .field("tests", &record.tests)
            .field("error", &record.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::expect;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_members_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::clone(&log);

        let suite = SuiteUnit::new("ordering", move |s| {
            for name in ["A", "B", "C"] {
                let log = Arc::clone(&shared);
                s.test(name, move || {
                    let log = Arc::clone(&log);
                    async move {
                        // later tests sleep less; interleaving would reorder the log
                        let delay = match name {
                            "A" => 15,
                            "B" => 5,
                            _ => 0,
                        };
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        log.lock().push(name);
                    }
                });
            }
        });

        suite.run().await;

        assert_eq!(*log.lock(), ["A", "B", "C"]);
        assert!(suite
            .tests()
            .iter()
            .all(|t| t.status() == TestStatus::Passed));
    }

    #[tokio::test]
    async fn test_scope_reports_suite_and_members() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);

        let suite = SuiteUnit::new("scope", move |s| {
            record.lock().push((s.suite().to_string(), s.len(), s.is_empty()));
            s.test("first", || ());
            s.test("second", || ());
            record.lock().push((s.suite().to_string(), s.len(), s.is_empty()));
        });

        suite.run().await;

        assert_eq!(
            *seen.lock(),
            [
                ("scope".to_string(), 0, true),
                ("scope".to_string(), 2, false)
            ]
        );
        assert_eq!(suite.tests().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_halt_suite() {
        let suite = SuiteUnit::new("fail soft", |s| {
            s.test("first", || expect(1).to_be(2));
            s.test("second", || expect(2).to_be(2));
            s.test("second", || -> () { panic!("boom") });
        });

        suite.run().await;

        let statuses: Vec<TestStatus> = suite.tests().iter().map(TestUnit::status).collect();
        assert_eq!(
            statuses,
            [TestStatus::Failed, TestStatus::Passed, TestStatus::Failed]
        );
    }

    #[tokio::test]
    async fn test_body_runs_once_per_run_and_rematerializes() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&invocations);

        let suite = SuiteUnit::new("lazy", move |s| {
            counter.fetch_add(1, Ordering::SeqCst);
            s.test("only", || ());
        });
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
        assert!(suite.tests().is_empty());

        suite.run().await;
        suite.run().await;

        assert_eq!(invocations.load(Ordering::SeqCst), 2);
        assert_eq!(suite.tests().len(), 1);
    }

    #[tokio::test]
    async fn test_shared_fixture() {
        let suite = SuiteUnit::new("fixture", |s| {
            let stack = Arc::new(Mutex::new(Vec::<i32>::new()));

            let push = Arc::clone(&stack);
            s.test("push", move || {
                push.lock().push(42);
                expect(push.lock().len()).to_be(1)
            });

            let pop = Arc::clone(&stack);
            s.test("pop", move || expect(pop.lock().pop()).to_be(Some(42)));
        });

        suite.run().await;

        assert!(suite
            .tests()
            .iter()
            .all(|t| t.status() == TestStatus::Passed));
    }

    #[tokio::test]
    async fn test_body_panic_is_captured() {
        let suite = SuiteUnit::new("broken", |s| {
            s.test("registered before panic", || ());
            panic!("could not open fixture");
        });

        suite.run().await;

        assert_eq!(suite.error().as_deref(), Some("could not open fixture"));
        let snapshot = suite.snapshot();
        assert_eq!(snapshot.tests.len(), 1);
        assert_eq!(snapshot.tests[0].status, TestStatus::Passed);
        assert_eq!(snapshot.tests[0].suite.as_deref(), Some("broken"));
    }
}
