//! Test session
//!
//! Owns the registered units and schedules batch runs. Registrations re-arm a
//! coalescing trigger; when it fires, a background runner executes every
//! registered unit in registration order. Batches never overlap: units
//! registered while a batch is running are picked up by the next one.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use super::body::IntoTestBody;
use super::events::{publish, Event};
use super::suite::{SuiteScope, SuiteUnit};
use super::trigger::CoalescingTrigger;
use super::unit::{TestUnit, UnitContext};
use crate::config::SessionConfig;
use crate::models::{BatchReport, UnitSnapshot};
use crate::utils::Timer;

/// A top-level registration
#[derive(Clone, Debug)]
pub enum Unit {
    Test(TestUnit),
    Suite(SuiteUnit),
}

impl Unit {
    pub fn name(&self) -> &str {
        match self {
            Unit::Test(test) => test.name(),
            Unit::Suite(suite) => suite.name(),
        }
    }

    pub async fn run(&self) {
        match self {
            Unit::Test(test) => test.run().await,
            Unit::Suite(suite) => suite.run().await,
        }
    }

    pub fn snapshot(&self) -> UnitSnapshot {
        match self {
            Unit::Test(test) => UnitSnapshot::Test(test.snapshot()),
            Unit::Suite(suite) => UnitSnapshot::Suite(suite.snapshot()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Unit::Test(_) => "test",
            Unit::Suite(_) => "suite",
        }
    }
}

#[derive(Default)]
struct SessionState {
    units: Vec<Unit>,
    /// Generation of the outstanding debounce timer
    armed: Option<u64>,
    /// Batch requests not yet picked up by the runner
    queued: usize,
    running: bool,
    batches: u64,
    last_report: Option<BatchReport>,
}

impl SessionState {
    fn is_idle(&self) -> bool {
        self.armed.is_none() && self.queued == 0 && !self.running
    }
}

struct SessionInner {
    config: SessionConfig,
    context: UnitContext,
    state: Mutex<SessionState>,
    trigger: CoalescingTrigger,
    requests: mpsc::UnboundedSender<()>,
    revision: watch::Sender<u64>,
}

impl SessionInner {
    /// Wake anyone waiting in `settled`
    fn touch(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn on_timer(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.armed == Some(generation) {
                state.armed = None;
            }
            state.queued += 1;
        }
        self.request_batch();
    }

    fn request_batch(&self) {
        if self.requests.send(()).is_err() {
            warn!("Batch runner has stopped, dropping batch request");
        }
        self.touch();
    }

    async fn run_batch(&self) {
        let (batch, units) = {
            let mut state = self.state.lock();
            state.queued = state.queued.saturating_sub(1);
            state.running = true;
            (state.batches + 1, state.units.clone())
        };
        self.touch();

        info!("Starting batch {} ({} units)", batch, units.len());
        publish(
            &self.context.events,
            Event::BatchStarted {
                batch,
                units: units.len(),
            },
        );

        let started_at = Utc::now();
        let timer = Timer::start(format!("batch {batch}"));

        for unit in &units {
            unit.run().await;
        }

        let report = BatchReport::new(
            batch,
            started_at,
            timer.stop(),
            units.iter().map(Unit::snapshot).collect(),
        );

        info!(
            "Batch {} completed in {:.1}ms - Pass: {}/{} ({:.1}%)",
            batch,
            report.elapsed_ms,
            report.passed,
            report.total,
            report.pass_rate()
        );

        {
            let mut state = self.state.lock();
            state.running = false;
            state.batches = batch;
            state.last_report = Some(report.clone());
        }
        self.touch();
        publish(&self.context.events, Event::BatchFinished(report));
    }
}

/// Processes batch requests one at a time until the session is dropped
async fn drive(session: Weak<SessionInner>, mut requests: mpsc::UnboundedReceiver<()>) {
    while requests.recv().await.is_some() {
        let Some(inner) = session.upgrade() else {
            break;
        };
        inner.run_batch().await;
    }
    debug!("Batch runner stopped");
}

/// Scheduler for one test session.
///
/// Clones share state. Dropping the last clone cancels any armed timer, stops
/// the background runner and closes the event channel. Test bodies that need
/// to register more units should capture a [`WeakSession`] from
/// [`Session::downgrade`]; a captured `Session` keeps itself alive.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session and start its batch runner.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(config: SessionConfig) -> Self {
        let (requests, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (revision, _) = watch::channel(0);

        let context = UnitContext {
            events,
            timeout: config.timeout(),
            filter: config.filter.clone(),
        };

        let inner = Arc::new_cyclic(|weak: &Weak<SessionInner>| {
            let weak = weak.clone();
            let trigger = CoalescingTrigger::new(config.debounce(), move |generation| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_timer(generation);
                }
            });

            SessionInner {
                config,
                context,
                state: Mutex::new(SessionState::default()),
                trigger,
                requests,
                revision,
            }
        });

        tokio::spawn(drive(Arc::downgrade(&inner), receiver));
        Self { inner }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Handle that does not keep the session alive
    pub fn downgrade(&self) -> WeakSession {
        WeakSession {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Register a standalone test
    pub fn test<M>(&self, name: impl Into<String>, body: impl IntoTestBody<M>) -> TestUnit {
        let unit = TestUnit::build(name.into(), None, body.into_body(), &self.inner.context);
        self.register(Unit::Test(unit.clone()));
        unit
    }

    /// Register a suite; its body runs when the suite does
    pub fn describe(
        &self,
        name: impl Into<String>,
        body: impl Fn(&mut SuiteScope) + Send + Sync + 'static,
    ) -> SuiteUnit {
        let suite = SuiteUnit::build(name.into(), Arc::new(body), self.inner.context.clone());
        self.register(Unit::Suite(suite.clone()));
        suite
    }

    fn register(&self, unit: Unit) {
        {
            let mut state = self.inner.state.lock();
            debug!(
                "Registered {} '{}' (unit {}{})",
                unit.kind(),
                unit.name(),
                state.units.len() + 1,
                if state.running {
                    ", deferred to next batch"
                } else {
                    ""
                }
            );
            state.units.push(unit);
            state.armed = Some(self.inner.trigger.arm());
        }
        self.inner.touch();
    }

    /// Skip the debounce delay and queue a batch right away
    pub fn flush(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.armed.take().is_some() {
                self.inner.trigger.cancel();
            }
            state.queued += 1;
        }
        self.inner.request_batch();
    }

    /// Registered units in registration order
    pub fn units(&self) -> Vec<Unit> {
        self.inner.state.lock().units.clone()
    }

    /// Receive state-change events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.context.events.subscribe()
    }

    pub fn last_report(&self) -> Option<BatchReport> {
        self.inner.state.lock().last_report.clone()
    }

    pub fn batches_run(&self) -> u64 {
        self.inner.state.lock().batches
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Wait until no timer is armed and no batch is queued or running, then
    /// return the latest report.
    ///
    /// A session that never registered anything settles immediately with an
    /// empty report numbered 0.
    pub async fn settled(&self) -> BatchReport {
        let mut revisions = self.inner.revision.subscribe();
        loop {
            {
                let state = self.inner.state.lock();
                if state.is_idle() {
                    if let Some(report) = &state.last_report {
                        return report.clone();
                    }
                    if state.units.is_empty() {
                        return BatchReport::new(0, Utc::now(), Default::default(), Vec::new());
                    }
                }
            }
            if revisions.changed().await.is_err() {
                return self.last_report().unwrap_or_else(|| {
                    BatchReport::new(0, Utc::now(), Default::default(), Vec::new())
                });
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Session")
            .field("units", &state.units.len())
            .field("armed", &state.armed.is_some())
            .field("running", &state.running)
            .field("batches", &state.batches)
            .finish()
    }
}

/// Non-owning handle to a [`Session`].
///
/// Registrations through a handle whose session is gone are dropped and
/// return `None`.
#[derive(Clone)]
pub struct WeakSession {
    inner: Weak<SessionInner>,
}

impl WeakSession {
    pub fn upgrade(&self) -> Option<Session> {
        self.inner.upgrade().map(|inner| Session { inner })
    }

    /// Register a standalone test if the session is still alive
    pub fn test<M>(
        &self,
        name: impl Into<String>,
        body: impl IntoTestBody<M>,
    ) -> Option<TestUnit> {
        let name = name.into();
        match self.upgrade() {
            Some(session) => Some(session.test(name, body)),
            None => {
                debug!("Session is gone, ignoring test '{}'", name);
                None
            }
        }
    }

    /// Register a suite if the session is still alive
    pub fn describe(
        &self,
        name: impl Into<String>,
        body: impl Fn(&mut SuiteScope) + Send + Sync + 'static,
    ) -> Option<SuiteUnit> {
        let name = name.into();
        match self.upgrade() {
            Some(session) => Some(session.describe(name, body)),
            None => {
                debug!("Session is gone, ignoring suite '{}'", name);
                None
            }
        }
    }
}

impl std::fmt::Debug for WeakSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakSession")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
