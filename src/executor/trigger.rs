//! Coalescing trigger
//!
//! Collapses a burst of events into a single callback fired after a quiet
//! period. Every [`CoalescingTrigger::arm`] cancels the outstanding timer and
//! starts a new one, so only the last event of a burst fires.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

type FireFn = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
struct Armed {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

/// Debounce timer built on a cancellable delayed task
pub struct CoalescingTrigger {
    delay: Duration,
    armed: Arc<Mutex<Armed>>,
    on_fire: FireFn,
}

impl CoalescingTrigger {
    /// `on_fire` receives the generation returned by the [`arm`](Self::arm)
    /// call that scheduled it.
    pub fn new(delay: Duration, on_fire: impl Fn(u64) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            armed: Arc::new(Mutex::new(Armed::default())),
            on_fire: Arc::new(on_fire),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel any outstanding timer and start a new one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&self) -> u64 {
        let mut armed = self.armed.lock();
        if let Some(handle) = armed.handle.take() {
            handle.abort();
            trace!(generation = armed.generation, "Debounce timer reset");
        }
        armed.generation += 1;
        let generation = armed.generation;

        let shared = Arc::clone(&self.armed);
        let on_fire = Arc::clone(&self.on_fire);
        let delay = self.delay;

        armed.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut armed = shared.lock();
                // superseded between wake-up and lock
                if armed.generation != generation {
                    return;
                }
                armed.handle = None;
            }
            trace!(generation, "Debounce timer fired");
            on_fire(generation);
        }));

        generation
    }

    /// Cancel the outstanding timer. Returns whether one was armed.
    pub fn cancel(&self) -> bool {
        let mut armed = self.armed.lock();
        armed.generation += 1;
        match armed.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.lock().handle.is_some()
    }
}

impl Drop for CoalescingTrigger {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for CoalescingTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingTrigger")
            .field("delay", &self.delay)
            .field("armed", &self.is_armed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    fn counting_trigger(delay_ms: u64) -> (CoalescingTrigger, Arc<AtomicUsize>, Arc<AtomicU64>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicU64::new(0));
        let (f, l) = (Arc::clone(&fired), Arc::clone(&last));
        let trigger = CoalescingTrigger::new(Duration::from_millis(delay_ms), move |generation| {
            f.fetch_add(1, Ordering::SeqCst);
            l.store(generation, Ordering::SeqCst);
        });
        (trigger, fired, last)
    }

    #[tokio::test]
    async fn test_burst_collapses_to_one_fire() {
        let (trigger, fired, last) = counting_trigger(20);

        let mut generation = 0;
        for _ in 0..5 {
            generation = trigger.arm();
        }
        assert!(trigger.is_armed());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), generation);
        assert!(!trigger.is_armed());
    }

    #[tokio::test]
    async fn test_rearm_resets_the_delay() {
        let (trigger, fired, _) = counting_trigger(40);
        assert_eq!(trigger.delay(), Duration::from_millis(40));

        trigger.arm();
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.arm();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel() {
        let (trigger, fired, _) = counting_trigger(10);

        trigger.arm();
        assert!(trigger.cancel());
        assert!(!trigger.cancel());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_separate_quiet_periods_fire_separately() {
        let (trigger, fired, _) = counting_trigger(10);

        trigger.arm();
        tokio::time::sleep(Duration::from_millis(40)).await;
        trigger.arm();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
