//! Scheduling primitives for the single-threaded editor core.
//!
//! The core never spawns threads or tasks. Work that should happen "later"
//! (re-tokenization after a burst of edits) is expressed as debounced timers
//! in a [`TimerQueue`]; the host drives the queue with the current time and
//! runs whatever is due. Long-running work is sliced with a [`Budget`].
//! Time always comes from a [`Clock`], so tests substitute a [`ManualClock`].

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Relaxed counters, inspected by tests and logged by the driver at shutdown.
// -------------------------------------------------------------------------------------------------
pub static TIMERS_SCHEDULED: AtomicU64 = AtomicU64::new(0);
pub static TIMERS_REPLACED: AtomicU64 = AtomicU64::new(0); // debounced: an unfired timer was superseded
pub static TIMERS_FIRED: AtomicU64 = AtomicU64::new(0);

// -------------------------------------------------------------------------------------------------
// Clocks
// -------------------------------------------------------------------------------------------------

/// Source of monotonic time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic clock for tests and scripted replays.
///
/// Clones share the same time, so a test can keep a handle while the editor
/// owns another. With a non-zero auto step every `now()` call advances time,
/// which lets budget exhaustion be provoked without sleeping.
#[derive(Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
    step: Rc<Cell<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
            step: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Advance by `step` after every `now()` read.
    pub fn set_auto_step(&self, step: Duration) {
        self.step.set(step);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let t = self.now.get();
        let step = self.step.get();
        if !step.is_zero() {
            self.now.set(t + step);
        }
        t
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("step", &self.step.get())
            .finish_non_exhaustive()
    }
}

// -------------------------------------------------------------------------------------------------
// Budget
// -------------------------------------------------------------------------------------------------

/// A slice of wall-clock time for cooperative work loops.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    limit: Duration,
}

impl Budget {
    pub fn start(clock: &dyn Clock, limit: Duration) -> Self {
        Self {
            started: clock.now(),
            limit,
        }
    }

    pub fn exhausted(&self, clock: &dyn Clock) -> bool {
        clock.now().saturating_duration_since(self.started) >= self.limit
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

// -------------------------------------------------------------------------------------------------
// Debounced timers
// -------------------------------------------------------------------------------------------------

/// At most one pending timer per kind. Scheduling a kind that is already
/// pending replaces its deadline (debounce), so a burst of edits results in a
/// single firing after the burst ends.
#[derive(Debug, Clone)]
pub struct TimerQueue<K> {
    pending: Vec<(K, Instant)>,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<K: Copy + Eq + fmt::Debug> TimerQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` to fire `delay` after `now`, replacing any unfired timer of that kind.
    pub fn schedule(&mut self, kind: K, delay: Duration, now: Instant) {
        let deadline = now + delay;
        TIMERS_SCHEDULED.fetch_add(1, Ordering::Relaxed);
        if let Some(slot) = self.pending.iter_mut().find(|(k, _)| *k == kind) {
            TIMERS_REPLACED.fetch_add(1, Ordering::Relaxed);
            slot.1 = deadline;
        } else {
            self.pending.push((kind, deadline));
        }
        trace!(target: "runtime", ?kind, delay_ms = delay.as_millis() as u64, "timer_scheduled");
    }

    /// Disarm `kind`. Returns whether it was pending.
    pub fn cancel(&mut self, kind: K) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(k, _)| *k != kind);
        before != self.pending.len()
    }

    pub fn pending(&self, kind: K) -> Option<Instant> {
        self.pending.iter().find(|(k, _)| *k == kind).map(|(_, d)| *d)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest deadline across all pending timers.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|(_, d)| *d).min()
    }

    /// Remove and return every timer due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(K, Instant)> = Vec::new();
        self.pending.retain(|(k, d)| {
            if *d <= now {
                due.push((*k, *d));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(_, d)| *d);
        TIMERS_FIRED.fetch_add(due.len() as u64, Ordering::Relaxed);
        due.into_iter().map(|(k, _)| k).collect()
    }
}
