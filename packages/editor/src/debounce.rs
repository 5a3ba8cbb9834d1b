//! Single-slot deferred tasks and the clock that drives them.
//!
//! All time is epoch milliseconds supplied by a [`Clock`]. Nothing here
//! sleeps: the host event loop calls `poll` on its own timer ticks.

use chrono::Utc;
use std::cell::Cell;
use std::rc::Rc;

/// Source of "now" in epoch milliseconds
pub trait Clock {
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Hand-advanced clock for tests and headless drivers. Clones share time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, millis: i64) {
        self.now.set(self.now.get() + millis);
    }

    pub fn set(&self, millis: i64) {
        self.now.set(millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.get()
    }
}

/// Cancel-and-reschedule deferred task.
///
/// Holds at most one pending payload. Each `trigger` replaces the payload and
/// restarts the wait window, so only the last trigger of a burst fires.
#[derive(Debug, Clone)]
pub struct Debouncer<T = ()> {
    delay_ms: i64,
    slot: Option<(i64, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms: delay_ms as i64,
            slot: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms as u64
    }

    /// Schedule `payload` to fire `delay` after `now`, superseding anything pending
    pub fn trigger(&mut self, now: i64, payload: T) {
        self.slot = Some((now + self.delay_ms, payload));
    }

    /// Take the payload if its deadline has passed
    pub fn poll(&mut self, now: i64) -> Option<T> {
        match &self.slot {
            Some((deadline, _)) if now >= *deadline => self.slot.take().map(|(_, payload)| payload),
            _ => None,
        }
    }

    /// Take the payload immediately, regardless of deadline
    pub fn flush(&mut self) -> Option<T> {
        self.slot.take().map(|(_, payload)| payload)
    }

    pub fn cancel(&mut self) {
        self.slot = None;
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    pub fn deadline(&self) -> Option<i64> {
        self.slot.as_ref().map(|(deadline, _)| *deadline)
    }
}
