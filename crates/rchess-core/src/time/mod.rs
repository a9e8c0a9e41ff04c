//! Time management
//!
//! `TimeManager` tracks one search at a time against a [`TimeBudget`]. It is a
//! cheap cloneable handle; every clone observes the same deadlines, so the
//! coordinator and all search threads poll the same clock.
//!
//! State machine: `Idle -> Searching` on `start_search`, `Searching -> Expired`
//! when the hard deadline passes or `cancel` is called, and back to `Idle` on
//! the next `start_search` (or `finish`).

use std::sync::OnceLock;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
};
use std::time::Instant;

use log::debug;

mod budget;

pub use budget::{GameClock, TimeBudget, TimeParameters};

/// Time manager state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeState {
    Idle = 0,
    Searching = 1,
    Expired = 2,
}

impl TimeState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => TimeState::Searching,
            2 => TimeState::Expired,
            _ => TimeState::Idle,
        }
    }
}

static MONO_BASE: OnceLock<Instant> = OnceLock::new();

/// Milliseconds since the first call in this process
#[inline]
pub(crate) fn monotonic_ms() -> u64 {
    MONO_BASE.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Time manager coordinating stop decisions of one search
#[derive(Clone)]
pub struct TimeManager {
    inner: Arc<TimeManagerInner>,
}

/// State shared between threads (atomics only, polled in the hot path)
struct TimeManagerInner {
    state: AtomicU8,
    start_mono_ms: AtomicU64,
    soft_limit_ms: AtomicU64,
    hard_limit_ms: AtomicU64,
    cancelled: AtomicBool,
}

impl Default for TimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TimeManagerInner {
                state: AtomicU8::new(TimeState::Idle as u8),
                start_mono_ms: AtomicU64::new(0),
                soft_limit_ms: AtomicU64::new(u64::MAX),
                hard_limit_ms: AtomicU64::new(u64::MAX),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Start timing a new search
    pub fn start_search(&self, budget: TimeBudget) {
        let inner = &self.inner;
        inner.soft_limit_ms.store(budget.soft_ms, Ordering::Relaxed);
        inner.hard_limit_ms.store(budget.hard_ms, Ordering::Relaxed);
        inner.start_mono_ms.store(monotonic_ms(), Ordering::Relaxed);
        inner.cancelled.store(false, Ordering::Relaxed);
        inner.state.store(TimeState::Searching as u8, Ordering::Release);
        debug!("time budget: soft={}ms hard={}ms", budget.soft_ms, budget.hard_ms);
    }

    pub fn state(&self) -> TimeState {
        TimeState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Milliseconds since `start_search`
    pub fn elapsed_ms(&self) -> u64 {
        monotonic_ms().saturating_sub(self.inner.start_mono_ms.load(Ordering::Relaxed))
    }

    pub fn soft_limit_ms(&self) -> u64 {
        self.inner.soft_limit_ms.load(Ordering::Relaxed)
    }

    pub fn hard_limit_ms(&self) -> u64 {
        self.inner.hard_limit_ms.load(Ordering::Relaxed)
    }

    /// Hard deadline passed or search cancelled
    pub fn is_time_up(&self) -> bool {
        match self.state() {
            TimeState::Idle => false,
            TimeState::Expired => true,
            TimeState::Searching => {
                if self.inner.cancelled.load(Ordering::Relaxed)
                    || self.elapsed_ms() >= self.hard_limit_ms()
                {
                    self.expire();
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Whether a new iteration should not be started. True from the soft
    /// deadline on, which leaves margin before the hard one.
    pub fn should_stop(&self) -> bool {
        if self.is_time_up() {
            return true;
        }
        self.state() == TimeState::Searching && self.elapsed_ms() >= self.soft_limit_ms()
    }

    /// Cooperative cancel; pollers see `is_time_up() == true`
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Relaxed);
        if self.state() == TimeState::Searching {
            self.expire();
        }
    }

    /// Search finished; return to idle
    pub fn finish(&self) {
        self.inner.state.store(TimeState::Idle as u8, Ordering::Release);
    }

    fn expire(&self) {
        if self
            .inner
            .state
            .compare_exchange(
                TimeState::Searching as u8,
                TimeState::Expired as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            debug!("search time expired after {}ms", self.elapsed_ms());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_state_transitions() {
        let tm = TimeManager::new();
        assert_eq!(tm.state(), TimeState::Idle);
        assert!(!tm.is_time_up());

        tm.start_search(TimeBudget::new(0, 10));
        assert_eq!(tm.state(), TimeState::Searching);
        thread::sleep(Duration::from_millis(20));
        assert!(tm.is_time_up());
        assert_eq!(tm.state(), TimeState::Expired);

        tm.start_search(TimeBudget::infinite());
        assert_eq!(tm.state(), TimeState::Searching);
        assert!(!tm.is_time_up());
        tm.finish();
        assert_eq!(tm.state(), TimeState::Idle);
    }

    #[test]
    fn test_soft_limit_precedes_hard_limit() {
        let tm = TimeManager::new();
        tm.start_search(TimeBudget::new(5, 10_000));
        thread::sleep(Duration::from_millis(15));
        assert!(tm.should_stop(), "soft deadline passed");
        assert!(!tm.is_time_up(), "hard deadline not reached");
        assert_eq!(tm.state(), TimeState::Searching);
    }

    #[test]
    fn test_cancel_expires_search() {
        let tm = TimeManager::new();
        tm.start_search(TimeBudget::infinite());
        let clone = tm.clone();
        clone.cancel();
        assert!(tm.is_time_up());
        assert!(tm.should_stop());
        assert_eq!(tm.state(), TimeState::Expired);

        // A new search clears the cancellation
        tm.start_search(TimeBudget::infinite());
        assert!(!tm.is_time_up());
    }

    #[test]
    fn test_cancel_while_idle_is_harmless() {
        let tm = TimeManager::new();
        tm.cancel();
        assert_eq!(tm.state(), TimeState::Idle);
        assert!(!tm.is_time_up());
    }
}
