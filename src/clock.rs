//! Fixed-cadence frame clock and cooperative cancellation.

use core::time::Duration;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::time::TimeSource;

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

/// Shared stop signal polled by the render loop.
///
/// Cloning yields another handle to the same flag. Sleeping through
/// [`CancelToken::wait_timeout`] wakes immediately when the flag is set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every sleeper.
    pub fn cancel(&self) {
        *self.inner.cancelled.lock() = true;
        self.inner.signal.notify_all();
    }

    /// Clears the flag so the token can guard another run.
    pub fn reset(&self) {
        *self.inner.cancelled.lock() = false;
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Blocks for up to `timeout` or until cancelled.
    ///
    /// Returns true if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            if self.inner.signal.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        *cancelled
    }
}

/// Fixed-interval tick scheduler.
///
/// Keeps an additive `next_tick` target so the schedule never drifts, but
/// always reports the nominal interval as `dt`. Overrun frames are not caught
/// up: simulated time falls behind wall time instead of jumping forward,
/// which keeps position updates deterministic.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    interval: Duration,
    next_tick: Duration,
    ticks: u64,
}

impl FrameClock {
    /// Starts a clock whose first tick is one interval after `now`.
    pub fn new(interval: Duration, now: Duration) -> Self {
        Self {
            interval,
            next_tick: now + interval,
            ticks: 0,
        }
    }

    /// Nominal tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of ticks delivered so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulated time covered by the delivered ticks.
    pub fn simulated(&self) -> Duration {
        self.interval.saturating_mul(u32::try_from(self.ticks).unwrap_or(u32::MAX))
    }

    /// Waits for the next tick and returns its `dt` in seconds.
    ///
    /// Returns `None` as soon as `cancel` is observed, either before waiting or
    /// after an interrupted sleep.
    pub fn next_tick<T: TimeSource>(&mut self, source: &T, cancel: &CancelToken) -> Option<f64> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            let now = source.now();
            if now < self.next_tick {
                source.sleep(self.next_tick - now, cancel);
                continue;
            }
            self.next_tick += self.interval;
            self.ticks += 1;
            return Some(self.interval.as_secs_f64());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct SteppingTime {
        now: Cell<Duration>,
        sleeps: Cell<u32>,
    }

    impl SteppingTime {
        fn new() -> Self {
            Self {
                now: Cell::new(Duration::ZERO),
                sleeps: Cell::new(0),
            }
        }
    }

    impl TimeSource for SteppingTime {
        fn now(&self) -> Duration {
            self.now.get()
        }

        fn sleep(&self, duration: Duration, _cancel: &CancelToken) {
            self.sleeps.set(self.sleeps.get() + 1);
            self.now.set(self.now.get() + duration);
        }
    }

    #[test]
    fn ticks_report_fixed_dt() {
        let time = SteppingTime::new();
        let cancel = CancelToken::new();
        let mut clock = FrameClock::new(Duration::from_millis(10), time.now());

        for _ in 0..5 {
            assert_eq!(clock.next_tick(&time, &cancel), Some(0.01));
        }
        assert_eq!(clock.ticks(), 5);
        assert_eq!(time.now(), Duration::from_millis(50));
        assert_eq!(clock.simulated(), Duration::from_millis(50));
    }

    #[test]
    fn overrun_does_not_catch_up() {
        let time = SteppingTime::new();
        let cancel = CancelToken::new();
        let mut clock = FrameClock::new(Duration::from_millis(10), time.now());

        // Stall for 35ms: the next three targets are already in the past
        time.now.set(Duration::from_millis(35));
        let sleeps_before = time.sleeps.get();
        for _ in 0..3 {
            assert_eq!(clock.next_tick(&time, &cancel), Some(0.01));
        }
        assert_eq!(time.sleeps.get(), sleeps_before);

        // Fourth target (40ms) requires a sleep again
        clock.next_tick(&time, &cancel);
        assert_eq!(time.sleeps.get(), sleeps_before + 1);
    }

    #[test]
    fn cancelled_clock_yields_no_tick() {
        let time = SteppingTime::new();
        let cancel = CancelToken::new();
        let mut clock = FrameClock::new(Duration::from_millis(10), time.now());

        cancel.cancel();
        assert_eq!(clock.next_tick(&time, &cancel), None);
        assert_eq!(clock.ticks(), 0);

        cancel.reset();
        assert!(!cancel.is_cancelled());
        assert!(clock.next_tick(&time, &cancel).is_some());
    }

    #[test]
    fn wait_timeout_wakes_on_cancel_from_other_thread() {
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let start = Instant::now();
        assert!(cancel.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }
}
