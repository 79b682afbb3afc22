//! Time abstraction for platform-agnostic and testable frame pacing.

use core::time::Duration;
use std::time::Instant;

use crate::clock::CancelToken;

/// Trait for abstracting monotonic time and sleeping.
///
/// `now` is measured from an arbitrary, fixed epoch. Implementations must never
/// go backwards.
pub trait TimeSource {
    /// Returns the time elapsed since this source's epoch.
    fn now(&self) -> Duration;

    /// Blocks for `duration`, returning early once `cancel` is set.
    fn sleep(&self, duration: Duration, cancel: &CancelToken);
}

/// Wall-clock time source backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    epoch: Instant,
}

impl SystemTimeSource {
    /// Creates a time source whose epoch is the moment of creation.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) {
        cancel.wait_timeout(duration);
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) {
        (**self).sleep(duration, cancel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_time_is_monotonic() {
        let source = SystemTimeSource::new();
        let a = source.now();
        let b = source.now();
        assert!(b >= a);
    }

    #[test]
    fn sleep_returns_early_when_cancelled() {
        let source = SystemTimeSource::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let start = source.now();
        source.sleep(Duration::from_secs(5), &cancel);
        assert!(source.now() - start < Duration::from_secs(1));
    }
}
