//! Shared test infrastructure for pace-rail integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pace_rail::{CancelToken, Event, PixelSink, Rgb, SinkError, TimeSource};

// ============================================================================
// Logging
// ============================================================================

/// Routes `tracing` output to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Manual Time Source
// ============================================================================

/// Simulated clock: `sleep` advances time instantly.
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    now: Arc<Mutex<Duration>>,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance time by the given duration
    pub fn advance(&self, duration: Duration) {
        *self.now.lock() += duration;
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> Duration {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration, _cancel: &CancelToken) {
        self.advance(duration);
    }
}

// ============================================================================
// Scripted Sink
// ============================================================================

/// Sink that records every flushed frame and can misbehave on cue.
#[derive(Debug, Default)]
pub struct ScriptedState {
    pub frames: Vec<Vec<Rgb>>,
    pub failed_shows: u32,
}

pub struct ScriptedRail {
    buffer: Vec<Rgb>,
    state: Arc<Mutex<ScriptedState>>,
    /// Time charged to every flush.
    latency: Option<(ManualTime, Duration)>,
    /// Flush numbers (1-based) that fail.
    fail_on: Vec<usize>,
    /// Cancel this token after the given number of flushes.
    cancel_after: Option<(usize, CancelToken)>,
    /// Panic while buffering during this flush number.
    panic_on: Option<usize>,
    attempts: usize,
}

impl ScriptedRail {
    pub fn new(len: usize) -> Self {
        Self {
            buffer: vec![Rgb::new(0, 0, 0); len],
            state: Arc::default(),
            latency: None,
            fail_on: Vec::new(),
            cancel_after: None,
            panic_on: None,
            attempts: 0,
        }
    }

    pub fn with_latency(mut self, time: ManualTime, latency: Duration) -> Self {
        self.latency = Some((time, latency));
        self
    }

    pub fn failing_on(mut self, flushes: &[usize]) -> Self {
        self.fail_on = flushes.to_vec();
        self
    }

    pub fn cancelling_after(mut self, flushes: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((flushes, token));
        self
    }

    pub fn panicking_on(mut self, flush: usize) -> Self {
        self.panic_on = Some(flush);
        self
    }

    pub fn state(&self) -> Arc<Mutex<ScriptedState>> {
        Arc::clone(&self.state)
    }
}

impl PixelSink for ScriptedRail {
    fn begin(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn set_pixel(&mut self, index: usize, color: Rgb) {
        if self.panic_on == Some(self.attempts + 1) {
            self.panic_on = None;
            panic!("scripted panic");
        }
        self.buffer[index] = color;
    }

    fn show(&mut self) -> Result<(), SinkError> {
        self.attempts += 1;
        if let Some((time, latency)) = &self.latency {
            time.advance(*latency);
        }
        if let Some((after, token)) = &self.cancel_after {
            if self.attempts >= *after {
                token.cancel();
            }
        }
        if self.fail_on.contains(&self.attempts) {
            self.state.lock().failed_shows += 1;
            return Err(SinkError::Write(String::from("scripted failure")));
        }
        self.state.lock().frames.push(self.buffer.clone());
        Ok(())
    }

    fn pixel_count(&self) -> usize {
        self.buffer.len()
    }
}

// ============================================================================
// Event Helpers
// ============================================================================

pub const INTERVAL: Duration = Duration::from_millis(10);

pub fn constant_event(name: &str, distance: u32, seconds: f64) -> Event {
    Event::builder()
        .name(name)
        .distance_m(distance)
        .target_time_s(seconds)
        .rail_leds(200)
        .laps_m(400)
        .build()
        .unwrap()
}

pub fn eight_hundred_splits() -> Event {
    Event::builder()
        .name("800m splits")
        .distance_m(800)
        .splits([14.0, 14.0, 14.0, 14.0, 15.0, 15.0, 15.0, 15.0])
        .rail_leds(200)
        .laps_m(400)
        .build()
        .unwrap()
}

pub fn lit_indices(frame: &[Rgb]) -> Vec<usize> {
    frame
        .iter()
        .enumerate()
        .filter(|(_, p)| **p != Rgb::new(0, 0, 0))
        .map(|(i, _)| i)
        .collect()
}
