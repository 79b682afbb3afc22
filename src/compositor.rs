//! Render loop that drives one or two paced events on a shared rail.
//!
//! Provides [`Compositor`], which owns the validated events for one run and
//! executes the fixed-cadence frame loop against a [`PixelSink`]. Contributions
//! from concurrent events are merged additively into a single framebuffer per
//! tick, so the sink only ever sees whole frames.

use core::time::Duration;

use heapless::Vec as BoundedVec;
use tracing::{debug, info, warn};

use crate::clock::{CancelToken, FrameClock};
use crate::event::Event;
use crate::sink::PixelSink;
use crate::time::TimeSource;
use crate::tracker::{CompletionPolicy, RunState};
use crate::trail::{Framebuffer, draw_trail};
use crate::types::{ConfigError, Rgb, RunOutcome};

/// Maximum number of events sharing one rail.
pub const MAX_PARALLEL_EVENTS: usize = 2;

/// Whether a run renders one event alone or composites a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunMode {
    /// One event, finishing on distance regardless of pace mode.
    Single,

    /// Up to two events blended together, each finishing on its parallel policy.
    Parallel,
}

/// Final state of one event at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerReport {
    /// Event label.
    pub name: String,
    /// Head position when the run ended.
    pub position: f64,
    /// Simulated distance covered.
    pub meters_done: f64,
    /// Full rail wraps performed.
    pub traversal_count: u32,
    /// Whether the event met its completion rule.
    pub done: bool,
}

/// Summary returned by every render loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// How the loop ended.
    pub outcome: RunOutcome,
    /// Ticks simulated after the startup frame.
    pub ticks: u64,
    /// Time spent pushing the initial blank frame.
    pub startup_delay: Duration,
    /// Startup delay plus `ticks` fixed intervals.
    pub simulated: Duration,
    /// Per-event final state, in submission order.
    pub events: BoundedVec<TrackerReport, MAX_PARALLEL_EVENTS>,
}

/// Clears the rail when dropped, on every exit path including unwinding.
struct RailGuard<'a, S: PixelSink> {
    sink: &'a mut S,
}

impl<S: PixelSink> Drop for RailGuard<'_, S> {
    fn drop(&mut self) {
        if let Err(err) = self.sink.clear() {
            warn!(error = %err, "failed to clear rail after run");
        }
    }
}

struct Track<'e> {
    event: &'e Event,
    state: RunState,
    levels: Vec<Rgb>,
}

/// A validated group of events ready to render together.
#[derive(Debug, Clone)]
pub struct Compositor {
    events: BoundedVec<Event, MAX_PARALLEL_EVENTS>,
    mode: RunMode,
}

impl Compositor {
    /// Prepares a single-event run.
    pub fn single(event: Event) -> Self {
        Self {
            events: core::iter::once(event).collect(),
            mode: RunMode::Single,
        }
    }

    /// Prepares a parallel run of one or two events.
    ///
    /// Events beyond the second are dropped. Both events must share the same
    /// rail size and lap length.
    ///
    /// # Errors
    /// * `NoEvents` - nothing was supplied
    /// * `ParallelRailMismatch` / `ParallelLapMismatch` - the pair is incompatible
    pub fn parallel<I>(events: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Event>,
    {
        let mut kept: BoundedVec<Event, MAX_PARALLEL_EVENTS> = BoundedVec::new();
        let mut dropped = 0usize;
        for event in events {
            if kept.push(event).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!(dropped, "parallel runs are limited to two events, extra events ignored");
        }

        let Some(first) = kept.first() else {
            return Err(ConfigError::NoEvents);
        };
        for other in kept.iter().skip(1) {
            if other.rail_leds() != first.rail_leds() {
                return Err(ConfigError::ParallelRailMismatch {
                    first: first.rail_leds(),
                    second: other.rail_leds(),
                });
            }
            if other.laps_m() != first.laps_m() {
                return Err(ConfigError::ParallelLapMismatch {
                    first: first.laps_m(),
                    second: other.laps_m(),
                });
            }
        }

        Ok(Self {
            events: kept,
            mode: RunMode::Parallel,
        })
    }

    /// Events in this run.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Single or parallel.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Checks every event matches a rail of `rail_leds` pixels.
    pub fn check_rail(&self, rail_leds: usize) -> Result<(), ConfigError> {
        match self.events.iter().find(|e| e.rail_leds() != rail_leds) {
            Some(event) => Err(ConfigError::RailMismatch {
                event: event.rail_leds(),
                rail: rail_leds,
            }),
            None => Ok(()),
        }
    }

    fn policy_for(&self, event: &Event) -> CompletionPolicy {
        match self.mode {
            RunMode::Single => CompletionPolicy::Distance,
            RunMode::Parallel => CompletionPolicy::parallel(event),
        }
    }

    /// Runs the frame loop until every event is done or `cancel` is set.
    ///
    /// Pushes one blank frame first and pre-advances every event by the time
    /// that push took. Each tick then advances the trackers by exactly
    /// `interval`, composites their trails, and flushes one frame. The rail is
    /// cleared on exit, however the loop ends.
    ///
    /// Flush failures during the run are logged and skipped.
    ///
    /// # Errors
    /// * `RailMismatch` - the sink's pixel count differs from the events' rail;
    ///   reported before anything is drawn
    pub fn run<S, T>(
        &self,
        sink: &mut S,
        time: &T,
        interval: Duration,
        cancel: &CancelToken,
    ) -> Result<RunReport, ConfigError>
    where
        S: PixelSink,
        T: TimeSource,
    {
        let rail_leds = sink.pixel_count();
        self.check_rail(rail_leds)?;

        let mut tracks: BoundedVec<Track<'_>, MAX_PARALLEL_EVENTS> = self
            .events
            .iter()
            .map(|event| Track {
                event,
                state: RunState::new(event, self.policy_for(event)),
                levels: event.trail_levels(),
            })
            .collect();

        info!(
            mode = ?self.mode,
            events = ?self.events.iter().map(Event::name).collect::<Vec<_>>(),
            "starting run"
        );

        let mut guard = RailGuard { sink };
        let mut frame = Framebuffer::new(rail_leds);

        let started = time.now();
        if let Err(err) = guard.sink.push_frame(&frame) {
            warn!(error = %err, "startup frame failed");
        }
        let startup_delay = time.now().saturating_sub(started);
        let startup_secs = startup_delay.as_secs_f64();
        if startup_secs > 0.0 {
            for track in tracks.iter_mut() {
                track.state.advance(startup_secs);
            }
        }
        debug!(startup_delay_ms = startup_secs * 1000.0, "compensated startup delay");

        let mut clock = FrameClock::new(interval, time.now());
        let outcome = loop {
            let Some(dt) = clock.next_tick(time, cancel) else {
                break RunOutcome::Cancelled;
            };

            frame.clear();
            let mut all_done = true;
            for track in tracks.iter_mut() {
                if track.state.is_done() {
                    continue;
                }
                if track.state.step(dt) {
                    debug!(
                        event = track.event.name(),
                        meters = track.state.meters_done(),
                        traversals = track.state.traversal_count(),
                        "event finished"
                    );
                    continue;
                }
                all_done = false;
                draw_trail(&mut frame, track.state.head_index(), &track.levels);
            }

            if all_done {
                break RunOutcome::Completed;
            }

            if let Err(err) = guard.sink.push_frame(&frame) {
                warn!(error = %err, tick = clock.ticks(), "frame dropped");
            }
        };
        drop(guard);

        let report = RunReport {
            outcome,
            ticks: clock.ticks(),
            startup_delay,
            simulated: startup_delay + clock.simulated(),
            events: tracks
                .iter()
                .map(|track| TrackerReport {
                    name: String::from(track.event.name()),
                    position: track.state.position(),
                    meters_done: track.state.meters_done(),
                    traversal_count: track.state.traversal_count(),
                    done: track.state.is_done(),
                })
                .collect(),
        };

        info!(
            outcome = ?report.outcome,
            ticks = report.ticks,
            simulated_s = report.simulated.as_secs_f64(),
            "run finished"
        );
        Ok(report)
    }
}
