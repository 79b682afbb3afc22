//! Per-event position and distance tracking.

use crate::event::{Event, SEGMENT_METERS};

/// Rule deciding when a tracked event has finished.
///
/// Events rendered on their own always use [`Distance`](Self::Distance).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompletionPolicy {
    /// Done once `meters_done >= distance_m`.
    Distance,

    /// Done once the head has wrapped `total_led_traversals` times.
    Traversals,
}

impl CompletionPolicy {
    /// Policy for an event sharing the rail with another.
    ///
    /// Split-paced events keep the distance rule; constant-pace events finish
    /// on traversal count. The two can disagree by a fraction of a lap when the
    /// distance is not a multiple of the lap length.
    pub fn parallel(event: &Event) -> Self {
        if event.uses_splits() {
            CompletionPolicy::Distance
        } else {
            CompletionPolicy::Traversals
        }
    }
}

/// Mutable simulation state of one event during a run.
#[derive(Debug, Clone)]
pub struct RunState {
    position: f64,
    meters_done: f64,
    traversal_count: u32,
    done: bool,
    rail_leds: usize,
    leds_per_meter: f64,
    constant_velocity: f64,
    splits: Option<Vec<f64>>,
    distance_m: f64,
    traversals_needed: u32,
    policy: CompletionPolicy,
}

impl RunState {
    /// Creates the starting state for `event` under `policy`.
    pub fn new(event: &Event, policy: CompletionPolicy) -> Self {
        let rail_leds = event.rail_leds();
        Self {
            position: event.initial_position(rail_leds) as f64,
            meters_done: 0.0,
            traversal_count: 0,
            done: false,
            rail_leds,
            leds_per_meter: event.leds_per_meter(),
            constant_velocity: event.velocity_leds_per_sec(),
            splits: event.splits().map(<[f64]>::to_vec),
            distance_m: f64::from(event.distance_m()),
            traversals_needed: event.total_led_traversals(),
            policy,
        }
    }

    /// Head position as a fractional rail index.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Integer index of the head pixel.
    pub fn head_index(&self) -> usize {
        self.position.floor() as usize
    }

    /// Simulated distance covered so far.
    pub fn meters_done(&self) -> f64 {
        self.meters_done
    }

    /// Number of full rail wraps so far.
    pub fn traversal_count(&self) -> u32 {
        self.traversal_count
    }

    /// True once the completion policy is satisfied.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Completion rule in effect.
    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    /// Index of the 100 m segment currently being run, clamped to the last split.
    pub fn segment_index(&self) -> usize {
        let count = self.splits.as_ref().map_or(1, Vec::len).max(1);
        let segment = (self.meters_done / SEGMENT_METERS).floor() as usize;
        segment.min(count - 1)
    }

    /// Current head velocity in pixels per second.
    ///
    /// Constant for a fixed-pace event; derived from the active split otherwise.
    pub fn velocity(&self) -> f64 {
        match &self.splits {
            Some(splits) if !splits.is_empty() => {
                let split = splits[self.segment_index()];
                if split > 0.0 {
                    SEGMENT_METERS / split * self.leds_per_meter
                } else {
                    0.0
                }
            }
            _ => self.constant_velocity,
        }
    }

    /// Moves the head forward by `dt` seconds at the current velocity.
    ///
    /// Wraps the position back onto the rail, counting one traversal per wrap.
    pub fn advance(&mut self, dt: f64) {
        let velocity = self.velocity();
        self.position += velocity * dt;
        if self.leds_per_meter > 0.0 {
            self.meters_done += velocity / self.leds_per_meter * dt;
        }

        let rail = self.rail_leds as f64;
        while self.position >= rail {
            self.position -= rail;
            self.traversal_count += 1;
        }
    }

    /// Evaluates the completion policy and latches `done`.
    pub fn check_complete(&mut self) -> bool {
        if !self.done {
            self.done = match self.policy {
                CompletionPolicy::Distance => self.meters_done >= self.distance_m,
                CompletionPolicy::Traversals => self.traversal_count >= self.traversals_needed,
            };
        }
        self.done
    }

    /// Advances one tick and reports whether the event is now finished.
    pub fn step(&mut self, dt: f64) -> bool {
        if self.done {
            return true;
        }
        self.advance(dt);
        self.check_complete()
    }
}
