//! Paced event description and its derived kinematics.

use core::fmt;

use crate::colors::scale;
use crate::types::{EventError, Rgb};

/// Length of one split segment in meters.
pub const SEGMENT_METERS: f64 = 100.0;

/// Distance of a mile race in meters.
pub const MILE_DISTANCE_M: u32 = 1609;

/// Rail index where a mile race starts on the reference 200-LED rail.
pub const MILE_START_LED: usize = 191;

/// Default head color (green).
pub const DEFAULT_COLOR: Rgb = Rgb::new(0, 255, 0);

/// Default number of trailing pixels.
pub const DEFAULT_TRAIL_LEN: usize = 5;

/// Default lap length in meters.
pub const DEFAULT_LAP_M: u32 = 400;

/// One paced run: how far, how fast, and how it looks on the rail.
///
/// Events are immutable once built. Every derived quantity is computed on
/// demand from the fields, so there is no cached state to invalidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    name: String,
    distance_m: u32,
    rail_leds: usize,
    target_time_s: f64,
    laps_m: u32,
    color: Rgb,
    trail_len: usize,
    splits_100: Option<Vec<f64>>,
    start_led: Option<usize>,
}

impl Event {
    /// Creates a new event builder.
    pub fn builder() -> EventBuilder {
        EventBuilder::new()
    }

    /// Label shown to the operator.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total race distance in meters.
    pub fn distance_m(&self) -> u32 {
        self.distance_m
    }

    /// Pixel count of the rail this event is laid out for.
    pub fn rail_leds(&self) -> usize {
        self.rail_leds
    }

    /// Target finish time. Equals the split sum for split-paced events.
    pub fn target_time_s(&self) -> f64 {
        self.target_time_s
    }

    /// Meters represented by one full pass of the rail.
    pub fn laps_m(&self) -> u32 {
        self.laps_m
    }

    /// Head color.
    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Number of dimmed pixels behind the head.
    pub fn trail_len(&self) -> usize {
        self.trail_len
    }

    /// Per-100 m target times, if this is a split-paced event.
    pub fn splits(&self) -> Option<&[f64]> {
        self.splits_100.as_deref()
    }

    /// Custom starting index of the head, if any.
    pub fn start_led(&self) -> Option<usize> {
        self.start_led
    }

    /// True when the event runs at variable pace from splits.
    pub fn uses_splits(&self) -> bool {
        self.splits_100.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// Average pace in meters per second, 0.0 when the target time is not positive.
    pub fn pace_mps(&self) -> f64 {
        if self.target_time_s > 0.0 {
            f64::from(self.distance_m) / self.target_time_s
        } else {
            0.0
        }
    }

    /// Rail pixels per track meter, 0.0 when the lap length is zero.
    pub fn leds_per_meter(&self) -> f64 {
        if self.laps_m > 0 {
            self.rail_leds as f64 / f64::from(self.laps_m)
        } else {
            0.0
        }
    }

    /// Constant-pace head velocity in pixels per second.
    pub fn velocity_leds_per_sec(&self) -> f64 {
        self.pace_mps() * self.leds_per_meter()
    }

    /// Number of full rail passes the head makes, at least one.
    pub fn total_led_traversals(&self) -> u32 {
        if self.laps_m == 0 {
            return 1;
        }
        self.distance_m.div_ceil(self.laps_m).max(1)
    }

    /// Target seconds per lap.
    pub fn lap_time_s(&self) -> f64 {
        if self.distance_m == 0 {
            return 0.0;
        }
        self.target_time_s * f64::from(self.laps_m) / f64::from(self.distance_m)
    }

    /// Precomputed trail colors, dimmest first, head last.
    ///
    /// Has `trail_len + 1` entries. The brightness factor for entry `i` is
    /// `max(0.1, 1 - (trail_len - i) / trail_len)`, so the tail never goes
    /// fully dark and the head is drawn at full color.
    pub fn trail_levels(&self) -> Vec<Rgb> {
        let span = self.trail_len.max(1) as f64;
        (0..=self.trail_len)
            .map(|i| {
                let distance_from_head = (self.trail_len - i) as f64;
                let factor = (1.0 - distance_from_head / span).max(0.1);
                scale(self.color, factor)
            })
            .collect()
    }

    /// Head index at the start of a run on a rail of `rail_leds` pixels.
    pub fn initial_position(&self, rail_leds: usize) -> usize {
        match self.start_led {
            Some(led) if rail_leds > 0 => led % rail_leds,
            _ => 0,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} — {}m in {:.1}s • LEDs:{} • trail:{}",
            self.name, self.distance_m, self.target_time_s, self.rail_leds, self.trail_len
        )?;
        if self.uses_splits() {
            write!(f, " • custom splits")?;
        }
        if self.start_led == Some(MILE_START_LED) {
            write!(f, " • start@{MILE_START_LED}")?;
        }
        Ok(())
    }
}

/// Builder for validated events.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    name: String,
    distance_m: u32,
    rail_leds: usize,
    target_time_s: f64,
    laps_m: u32,
    color: Rgb,
    trail_len: usize,
    splits_100: Option<Vec<f64>>,
    start_led: Option<usize>,
}

impl EventBuilder {
    /// Creates a builder with the reference defaults: 400 m laps, green head,
    /// five trailing pixels, 200-LED rail.
    pub fn new() -> Self {
        Self {
            name: String::new(),
            distance_m: 0,
            rail_leds: crate::config::DEFAULT_LED_COUNT,
            target_time_s: 0.0,
            laps_m: DEFAULT_LAP_M,
            color: DEFAULT_COLOR,
            trail_len: DEFAULT_TRAIL_LEN,
            splits_100: None,
            start_led: None,
        }
    }

    /// Sets the label. Blank names become "Race".
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the race distance in meters.
    pub fn distance_m(mut self, distance_m: u32) -> Self {
        self.distance_m = distance_m;
        self
    }

    /// Sets the rail pixel count.
    pub fn rail_leds(mut self, rail_leds: usize) -> Self {
        self.rail_leds = rail_leds;
        self
    }

    /// Sets the target finish time. Ignored when splits are supplied.
    pub fn target_time_s(mut self, seconds: f64) -> Self {
        self.target_time_s = seconds;
        self
    }

    /// Sets the lap length represented by one rail pass.
    pub fn laps_m(mut self, laps_m: u32) -> Self {
        self.laps_m = laps_m;
        self
    }

    /// Sets the head color.
    pub fn color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    /// Sets the trail length.
    pub fn trail_len(mut self, trail_len: usize) -> Self {
        self.trail_len = trail_len;
        self
    }

    /// Switches the event to split pace with one time per 100 m.
    pub fn splits(mut self, splits: impl Into<Vec<f64>>) -> Self {
        self.splits_100 = Some(splits.into());
        self
    }

    /// Starts the head at a fixed index instead of 0.
    pub fn start_led(mut self, led: usize) -> Self {
        self.start_led = Some(led);
        self
    }

    /// Starts the head at the mile start mark.
    pub fn mile_start(self) -> Self {
        self.start_led(MILE_START_LED)
    }

    /// Builds and validates the event.
    ///
    /// # Errors
    /// * `ZeroDistance`, `ZeroRailLeds`, `ZeroLapLength` - a size field is zero
    /// * `InvalidTargetTime` - no splits and the target time is not positive
    /// * `SplitCountMismatch` - splits given but not one per 100 m
    /// * `InvalidSplit` - a split is not a positive finite number
    pub fn build(self) -> Result<Event, EventError> {
        if self.distance_m == 0 {
            return Err(EventError::ZeroDistance);
        }
        if self.rail_leds == 0 {
            return Err(EventError::ZeroRailLeds);
        }
        if self.laps_m == 0 {
            return Err(EventError::ZeroLapLength);
        }

        let splits = self.splits_100.filter(|s| !s.is_empty());
        let target_time_s = match &splits {
            Some(splits) => {
                let expected = (self.distance_m / 100) as usize;
                if splits.len() != expected {
                    return Err(EventError::SplitCountMismatch {
                        expected,
                        actual: splits.len(),
                    });
                }
                if let Some((index, &value)) = splits
                    .iter()
                    .enumerate()
                    .find(|&(_, &s)| !(s.is_finite() && s > 0.0))
                {
                    return Err(EventError::InvalidSplit { index, value });
                }
                splits.iter().sum()
            }
            None => {
                if !(self.target_time_s.is_finite() && self.target_time_s > 0.0) {
                    return Err(EventError::InvalidTargetTime(self.target_time_s));
                }
                self.target_time_s
            }
        };

        let name = match self.name.trim() {
            "" => String::from("Race"),
            trimmed => String::from(trimmed),
        };

        Ok(Event {
            name,
            distance_m: self.distance_m,
            rail_leds: self.rail_leds,
            target_time_s,
            laps_m: self.laps_m,
            color: self.color,
            trail_len: self.trail_len,
            splits_100: splits,
            start_led: self.start_led,
        })
    }
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new()
    }
}
