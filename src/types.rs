//! Core value types and validation errors shared across the engine.

use palette::Srgb;
use thiserror::Error;

/// An 8-bit-per-channel RGB triple.
///
/// This is the only color representation used inside the engine. Packing into
/// a wire format happens at the sink boundary via [`ColorOrder`](crate::ColorOrder).
pub type Rgb = Srgb<u8>;

/// How a render loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunOutcome {
    /// Every event reached its completion condition.
    Completed,

    /// The cancellation token was set before completion.
    Cancelled,
}

/// Event validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    /// Distance must be positive.
    #[error("distance must be greater than zero")]
    ZeroDistance,

    /// Rail must have at least one pixel.
    #[error("rail must have at least one LED")]
    ZeroRailLeds,

    /// Lap length must be positive.
    #[error("lap length must be greater than zero")]
    ZeroLapLength,

    /// Constant-pace events need a positive, finite target time.
    #[error("target time must be a positive number of seconds, got {0}")]
    InvalidTargetTime(f64),

    /// Split count does not match the number of 100 m segments.
    #[error("expected {expected} splits (one per 100m), got {actual}")]
    SplitCountMismatch {
        /// `distance_m / 100`.
        expected: usize,
        /// Number of splits supplied.
        actual: usize,
    },

    /// A split time is zero, negative, or not finite.
    #[error("split {index} must be a positive number of seconds, got {value}")]
    InvalidSplit {
        /// Position of the offending split.
        index: usize,
        /// The rejected value.
        value: f64,
    },
}

/// Configuration errors detected before any frame is rendered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The rail configuration has no pixels.
    #[error("rail configuration must have at least one LED")]
    ZeroLedCount,

    /// The frame rate cap is zero.
    #[error("max fps must be greater than zero")]
    ZeroFrameRate,

    /// No events were submitted.
    #[error("no events submitted")]
    NoEvents,

    /// An event targets a rail of a different size than the sink.
    #[error("event targets {event} LEDs but the rail has {rail}")]
    RailMismatch {
        /// `rail_leds` of the event.
        event: usize,
        /// Pixel count of the sink.
        rail: usize,
    },

    /// The sink does not have the configured number of pixels.
    #[error("rail is configured for {configured} LEDs but the sink has {sink}")]
    SinkSizeMismatch {
        /// `RailConfig::led_count`.
        configured: usize,
        /// Pixel count reported by the sink.
        sink: usize,
    },

    /// Parallel events must share the same rail size.
    #[error("all events must use the same rail LEDs to run in parallel ({first} vs {second})")]
    ParallelRailMismatch {
        /// `rail_leds` of the first event.
        first: usize,
        /// `rail_leds` of the second event.
        second: usize,
    },

    /// Parallel events must share the same lap length.
    #[error("all events must use the same lap length to run in parallel ({first}m vs {second}m)")]
    ParallelLapMismatch {
        /// `laps_m` of the first event.
        first: u32,
        /// `laps_m` of the second event.
        second: u32,
    },
}
