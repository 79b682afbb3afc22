#![doc = include_str!("../README.md")]

//! # Core Concepts
//!
//! - **`Event`**: Immutable description of one paced run (distance, target time or splits, look)
//! - **`RunState`**: Per-event position, distance and traversal tracking during a run
//! - **`CompletionPolicy`**: Whether an event finishes on distance or on rail traversals
//! - **`FrameClock`**: Fixed-interval tick scheduler with a deterministic `dt`
//! - **`CancelToken`**: Shared stop signal polled by the render loop
//! - **`Framebuffer`** / **`draw_trail`**: Head-and-trail drawing with additive blending
//! - **`Compositor`**: Runs one or two events on the shared rail and reports the result
//! - **`Orchestrator`**: Owns the rail on a worker thread; submit, queue, cancel, poll
//! - **`PixelSink`**: Trait to implement for your LED hardware
//! - **`TimeSource`**: Trait to implement for your timing system
//!
//! The engine uses 8-bit `Srgb<u8>` triples for all color work. Channel
//! reordering into the strip's wire format only happens inside a sink.

pub use palette::Srgb;

pub mod clock;
pub mod colors;
pub mod command;
pub mod compositor;
pub mod config;
pub mod event;
pub mod orchestrator;
pub mod sink;
pub mod time;
pub mod tracker;
pub mod trail;
pub mod types;

pub use clock::{CancelToken, FrameClock};
pub use colors::{ColorOrder, blend_additive};
pub use command::RunCommand;
pub use compositor::{Compositor, MAX_PARALLEL_EVENTS, RunMode, RunReport, TrackerReport};
pub use config::RailConfig;
pub use event::{Event, EventBuilder, MILE_DISTANCE_M, MILE_START_LED, SEGMENT_METERS};
pub use orchestrator::{Orchestrator, OrchestratorError, QUEUE_CAPACITY, RunnerState};
pub use sink::{HardwareRail, MemoryRail, PixelSink, RailProbe, SinkError};
pub use time::{SystemTimeSource, TimeSource};
pub use tracker::{CompletionPolicy, RunState};
pub use trail::{Framebuffer, draw_trail};
pub use types::{ConfigError, EventError, Rgb, RunOutcome};

/// All channels off.
pub const COLOR_OFF: Rgb = Rgb::new(0, 0, 0);
