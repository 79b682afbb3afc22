//! Addressable pixel sinks: the hardware boundary of the engine.
//!
//! Provides the [`PixelSink`] trait consumed by the render loop, plus two
//! implementations selected at construction: [`HardwareRail`] for any
//! `smart-leds` driver and [`MemoryRail`] for headless runs and tests.

use std::sync::Arc;

use parking_lot::Mutex;
use smart_leds_trait::{RGB8, SmartLedsWrite};
use thiserror::Error;

use crate::config::RailConfig;
use crate::trail::Framebuffer;
use crate::types::Rgb;
use crate::COLOR_OFF;

/// Errors reported by a pixel sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The rail could not be acquired. Fatal.
    #[error("failed to initialize LED rail: {0}")]
    Init(String),

    /// A flush failed. Transient; the next frame may succeed.
    #[error("failed to write LED frame: {0}")]
    Write(String),
}

/// Trait for abstracting an ordered array of addressable lights.
///
/// Implement this for your LED hardware (PWM/DMA driver, SPI, simulator) to
/// let the render loop drive it. Colors are always 8-bit RGB; any channel
/// reordering is the sink's job.
pub trait PixelSink {
    /// Acquires and initializes the rail. Failure here is fatal.
    fn begin(&mut self) -> Result<(), SinkError>;

    /// Buffers one pixel. `index` must be below [`pixel_count`](Self::pixel_count).
    fn set_pixel(&mut self, index: usize, color: Rgb);

    /// Flushes buffered pixels to the rail.
    fn show(&mut self) -> Result<(), SinkError>;

    /// Number of pixels on the rail.
    fn pixel_count(&self) -> usize;

    /// Turns every pixel off and flushes.
    fn clear(&mut self) -> Result<(), SinkError> {
        for index in 0..self.pixel_count() {
            self.set_pixel(index, COLOR_OFF);
        }
        self.show()
    }

    /// Copies a whole frame into the buffer and flushes it.
    fn push_frame(&mut self, frame: &Framebuffer) -> Result<(), SinkError> {
        let count = self.pixel_count();
        for (index, &color) in frame.pixels().iter().enumerate().take(count) {
            self.set_pixel(index, color);
        }
        self.show()
    }
}

impl<S: PixelSink + ?Sized> PixelSink for &mut S {
    fn begin(&mut self) -> Result<(), SinkError> {
        (**self).begin()
    }

    fn set_pixel(&mut self, index: usize, color: Rgb) {
        (**self).set_pixel(index, color);
    }

    fn show(&mut self) -> Result<(), SinkError> {
        (**self).show()
    }

    fn pixel_count(&self) -> usize {
        (**self).pixel_count()
    }

    fn clear(&mut self) -> Result<(), SinkError> {
        (**self).clear()
    }

    fn push_frame(&mut self, frame: &Framebuffer) -> Result<(), SinkError> {
        (**self).push_frame(frame)
    }
}

impl<S: PixelSink + ?Sized> PixelSink for Box<S> {
    fn begin(&mut self) -> Result<(), SinkError> {
        (**self).begin()
    }

    fn set_pixel(&mut self, index: usize, color: Rgb) {
        (**self).set_pixel(index, color);
    }

    fn show(&mut self) -> Result<(), SinkError> {
        (**self).show()
    }

    fn pixel_count(&self) -> usize {
        (**self).pixel_count()
    }

    fn clear(&mut self) -> Result<(), SinkError> {
        (**self).clear()
    }

    fn push_frame(&mut self, frame: &Framebuffer) -> Result<(), SinkError> {
        (**self).push_frame(frame)
    }
}

/// Sink backed by any `smart-leds` driver (WS281x over PWM, SPI, RMT, ...).
///
/// Channels are written in the configured [`ColorOrder`](crate::ColorOrder)
/// and scaled by the configured brightness. Use `ColorOrder::Rgb` with drivers
/// that already reorder internally.
pub struct HardwareRail<W> {
    driver: W,
    config: RailConfig,
    buffer: Vec<Rgb>,
}

impl<W> HardwareRail<W>
where
    W: SmartLedsWrite,
    W::Error: core::fmt::Debug,
    RGB8: Into<W::Color>,
{
    /// Wraps a driver for a rail described by `config`.
    pub fn new(driver: W, config: RailConfig) -> Self {
        Self {
            driver,
            buffer: vec![COLOR_OFF; config.led_count()],
            config,
        }
    }

    /// Returns the underlying driver.
    pub fn into_inner(self) -> W {
        self.driver
    }

    fn wire_color(&self, color: Rgb) -> RGB8 {
        let level = u16::from(self.config.brightness());
        let dim = |c: u8| ((u16::from(c) * level) / 255) as u8;
        let [a, b, c] = self.config.color_order().order(color);
        RGB8::new(dim(a), dim(b), dim(c))
    }

    fn write(&mut self) -> Result<(), String> {
        let frame: Vec<RGB8> = self.buffer.iter().map(|&c| self.wire_color(c)).collect();
        self.driver.write(frame).map_err(|e| format!("{e:?}"))
    }
}

impl<W> core::fmt::Debug for HardwareRail<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HardwareRail")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<W> PixelSink for HardwareRail<W>
where
    W: SmartLedsWrite,
    W::Error: core::fmt::Debug,
    RGB8: Into<W::Color>,
{
    fn begin(&mut self) -> Result<(), SinkError> {
        self.config
            .validate()
            .map_err(|e| SinkError::Init(e.to_string()))?;
        self.buffer.fill(COLOR_OFF);
        self.write().map_err(SinkError::Init)
    }

    fn set_pixel(&mut self, index: usize, color: Rgb) {
        if let Some(pixel) = self.buffer.get_mut(index) {
            *pixel = color;
        }
    }

    fn show(&mut self) -> Result<(), SinkError> {
        self.write().map_err(SinkError::Write)
    }

    fn pixel_count(&self) -> usize {
        self.buffer.len()
    }
}

#[derive(Debug)]
struct MemoryState {
    buffer: Vec<Rgb>,
    shown: Vec<Rgb>,
    show_count: u64,
    began: bool,
    fail_begin: bool,
    failing_shows: u32,
}

/// In-memory rail for simulation and tests.
///
/// Keeps the last flushed frame and a flush counter, readable from other
/// threads through a [`RailProbe`].
#[derive(Debug)]
pub struct MemoryRail {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRail {
    /// Creates an all-dark rail sized by `config`.
    pub fn new(config: RailConfig) -> Self {
        let count = config.led_count();
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                buffer: vec![COLOR_OFF; count],
                shown: vec![COLOR_OFF; count],
                show_count: 0,
                began: false,
                fail_begin: false,
                failing_shows: 0,
            })),
        }
    }

    /// Makes [`begin`](PixelSink::begin) fail, simulating absent hardware.
    pub fn failing_begin(self) -> Self {
        self.state.lock().fail_begin = true;
        self
    }

    /// Returns a handle that observes this rail.
    pub fn probe(&self) -> RailProbe {
        RailProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl PixelSink for MemoryRail {
    fn begin(&mut self) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if state.fail_begin {
            return Err(SinkError::Init(String::from("memory rail configured to fail")));
        }
        if state.buffer.is_empty() {
            return Err(SinkError::Init(String::from("rail has no pixels")));
        }
        state.began = true;
        Ok(())
    }

    fn set_pixel(&mut self, index: usize, color: Rgb) {
        if let Some(pixel) = self.state.lock().buffer.get_mut(index) {
            *pixel = color;
        }
    }

    fn show(&mut self) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if state.failing_shows > 0 {
            state.failing_shows -= 1;
            return Err(SinkError::Write(String::from("simulated flush failure")));
        }
        let MemoryState { buffer, shown, .. } = &mut *state;
        shown.copy_from_slice(buffer);
        state.show_count += 1;
        Ok(())
    }

    fn pixel_count(&self) -> usize {
        self.state.lock().buffer.len()
    }
}

/// Read-only view of a [`MemoryRail`], usable after the rail moves to a worker.
#[derive(Debug, Clone)]
pub struct RailProbe {
    state: Arc<Mutex<MemoryState>>,
}

impl RailProbe {
    /// The most recently flushed frame.
    pub fn last_frame(&self) -> Vec<Rgb> {
        self.state.lock().shown.clone()
    }

    /// Number of successful flushes.
    pub fn show_count(&self) -> u64 {
        self.state.lock().show_count
    }

    /// True if [`begin`](PixelSink::begin) succeeded.
    pub fn began(&self) -> bool {
        self.state.lock().began
    }

    /// True when the last flushed frame is entirely black.
    pub fn is_dark(&self) -> bool {
        self.state.lock().shown.iter().all(|p| *p == COLOR_OFF)
    }

    /// Makes the next `count` flushes fail.
    pub fn fail_next_shows(&self, count: u32) {
        self.state.lock().failing_shows = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::ColorOrder;

    #[derive(Default)]
    struct RecordingDriver {
        frames: Vec<Vec<RGB8>>,
        fail: bool,
    }

    impl SmartLedsWrite for RecordingDriver {
        type Error = &'static str;
        type Color = RGB8;

        fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
        where
            T: IntoIterator<Item = I>,
            I: Into<Self::Color>,
        {
            if self.fail {
                return Err("bus error");
            }
            self.frames.push(iterator.into_iter().map(Into::into).collect());
            Ok(())
        }
    }

    #[test]
    fn memory_rail_records_flushed_frame() {
        let mut rail = MemoryRail::new(RailConfig::new(4));
        let probe = rail.probe();
        rail.begin().unwrap();

        rail.set_pixel(2, Rgb::new(1, 2, 3));
        assert!(probe.is_dark());
        rail.show().unwrap();
        assert_eq!(probe.last_frame()[2], Rgb::new(1, 2, 3));
        assert_eq!(probe.show_count(), 1);

        rail.clear().unwrap();
        assert!(probe.is_dark());
        assert_eq!(probe.show_count(), 2);
    }

    #[test]
    fn memory_rail_injected_failures_are_transient() {
        let mut rail = MemoryRail::new(RailConfig::new(4));
        let probe = rail.probe();
        probe.fail_next_shows(1);

        assert!(matches!(rail.show(), Err(SinkError::Write(_))));
        assert!(rail.show().is_ok());
        assert_eq!(probe.show_count(), 1);
    }

    #[test]
    fn memory_rail_begin_can_fail() {
        let mut rail = MemoryRail::new(RailConfig::new(4)).failing_begin();
        assert!(matches!(rail.begin(), Err(SinkError::Init(_))));
        assert!(!rail.probe().began());
    }

    #[test]
    fn hardware_rail_applies_order_and_brightness() {
        let config = RailConfig::new(2)
            .with_color_order(ColorOrder::Grb)
            .with_brightness(128);
        let mut rail = HardwareRail::new(RecordingDriver::default(), config);
        rail.begin().unwrap();

        rail.set_pixel(0, Rgb::new(255, 0, 10));
        rail.show().unwrap();

        let driver = rail.into_inner();
        assert_eq!(driver.frames.len(), 2);
        assert_eq!(driver.frames[0], vec![RGB8::new(0, 0, 0); 2]);
        assert_eq!(driver.frames[1][0], RGB8::new(0, 128, 5));
    }

    #[test]
    fn hardware_rail_maps_driver_errors() {
        let driver = RecordingDriver {
            fail: true,
            ..Default::default()
        };
        let mut rail = HardwareRail::new(driver, RailConfig::new(2));
        assert!(matches!(rail.begin(), Err(SinkError::Init(_))));
        assert!(matches!(rail.show(), Err(SinkError::Write(_))));
    }
}
