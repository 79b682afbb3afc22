//! Immutable rail configuration.

use core::time::Duration;

use crate::colors::ColorOrder;
use crate::types::ConfigError;

/// Default number of LEDs on the rail.
pub const DEFAULT_LED_COUNT: usize = 200;

/// Default rendering cap. Keeps CPU load reasonable on small boards.
pub const DEFAULT_MAX_FPS: u32 = 120;

/// Rail and render settings, fixed for the lifetime of a sink.
///
/// Passed once at construction instead of living in process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RailConfig {
    led_count: usize,
    color_order: ColorOrder,
    max_fps: u32,
    brightness: u8,
}

impl RailConfig {
    /// Creates a configuration for a rail of `led_count` pixels with default
    /// GRB order, 120 fps and full brightness.
    pub const fn new(led_count: usize) -> Self {
        Self {
            led_count,
            color_order: ColorOrder::Grb,
            max_fps: DEFAULT_MAX_FPS,
            brightness: u8::MAX,
        }
    }

    /// Sets the hardware channel order.
    pub const fn with_color_order(mut self, order: ColorOrder) -> Self {
        self.color_order = order;
        self
    }

    /// Sets the frame rate cap.
    pub const fn with_max_fps(mut self, fps: u32) -> Self {
        self.max_fps = fps;
        self
    }

    /// Sets the global brightness applied by hardware sinks.
    pub const fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness;
        self
    }

    /// Checks the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.led_count == 0 {
            return Err(ConfigError::ZeroLedCount);
        }
        if self.max_fps == 0 {
            return Err(ConfigError::ZeroFrameRate);
        }
        Ok(())
    }

    /// Number of pixels on the rail.
    pub fn led_count(&self) -> usize {
        self.led_count
    }

    /// Hardware channel order.
    pub fn color_order(&self) -> ColorOrder {
        self.color_order
    }

    /// Frame rate cap.
    pub fn max_fps(&self) -> u32 {
        self.max_fps
    }

    /// Global brightness, 255 is full.
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Fixed simulation step, `1 / max_fps` seconds.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.max_fps.max(1)))
    }
}

impl Default for RailConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LED_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_rail() {
        let config = RailConfig::default();
        assert_eq!(config.led_count(), 200);
        assert_eq!(config.color_order(), ColorOrder::Grb);
        assert_eq!(config.max_fps(), 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_rail_and_zero_fps() {
        assert_eq!(RailConfig::new(0).validate(), Err(ConfigError::ZeroLedCount));
        assert_eq!(
            RailConfig::new(10).with_max_fps(0).validate(),
            Err(ConfigError::ZeroFrameRate)
        );
    }

    #[test]
    fn frame_interval_is_reciprocal_of_fps() {
        let config = RailConfig::new(10).with_max_fps(50);
        assert_eq!(config.frame_interval(), Duration::from_millis(20));
    }
}
