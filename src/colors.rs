//! Color arithmetic and wire packing helpers.
//!
//! The engine works exclusively with 8-bit [`Rgb`] triples. Blending and dimming
//! happen here; conversion to a device byte order only happens at the sink.

use crate::types::Rgb;

/// Adds two colors channel by channel, saturating at 255.
#[inline]
pub fn blend_additive(existing: Rgb, incoming: Rgb) -> Rgb {
    Rgb::new(
        existing.red.saturating_add(incoming.red),
        existing.green.saturating_add(incoming.green),
        existing.blue.saturating_add(incoming.blue),
    )
}

/// Scales each channel by `factor`, flooring to an integer.
///
/// `factor` is clamped to `0.0..=1.0`.
#[inline]
pub fn scale(color: Rgb, factor: f64) -> Rgb {
    let factor = factor.clamp(0.0, 1.0);
    let channel = |c: u8| (f64::from(c) * factor).floor() as u8;
    Rgb::new(channel(color.red), channel(color.green), channel(color.blue))
}

/// Channel order expected by the LED hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorOrder {
    /// Red, green, blue.
    Rgb,

    /// Green, red, blue. Common on WS281x and UCS1903 strips.
    #[default]
    Grb,

    /// Blue, red, green.
    Brg,
}

impl ColorOrder {
    /// Returns the three channels in wire order.
    #[inline]
    pub fn order(self, color: Rgb) -> [u8; 3] {
        let (red, green, blue) = (color.red, color.green, color.blue);
        match self {
            ColorOrder::Rgb => [red, green, blue],
            ColorOrder::Grb => [green, red, blue],
            ColorOrder::Brg => [blue, red, green],
        }
    }

    /// Packs a color into a 24-bit integer, first wire channel in the high byte.
    #[inline]
    pub fn pack(self, color: Rgb) -> u32 {
        let [a, b, c] = self.order(color);
        (u32::from(a) << 16) | (u32::from(b) << 8) | u32::from(c)
    }
}
