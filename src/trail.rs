//! Framebuffer and head-and-trail drawing.

use crate::colors::blend_additive;
use crate::types::Rgb;
use crate::COLOR_OFF;

/// One frame of pixel colors for the whole rail.
///
/// Rebuilt from black every tick; nothing carries over between frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pixels: Vec<Rgb>,
}

impl Framebuffer {
    /// Creates an all-black framebuffer of `len` pixels.
    pub fn new(len: usize) -> Self {
        Self {
            pixels: vec![COLOR_OFF; len],
        }
    }

    /// Resets every pixel to black.
    pub fn clear(&mut self) {
        self.pixels.fill(COLOR_OFF);
    }

    /// Adds `color` onto pixel `index`, saturating per channel.
    ///
    /// Out-of-range indices are ignored.
    pub fn blend(&mut self, index: usize, color: Rgb) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = blend_additive(*pixel, color);
        }
    }

    /// Pixel colors in rail order.
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// True for a zero-length rail.
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// True when every pixel is black.
    pub fn is_dark(&self) -> bool {
        self.pixels.iter().all(|p| *p == COLOR_OFF)
    }
}

/// Draws a head and its trail ending at `head_idx`.
///
/// `levels` is dimmest first with the head color last; entry `t` lands on
/// `head_idx - (levels.len() - 1 - t)`. Pixels that would fall before index 0
/// are dropped rather than wrapped to the far end, so the trail is visibly
/// shorter right after the start line.
pub fn draw_trail(frame: &mut Framebuffer, head_idx: usize, levels: &[Rgb]) {
    let trail_len = levels.len().saturating_sub(1);
    for (t, &color) in levels.iter().enumerate() {
        let behind = trail_len - t;
        if let Some(index) = head_idx.checked_sub(behind) {
            frame.blend(index, color);
        }
    }
}
