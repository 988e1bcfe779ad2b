//! Luminance frames and color conversion

use crate::error::MediaError;
use serde::{Deserialize, Serialize};

/// Video resolution information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoResolution {
    pub width: u32,
    pub height: u32,
}

impl VideoResolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const HD: Self = Self::new(1280, 720);
    pub const VGA: Self = Self::new(640, 480);

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Luma of one RGB pixel: `round(0.299 R + 0.587 G + 0.114 B)`
pub fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    y.round().clamp(0.0, 255.0) as u8
}

/// Convert packed RGBA pixels to one luminance byte per pixel
///
/// Alpha is ignored. A trailing partial pixel is ignored too.
pub fn luma_from_rgba(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .map(|px| rgb_to_luma(px[0], px[1], px[2]))
        .collect()
}

/// Immutable luminance snapshot of one sampled video frame
///
/// Not `Clone`: the buffer moves into the detection request and the sampler
/// never sees it again.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame {
    sequence: u64,
    width: u32,
    height: u32,
    luma: Vec<u8>,
}

impl Frame {
    /// Create a frame, checking that the buffer holds `width * height` bytes
    pub fn new(sequence: u64, width: u32, height: u32, luma: Vec<u8>) -> Result<Self, MediaError> {
        let expected = width as usize * height as usize;
        if luma.len() != expected {
            return Err(MediaError::InvalidFrameData {
                expected,
                actual: luma.len(),
            });
        }

        Ok(Self {
            sequence,
            width,
            height,
            luma,
        })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> VideoResolution {
        VideoResolution::new(self.width, self.height)
    }

    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    /// Give up the frame, moving out `(width, height, luma)`
    pub fn into_parts(self) -> (u32, u32, Vec<u8>) {
        (self.width, self.height, self.luma)
    }
}
