//! Blank fallback source used when no camera can be opened

use super::{FrameSource, SourceState};
use crate::error::MediaError;
use crate::frame::VideoResolution;

/// Produces opaque black frames at a fixed resolution
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    resolution: VideoResolution,
}

impl SyntheticSource {
    pub fn new(resolution: VideoResolution) -> Self {
        Self { resolution }
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn state(&self) -> SourceState {
        SourceState::Playing
    }

    fn resolution(&self) -> Option<VideoResolution> {
        Some(self.resolution)
    }

    fn read_rgba(&mut self, surface: &mut [u8]) -> Result<(), MediaError> {
        for px in surface.chunks_exact_mut(4) {
            px.copy_from_slice(&[0, 0, 0, 255]);
        }
        Ok(())
    }
}
