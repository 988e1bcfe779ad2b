//! Replays a fixed RGBA image
//!
//! Clones share playback state, so a test or demo can keep a clone to
//! pause, end, resize or break the source while the pipeline owns another.

use super::{FrameSource, SourceState};
use crate::error::MediaError;
use crate::frame::VideoResolution;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
struct StillInner {
    state: SourceState,
    resolution: Option<VideoResolution>,
    rgba: Vec<u8>,
    failing_reads: u32,
    reads: u64,
}

/// Source that returns the same image on every read
#[derive(Debug, Clone)]
pub struct StillSource {
    name: String,
    inner: Arc<Mutex<StillInner>>,
}

impl StillSource {
    /// Create a playing source from packed RGBA pixels
    pub fn new(resolution: VideoResolution, rgba: Vec<u8>) -> Result<Self, MediaError> {
        check_len(resolution, &rgba)?;
        Ok(Self {
            name: format!("still {}x{}", resolution.width, resolution.height),
            inner: Arc::new(Mutex::new(StillInner {
                state: SourceState::Playing,
                resolution: Some(resolution),
                rgba,
                failing_reads: 0,
                reads: 0,
            })),
        })
    }

    /// Solid color image
    pub fn solid(resolution: VideoResolution, rgb: [u8; 3]) -> Self {
        let pixel = [rgb[0], rgb[1], rgb[2], 255];
        let rgba = pixel.repeat(resolution.pixel_count() as usize);
        Self {
            name: format!("solid {}x{}", resolution.width, resolution.height),
            inner: Arc::new(Mutex::new(StillInner {
                state: SourceState::Playing,
                resolution: Some(resolution),
                rgba,
                failing_reads: 0,
                reads: 0,
            })),
        }
    }

    pub fn set_state(&self, state: SourceState) {
        self.inner.lock().state = state;
    }

    /// Swap in a new image, possibly with new dimensions
    pub fn replace_image(&self, resolution: VideoResolution, rgba: Vec<u8>) -> Result<(), MediaError> {
        check_len(resolution, &rgba)?;
        let mut inner = self.inner.lock();
        inner.resolution = Some(resolution);
        inner.rgba = rgba;
        Ok(())
    }

    /// Make the next `count` reads fail as a tainted surface would
    pub fn fail_next_reads(&self, count: u32) {
        self.inner.lock().failing_reads = count;
    }

    /// Number of read attempts so far
    pub fn reads(&self) -> u64 {
        self.inner.lock().reads
    }
}

fn check_len(resolution: VideoResolution, rgba: &[u8]) -> Result<(), MediaError> {
    let expected = resolution.pixel_count() as usize * 4;
    if rgba.len() != expected {
        return Err(MediaError::InvalidFrameData {
            expected,
            actual: rgba.len(),
        });
    }
    Ok(())
}

impl FrameSource for StillSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> SourceState {
        self.inner.lock().state
    }

    fn resolution(&self) -> Option<VideoResolution> {
        self.inner.lock().resolution
    }

    fn read_rgba(&mut self, surface: &mut [u8]) -> Result<(), MediaError> {
        let mut inner = self.inner.lock();
        inner.reads += 1;

        if inner.failing_reads > 0 {
            inner.failing_reads -= 1;
            return Err(MediaError::ReadbackFailed {
                reason: "surface is not readable".to_string(),
            });
        }

        if surface.len() != inner.rgba.len() {
            return Err(MediaError::ReadbackFailed {
                reason: format!(
                    "surface holds {} bytes, image has {}",
                    surface.len(),
                    inner.rgba.len()
                ),
            });
        }

        surface.copy_from_slice(&inner.rgba);
        Ok(())
    }
}
