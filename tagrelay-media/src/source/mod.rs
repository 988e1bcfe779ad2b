//! Video frame sources
//!
//! A source produces decoded frames at its own rate. The sampler only ever
//! asks for the current frame, drawn as packed RGBA into a buffer it owns.

#[cfg(feature = "camera")]
pub mod camera;
pub mod still;
pub mod synthetic;

pub use still::StillSource;
pub use synthetic::SyntheticSource;

use crate::error::MediaError;
use crate::frame::VideoResolution;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Playback state of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceState {
    /// Frames are flowing
    Playing,
    /// Temporarily not producing frames
    Paused,
    /// Will never produce another frame
    Ended,
}

/// Producer of video frames
pub trait FrameSource: Send {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Current playback state
    fn state(&self) -> SourceState;

    /// Native resolution; `None` until the source knows its dimensions
    fn resolution(&self) -> Option<VideoResolution>;

    /// Draw the current frame as RGBA into `surface`
    ///
    /// `surface` is exactly `width * height * 4` bytes for the resolution
    /// most recently reported by [`FrameSource::resolution`].
    fn read_rgba(&mut self, surface: &mut [u8]) -> Result<(), MediaError>;
}

/// Which source to open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Camera index to try first; `None` goes straight to the synthetic source
    pub camera_index: Option<u32>,
    /// Resolution of the blank fallback source
    pub fallback_resolution: VideoResolution,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            camera_index: Some(0),
            fallback_resolution: VideoResolution::VGA,
        }
    }
}

/// Open the configured camera, falling back to a blank synthetic source
///
/// Camera failures are never fatal. They are logged and the pipeline keeps
/// running on blank frames.
pub fn open_source_or_fallback(config: &SourceConfig) -> Box<dyn FrameSource> {
    if let Some(index) = config.camera_index {
        match open_camera(index) {
            Ok(source) => {
                info!("Opened video source {}", source.name());
                return source;
            }
            Err(e) => warn!("Camera {} unavailable, using blank source: {}", index, e),
        }
    }

    Box::new(SyntheticSource::new(config.fallback_resolution))
}

#[cfg(feature = "camera")]
fn open_camera(index: u32) -> Result<Box<dyn FrameSource>, MediaError> {
    Ok(Box::new(camera::CameraSource::open(index)?))
}

#[cfg(not(feature = "camera"))]
fn open_camera(_index: u32) -> Result<Box<dyn FrameSource>, MediaError> {
    Err(MediaError::SourceUnavailable {
        reason: "camera support not compiled in (enable the `camera` feature)".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "camera"))]
    #[test]
    fn test_fallback_to_synthetic_source() {
        let config = SourceConfig {
            camera_index: Some(0),
            fallback_resolution: VideoResolution::new(320, 240),
        };
        let source = open_source_or_fallback(&config);
        assert_eq!(source.state(), SourceState::Playing);
        assert_eq!(source.resolution(), Some(VideoResolution::new(320, 240)));
    }

    #[test]
    fn test_no_camera_requested() {
        let config = SourceConfig {
            camera_index: None,
            ..SourceConfig::default()
        };
        let source = open_source_or_fallback(&config);
        assert_eq!(source.resolution(), Some(VideoResolution::VGA));
    }
}
