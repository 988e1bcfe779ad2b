//! Frame sampling: raster readback and luminance conversion
//!
//! Each tick either defers (source paused or ended, detector not ready,
//! dimensions not known yet) or performs one full capture and convert step.
//! Failures are logged and reported for the tick; the sampler itself never
//! gives up.

use crate::error::MediaError;
use crate::frame::{luma_from_rgba, Frame, VideoResolution};
use crate::source::{FrameSource, SourceState};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace, warn};

/// Sampler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Largest source frame, in pixels, the sampler will read back
    pub max_pixels: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_pixels: 3840 * 2160,
        }
    }
}

impl SamplerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), MediaError> {
        if self.max_pixels == 0 {
            return Err(MediaError::InvalidConfiguration {
                message: "Max pixels must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Why a tick did no work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferReason {
    SourcePaused,
    SourceEnded,
    DetectorNotReady,
    /// Source has not reported its dimensions yet
    NoResolution,
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeferReason::SourcePaused => "source paused",
            DeferReason::SourceEnded => "source ended",
            DeferReason::DetectorNotReady => "detector not ready",
            DeferReason::NoResolution => "source dimensions unknown",
        };
        f.write_str(text)
    }
}

/// Result of one sampling tick
#[derive(Debug)]
pub enum SampleOutcome {
    Captured(Frame),
    Deferred(DeferReason),
    Failed(MediaError),
}

/// Off-screen RGBA raster owned by the sampler
#[derive(Debug, Default)]
pub struct RasterSurface {
    resolution: Option<VideoResolution>,
    rgba: Vec<u8>,
}

impl RasterSurface {
    /// Resize to `resolution`; returns true when the size changed
    pub fn ensure_size(&mut self, resolution: VideoResolution) -> bool {
        if self.resolution == Some(resolution) {
            return false;
        }
        self.resolution = Some(resolution);
        self.rgba.clear();
        self.rgba.resize(resolution.pixel_count() as usize * 4, 0);
        true
    }

    pub fn resolution(&self) -> Option<VideoResolution> {
        self.resolution
    }

    pub fn pixels(&self) -> &[u8] {
        &self.rgba
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.rgba
    }
}

/// Sampler counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerStats {
    pub frames_captured: u64,
    pub ticks_deferred: u64,
    pub readback_failures: u64,
    pub surface_resizes: u64,
}

/// Captures one frame per tick from a [`FrameSource`]
#[derive(Debug)]
pub struct FrameSampler {
    config: SamplerConfig,
    surface: RasterSurface,
    sequence: u64,
    stats: SamplerStats,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config,
            surface: RasterSurface::default(),
            sequence: 0,
            stats: SamplerStats::default(),
        }
    }

    /// Run one sampling tick
    pub fn tick(&mut self, source: &mut dyn FrameSource, detector_ready: bool) -> SampleOutcome {
        let reason = match source.state() {
            SourceState::Paused => Some(DeferReason::SourcePaused),
            SourceState::Ended => Some(DeferReason::SourceEnded),
            SourceState::Playing if !detector_ready => Some(DeferReason::DetectorNotReady),
            SourceState::Playing => None,
        };
        if let Some(reason) = reason {
            return self.defer(reason);
        }

        let resolution = match source.resolution() {
            Some(resolution) if !resolution.is_empty() => resolution,
            _ => return self.defer(DeferReason::NoResolution),
        };

        if resolution.pixel_count() > self.config.max_pixels {
            return SampleOutcome::Failed(MediaError::FrameTooLarge {
                width: resolution.width,
                height: resolution.height,
                max_pixels: self.config.max_pixels,
            });
        }

        if self.surface.ensure_size(resolution) {
            self.stats.surface_resizes += 1;
            debug!(
                "Raster surface resized to {}x{} for {}",
                resolution.width,
                resolution.height,
                source.name()
            );
        }

        if let Err(e) = source.read_rgba(self.surface.pixels_mut()) {
            self.stats.readback_failures += 1;
            warn!("Readback from {} failed, retrying next tick: {}", source.name(), e);
            return SampleOutcome::Failed(e);
        }

        let luma = luma_from_rgba(self.surface.pixels());
        self.sequence += 1;
        match Frame::new(self.sequence, resolution.width, resolution.height, luma) {
            Ok(frame) => {
                self.stats.frames_captured += 1;
                trace!(
                    "Captured frame #{} ({}x{})",
                    frame.sequence(),
                    frame.width(),
                    frame.height()
                );
                SampleOutcome::Captured(frame)
            }
            Err(e) => SampleOutcome::Failed(e),
        }
    }

    fn defer(&mut self, reason: DeferReason) -> SampleOutcome {
        self.stats.ticks_deferred += 1;
        trace!("Sampling deferred: {}", reason);
        SampleOutcome::Deferred(reason)
    }

    pub fn stats(&self) -> &SamplerStats {
        &self.stats
    }

    pub fn surface(&self) -> &RasterSurface {
        &self.surface
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(SamplerConfig::default())
    }
}
