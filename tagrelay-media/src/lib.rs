//! # tagrelay media
//!
//! Frame acquisition and marker detection for tagrelay. This crate samples
//! frames from a video source, converts them to single-channel luminance,
//! and hands them to a detection worker that owns the marker detector in
//! its own task.

#![warn(clippy::all)]

pub mod detector;
pub mod error;
pub mod frame;
pub mod sampler;
pub mod source;
pub mod worker;

// Re-export main types
pub use detector::{AprilTagConfig, MarkerDetector, ScriptStep, ScriptedDetector, TagFamily};
pub use error::{ErrorCategory, MediaError, MediaResult};
pub use frame::{luma_from_rgba, rgb_to_luma, Frame, VideoResolution};
pub use sampler::{
    DeferReason, FrameSampler, RasterSurface, SampleOutcome, SamplerConfig, SamplerStats,
};
pub use source::{
    open_source_or_fallback, FrameSource, SourceConfig, SourceState, StillSource, SyntheticSource,
};
pub use worker::{
    DebugAction, DetectionWorker, WorkerConfig, WorkerHandle, WorkerRequest, WorkerResponse,
};

#[cfg(feature = "camera")]
pub use source::camera::CameraSource;

#[cfg(feature = "apriltag")]
pub use detector::AprilTagDetector;
