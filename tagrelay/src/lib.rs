//! # tagrelay - Camera to Robot Marker Relay
//!
//! tagrelay samples frames from a camera, finds fiducial markers in them,
//! estimates each marker's distance and bearing with a pinhole model, and
//! turns the estimate into a two-motor steering command sent over a socket.
//!
//! ## Pipeline
//!
//! - **Sampler**: one frame per tick, converted to luminance
//! - **Detection worker**: owns the detector in its own task; one request in flight,
//!   abandoned after a timeout. Real frames need the `apriltag` feature
//! - **Estimator**: distance from apparent marker size, bearing from horizontal offset
//! - **Policy**: stop when close or when nothing is seen, otherwise steer towards the marker
//! - **Actuation link**: `steer,m1f,m1b,m2f,m2b\n` over TCP or WebSocket, best effort
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tagrelay::{MemorySink, PipelineBuilder, RelayConfig, ScriptedDetector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sink = MemorySink::new();
//!     let pipeline = PipelineBuilder::new(RelayConfig::default())
//!         .detector(ScriptedDetector::new())
//!         .sink(Arc::new(sink.clone()))
//!         .start()
//!         .await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     println!("{}", pipeline.overlay_line());
//!
//!     let stats = pipeline.shutdown().await?;
//!     println!("sent {} commands", stats.commands_sent);
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use tagrelay_core::{
    apparent_side_px, bearing_deg, distance_from_side, estimate, ActuationCommand,
    ActuationLink, ActuationSink, Calibration, DecisionPolicy, Detection, Endpoint, Estimate,
    LinkState, LoggingSink, Maneuver, MemorySink, Point2, RelayError, SendOutcome,
};

pub use tagrelay_media::{
    luma_from_rgba, rgb_to_luma, AprilTagConfig, DebugAction, DetectionWorker, Frame,
    FrameSampler, FrameSource, MarkerDetector, MediaError, SamplerConfig, ScriptStep,
    ScriptedDetector, SourceConfig, SourceState, StillSource, SyntheticSource, TagFamily,
    VideoResolution, WorkerConfig, WorkerHandle, WorkerRequest, WorkerResponse,
};

#[cfg(feature = "camera")]
pub use tagrelay_media::CameraSource;

#[cfg(feature = "apriltag")]
pub use tagrelay_media::AprilTagDetector;

#[cfg(feature = "signaling")]
pub use tagrelay_signaling::{connect_target_from_url, PeerId, PeerRole, ShareLink};

pub use tagrelay_diagnostics::{init_logging, DebugLogger, DiagnosticOverlay};

// Public API modules
pub mod config;
pub mod event;
pub mod pipeline;

// Re-export main API types
pub use config::RelayConfig;
pub use event::PipelineEvent;
pub use pipeline::{select_target, PipelineBuilder, PipelineHandle, PipelineStats};
