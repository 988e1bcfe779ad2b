//! # tagrelay diagnostics
//!
//! Logging setup and the one-line status overlay shown while the pipeline
//! runs.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod debug_logger;
pub mod overlay;

// Re-export main types
pub use debug_logger::{init_logging, DebugLogger, DEFAULT_FILTER};
pub use overlay::{DiagnosticOverlay, OverlaySnapshot};
