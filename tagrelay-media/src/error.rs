//! Media pipeline error types and handling
//!
//! Errors raised while acquiring frames or running the marker detector.
//! None of them is fatal to the pipeline: each one degrades to "no output
//! this tick" at the coordinator.

use tagrelay_core::RelayError;
use thiserror::Error;

/// Main error type for frame acquisition and detection
#[derive(Error, Debug)]
pub enum MediaError {
    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Invalid frame data error
    #[error("Invalid frame data: expected {expected} bytes, got {actual}")]
    InvalidFrameData {
        /// Expected data size
        expected: usize,
        /// Actual data size
        actual: usize,
    },

    /// Frame would exceed the configured pixel budget
    #[error("Frame too large: {width}x{height} exceeds {max_pixels} pixels")]
    FrameTooLarge {
        /// Source width
        width: u32,
        /// Source height
        height: u32,
        /// Configured limit
        max_pixels: u64,
    },

    /// Video source could not be opened
    #[error("Video source unavailable: {reason}")]
    SourceUnavailable {
        /// Failure reason
        reason: String,
    },

    /// Reading pixels back from the source failed
    #[error("Pixel readback failed: {reason}")]
    ReadbackFailed {
        /// Failure reason
        reason: String,
    },

    /// Detector could not be initialized
    #[error("Detector initialization failed: {detector} - {reason}")]
    DetectorInitFailed {
        /// Detector name
        detector: String,
        /// Failure reason
        reason: String,
    },

    /// Detection requested before the detector reported ready
    #[error("detector not ready")]
    DetectorNotReady,

    /// The detection call itself failed
    #[error("Detection failed: {reason}")]
    DetectionFailed {
        /// Failure reason
        reason: String,
    },

    /// A request is already waiting on the worker
    #[error("Worker busy: request queue is full")]
    WorkerBusy,

    /// The worker task has stopped
    #[error("Worker closed")]
    WorkerClosed,
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Check if the next tick may succeed where this one failed
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::ReadbackFailed { .. } => true,
            MediaError::DetectionFailed { .. } => true,
            MediaError::DetectorNotReady => true,
            MediaError::WorkerBusy => true,
            MediaError::InvalidFrameData { .. } => true,
            MediaError::FrameTooLarge { .. } => false,
            MediaError::SourceUnavailable { .. } => false,
            MediaError::DetectorInitFailed { .. } => false,
            MediaError::InvalidConfiguration { .. } => false,
            MediaError::WorkerClosed => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            MediaError::InvalidFrameData { .. } => ErrorCategory::Data,
            MediaError::FrameTooLarge { .. } => ErrorCategory::Memory,
            MediaError::SourceUnavailable { .. } => ErrorCategory::Acquisition,
            MediaError::ReadbackFailed { .. } => ErrorCategory::Acquisition,
            MediaError::DetectorInitFailed { .. } => ErrorCategory::DetectorInit,
            MediaError::DetectorNotReady => ErrorCategory::Detection,
            MediaError::DetectionFailed { .. } => ErrorCategory::Detection,
            MediaError::WorkerBusy => ErrorCategory::State,
            MediaError::WorkerClosed => ErrorCategory::State,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Camera or stream unavailable, readback failures
    Acquisition,
    /// Detector binary or initialization problems
    DetectorInit,
    /// Per-frame detection problems
    Detection,
    /// Configuration and parameter errors
    Configuration,
    /// Data validation errors
    Data,
    /// Memory management errors
    Memory,
    /// State management errors
    State,
}

impl From<MediaError> for RelayError {
    fn from(error: MediaError) -> Self {
        RelayError::Media {
            reason: error.to_string(),
        }
    }
}
