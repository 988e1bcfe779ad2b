//! Pipeline events

use serde::{Deserialize, Serialize};
use tagrelay_core::{ActuationCommand, Estimate, SendOutcome};

/// Events emitted by a running pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// The detector finished initializing
    DetectorReady,
    /// The detector failed to initialize
    DetectorInitFailed {
        /// Failure message from the worker
        message: String,
    },
    /// A frame was captured and sent for detection
    FrameCaptured {
        /// Frame sequence number
        sequence: u64,
        /// Frame width
        width: u32,
        /// Frame height
        height: u32,
    },
    /// Sampling failed this tick
    SamplingFailed {
        /// Failure reason
        reason: String,
    },
    /// A tick was skipped because a request was in flight
    TickSkipped {
        /// Request still outstanding
        in_flight: u64,
    },
    /// Detection results arrived for the in-flight request
    DetectionsReceived {
        /// Request the results belong to
        request_id: u64,
        /// Number of markers found
        count: usize,
    },
    /// A detection request failed
    DetectionFailed {
        /// Request that failed, if the failure was tied to one
        request_id: Option<u64>,
        /// Failure message
        message: String,
    },
    /// A response for a request no longer in flight was discarded
    StaleResponse {
        /// Request id carried by the response
        request_id: u64,
    },
    /// The marker chosen for steering this tick
    TargetEstimated {
        /// Its estimate
        estimate: Estimate,
    },
    /// A command was handed to the actuation sink
    CommandSent {
        /// The command
        command: ActuationCommand,
        /// Whether the sink accepted it
        outcome: SendOutcome,
    },
    /// Reply to a debug action
    DebugReport {
        /// Worker's message
        message: String,
    },
    /// The pipeline stopped
    Stopped,
}

impl PipelineEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::DetectorReady => "detector_ready",
            PipelineEvent::DetectorInitFailed { .. } => "detector_init_failed",
            PipelineEvent::FrameCaptured { .. } => "frame_captured",
            PipelineEvent::SamplingFailed { .. } => "sampling_failed",
            PipelineEvent::TickSkipped { .. } => "tick_skipped",
            PipelineEvent::DetectionsReceived { .. } => "detections_received",
            PipelineEvent::DetectionFailed { .. } => "detection_failed",
            PipelineEvent::StaleResponse { .. } => "stale_response",
            PipelineEvent::TargetEstimated { .. } => "target_estimated",
            PipelineEvent::CommandSent { .. } => "command_sent",
            PipelineEvent::DebugReport { .. } => "debug_report",
            PipelineEvent::Stopped => "stopped",
        }
    }

    /// Check if this is an error event
    pub fn is_error_event(&self) -> bool {
        matches!(
            self,
            PipelineEvent::DetectorInitFailed { .. }
                | PipelineEvent::SamplingFailed { .. }
                | PipelineEvent::DetectionFailed { .. }
        )
    }
}
