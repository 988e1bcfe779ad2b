//! On-screen diagnostic overlay
//!
//! Purely cosmetic. The pipeline feeds it counters as it runs and a
//! frontend (or the demo's terminal) renders the one-line status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tagrelay_core::ActuationCommand;

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

/// Point-in-time copy of the overlay counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySnapshot {
    /// Sequence number of the last captured frame
    pub frame: u64,
    /// Markers in the last detection result
    pub detections: usize,
    /// Ticks skipped because a request was still in flight
    pub ticks_skipped: u64,
    /// Worker responses discarded as stale
    pub stale_responses: u64,
    /// Last command handed to the actuation sink
    pub last_command: Option<ActuationCommand>,
    /// When the overlay started counting
    pub started_at: DateTime<Utc>,
}

/// Frame counter, liveness spinner and pipeline counters
#[derive(Debug, Clone)]
pub struct DiagnosticOverlay {
    frame: u64,
    spinner: usize,
    detections: usize,
    ticks_skipped: u64,
    stale_responses: u64,
    last_command: Option<ActuationCommand>,
    started_at: DateTime<Utc>,
}

impl DiagnosticOverlay {
    /// Fresh overlay with all counters at zero
    pub fn new() -> Self {
        Self {
            frame: 0,
            spinner: 0,
            detections: 0,
            ticks_skipped: 0,
            stale_responses: 0,
            last_command: None,
            started_at: Utc::now(),
        }
    }

    /// A frame was captured; advances the spinner
    pub fn record_frame(&mut self, sequence: u64) {
        self.frame = sequence;
        self.spinner = (self.spinner + 1) % SPINNER.len();
    }

    /// A detection result arrived with `count` markers
    pub fn record_detections(&mut self, count: usize) {
        self.detections = count;
    }

    /// A tick was skipped
    pub fn record_skipped(&mut self) {
        self.ticks_skipped += 1;
    }

    /// A stale response was discarded
    pub fn record_stale(&mut self) {
        self.stale_responses += 1;
    }

    /// A command went to the sink
    pub fn record_command(&mut self, command: ActuationCommand) {
        self.last_command = Some(command);
    }

    /// Current liveness glyph
    pub fn spinner(&self) -> char {
        SPINNER[self.spinner]
    }

    /// Copy of the counters
    pub fn snapshot(&self) -> OverlaySnapshot {
        OverlaySnapshot {
            frame: self.frame,
            detections: self.detections,
            ticks_skipped: self.ticks_skipped,
            stale_responses: self.stale_responses,
            last_command: self.last_command,
            started_at: self.started_at,
        }
    }

    /// One-line status, e.g. `| frame 42 | markers 1 | skipped 3 | stale 0 | cmd 0,160,0,160,0 | up 12s`
    pub fn render(&self) -> String {
        let command = self
            .last_command
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let uptime = (Utc::now() - self.started_at).num_seconds().max(0);
        format!(
            "{} frame {} | markers {} | skipped {} | stale {} | cmd {} | up {}s",
            self.spinner(),
            self.frame,
            self.detections,
            self.ticks_skipped,
            self.stale_responses,
            command,
            uptime
        )
    }
}

impl Default for DiagnosticOverlay {
    fn default() -> Self {
        Self::new()
    }
}
