//! Marker detector abstraction
//!
//! A detector is initialized once, asynchronously, and then called with
//! luminance frames. Detection itself is synchronous and CPU-bound; the
//! worker runs it on the blocking pool.
//!
//! [`ScriptedDetector`] replays canned results for tests and demos; the
//! `apriltag` feature adds [`AprilTagDetector`] for real frames.

pub mod apriltag;

pub use self::apriltag::{AprilTagConfig, TagFamily};
#[cfg(feature = "apriltag")]
pub use self::apriltag::AprilTagDetector;

use crate::error::MediaError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tagrelay_core::Detection;
use tracing::debug;

/// Fiducial marker detector
#[async_trait]
pub trait MarkerDetector: Send + Sync + 'static {
    /// Detector name for diagnostics
    fn name(&self) -> &str;

    /// Load whatever the detector needs before it can run
    async fn initialize(&mut self) -> Result<(), MediaError>;

    /// Find markers in a `width` x `height` luminance buffer
    fn detect(&mut self, luma: &[u8], width: u32, height: u32)
        -> Result<Vec<Detection>, MediaError>;

    /// Check that the detector's backing binary or model is reachable
    async fn probe(&self) -> Result<String, MediaError> {
        Ok(format!("{} reachable", self.name()))
    }
}

/// One scripted detection reply
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Return these detections
    Detections(Vec<Detection>),
    /// Fail the detection call with this reason
    Fail(String),
    /// Block the detection call this long, then report no markers
    Stall(Duration),
}

/// Detector that replays a fixed script
///
/// Steps are consumed in order. Once the script runs out the repeating step
/// is returned on every call (an empty detection list unless configured).
#[derive(Debug)]
pub struct ScriptedDetector {
    name: String,
    script: VecDeque<ScriptStep>,
    repeat: ScriptStep,
    init_failures: u32,
    init_message: String,
    init_delay: Option<Duration>,
    latency: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            script: VecDeque::new(),
            repeat: ScriptStep::Detections(Vec::new()),
            init_failures: 0,
            init_message: String::new(),
            init_delay: None,
            latency: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn then_detect(mut self, detections: Vec<Detection>) -> Self {
        self.script.push_back(ScriptStep::Detections(detections));
        self
    }

    pub fn then_fail(mut self, reason: impl Into<String>) -> Self {
        self.script.push_back(ScriptStep::Fail(reason.into()));
        self
    }

    pub fn then_stall(mut self, duration: Duration) -> Self {
        self.script.push_back(ScriptStep::Stall(duration));
        self
    }

    /// Step returned once the script is exhausted
    pub fn repeating(mut self, step: ScriptStep) -> Self {
        self.repeat = step;
        self
    }

    /// Fail the first `times` initialization attempts
    pub fn failing_init(mut self, times: u32, message: impl Into<String>) -> Self {
        self.init_failures = times;
        self.init_message = message.into();
        self
    }

    /// Take this long to initialize
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    /// Sleep this long inside every detect call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Shared count of detect calls, readable after the detector moves
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Steps left in the script
    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }
}

impl Default for ScriptedDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarkerDetector for ScriptedDetector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&mut self) -> Result<(), MediaError> {
        if let Some(delay) = self.init_delay {
            tokio::time::sleep(delay).await;
        }
        if self.init_failures > 0 {
            self.init_failures -= 1;
            return Err(MediaError::DetectorInitFailed {
                detector: self.name.clone(),
                reason: self.init_message.clone(),
            });
        }
        debug!("Scripted detector ready with {} steps", self.script.len());
        Ok(())
    }

    fn detect(
        &mut self,
        luma: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let expected = width as usize * height as usize;
        if luma.len() != expected {
            return Err(MediaError::InvalidFrameData {
                expected,
                actual: luma.len(),
            });
        }

        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        let step = self.script.pop_front().unwrap_or_else(|| self.repeat.clone());
        match step {
            ScriptStep::Detections(detections) => Ok(detections),
            ScriptStep::Fail(reason) => Err(MediaError::DetectionFailed { reason }),
            ScriptStep::Stall(duration) => {
                std::thread::sleep(duration);
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_order_then_repeat() {
        let marker = Detection::square(3, 10.0, 10.0, 4.0);
        let mut detector = ScriptedDetector::new()
            .then_detect(vec![marker.clone()])
            .then_fail("blurred");
        detector.initialize().await.unwrap();

        let luma = vec![0u8; 4];
        assert_eq!(detector.detect(&luma, 2, 2).unwrap(), vec![marker]);
        assert!(matches!(
            detector.detect(&luma, 2, 2),
            Err(MediaError::DetectionFailed { .. })
        ));
        assert!(detector.detect(&luma, 2, 2).unwrap().is_empty());
        assert_eq!(detector.call_counter().load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failing_init_recovers() {
        let mut detector = ScriptedDetector::new().failing_init(1, "binary missing");
        assert!(detector.initialize().await.is_err());
        assert!(detector.initialize().await.is_ok());
        assert_eq!(detector.probe().await.unwrap(), "scripted reachable");
    }

    #[tokio::test]
    async fn test_stall_step_reports_nothing() {
        let mut detector = ScriptedDetector::new().then_stall(Duration::from_millis(10));
        detector.initialize().await.unwrap();
        let started = std::time::Instant::now();
        assert!(detector.detect(&[0u8; 4], 2, 2).unwrap().is_empty());
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_rejects_wrong_buffer_size() {
        let mut detector = ScriptedDetector::new();
        assert!(matches!(
            detector.detect(&[0u8; 3], 2, 2),
            Err(MediaError::InvalidFrameData { expected: 4, actual: 3 })
        ));
    }
}
