//! Pipeline coordinator
//!
//! One task owns the whole pipeline through a [`PipelineContext`]: the
//! frame source and sampler, the detection worker handle, the in-flight
//! slot, the estimator constants, the policy and the actuation sink. A
//! periodic tick samples a frame; worker responses are handled as they
//! arrive. Nothing is shared with other tasks except statistics, the
//! overlay and the event channel.
//!
//! At most one detection request is in flight. Ticks that fire while one
//! is outstanding are skipped. Responses are correlated by request id and
//! anything that does not match the in-flight slot is discarded as stale.
//! A request that outlives the worker's request timeout is abandoned: the
//! slot is cleared and the robot is told to stop.

use crate::config::RelayConfig;
use crate::event::PipelineEvent;
use crate::RelayError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tagrelay_core::{
    estimate, ActuationCommand, ActuationLink, ActuationSink, Calibration, DecisionPolicy,
    Estimate, LoggingSink, SendOutcome,
};
use tagrelay_diagnostics::DiagnosticOverlay;
use tagrelay_media::{
    open_source_or_fallback, DebugAction, DetectionWorker, FrameSampler, FrameSource,
    MarkerDetector, SampleOutcome, WorkerHandle, WorkerResponse,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Pipeline counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// When the pipeline started
    pub started_at: DateTime<Utc>,
    /// Whether the coordinator loop is running
    pub running: bool,
    /// Whether the detector reported ready
    pub detector_ready: bool,
    /// Frames captured and sent for detection
    pub frames_captured: u64,
    /// Ticks where the sampler had nothing to do
    pub ticks_deferred: u64,
    /// Ticks skipped because a request was in flight
    pub ticks_skipped: u64,
    /// Ticks where sampling failed
    pub sampling_failures: u64,
    /// Detection results received for the in-flight request
    pub results_received: u64,
    /// Detection requests that failed, timeouts included
    pub detection_failures: u64,
    /// Detection requests abandoned after the request timeout
    pub detection_timeouts: u64,
    /// Responses discarded as stale
    pub stale_responses: u64,
    /// Commands accepted by the sink
    pub commands_sent: u64,
    /// Commands the sink dropped
    pub commands_dropped: u64,
    /// Estimate used for the most recent command
    pub last_estimate: Option<Estimate>,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            running: false,
            detector_ready: false,
            frames_captured: 0,
            ticks_deferred: 0,
            ticks_skipped: 0,
            sampling_failures: 0,
            results_received: 0,
            detection_failures: 0,
            detection_timeouts: 0,
            stale_responses: 0,
            commands_sent: 0,
            commands_dropped: 0,
            last_estimate: None,
        }
    }
}

/// Choose the estimate to steer by
///
/// The configured target marker wins when it is visible. Otherwise the
/// nearest marker with a usable (positive) distance is chosen.
pub fn select_target(estimates: &[Estimate], target_marker_id: Option<u32>) -> Option<Estimate> {
    if let Some(id) = target_marker_id {
        let matching = || estimates.iter().filter(move |e| e.marker_id == id);
        if let Some(found) = nearest(matching()).or_else(|| matching().next().copied()) {
            return Some(found);
        }
    }

    nearest(estimates.iter())
}

fn nearest<'a>(candidates: impl Iterator<Item = &'a Estimate>) -> Option<Estimate> {
    candidates
        .filter(|e| e.distance_m > 0.0)
        .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
        .copied()
}

/// Outstanding detection request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    request_id: u64,
    sequence: u64,
    width: u32,
    deadline: Option<Instant>,
}

impl InFlight {
    fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// Everything the coordinator task owns
pub struct PipelineContext {
    source: Box<dyn FrameSource>,
    sampler: FrameSampler,
    worker: WorkerHandle,
    worker_alive: bool,
    sink: Arc<dyn ActuationSink>,
    calibration: Calibration,
    policy: DecisionPolicy,
    target_marker_id: Option<u32>,
    detector_ready: bool,
    request_timeout: Option<Duration>,
    in_flight: Option<InFlight>,
    stats: Arc<RwLock<PipelineStats>>,
    overlay: Arc<RwLock<DiagnosticOverlay>>,
    events: broadcast::Sender<PipelineEvent>,
}

impl PipelineContext {
    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// One sampling tick
    fn on_tick(&mut self) {
        if let Some(in_flight) = self.in_flight {
            if in_flight.expired(Instant::now()) {
                self.abandon(in_flight);
                return;
            }
            trace!("Request #{} still in flight, skipping tick", in_flight.request_id);
            self.stats.write().ticks_skipped += 1;
            self.overlay.write().record_skipped();
            self.emit(PipelineEvent::TickSkipped {
                in_flight: in_flight.request_id,
            });
            return;
        }

        match self.sampler.tick(self.source.as_mut(), self.detector_ready) {
            SampleOutcome::Deferred(_) => {
                self.stats.write().ticks_deferred += 1;
            }
            SampleOutcome::Failed(e) => {
                self.stats.write().sampling_failures += 1;
                self.emit(PipelineEvent::SamplingFailed {
                    reason: e.to_string(),
                });
            }
            SampleOutcome::Captured(frame) => {
                let sequence = frame.sequence();
                let width = frame.width();
                let height = frame.height();
                self.overlay.write().record_frame(sequence);

                match self.worker.try_detect(frame) {
                    Ok(request_id) => {
                        self.in_flight = Some(InFlight {
                            request_id,
                            sequence,
                            width,
                            deadline: self.request_timeout.map(|timeout| Instant::now() + timeout),
                        });
                        self.stats.write().frames_captured += 1;
                        self.emit(PipelineEvent::FrameCaptured {
                            sequence,
                            width,
                            height,
                        });
                    }
                    Err(e) => {
                        warn!("Could not queue frame #{}: {}", sequence, e);
                        self.stats.write().detection_failures += 1;
                        self.emit(PipelineEvent::DetectionFailed {
                            request_id: None,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Give up on a request the worker never answered; its late response
    /// will be discarded as stale
    fn abandon(&mut self, in_flight: InFlight) {
        self.in_flight = None;
        warn!(
            "Detection #{} unanswered after {:?}, stopping",
            in_flight.request_id,
            self.request_timeout.unwrap_or_default()
        );
        {
            let mut stats = self.stats.write();
            stats.detection_failures += 1;
            stats.detection_timeouts += 1;
            stats.last_estimate = None;
        }
        self.emit(PipelineEvent::DetectionFailed {
            request_id: Some(in_flight.request_id),
            message: "detection timed out".to_string(),
        });
        self.send_command(ActuationCommand::STOP);
    }

    /// Slot matching `request_id`, cleared; `None` marks a stale response
    fn take_in_flight(&mut self, request_id: u64) -> Option<InFlight> {
        match self.in_flight {
            Some(in_flight) if in_flight.request_id == request_id => self.in_flight.take(),
            _ => {
                debug!("Discarding stale response for request #{}", request_id);
                self.stats.write().stale_responses += 1;
                self.overlay.write().record_stale();
                self.emit(PipelineEvent::StaleResponse { request_id });
                None
            }
        }
    }

    fn on_response(&mut self, response: WorkerResponse) {
        match response {
            WorkerResponse::Ready => {
                info!("Detector ready, sampling frames");
                self.detector_ready = true;
                self.stats.write().detector_ready = true;
                self.emit(PipelineEvent::DetectorReady);
            }
            WorkerResponse::Error {
                request_id: None,
                message,
            } => {
                warn!("Detector initialization failed: {}", message);
                self.emit(PipelineEvent::DetectorInitFailed { message });
            }
            WorkerResponse::Error {
                request_id: Some(request_id),
                message,
            } => {
                if self.take_in_flight(request_id).is_none() {
                    return;
                }
                warn!("Detection #{} failed: {}", request_id, message);
                self.stats.write().detection_failures += 1;
                self.emit(PipelineEvent::DetectionFailed {
                    request_id: Some(request_id),
                    message,
                });
            }
            WorkerResponse::Result {
                request_id,
                detections,
            } => {
                let Some(in_flight) = self.take_in_flight(request_id) else {
                    return;
                };
                trace!(
                    "Frame #{} produced {} detections",
                    in_flight.sequence,
                    detections.len()
                );
                self.stats.write().results_received += 1;
                self.overlay.write().record_detections(detections.len());
                self.emit(PipelineEvent::DetectionsReceived {
                    request_id,
                    count: detections.len(),
                });

                let estimates: Vec<Estimate> = detections
                    .iter()
                    .map(|d| estimate(d, in_flight.width, &self.calibration))
                    .collect();
                let target = select_target(&estimates, self.target_marker_id);
                if let Some(target) = target {
                    self.emit(PipelineEvent::TargetEstimated { estimate: target });
                }

                let command = self.policy.decide(target.as_ref());
                self.stats.write().last_estimate = target;
                self.send_command(command);
            }
            WorkerResponse::Debug { message } => {
                info!("Detector debug: {}", message);
                self.emit(PipelineEvent::DebugReport { message });
            }
        }
    }

    fn send_command(&mut self, command: ActuationCommand) {
        let outcome = self.sink.send(&command);
        {
            let mut stats = self.stats.write();
            match outcome {
                SendOutcome::Sent => stats.commands_sent += 1,
                SendOutcome::Dropped => stats.commands_dropped += 1,
            }
        }
        self.overlay.write().record_command(command);
        self.emit(PipelineEvent::CommandSent { command, outcome });
    }

    fn on_debug_request(&mut self, action: DebugAction) {
        if let Err(e) = self.worker.request_debug(action) {
            warn!("Could not queue debug action {:?}: {}", action, e);
        }
    }

    async fn run(
        mut self,
        tick_interval: std::time::Duration,
        mut shutdown: watch::Receiver<bool>,
        mut debug_requests: mpsc::UnboundedReceiver<DebugAction>,
    ) {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.stats.write().running = true;
        info!(
            "Pipeline running on {} every {:?}",
            self.source.name(),
            tick_interval
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                response = self.worker.recv(), if self.worker_alive => {
                    match response {
                        Some(response) => self.on_response(response),
                        None => {
                            warn!("Detection worker stopped; no further detections");
                            self.worker_alive = false;
                            self.in_flight = None;
                        }
                    }
                }
                Some(action) = debug_requests.recv() => self.on_debug_request(action),
                _ = interval.tick() => self.on_tick(),
            }
        }

        // Leave the robot stopped.
        self.send_command(ActuationCommand::STOP);
        self.sink.close();
        self.stats.write().running = false;
        self.emit(PipelineEvent::Stopped);
        info!("Pipeline stopped");
    }
}

/// Builds and starts a pipeline
pub struct PipelineBuilder {
    config: RelayConfig,
    source: Option<Box<dyn FrameSource>>,
    detector: Option<Box<dyn MarkerDetector>>,
    sink: Option<Arc<dyn ActuationSink>>,
}

impl PipelineBuilder {
    /// Start from a configuration
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            source: None,
            detector: None,
            sink: None,
        }
    }

    /// Use this frame source instead of opening the configured one
    pub fn source(mut self, source: impl FrameSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Marker detector to run in the worker
    pub fn detector(mut self, detector: impl MarkerDetector) -> Self {
        self.detector = Some(Box::new(detector));
        self
    }

    /// Use this sink instead of the configured actuation endpoint
    pub fn sink(mut self, sink: Arc<dyn ActuationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Open everything and spawn the coordinator task
    pub async fn start(self) -> Result<PipelineHandle, RelayError> {
        self.config.validate()?;
        let config = self.config;

        let detector = self.detector.ok_or_else(|| RelayError::InvalidConfiguration {
            message: "no marker detector configured".to_string(),
        })?;

        let source = match self.source {
            Some(source) => source,
            None => {
                // Opening a camera blocks until the device answers.
                let source_config = config.source.clone();
                tokio::task::spawn_blocking(move || open_source_or_fallback(&source_config))
                    .await
                    .map_err(|e| RelayError::Media {
                        reason: format!("opening video source panicked: {}", e),
                    })?
            }
        };

        let sink = match self.sink {
            Some(sink) => sink,
            None => open_sink(&config).await,
        };

        let worker = DetectionWorker::spawn(detector, config.worker.clone());

        let stats = Arc::new(RwLock::new(PipelineStats::default()));
        let overlay = Arc::new(RwLock::new(DiagnosticOverlay::new()));
        let (events, _) = broadcast::channel(config.event_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (debug_tx, debug_rx) = mpsc::unbounded_channel();

        let context = PipelineContext {
            source,
            sampler: FrameSampler::new(config.sampler.clone()),
            worker,
            worker_alive: true,
            sink,
            calibration: config.calibration.clone(),
            policy: config.policy.clone(),
            target_marker_id: config.target_marker_id,
            detector_ready: false,
            request_timeout: config.worker.request_timeout(),
            in_flight: None,
            stats: stats.clone(),
            overlay: overlay.clone(),
            events: events.clone(),
        };

        let task = tokio::spawn(context.run(config.tick_interval(), shutdown_rx, debug_rx));

        Ok(PipelineHandle {
            shutdown: shutdown_tx,
            debug_requests: debug_tx,
            stats,
            overlay,
            events,
            task,
        })
    }
}

/// Connect the configured endpoint; a link that cannot be opened degrades
/// to logging commands
async fn open_sink(config: &RelayConfig) -> Arc<dyn ActuationSink> {
    let Some(endpoint) = &config.actuation_endpoint else {
        info!("No actuation endpoint configured, logging commands only");
        return Arc::new(LoggingSink);
    };

    match ActuationLink::connect(endpoint, config.connect_timeout()).await {
        Ok(link) => Arc::new(link),
        Err(e) => {
            warn!("Actuation link unavailable, logging commands only: {}", e);
            Arc::new(LoggingSink)
        }
    }
}

/// Handle to a running pipeline
pub struct PipelineHandle {
    shutdown: watch::Sender<bool>,
    debug_requests: mpsc::UnboundedSender<DebugAction>,
    stats: Arc<RwLock<PipelineStats>>,
    overlay: Arc<RwLock<DiagnosticOverlay>>,
    events: broadcast::Sender<PipelineEvent>,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Current counters
    pub fn stats(&self) -> PipelineStats {
        self.stats.read().clone()
    }

    /// One-line diagnostic status
    pub fn overlay_line(&self) -> String {
        self.overlay.read().render()
    }

    /// Ask the worker to run a diagnostic action; the reply arrives as
    /// [`PipelineEvent::DebugReport`]
    pub fn request_debug(&self, action: DebugAction) -> Result<(), RelayError> {
        self.debug_requests
            .send(action)
            .map_err(|_| RelayError::InvalidState {
                expected: "running".to_string(),
                actual: "stopped".to_string(),
            })
    }

    /// Whether the coordinator task is still running
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the pipeline, send a final STOP, and return the final counters
    pub async fn shutdown(self) -> Result<PipelineStats, RelayError> {
        // Already stopped if the receiver is gone.
        let _ = self.shutdown.send(true);
        self.task.await.map_err(|e| RelayError::InvalidState {
            expected: "clean pipeline shutdown".to_string(),
            actual: e.to_string(),
        })?;
        let stats = self.stats.read().clone();
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagrelay_core::MemorySink;
    use tagrelay_media::{ScriptedDetector, StillSource, VideoResolution, WorkerConfig};

    fn context(sink: &MemorySink) -> PipelineContext {
        let (events, _) = broadcast::channel(16);
        PipelineContext {
            source: Box::new(StillSource::solid(VideoResolution::new(4, 4), [0, 0, 0])),
            sampler: FrameSampler::default(),
            worker: DetectionWorker::spawn(
                Box::new(ScriptedDetector::new()),
                WorkerConfig::default(),
            ),
            worker_alive: true,
            sink: Arc::new(sink.clone()),
            calibration: Calibration::default(),
            policy: DecisionPolicy::default(),
            target_marker_id: None,
            detector_ready: true,
            request_timeout: Some(Duration::from_millis(100)),
            in_flight: Some(InFlight {
                request_id: 5,
                sequence: 1,
                width: 4,
                deadline: None,
            }),
            stats: Arc::new(RwLock::new(PipelineStats::default())),
            overlay: Arc::new(RwLock::new(DiagnosticOverlay::new())),
            events,
        }
    }

    fn empty_result(request_id: u64) -> WorkerResponse {
        WorkerResponse::Result {
            request_id,
            detections: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_stale_responses_are_discarded() {
        let sink = MemorySink::new();
        let mut ctx = context(&sink);

        ctx.on_response(empty_result(4));
        assert_eq!(ctx.stats.read().stale_responses, 1);
        assert!(sink.is_empty());
        assert_eq!(ctx.in_flight.map(|f| f.request_id), Some(5));

        ctx.on_response(empty_result(5));
        assert_eq!(sink.commands(), vec![ActuationCommand::STOP]);
        assert!(ctx.in_flight.is_none());

        // A duplicate of an answered request is stale too.
        ctx.on_response(empty_result(5));
        assert_eq!(ctx.stats.read().stale_responses, 2);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_tick_skipped_while_in_flight() {
        let sink = MemorySink::new();
        let mut ctx = context(&sink);

        ctx.on_tick();
        ctx.on_tick();
        assert_eq!(ctx.stats.read().ticks_skipped, 2);
        assert_eq!(ctx.stats.read().frames_captured, 0);

        ctx.on_response(WorkerResponse::Error {
            request_id: Some(5),
            message: "blurred".to_string(),
        });
        assert!(ctx.in_flight.is_none());

        ctx.on_tick();
        assert_eq!(ctx.stats.read().frames_captured, 1);
        assert!(ctx.in_flight.is_some());
    }

    #[tokio::test]
    async fn test_expired_request_is_abandoned_with_stop() {
        let sink = MemorySink::new();
        let mut ctx = context(&sink);
        ctx.in_flight = Some(InFlight {
            request_id: 5,
            sequence: 1,
            width: 4,
            deadline: Some(Instant::now() - Duration::from_millis(1)),
        });

        ctx.on_tick();
        assert!(ctx.in_flight.is_none());
        assert_eq!(sink.commands(), vec![ActuationCommand::STOP]);
        {
            let stats = ctx.stats.read();
            assert_eq!(stats.detection_timeouts, 1);
            assert_eq!(stats.detection_failures, 1);
            assert_eq!(stats.ticks_skipped, 0);
        }

        // The answer that finally shows up is stale.
        ctx.on_response(empty_result(5));
        assert_eq!(ctx.stats.read().stale_responses, 1);
        assert_eq!(sink.len(), 1);

        // Sampling resumes with a fresh deadline.
        ctx.on_tick();
        let next = ctx.in_flight.expect("new request queued");
        assert_ne!(next.request_id, 5);
        assert!(next.deadline.is_some());
    }

    #[test]
    fn test_deadline_only_expires_when_set() {
        let now = Instant::now();
        let open_ended = InFlight {
            request_id: 1,
            sequence: 1,
            width: 4,
            deadline: None,
        };
        assert!(!open_ended.expired(now));
        let bounded = InFlight {
            deadline: Some(now),
            ..open_ended
        };
        assert!(bounded.expired(now));
        assert!(!bounded.expired(now - Duration::from_millis(5)));
    }

    fn est(marker_id: u32, distance_m: f64) -> Estimate {
        Estimate {
            marker_id,
            distance_m,
            bearing_deg: 0.0,
        }
    }

    #[test]
    fn test_select_nearest_positive() {
        let estimates = [est(1, 2.0), est(2, 0.0), est(3, 0.9)];
        assert_eq!(select_target(&estimates, None), Some(est(3, 0.9)));
    }

    #[test]
    fn test_select_configured_target() {
        let estimates = [est(1, 2.0), est(3, 0.9)];
        assert_eq!(select_target(&estimates, Some(1)), Some(est(1, 2.0)));
        assert_eq!(select_target(&estimates, Some(8)), Some(est(3, 0.9)));
    }

    #[test]
    fn test_select_degenerate_only() {
        assert_eq!(select_target(&[est(4, 0.0)], None), None);
        assert_eq!(select_target(&[est(4, 0.0)], Some(4)), Some(est(4, 0.0)));
        assert_eq!(select_target(&[], None), None);
    }
}
