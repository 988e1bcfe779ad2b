//! Detection worker
//!
//! The worker owns the marker detector inside its own task and talks to the
//! rest of the pipeline only through request and response channels. Frames
//! are moved into requests; nothing is shared.
//!
//! Lifecycle:
//! - On spawn the detector is initialized in the background. Success emits
//!   [`WorkerResponse::Ready`]; each failed attempt emits
//!   [`WorkerResponse::Error`] without a request id. With a retry delay
//!   configured, one more attempt follows. A detector that never initializes
//!   stays disabled for the session.
//! - Detect requests that arrive before `Ready` are answered with an error
//!   straight away and never queued.
//! - The worker stops when its [`WorkerHandle`] is dropped.

use crate::detector::MarkerDetector;
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tagrelay_core::Detection;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Diagnostic actions the worker can perform on request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugAction {
    /// Check that the detector binary is reachable
    CheckBinary,
}

/// Message sent to the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// Run detection on one luminance frame
    Detect {
        request_id: u64,
        width: u32,
        height: u32,
        buffer: Vec<u8>,
    },
    /// Run a diagnostic action
    Debug { action: DebugAction },
}

impl WorkerRequest {
    /// Build a detect request, moving the frame's buffer into it
    pub fn detect(request_id: u64, frame: Frame) -> Self {
        let (width, height, buffer) = frame.into_parts();
        WorkerRequest::Detect {
            request_id,
            width,
            height,
            buffer,
        }
    }
}

/// Message sent by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerResponse {
    /// Detector initialized; detect requests will now be served
    Ready,
    /// Detections for a request; an empty list means no marker in view
    Result {
        request_id: u64,
        detections: Vec<Detection>,
    },
    /// A request or the initialization failed
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        message: String,
    },
    /// Reply to a debug action
    Debug { message: String },
}

/// Worker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Capacity of the request channel
    pub request_capacity: usize,
    /// Capacity of the response channel
    pub response_capacity: usize,
    /// Delay before the single initialization retry; `None` disables it
    pub init_retry_delay_ms: Option<u64>,
    /// How long a detect request may stay unanswered before the caller
    /// gives up on it; `None` waits forever
    pub request_timeout_ms: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            request_capacity: 8,
            response_capacity: 32,
            init_retry_delay_ms: None,
            request_timeout_ms: Some(1000),
        }
    }
}

impl WorkerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), MediaError> {
        if self.request_capacity == 0 || self.response_capacity == 0 {
            return Err(MediaError::InvalidConfiguration {
                message: "Worker channel capacities must be > 0".to_string(),
            });
        }
        if self.request_timeout_ms == Some(0) {
            return Err(MediaError::InvalidConfiguration {
                message: "Request timeout must be > 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn init_retry_delay(&self) -> Option<Duration> {
        self.init_retry_delay_ms.map(Duration::from_millis)
    }

    /// Deadline for a single detect request
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

type InitOutcome = (Box<dyn MarkerDetector>, MediaResult<()>);

/// Spawns detection workers
pub struct DetectionWorker;

impl DetectionWorker {
    /// Move `detector` into a new worker task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(detector: Box<dyn MarkerDetector>, config: WorkerConfig) -> WorkerHandle {
        let (request_tx, request_rx) = mpsc::channel(config.request_capacity.max(1));
        let (response_tx, response_rx) = mpsc::channel(config.response_capacity.max(1));

        info!("Starting detection worker for {}", detector.name());

        let (init_tx, init_rx) = oneshot::channel();
        tokio::spawn(initialize(
            detector,
            config.init_retry_delay(),
            response_tx.clone(),
            init_tx,
        ));

        let task = tokio::spawn(run(request_rx, response_tx, init_rx));

        WorkerHandle {
            requests: request_tx,
            responses: response_rx,
            next_request_id: 1,
            task,
        }
    }
}

async fn initialize(
    mut detector: Box<dyn MarkerDetector>,
    retry_delay: Option<Duration>,
    responses: mpsc::Sender<WorkerResponse>,
    done: oneshot::Sender<InitOutcome>,
) {
    let mut result = detector.initialize().await;

    if let Err(e) = &result {
        warn!("Detector {} failed to initialize: {}", detector.name(), e);
        let _ = responses
            .send(WorkerResponse::Error {
                request_id: None,
                message: e.to_string(),
            })
            .await;

        if let Some(delay) = retry_delay {
            debug!("Retrying detector initialization in {:?}", delay);
            tokio::time::sleep(delay).await;
            result = detector.initialize().await;
            if let Err(e) = &result {
                warn!("Detector {} retry failed: {}", detector.name(), e);
                let _ = responses
                    .send(WorkerResponse::Error {
                        request_id: None,
                        message: e.to_string(),
                    })
                    .await;
            }
        }
    }

    let _ = done.send((detector, result));
}

async fn run(
    mut requests: mpsc::Receiver<WorkerRequest>,
    responses: mpsc::Sender<WorkerResponse>,
    mut init: oneshot::Receiver<InitOutcome>,
) {
    let mut detector: Option<Box<dyn MarkerDetector>> = None;
    let mut ready = false;
    let mut init_pending = true;

    loop {
        let response = tokio::select! {
            outcome = &mut init, if init_pending => {
                init_pending = false;
                match outcome {
                    Ok((initialized, Ok(()))) => {
                        info!("Detector {} ready", initialized.name());
                        detector = Some(initialized);
                        ready = true;
                        Some(WorkerResponse::Ready)
                    }
                    Ok((failed, Err(_))) => {
                        warn!("Detection disabled: {} never initialized", failed.name());
                        detector = Some(failed);
                        None
                    }
                    Err(_) => {
                        error!("Detector initialization task stopped without a result");
                        None
                    }
                }
            }
            request = requests.recv() => {
                let Some(request) = request else {
                    break;
                };
                Some(handle_request(request, &mut detector, ready).await)
            }
        };

        if let Some(response) = response {
            if responses.send(response).await.is_err() {
                debug!("Response receiver dropped, stopping worker");
                break;
            }
        }
    }

    info!("Detection worker stopped");
}

async fn handle_request(
    request: WorkerRequest,
    detector: &mut Option<Box<dyn MarkerDetector>>,
    ready: bool,
) -> WorkerResponse {
    match request {
        WorkerRequest::Detect {
            request_id,
            width,
            height,
            buffer,
        } => {
            let active = if ready { detector.take() } else { None };
            let Some(mut active) = active else {
                debug!("Detect #{} before detector ready", request_id);
                return WorkerResponse::Error {
                    request_id: Some(request_id),
                    message: MediaError::DetectorNotReady.to_string(),
                };
            };

            let joined = tokio::task::spawn_blocking(move || {
                let result = active.detect(&buffer, width, height);
                (active, result)
            })
            .await;

            match joined {
                Ok((active, Ok(detections))) => {
                    *detector = Some(active);
                    debug!("Detect #{} found {} markers", request_id, detections.len());
                    WorkerResponse::Result {
                        request_id,
                        detections,
                    }
                }
                Ok((active, Err(e))) => {
                    *detector = Some(active);
                    warn!("Detect #{} failed: {}", request_id, e);
                    WorkerResponse::Error {
                        request_id: Some(request_id),
                        message: e.to_string(),
                    }
                }
                Err(e) => {
                    error!("Detector panicked during request #{}: {}", request_id, e);
                    WorkerResponse::Error {
                        request_id: Some(request_id),
                        message: format!("detector task failed: {}", e),
                    }
                }
            }
        }
        WorkerRequest::Debug {
            action: DebugAction::CheckBinary,
        } => {
            let message = match detector.as_ref() {
                Some(active) => match active.probe().await {
                    Ok(message) => message,
                    Err(e) => format!("probe failed: {}", e),
                },
                None => "detector still initializing".to_string(),
            };
            WorkerResponse::Debug { message }
        }
    }
}

/// Handle to a running detection worker
#[derive(Debug)]
pub struct WorkerHandle {
    requests: mpsc::Sender<WorkerRequest>,
    responses: mpsc::Receiver<WorkerResponse>,
    next_request_id: u64,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Allocate a fresh request id
    pub fn next_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// Queue a frame for detection without waiting; returns its request id
    pub fn try_detect(&mut self, frame: Frame) -> MediaResult<u64> {
        let request_id = self.next_request_id();
        self.try_send(WorkerRequest::detect(request_id, frame))?;
        Ok(request_id)
    }

    /// Queue a debug action
    pub fn request_debug(&self, action: DebugAction) -> MediaResult<()> {
        self.try_send(WorkerRequest::Debug { action })
    }

    /// Queue a raw request
    pub fn try_send(&self, request: WorkerRequest) -> MediaResult<()> {
        self.requests.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => MediaError::WorkerBusy,
            mpsc::error::TrySendError::Closed(_) => MediaError::WorkerClosed,
        })
    }

    /// Next response; `None` once the worker has stopped
    pub async fn recv(&mut self) -> Option<WorkerResponse> {
        self.responses.recv().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
