//! Native camera capture via nokhwa
//!
//! The camera handle stays on a dedicated capture thread. The thread keeps
//! the most recent decoded RGBA frame in a shared slot and the sampler copies
//! from that slot on each tick.

use super::{FrameSource, SourceState};
use crate::error::MediaError;
use crate::frame::VideoResolution;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct LatestFrame {
    resolution: Option<VideoResolution>,
    rgba: Vec<u8>,
    ended: bool,
}

/// System camera decoded to RGBA
pub struct CameraSource {
    name: String,
    latest: Arc<Mutex<LatestFrame>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CameraSource {
    /// Open camera `index` at its highest frame rate and start streaming
    pub fn open(index: u32) -> Result<Self, MediaError> {
        let latest = Arc::new(Mutex::new(LatestFrame::default()));
        let running = Arc::new(AtomicBool::new(true));
        let (opened_tx, opened_rx) = oneshot::channel();

        let thread = {
            let latest = latest.clone();
            let running = running.clone();
            std::thread::Builder::new()
                .name(format!("camera-{}", index))
                .spawn(move || capture_loop(index, latest, running, opened_tx))
                .map_err(|e| MediaError::SourceUnavailable {
                    reason: format!("camera {} thread: {}", index, e),
                })?
        };

        let name = opened_rx
            .blocking_recv()
            .map_err(|_| MediaError::SourceUnavailable {
                reason: format!("camera {} thread exited during open", index),
            })??;

        Ok(Self {
            name,
            latest,
            running,
            thread: Some(thread),
        })
    }
}

fn open_camera(index: u32) -> Result<Camera, MediaError> {
    let requested =
        RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
    let mut camera =
        Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
            MediaError::SourceUnavailable {
                reason: format!("camera {}: {}", index, e),
            }
        })?;
    camera
        .open_stream()
        .map_err(|e| MediaError::SourceUnavailable {
            reason: format!("camera {} stream: {}", index, e),
        })?;
    Ok(camera)
}

fn capture_loop(
    index: u32,
    latest: Arc<Mutex<LatestFrame>>,
    running: Arc<AtomicBool>,
    opened: oneshot::Sender<Result<String, MediaError>>,
) {
    let mut camera = match open_camera(index) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = opened.send(Err(e));
            return;
        }
    };

    let native = camera.resolution();
    let name = camera.info().human_name();
    info!(
        "Camera {} streaming at {}x{}",
        name,
        native.width(),
        native.height()
    );
    if opened.send(Ok(name)).is_err() {
        return;
    }

    let mut consecutive_errors = 0u32;
    while running.load(Ordering::Relaxed) {
        let decoded = camera
            .frame()
            .and_then(|buffer| buffer.decode_image::<RgbAFormat>());
        match decoded {
            Ok(image) => {
                consecutive_errors = 0;
                let resolution = VideoResolution::new(image.width(), image.height());
                let mut slot = latest.lock();
                if slot.resolution != Some(resolution) {
                    debug!(
                        "Camera {} delivering {}x{}",
                        index, resolution.width, resolution.height
                    );
                    slot.resolution = Some(resolution);
                }
                slot.rgba = image.into_raw();
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors == 1 {
                    warn!("Camera {} frame error: {}", index, e);
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
        }
    }

    if let Err(e) = camera.stop_stream() {
        debug!("Camera {} stop failed: {}", index, e);
    }
    latest.lock().ended = true;
}

impl FrameSource for CameraSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> SourceState {
        if self.latest.lock().ended {
            SourceState::Ended
        } else {
            SourceState::Playing
        }
    }

    fn resolution(&self) -> Option<VideoResolution> {
        self.latest.lock().resolution
    }

    fn read_rgba(&mut self, surface: &mut [u8]) -> Result<(), MediaError> {
        let slot = self.latest.lock();
        if slot.rgba.len() != surface.len() {
            // The sampler resizes its surface on the next tick.
            return Err(MediaError::ReadbackFailed {
                reason: format!(
                    "camera frame holds {} bytes, surface has {}",
                    slot.rgba.len(),
                    surface.len()
                ),
            });
        }
        surface.copy_from_slice(&slot.rgba);
        Ok(())
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
