//! AprilTag detection via the AprilTag C library
//!
//! The configuration types are always available so a relay config can name
//! a tag family without the native library. The detector itself needs the
//! `apriltag` feature.

use crate::error::MediaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported AprilTag families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagFamily {
    /// tag16h5
    Tag16h5,
    /// tag25h9
    Tag25h9,
    /// tag36h11
    #[default]
    Tag36h11,
}

impl TagFamily {
    /// Family name as the AprilTag library spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            TagFamily::Tag16h5 => "tag16h5",
            TagFamily::Tag25h9 => "tag25h9",
            TagFamily::Tag36h11 => "tag36h11",
        }
    }
}

impl fmt::Display for TagFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AprilTag detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AprilTagConfig {
    /// Tag family to look for
    pub family: TagFamily,
    /// Input decimation for quad detection; 1.0 uses full resolution
    pub decimation: f32,
    /// Bit errors the decoder may correct
    pub max_hamming: u8,
}

impl Default for AprilTagConfig {
    fn default() -> Self {
        Self {
            family: TagFamily::Tag36h11,
            decimation: 2.0,
            max_hamming: 1,
        }
    }
}

impl AprilTagConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), MediaError> {
        if self.decimation.is_nan() || self.decimation < 1.0 {
            return Err(MediaError::InvalidConfiguration {
                message: "AprilTag decimation must be >= 1.0".to_string(),
            });
        }
        if self.max_hamming > 3 {
            return Err(MediaError::InvalidConfiguration {
                message: "AprilTag max_hamming must be <= 3".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(feature = "apriltag")]
pub use backend::AprilTagDetector;

#[cfg(feature = "apriltag")]
mod backend {
    use super::{AprilTagConfig, TagFamily};
    use crate::detector::MarkerDetector;
    use crate::error::MediaError;
    use ::apriltag::{Detector, DetectorBuilder, Family, Image};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tagrelay_core::{Detection, Point2};
    use tracing::{debug, info};

    fn family(family: TagFamily) -> Family {
        match family {
            TagFamily::Tag16h5 => Family::tag_16h5(),
            TagFamily::Tag25h9 => Family::tag_25h9(),
            TagFamily::Tag36h11 => Family::tag_36h11(),
        }
    }

    /// Marker detector backed by the AprilTag C library
    pub struct AprilTagDetector {
        config: AprilTagConfig,
        detector: Option<Mutex<Detector>>,
    }

    impl AprilTagDetector {
        /// Create an uninitialized detector; the library detector is built
        /// by [`MarkerDetector::initialize`]
        pub fn new(config: AprilTagConfig) -> Self {
            Self {
                config,
                detector: None,
            }
        }

        /// Active configuration
        pub fn config(&self) -> &AprilTagConfig {
            &self.config
        }
    }

    impl Default for AprilTagDetector {
        fn default() -> Self {
            Self::new(AprilTagConfig::default())
        }
    }

    impl std::fmt::Debug for AprilTagDetector {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("AprilTagDetector")
                .field("config", &self.config)
                .field("initialized", &self.detector.is_some())
                .finish()
        }
    }

    /// Copy a packed luminance buffer into a library image
    fn luma_image(luma: &[u8], width: usize, height: usize) -> Result<Image, MediaError> {
        let mut image = Image::zeros_with_stride(width, height, width).ok_or_else(|| {
            MediaError::DetectionFailed {
                reason: format!("cannot allocate {}x{} image", width, height),
            }
        })?;
        for (y, row) in luma.chunks_exact(width).enumerate() {
            for (x, &value) in row.iter().enumerate() {
                image[(x, y)] = value;
            }
        }
        Ok(image)
    }

    /// The library reports corners counter-clockwise from bottom-left;
    /// reorder them clockwise from top-left.
    fn to_detection(found: &::apriltag::Detection) -> Detection {
        let [bottom_left, bottom_right, top_right, top_left] =
            found.corners().map(|[x, y]| Point2::new(x, y));
        let [cx, cy] = found.center();
        Detection::new(
            found.id() as u32,
            [top_left, top_right, bottom_right, bottom_left],
        )
        .with_center(Point2::new(cx, cy))
    }

    #[async_trait]
    impl MarkerDetector for AprilTagDetector {
        fn name(&self) -> &str {
            "apriltag"
        }

        async fn initialize(&mut self) -> Result<(), MediaError> {
            self.config.validate()?;
            let detector = DetectorBuilder::new()
                .add_family_bits(family(self.config.family), self.config.max_hamming as usize)
                .set_decimation(self.config.decimation)
                .build()
                .map_err(|e| MediaError::DetectorInitFailed {
                    detector: "apriltag".to_string(),
                    reason: format!("{:?}", e),
                })?;
            self.detector = Some(Mutex::new(detector));
            info!(
                "AprilTag detector ready for {} (decimation {})",
                self.config.family, self.config.decimation
            );
            Ok(())
        }

        fn detect(
            &mut self,
            luma: &[u8],
            width: u32,
            height: u32,
        ) -> Result<Vec<Detection>, MediaError> {
            let detector = self
                .detector
                .as_mut()
                .ok_or(MediaError::DetectorNotReady)?
                .get_mut();

            let (width, height) = (width as usize, height as usize);
            let expected = width * height;
            if luma.len() != expected {
                return Err(MediaError::InvalidFrameData {
                    expected,
                    actual: luma.len(),
                });
            }
            if expected == 0 {
                return Ok(Vec::new());
            }

            let image = luma_image(luma, width, height)?;
            let detections: Vec<Detection> =
                detector.detect(&image).iter().map(to_detection).collect();
            debug!("AprilTag found {} markers in {}x{}", detections.len(), width, height);
            Ok(detections)
        }

        async fn probe(&self) -> Result<String, MediaError> {
            match self.detector {
                Some(_) => Ok(format!("apriltag reachable, family {}", self.config.family)),
                None => Err(MediaError::DetectorNotReady),
            }
        }
    }
}
