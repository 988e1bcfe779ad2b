//! Distance and bearing estimation from marker corner geometry
//!
//! A pinhole model: a marker of physical side `S` meters that appears `L`
//! pixels wide under focal length `F` pixels sits at `S * F / L` meters.

use crate::error::RelayError;
use crate::marker::{Detection, Estimate, Point2};
use serde::{Deserialize, Serialize};

/// Focal length as a fraction of image width when no calibrated value exists
pub const DEFAULT_FOCAL_FRACTION: f64 = 0.8;

/// Camera and marker calibration constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Physical marker side length in meters
    pub marker_size_m: f64,
    /// Calibrated focal length in pixels
    pub focal_length_px: Option<f64>,
    /// Focal length approximation as a fraction of image width
    pub focal_fraction: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            marker_size_m: 0.1,
            focal_length_px: None,
            focal_fraction: DEFAULT_FOCAL_FRACTION,
        }
    }
}

impl Calibration {
    /// Validate calibration constants
    pub fn validate(&self) -> Result<(), RelayError> {
        if !(self.marker_size_m.is_finite() && self.marker_size_m > 0.0) {
            return Err(RelayError::invalid_config("Marker size must be > 0"));
        }

        if let Some(focal) = self.focal_length_px {
            if !(focal.is_finite() && focal > 0.0) {
                return Err(RelayError::invalid_config("Focal length must be > 0"));
            }
        }

        if !(self.focal_fraction.is_finite() && self.focal_fraction > 0.0) {
            return Err(RelayError::invalid_config("Focal fraction must be > 0"));
        }

        Ok(())
    }

    /// Focal length in pixels for an image of the given width
    pub fn focal_length(&self, image_width: u32) -> f64 {
        self.focal_length_px
            .unwrap_or(self.focal_fraction * image_width as f64)
    }
}

/// Apparent marker side in pixels: mean of edges 0-1 and 1-2
pub fn apparent_side_px(corners: &[Point2; 4]) -> f64 {
    (corners[0].distance_to(&corners[1]) + corners[1].distance_to(&corners[2])) / 2.0
}

/// Distance in meters, or `0.0` when the apparent side is degenerate
pub fn distance_from_side(marker_size_m: f64, focal_px: f64, side_px: f64) -> f64 {
    if !(side_px.is_finite() && side_px > 0.0) {
        return 0.0;
    }

    let distance = marker_size_m * focal_px / side_px;
    if distance.is_finite() && distance >= 0.0 {
        distance
    } else {
        0.0
    }
}

/// Signed bearing in degrees of a point at `center_x`; negative is left
pub fn bearing_deg(center_x: f64, image_width: u32, focal_px: f64) -> f64 {
    (center_x - image_width as f64 / 2.0)
        .atan2(focal_px)
        .to_degrees()
}

/// Estimate distance and bearing of one detection
pub fn estimate(detection: &Detection, image_width: u32, calibration: &Calibration) -> Estimate {
    let focal = calibration.focal_length(image_width);
    let side = apparent_side_px(&detection.corners);

    Estimate {
        marker_id: detection.id,
        distance_m: distance_from_side(calibration.marker_size_m, focal, side),
        bearing_deg: bearing_deg(detection.center().x, image_width, focal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_zero_side_yields_sentinel() {
        assert_eq!(distance_from_side(0.1, 500.0, 0.0), 0.0);
        assert_eq!(distance_from_side(0.1, 500.0, f64::NAN), 0.0);

        let collapsed = Detection::new(1, [Point2::new(5.0, 5.0); 4]);
        let est = estimate(&collapsed, 640, &Calibration::default());
        assert_eq!(est.distance_m, 0.0);
        assert!(est.is_degenerate());
    }

    #[test]
    fn test_distance_is_size_times_focal_over_side() {
        let calibration = Calibration {
            marker_size_m: 0.15,
            focal_length_px: Some(600.0),
            ..Calibration::default()
        };
        let detection = Detection::square(4, 320.0, 240.0, 90.0);
        let est = estimate(&detection, 640, &calibration);
        assert!((est.distance_m - 0.15 * 600.0 / 90.0).abs() < EPS);
    }

    #[test]
    fn test_side_uses_two_adjacent_edges_only() {
        // Trapezoid: edges 0-1 and 1-2 are 10 and 20 long, the far edges differ.
        let corners = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 20.0),
            Point2::new(-30.0, 20.0),
        ];
        assert!((apparent_side_px(&corners) - 15.0).abs() < EPS);
    }

    #[test]
    fn test_bearing_sign_convention() {
        let focal = 512.0;
        assert_eq!(bearing_deg(320.0, 640, focal), 0.0);
        assert!(bearing_deg(100.0, 640, focal) < 0.0);
        assert!(bearing_deg(500.0, 640, focal) > 0.0);
    }

    #[test]
    fn test_bearing_matches_atan() {
        let b = bearing_deg(320.0 + 512.0, 640, 512.0);
        assert!((b - 45.0).abs() < EPS);
    }

    #[test]
    fn test_focal_defaults_to_fraction_of_width() {
        let calibration = Calibration::default();
        assert!((calibration.focal_length(1000) - 800.0).abs() < EPS);

        let calibrated = Calibration {
            focal_length_px: Some(900.0),
            ..Calibration::default()
        };
        assert_eq!(calibrated.focal_length(1000), 900.0);
    }

    #[test]
    fn test_validate_rejects_bad_constants() {
        assert!(Calibration::default().validate().is_ok());
        assert!(Calibration {
            marker_size_m: 0.0,
            ..Calibration::default()
        }
        .validate()
        .is_err());
        assert!(Calibration {
            focal_length_px: Some(-1.0),
            ..Calibration::default()
        }
        .validate()
        .is_err());
    }
}
