//! Marker detections and the estimates derived from them
//!
//! Corners are in pixel coordinates with the y axis pointing down and are
//! ordered clockwise starting from the marker's top-left corner:
//! `[top_left, top_right, bottom_right, bottom_left]`. The geometry
//! estimator relies on corners 0-1 and 1-2 being adjacent edges.

use serde::{Deserialize, Serialize};

/// A 2-D point in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate (grows downwards)
    pub y: f64,
}

impl Point2 {
    /// Create a new point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One marker found in one frame
///
/// Detections carry no identity across frames; each one stands alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Marker identifier
    pub id: u32,
    /// Corner points, clockwise from top-left
    pub corners: [Point2; 4],
    /// Center reported by the detector, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Point2>,
}

impl Detection {
    /// Create a detection without an explicit center
    pub fn new(id: u32, corners: [Point2; 4]) -> Self {
        Self {
            id,
            corners,
            center: None,
        }
    }

    /// Attach the detector-reported center
    pub fn with_center(mut self, center: Point2) -> Self {
        self.center = Some(center);
        self
    }

    /// Axis-aligned square marker centered on `(cx, cy)` with the given side
    pub fn square(id: u32, cx: f64, cy: f64, side: f64) -> Self {
        let half = side / 2.0;
        Self::new(
            id,
            [
                Point2::new(cx - half, cy - half),
                Point2::new(cx + half, cy - half),
                Point2::new(cx + half, cy + half),
                Point2::new(cx - half, cy + half),
            ],
        )
    }

    /// Center of the marker: the reported one, or the mean of the corners
    pub fn center(&self) -> Point2 {
        self.center.unwrap_or_else(|| {
            let (sx, sy) = self
                .corners
                .iter()
                .fold((0.0, 0.0), |(sx, sy), c| (sx + c.x, sy + c.y));
            Point2::new(sx / 4.0, sy / 4.0)
        })
    }
}

/// Distance and bearing of one marker relative to the camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Identifier of the marker this estimate belongs to
    pub marker_id: u32,
    /// Distance in meters; `0.0` when the marker's apparent size was degenerate
    pub distance_m: f64,
    /// Signed horizontal angle in degrees; negative is left of center
    pub bearing_deg: f64,
}

impl Estimate {
    /// Whether the distance is the degenerate-geometry sentinel
    pub fn is_degenerate(&self) -> bool {
        self.distance_m == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_falls_back_to_corner_mean() {
        let detection = Detection::square(3, 100.0, 50.0, 20.0);
        assert_eq!(detection.center(), Point2::new(100.0, 50.0));

        let reported = detection.with_center(Point2::new(101.0, 49.0));
        assert_eq!(reported.center(), Point2::new(101.0, 49.0));
    }

    #[test]
    fn test_square_corner_order_is_clockwise_from_top_left() {
        let d = Detection::square(0, 0.0, 0.0, 2.0);
        assert_eq!(d.corners[0], Point2::new(-1.0, -1.0));
        assert_eq!(d.corners[1], Point2::new(1.0, -1.0));
        assert_eq!(d.corners[2], Point2::new(1.0, 1.0));
        assert_eq!(d.corners[3], Point2::new(-1.0, 1.0));
    }

    #[test]
    fn test_detection_json_shape() {
        let json = serde_json::to_value(Detection::square(7, 10.0, 10.0, 4.0)).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["corners"].as_array().unwrap().len(), 4);
        assert_eq!(json["corners"][0]["x"], 8.0);
        assert!(json.get("center").is_none());
    }
}
