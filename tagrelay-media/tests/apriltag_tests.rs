//! AprilTag backend tests
//!
//! A tag36h11 marker is rendered into a luminance buffer cell by cell and fed
//! straight to the detector.

#![cfg(feature = "apriltag")]

use tagrelay_core::apparent_side_px;
use tagrelay_media::*;
use tokio_test::assert_ok;

/// tag36h11 code word for id 0
const TAG36H11_ID0: u64 = 0xd_7e00_984b;

/// Data bit positions on the 8x8 grid inside the white margin (black
/// border at 0 and 7), most significant bit first. The first quadrant is
/// listed; the other three follow by rotating it clockwise.
fn tag36h11_bit_cells() -> Vec<(usize, usize)> {
    let mut quadrant = vec![
        (1, 1),
        (2, 1),
        (3, 1),
        (4, 1),
        (5, 1),
        (2, 2),
        (3, 2),
        (4, 2),
        (3, 3),
    ];
    let mut cells = Vec::with_capacity(36);
    for _ in 0..4 {
        cells.extend(quadrant.iter().copied());
        quadrant = quadrant.iter().map(|&(x, y)| (7 - y, x)).collect();
    }
    cells
}

/// Render `code` as a 10x10-cell tag with `cell` pixels per cell, centered
/// in a white frame with `margin` pixels on each side
fn render_tag36h11(code: u64, cell: usize, margin: usize) -> (Vec<u8>, u32) {
    let mut grid = [[0u8; 10]; 10];
    for (y, row) in grid.iter_mut().enumerate() {
        for (x, value) in row.iter_mut().enumerate() {
            let outer = x == 0 || y == 0 || x == 9 || y == 9;
            *value = if outer { 255 } else { 0 };
        }
    }
    for (bit, (x, y)) in tag36h11_bit_cells().into_iter().enumerate() {
        if (code >> (35 - bit)) & 1 == 1 {
            grid[y + 1][x + 1] = 255;
        }
    }

    let side = 10 * cell + 2 * margin;
    let mut luma = vec![255u8; side * side];
    for (gy, row) in grid.iter().enumerate() {
        for (gx, &value) in row.iter().enumerate() {
            for py in 0..cell {
                let start = (margin + gy * cell + py) * side + margin + gx * cell;
                luma[start..start + cell].fill(value);
            }
        }
    }
    (luma, side as u32)
}

#[test]
fn test_bit_layout_covers_data_area_once() {
    let mut cells = tag36h11_bit_cells();
    assert_eq!(cells.len(), 36);
    cells.sort();
    cells.dedup();
    assert_eq!(cells.len(), 36);
    assert!(cells.iter().all(|&(x, y)| (1..=6).contains(&x) && (1..=6).contains(&y)));
}

#[tokio::test]
async fn test_detects_rendered_tag() {
    let (luma, side) = render_tag36h11(TAG36H11_ID0, 20, 100);
    let mut detector = AprilTagDetector::new(AprilTagConfig::default());
    assert_ok!(detector.initialize().await);

    let detections = assert_ok!(detector.detect(&luma, side, side));
    assert_eq!(detections.len(), 1);
    let tag = &detections[0];
    assert_eq!(tag.id, 0);

    let middle = side as f64 / 2.0;
    let center = tag.center();
    assert!((center.x - middle).abs() < 2.0, "center x {}", center.x);
    assert!((center.y - middle).abs() < 2.0, "center y {}", center.y);

    // Clockwise from top-left, y pointing down.
    let [top_left, top_right, bottom_right, bottom_left] = tag.corners;
    assert!(top_left.x < middle && top_left.y < middle);
    assert!(top_right.x > middle && top_right.y < middle);
    assert!(bottom_right.x > middle && bottom_right.y > middle);
    assert!(bottom_left.x < middle && bottom_left.y > middle);

    // The detected quad is the black border: 8 cells across.
    assert!((apparent_side_px(&tag.corners) - 160.0).abs() < 3.0);
}

#[tokio::test]
async fn test_blank_frame_has_no_tags() {
    let mut detector = AprilTagDetector::default();
    assert_ok!(detector.initialize().await);
    let luma = vec![200u8; 320 * 240];
    assert!(assert_ok!(detector.detect(&luma, 320, 240)).is_empty());
}

#[tokio::test]
async fn test_detect_requires_initialize() {
    let mut detector = AprilTagDetector::default();
    assert!(matches!(
        detector.detect(&[0u8; 16], 4, 4),
        Err(MediaError::DetectorNotReady)
    ));
    assert!(detector.probe().await.is_err());

    assert_ok!(detector.initialize().await);
    assert!(matches!(
        detector.detect(&[0u8; 3], 2, 2),
        Err(MediaError::InvalidFrameData { expected: 4, actual: 3 })
    ));
    let report = assert_ok!(detector.probe().await);
    assert!(report.contains("tag36h11"));
}

#[tokio::test]
async fn test_worker_runs_apriltag_backend() {
    let (luma, side) = render_tag36h11(TAG36H11_ID0, 12, 60);
    let mut handle = DetectionWorker::spawn(
        Box::new(AprilTagDetector::default()),
        WorkerConfig::default(),
    );
    let first = handle.recv().await;
    assert_eq!(first, Some(WorkerResponse::Ready));

    let frame = assert_ok!(Frame::new(1, side, side, luma));
    let request_id = assert_ok!(handle.try_detect(frame));
    match handle.recv().await {
        Some(WorkerResponse::Result {
            request_id: id,
            detections,
        }) => {
            assert_eq!(id, request_id);
            assert_eq!(detections.iter().map(|d| d.id).collect::<Vec<_>>(), vec![0]);
        }
        other => panic!("expected result, got {:?}", other),
    }
}
