//! Share link and connect-target tests

use tagrelay_signaling::*;

// ============================================================================
// SHARE LINKS
// ============================================================================

#[test]
fn test_share_link_keeps_origin_and_path() {
    let peer = PeerId::parse("b3f1c2").unwrap();
    let link = ShareLink::new("https://robot.local:8443/drive/index.html", &peer).unwrap();
    assert_eq!(
        link.as_str(),
        "https://robot.local:8443/drive/index.html?connect=b3f1c2"
    );
}

#[test]
fn test_share_link_replaces_existing_query() {
    let peer = PeerId::parse("abc").unwrap();
    let link = ShareLink::new("http://localhost:8080/?connect=old&x=1#top", &peer).unwrap();
    assert_eq!(link.to_string(), "http://localhost:8080/?connect=abc");
}

#[test]
fn test_share_link_round_trips_generated_id() {
    let peer = PeerId::generate();
    let link = ShareLink::new("http://localhost:8080/", &peer).unwrap();
    assert_eq!(link.peer_id(), Some(peer.clone()));
    assert_eq!(
        connect_target_from_url(link.as_str()),
        Some(peer.as_str().to_string())
    );
}

#[test]
fn test_share_link_rejects_bad_base() {
    let peer = PeerId::generate();
    assert!(ShareLink::new("not a url", &peer).is_err());
    assert!(ShareLink::new("mailto:someone@example.com", &peer).is_err());
}

// ============================================================================
// QR CODES
// ============================================================================

/// Rasterize a QR code with a four-module quiet zone, `scale` pixels per module
fn rasterize(code: &qrcode::QrCode, scale: usize) -> (usize, Vec<u8>) {
    const QUIET: usize = 4;
    let width = code.width();
    let colors = code.to_colors();
    let size = (width + 2 * QUIET) * scale;
    let mut luma = vec![255u8; size * size];
    for y in 0..size {
        for x in 0..size {
            let (mx, my) = (x / scale, y / scale);
            let inside = (QUIET..QUIET + width).contains(&mx) && (QUIET..QUIET + width).contains(&my);
            if inside && colors[(my - QUIET) * width + (mx - QUIET)] == qrcode::Color::Dark {
                luma[y * size + x] = 0;
            }
        }
    }
    (size, luma)
}

#[test]
fn test_qr_code_decodes_to_link() {
    let peer = PeerId::generate();
    let link = ShareLink::new("https://robot.local:8443/drive/", &peer).unwrap();

    let (size, luma) = rasterize(&link.qr_code().unwrap(), 4);
    let mut image = rqrr::PreparedImage::prepare_from_greyscale(size, size, |x, y| luma[y * size + x]);
    let grids = image.detect_grids();
    assert_eq!(grids.len(), 1);
    let (_, content) = grids[0].decode().unwrap();
    assert_eq!(content, link.as_str());
    assert_eq!(connect_target_from_url(&content), Some(peer.to_string()));
}

#[test]
fn test_qr_renderings() {
    let peer = PeerId::parse("robot-1").unwrap();
    let link = ShareLink::new("http://localhost:8080/", &peer).unwrap();

    let svg = link.to_qr_svg(256).unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.contains("</svg>"));

    let terminal = link.to_qr_terminal().unwrap();
    let widths: Vec<usize> = terminal.lines().map(|line| line.chars().count()).collect();
    assert!(widths.len() > 10);
    assert!(widths.iter().all(|&w| w == widths[0]));
}

// ============================================================================
// CONNECT TARGETS
// ============================================================================

#[test]
fn test_connect_target_is_trimmed() {
    assert_eq!(
        connect_target_from_url("https://example.com/?connect=%20peer-7%20"),
        Some("peer-7".to_string())
    );
}

#[test]
fn test_missing_or_blank_target() {
    assert_eq!(connect_target_from_url("https://example.com/"), None);
    assert_eq!(connect_target_from_url("https://example.com/?connect="), None);
    assert_eq!(connect_target_from_url("https://example.com/?other=1"), None);
    assert_eq!(connect_target_from_url("::"), None);
}
