//! Share Link Demo
//!
//! Shows the connect-link handshake between a camera peer and a receiver:
//! the sender builds a link carrying its peer id and shows it as a QR code,
//! the receiver opens it and reads the id back out.
//!
//! Usage: `cargo run --example share_link_demo [page-url]`

use tagrelay::{connect_target_from_url, PeerId, PeerRole, ShareLink};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let page = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8080/relay/".to_string());

    println!("🔗 tagrelay Share Link Demo");
    println!("===========================");

    let sender = PeerId::generate();
    println!("\n📷 Sender ({:?}) peer id: {}", PeerRole::from_url(&page), sender);

    let link = ShareLink::new(&page, &sender)?;
    println!("   Share this link: {}", link);
    println!("   Or scan it:\n{}", link.to_qr_terminal()?);

    let svg_path = std::env::temp_dir().join("tagrelay-share-link.svg");
    std::fs::write(&svg_path, link.to_qr_svg(320)?)?;
    println!("   QR code saved to {}", svg_path.display());

    let role = PeerRole::from_url(link.as_str());
    match connect_target_from_url(link.as_str()) {
        Some(target) => println!("\n📺 Receiver ({:?}) connecting to {}", role, target),
        None => println!("\n📺 No connect target in {}", link),
    }

    println!("\n✨ Share link demo completed!");
    Ok(())
}
