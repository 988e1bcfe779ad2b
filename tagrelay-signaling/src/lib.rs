//! # tagrelay signaling
//!
//! Peer discovery helpers for tagrelay. A camera peer publishes a share link
//! carrying its peer id, rendered as a QR code; a receiving peer
//! opened through that link reads the id back out of its own URL.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod discovery;

// Re-export main types
pub use discovery::{connect_target_from_url, PeerId, PeerRole, ShareLink, CONNECT_PARAM};
