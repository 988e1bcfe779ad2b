//! Peer discovery through shareable connect links

use qrcode::render::{svg, unicode};
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use tagrelay_core::RelayError;
use tracing::debug;
use url::Url;

/// Query parameter that carries the peer id in a share link
pub const CONNECT_PARAM: &str = "connect";

/// Identifier a peer is reachable under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Fresh random peer id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Peer id from user input; surrounding whitespace is ignored and blank
    /// input is rejected
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The id as text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of a session a peer plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRole {
    /// Owns the camera and publishes its share link
    Sender,
    /// Connects to a sender and receives its video
    Receiver,
}

impl PeerRole {
    /// Role implied by how the page was opened: a connect target means the
    /// peer was reached through someone else's share link
    pub fn from_url(url: &str) -> Self {
        if connect_target_from_url(url).is_some() {
            PeerRole::Receiver
        } else {
            PeerRole::Sender
        }
    }
}

/// `<origin><path>?connect=<peer id>` link a receiver can open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    url: Url,
}

impl ShareLink {
    /// Build the share link for `peer` from the sender's own page URL
    ///
    /// Any query string or fragment on `base_url` is dropped.
    pub fn new(base_url: &str, peer: &PeerId) -> Result<Self, RelayError> {
        let mut url = Url::parse(base_url).map_err(|e| RelayError::InvalidConfiguration {
            message: format!("invalid share link base {}: {}", base_url, e),
        })?;
        if url.cannot_be_a_base() {
            return Err(RelayError::InvalidConfiguration {
                message: format!("share link base {} has no path", base_url),
            });
        }

        url.set_fragment(None);
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair(CONNECT_PARAM, peer.as_str());

        debug!("Share link for peer {}: {}", peer, url);
        Ok(Self { url })
    }

    /// Link text, as the QR code carries it
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Peer id carried by this link
    pub fn peer_id(&self) -> Option<PeerId> {
        connect_target(&self.url)
    }

    /// QR code encoding the link text
    pub fn qr_code(&self) -> Result<QrCode, RelayError> {
        QrCode::new(self.as_str()).map_err(|e| RelayError::InvalidConfiguration {
            message: format!("share link does not fit in a QR code: {}", e),
        })
    }

    /// QR code as an SVG document at least `size` pixels square
    pub fn to_qr_svg(&self, size: u32) -> Result<String, RelayError> {
        Ok(self
            .qr_code()?
            .render::<svg::Color>()
            .min_dimensions(size, size)
            .build())
    }

    /// QR code drawn with half-block characters, light on dark, for a
    /// terminal
    pub fn to_qr_terminal(&self) -> Result<String, RelayError> {
        Ok(self
            .qr_code()?
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build())
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Peer id to connect to, read from the `connect` query parameter
///
/// Returns `None` when the URL does not parse, has no `connect` parameter,
/// or the parameter is blank.
pub fn connect_target_from_url(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    connect_target(&url).map(|peer| peer.0)
}

fn connect_target(url: &Url) -> Option<PeerId> {
    url.query_pairs()
        .find(|(key, _)| key == CONNECT_PARAM)
        .and_then(|(_, value)| PeerId::parse(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = PeerId::generate();
        let b = PeerId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_parse_trims_input() {
        assert_eq!(PeerId::parse("  abc \n").unwrap().as_str(), "abc");
        assert!(PeerId::parse("   ").is_none());
    }

    #[test]
    fn test_role_from_url() {
        assert_eq!(
            PeerRole::from_url("https://example.com/app/?connect=xyz"),
            PeerRole::Receiver
        );
        assert_eq!(PeerRole::from_url("https://example.com/app/"), PeerRole::Sender);
    }

    #[test]
    fn test_peer_id_serializes_as_string() {
        let peer = PeerId::parse("robot-1").unwrap();
        assert_eq!(serde_json::to_string(&peer).unwrap(), "\"robot-1\"");
    }
}
