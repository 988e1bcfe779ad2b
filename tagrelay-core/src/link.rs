//! Socket-backed actuation link
//!
//! A writer task owns the socket. Commands reach it through a `watch`
//! channel, which holds only the latest value: if the robot side is slow,
//! intermediate commands are overwritten instead of queued.
//!
//! Closing the link (or dropping it) still delivers a command that was handed
//! over but not yet written, so a final STOP reaches the robot.

use crate::actuation::{ActuationCommand, ActuationSink, LinkState, SendOutcome};
use crate::error::RelayError;
use futures::SinkExt;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

/// Where the robot controller listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Plain TCP, one newline-terminated line per command (`tcp://host:port`)
    Tcp(String),
    /// WebSocket, one text message per command (`ws://` or `wss://`)
    WebSocket(String),
}

impl Endpoint {
    /// Parse an endpoint string
    pub fn parse(endpoint: &str) -> Result<Self, RelayError> {
        let endpoint = endpoint.trim();
        if let Some(addr) = endpoint.strip_prefix("tcp://") {
            if addr.is_empty() {
                return Err(RelayError::UnsupportedEndpoint {
                    endpoint: endpoint.to_string(),
                });
            }
            return Ok(Endpoint::Tcp(addr.to_string()));
        }

        if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            return Ok(Endpoint::WebSocket(endpoint.to_string()));
        }

        Err(RelayError::UnsupportedEndpoint {
            endpoint: endpoint.to_string(),
        })
    }

    fn describe(&self) -> String {
        match self {
            Endpoint::Tcp(addr) => format!("tcp://{}", addr),
            Endpoint::WebSocket(url) => url.clone(),
        }
    }
}

/// Connected socket the writer task owns
enum LinkWriter {
    Tcp(TcpStream),
    WebSocket(Box<WebSocketStream<MaybeTlsStream<TcpStream>>>),
}

impl LinkWriter {
    async fn write_command(&mut self, command: &ActuationCommand) -> Result<(), RelayError> {
        match self {
            LinkWriter::Tcp(stream) => {
                stream.write_all(command.to_line().as_bytes()).await?;
                stream.flush().await?;
            }
            LinkWriter::WebSocket(ws) => {
                ws.send(Message::Text(command.to_line()))
                    .await
                    .map_err(|e| RelayError::Link {
                        endpoint: "websocket".to_string(),
                        reason: e.to_string(),
                    })?;
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), String> {
        match self {
            LinkWriter::Tcp(stream) => stream.shutdown().await.map_err(|e| e.to_string()),
            LinkWriter::WebSocket(ws) => WebSocketStream::close(ws.as_mut(), None)
                .await
                .map_err(|e| e.to_string()),
        }
    }
}

/// Counters for one link
#[derive(Debug, Default)]
struct LinkCounters {
    sent: AtomicU64,
    dropped: AtomicU64,
}

/// Best-effort actuation link to a robot controller
#[derive(Debug)]
pub struct ActuationLink {
    endpoint: String,
    state: Arc<RwLock<LinkState>>,
    latest: watch::Sender<Option<ActuationCommand>>,
    counters: Arc<LinkCounters>,
    shutdown: Arc<Notify>,
    writer: JoinHandle<()>,
}

impl ActuationLink {
    /// Connect to `endpoint` and start the writer task
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self, RelayError> {
        let parsed = Endpoint::parse(endpoint)?;
        let description = parsed.describe();
        let state = Arc::new(RwLock::new(LinkState::Connecting));

        let writer = match &parsed {
            Endpoint::Tcp(addr) => {
                let stream = tokio::time::timeout(timeout, TcpStream::connect(addr.as_str()))
                    .await
                    .map_err(|_| RelayError::ConnectTimeout {
                        endpoint: description.clone(),
                        timeout,
                    })?
                    .map_err(|e| RelayError::Link {
                        endpoint: description.clone(),
                        reason: e.to_string(),
                    })?;
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Could not disable Nagle on {}: {}", description, e);
                }
                LinkWriter::Tcp(stream)
            }
            Endpoint::WebSocket(url) => {
                let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url.as_str()))
                    .await
                    .map_err(|_| RelayError::ConnectTimeout {
                        endpoint: description.clone(),
                        timeout,
                    })?
                    .map_err(|e| RelayError::Link {
                        endpoint: description.clone(),
                        reason: e.to_string(),
                    })?;
                LinkWriter::WebSocket(Box::new(ws_stream))
            }
        };

        *state.write() = LinkState::Open;
        info!("Actuation link open to {}", description);

        let (latest, rx) = watch::channel(None);
        let counters = Arc::new(LinkCounters::default());
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(Self::write_loop(
            writer,
            rx,
            shutdown.clone(),
            state.clone(),
            counters.clone(),
            description.clone(),
        ));

        Ok(Self {
            endpoint: description,
            state,
            latest,
            counters,
            shutdown,
            writer: task,
        })
    }

    async fn write_loop(
        mut writer: LinkWriter,
        mut rx: watch::Receiver<Option<ActuationCommand>>,
        shutdown: Arc<Notify>,
        state: Arc<RwLock<LinkState>>,
        counters: Arc<LinkCounters>,
        endpoint: String,
    ) {
        loop {
            // A pending command wins over shutdown so the last one is written.
            let closing = tokio::select! {
                biased;
                changed = rx.changed() => changed.is_err(),
                _ = shutdown.notified() => true,
            };
            if closing {
                break;
            }

            let latest = *rx.borrow_and_update();
            let Some(command) = latest else {
                continue;
            };
            if let Err(e) = writer.write_command(&command).await {
                warn!("Actuation link to {} lost: {}", endpoint, e);
                *state.write() = LinkState::Closed;
                return;
            }
            counters.sent.fetch_add(1, Ordering::Relaxed);
            trace!(%command, "command written to {}", endpoint);
        }

        if let Err(e) = writer.shutdown().await {
            debug!("Actuation link to {} did not shut down cleanly: {}", endpoint, e);
        }
        *state.write() = LinkState::Closed;
        debug!("Actuation writer for {} stopped", endpoint);
    }

    /// Endpoint this link is connected to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Commands actually written to the socket
    pub fn commands_written(&self) -> u64 {
        self.counters.sent.load(Ordering::Relaxed)
    }

    /// Commands discarded because the link was not open
    pub fn commands_dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    /// Whether the writer task has finished
    pub fn is_closed(&self) -> bool {
        self.writer.is_finished()
    }
}

impl ActuationSink for ActuationLink {
    fn state(&self) -> LinkState {
        *self.state.read()
    }

    fn send(&self, command: &ActuationCommand) -> SendOutcome {
        if self.state() != LinkState::Open {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(%command, "actuation link not open, dropping command");
            return SendOutcome::Dropped;
        }
        self.latest.send_replace(Some(*command));
        SendOutcome::Sent
    }

    /// Stop accepting commands; the writer flushes the last one and exits
    fn close(&self) {
        let mut state = self.state.write();
        if *state == LinkState::Open {
            *state = LinkState::Closing;
            self.shutdown.notify_one();
            info!("Closing actuation link to {}", self.endpoint);
        }
    }
}

impl Drop for ActuationLink {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parsing() {
        assert_eq!(
            Endpoint::parse("tcp://192.168.4.1:9000").unwrap(),
            Endpoint::Tcp("192.168.4.1:9000".to_string())
        );
        assert_eq!(
            Endpoint::parse("ws://robot.local:81/").unwrap(),
            Endpoint::WebSocket("ws://robot.local:81/".to_string())
        );
        assert!(Endpoint::parse("udp://1.2.3.4:5").is_err());
        assert!(Endpoint::parse("tcp://").is_err());
    }

    #[tokio::test]
    async fn test_connect_refused_is_link_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result =
            ActuationLink::connect(&format!("tcp://{}", addr), Duration::from_secs(2)).await;
        assert!(matches!(result, Err(RelayError::Link { .. })));
    }
}
