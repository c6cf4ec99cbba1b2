//! Broadcast channels carrying encoded draw messages between clients.
//!
//! The replication layer only needs "send a string to every other peer" and
//! "give me what arrived since last time". [`LocalHub`] does that in-process;
//! [`NativeWebSocket`] does it through the relay server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not connected")]
    NotConnected,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("codec error: {0}")]
    Codec(String),
}

/// Unordered, at-least-once publish/subscribe channel.
pub trait BroadcastChannel: Send {
    /// Publish to every other endpoint. Never delivered back to the sender.
    fn send(&mut self, payload: &str) -> Result<(), SyncError>;

    /// Drain payloads received since the last poll.
    fn poll(&mut self) -> Vec<String>;
}

// ============================================================================
// In-process hub
// ============================================================================

#[derive(Default)]
struct HubInner {
    queues: Vec<Option<VecDeque<String>>>,
    duplicate: bool,
}

/// In-process fan-out between [`LocalChannel`] endpoints.
#[derive(Clone, Default)]
pub struct LocalHub {
    inner: Arc<Mutex<HubInner>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new endpoint.
    pub fn channel(&self) -> LocalChannel {
        let index = match self.inner.lock() {
            Ok(mut inner) => {
                inner.queues.push(Some(VecDeque::new()));
                inner.queues.len() - 1
            }
            Err(e) => {
                log::error!("local hub poisoned: {}", e);
                usize::MAX
            }
        };
        LocalChannel {
            hub: self.inner.clone(),
            index,
        }
    }

    /// Deliver every message twice, to exercise at-least-once handling.
    pub fn set_duplicate_delivery(&self, duplicate: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.duplicate = duplicate;
        }
    }
}

/// One endpoint of a [`LocalHub`].
pub struct LocalChannel {
    hub: Arc<Mutex<HubInner>>,
    index: usize,
}

impl BroadcastChannel for LocalChannel {
    fn send(&mut self, payload: &str) -> Result<(), SyncError> {
        let mut inner = self.hub.lock().map_err(|e| SyncError::Send(e.to_string()))?;
        let copies = if inner.duplicate { 2 } else { 1 };
        for (i, queue) in inner.queues.iter_mut().enumerate() {
            if i == self.index {
                continue;
            }
            if let Some(queue) = queue {
                for _ in 0..copies {
                    queue.push_back(payload.to_string());
                }
            }
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<String> {
        let Ok(mut inner) = self.hub.lock() else {
            return Vec::new();
        };
        match inner.queues.get_mut(self.index) {
            Some(Some(queue)) => queue.drain(..).collect(),
            _ => Vec::new(),
        }
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.hub.lock() {
            if let Some(slot) = inner.queues.get_mut(self.index) {
                *slot = None;
            }
        }
    }
}

// ============================================================================
// Relay wire format
// ============================================================================

/// Messages sent to the relay server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayClientMessage {
    /// Join a scene room
    Join { room: String },
    /// Leave current room
    Leave,
    /// Opaque payload for every other peer in the room
    Broadcast { data: String },
}

/// Messages received from the relay server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayServerMessage {
    Joined { room: String, peer_count: usize },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    Broadcast { from: String, data: String },
    Error { message: String },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the WebSocket client
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connected,
    Disconnected,
    JoinedRoom { room: String, peer_count: usize },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    Received { from: String, data: String },
    Error { message: String },
}

impl From<RelayServerMessage> for SyncEvent {
    fn from(msg: RelayServerMessage) -> Self {
        match msg {
            RelayServerMessage::Joined { room, peer_count } => SyncEvent::JoinedRoom { room, peer_count },
            RelayServerMessage::PeerJoined { peer_id } => SyncEvent::PeerJoined { peer_id },
            RelayServerMessage::PeerLeft { peer_id } => SyncEvent::PeerLeft { peer_id },
            RelayServerMessage::Broadcast { from, data } => SyncEvent::Received { from, data },
            RelayServerMessage::Error { message } => SyncEvent::Error { message },
        }
    }
}

pub fn encode_client_message(msg: &RelayClientMessage) -> Result<String, SyncError> {
    serde_json::to_string(msg).map_err(|e| SyncError::Codec(e.to_string()))
}

// ============================================================================
// Native WebSocket Client
// ============================================================================

mod native_client {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};
    use url::Url;

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// Relay client for native platforms.
    ///
    /// Uses a background thread for non-blocking operation. Joins `room` as
    /// soon as the socket is open.
    pub struct NativeWebSocket {
        state: ConnectionState,
        events: Vec<SyncEvent>,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<SyncEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to a relay server and join `room`.
        pub fn connect(&mut self, url: &str, room: &str) -> Result<(), SyncError> {
            if self.cmd_tx.is_some() {
                return Err(SyncError::Send("already connected".to_string()));
            }

            let parsed_url = Url::parse(url).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
            if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
                return Err(SyncError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    parsed_url.scheme()
                )));
            }
            let join = encode_client_message(&RelayClientMessage::Join {
                room: room.to_string(),
            })?;

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();
            let url = url.to_string();

            let handle = thread::spawn(move || {
                log::info!("relay thread: connecting to {}", url);

                let (mut socket, response) = match connect(&url) {
                    Ok(connected) => connected,
                    Err(e) => {
                        log::error!("relay connection failed: {}", e);
                        let _ = event_tx.send(SyncEvent::Error {
                            message: format!("Connection failed: {}", e),
                        });
                        return;
                    }
                };
                log::info!("relay connected, status: {}", response.status());
                let _ = event_tx.send(SyncEvent::Connected);

                if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
                    let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                    let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
                }

                if let Err(e) = socket.send(Message::Text(join)) {
                    log::error!("relay join failed: {}", e);
                    let _ = event_tx.send(SyncEvent::Disconnected);
                    return;
                }

                loop {
                    match cmd_rx.try_recv() {
                        Ok(WsCommand::Send(msg)) => {
                            if let Err(e) = socket.send(Message::Text(msg)) {
                                log::error!("relay send error: {}", e);
                                break;
                            }
                        }
                        Ok(WsCommand::Close) => {
                            log::info!("relay close requested");
                            let _ = socket.close(None);
                            break;
                        }
                        Err(TryRecvError::Disconnected) => break,
                        Err(TryRecvError::Empty) => {}
                    }

                    match socket.read() {
                        Ok(Message::Text(txt)) => match serde_json::from_str::<RelayServerMessage>(&txt) {
                            Ok(msg) => {
                                let _ = event_tx.send(msg.into());
                            }
                            Err(e) => log::warn!("unparseable relay message: {}", e),
                        },
                        Ok(Message::Ping(data)) => {
                            let _ = socket.send(Message::Pong(data));
                        }
                        Ok(Message::Close(_)) => {
                            log::info!("relay closed the connection");
                            break;
                        }
                        Ok(_) => {}
                        Err(tungstenite::Error::Io(ref e))
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut =>
                        {
                            continue;
                        }
                        Err(e) => {
                            log::error!("relay read error: {}", e);
                            break;
                        }
                    }
                }

                log::info!("relay thread exiting");
                let _ = event_tx.send(SyncEvent::Disconnected);
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);
            Ok(())
        }

        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Poll for pending events (non-blocking).
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        SyncEvent::Connected => self.state = ConnectionState::Connected,
                        SyncEvent::Disconnected => self.state = ConnectionState::Disconnected,
                        SyncEvent::Error { .. } => self.state = ConnectionState::Error,
                        _ => {}
                    }
                    self.events.push(event);
                }
            }
            std::mem::take(&mut self.events)
        }

        pub fn state(&self) -> ConnectionState {
            self.state
        }

        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl BroadcastChannel for NativeWebSocket {
        fn send(&mut self, payload: &str) -> Result<(), SyncError> {
            let tx = self.cmd_tx.as_ref().ok_or(SyncError::NotConnected)?;
            let msg = encode_client_message(&RelayClientMessage::Broadcast {
                data: payload.to_string(),
            })?;
            tx.send(WsCommand::Send(msg)).map_err(|e| SyncError::Send(e.to_string()))
        }

        fn poll(&mut self) -> Vec<String> {
            self.poll_events()
                .into_iter()
                .filter_map(|event| match event {
                    SyncEvent::Received { data, .. } => Some(data),
                    SyncEvent::Error { message } => {
                        log::warn!("relay error: {}", message);
                        None
                    }
                    other => {
                        log::debug!("relay event: {:?}", other);
                        None
                    }
                })
                .collect()
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

pub use native_client::NativeWebSocket;
