//! drafftmark WebSocket relay
//!
//! Fans opaque draw-message payloads out to every other peer in the same
//! scene room. The relay never inspects or stores payloads.
//!
//! ## Protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "join", "room": "scene-id" }
//! { "type": "leave" }
//! { "type": "broadcast", "data": "<draw message>" }
//! ```

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// A message sent by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a scene room
    Join { room: String },
    /// Leave current room
    Leave,
    /// Payload for every other peer in the room
    Broadcast { data: String },
}

/// A message sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join
    Joined { room: String, peer_count: usize },
    /// Peer joined the room
    PeerJoined { peer_id: String },
    /// Peer left the room
    PeerLeft { peer_id: String },
    /// Payload from another peer
    Broadcast { from: String, data: String },
    /// Error message
    Error { message: String },
}

/// Room state
struct Room {
    tx: broadcast::Sender<(String, ServerMessage)>,
    peers: HashSet<String>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
        }
    }
}

/// Shared application state
#[derive(Default)]
pub struct AppState {
    rooms: DashMap<String, Room>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.peers.len())
    }

    /// Add peer to room, creating it on first join
    fn join_room(&self, room_id: &str, peer_id: &str) -> (broadcast::Receiver<(String, ServerMessage)>, usize) {
        let mut room = self.rooms.entry(room_id.to_string()).or_insert_with(Room::new);
        room.peers.insert(peer_id.to_string());
        (room.tx.subscribe(), room.peers.len())
    }

    /// Remove peer from room and drop the room once empty
    fn leave_room(&self, room_id: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.peers.remove(peer_id);
            if room.peers.is_empty() {
                drop(room);
                self.rooms.remove_if(room_id, |_, room| room.peers.is_empty());
            }
        }
    }

    fn broadcast(&self, room_id: &str, from: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            let _ = room.tx.send((from.to_string(), msg));
        }
    }
}

/// Build the relay router: `/` banner, `/ws` socket, `/health` probe.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> &'static str {
    "drafftmark relay - connect via WebSocket at /ws"
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn encode(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!("Failed to encode server message: {}", e);
            None
        }
    }
}

/// Per-connection room membership
struct Peer {
    id: String,
    room: Option<String>,
    rx: Option<broadcast::Receiver<(String, ServerMessage)>>,
}

impl Peer {
    fn leave(&mut self, state: &AppState) {
        if let Some(room) = self.room.take() {
            state.leave_room(&room, &self.id);
            state.broadcast(&room, &self.id, ServerMessage::PeerLeft { peer_id: self.id.clone() });
            info!("Peer {} left room {}", self.id, room);
        }
        self.rx = None;
    }

    /// Apply one client message, returning the direct reply if any
    fn handle(&mut self, state: &AppState, msg: ClientMessage) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Join { room } => {
                self.leave(state);
                let (rx, peer_count) = state.join_room(&room, &self.id);
                self.rx = Some(rx);
                self.room = Some(room.clone());
                state.broadcast(&room, &self.id, ServerMessage::PeerJoined { peer_id: self.id.clone() });
                info!("Peer {} joined room {}", self.id, room);
                Some(ServerMessage::Joined { room, peer_count })
            }
            ClientMessage::Leave => {
                self.leave(state);
                None
            }
            ClientMessage::Broadcast { data } => match &self.room {
                Some(room) => {
                    state.broadcast(room, &self.id, ServerMessage::Broadcast {
                        from: self.id.clone(),
                        data,
                    });
                    None
                }
                None => Some(ServerMessage::Error {
                    message: "Join a room before broadcasting".to_string(),
                }),
            },
        }
    }

    fn handle_text(&mut self, state: &AppState, text: &str) -> Option<ServerMessage> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => self.handle(state, msg),
            Err(e) => {
                warn!("Invalid message from {}: {}", self.id, e);
                Some(ServerMessage::Error {
                    message: format!("Invalid message: {}", e),
                })
            }
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let mut peer = Peer {
        id: Uuid::new_v4().to_string(),
        room: None,
        rx: None,
    };
    info!("New connection: {}", peer.id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let reply = match msg {
                    Some(Ok(Message::Text(text))) => peer.handle_text(&state, text.as_str()),
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => peer.handle_text(&state, text),
                        Err(_) => Some(ServerMessage::Error {
                            message: "Binary frames must be UTF-8 JSON".to_string(),
                        }),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => None,
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer.id, e);
                        break;
                    }
                };
                if let Some(frame) = reply.as_ref().and_then(encode) {
                    if sender.send(frame).await.is_err() {
                        break;
                    }
                }
            }

            msg = async {
                match &mut peer.rx {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                match msg {
                    Ok((from, server_msg)) => {
                        // No echo to the sender
                        if from == peer.id {
                            continue;
                        }
                        if let Some(frame) = encode(&server_msg) {
                            if sender.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Peer {} lagged, {} messages dropped", peer.id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Room channel closed for {}", peer.id);
                        peer.rx = None;
                    }
                }
            }
        }
    }

    peer.leave(&state);
    info!("Connection closed: {}", peer.id);
}
