//! Outbound fan-out: player sockets, the public SSE stream and the admin SSE stream.

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dto::{sse::ServerEvent, ws::ServerMessage};

/// Handle used to push frames to a connected player socket.
#[derive(Clone)]
pub struct PlayerConnection {
    /// Distinguishes successive sockets of the same player.
    pub connection_id: Uuid,
    /// Writer channel of the socket.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

/// Routes coordinator messages to their audience.
pub struct Gateway {
    players: broadcast::Sender<ServerMessage>,
    public: SseHub,
    admin: SseHub,
    admin_token: Mutex<Option<String>>,
    connections: DashMap<String, PlayerConnection>,
}

impl Gateway {
    /// Build the gateway with per-stream channel capacities.
    pub fn new(capacity: usize) -> Self {
        let (players, _receiver) = broadcast::channel(capacity);
        Self {
            players,
            public: SseHub::new(capacity),
            admin: SseHub::new(capacity),
            admin_token: Mutex::new(None),
            connections: DashMap::new(),
        }
    }

    /// Receive every message addressed to all players.
    pub fn subscribe_players(&self) -> broadcast::Receiver<ServerMessage> {
        self.players.subscribe()
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_hub(&self) -> &SseHub {
        &self.public
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_hub(&self) -> &SseHub {
        &self.admin
    }

    /// Token guard that ensures a single admin SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        &self.admin_token
    }

    /// Number of sockets bound to an identity.
    pub fn connected_players(&self) -> usize {
        self.connections.len()
    }

    /// Bind a socket to `player_id`, closing any socket previously bound to it.
    pub fn register(&self, player_id: &str, tx: mpsc::UnboundedSender<Message>) -> Uuid {
        let connection_id = Uuid::new_v4();
        let previous = self.connections.insert(
            player_id.to_string(),
            PlayerConnection { connection_id, tx },
        );
        if let Some(previous) = previous {
            debug!(player = %player_id, "replacing previous player socket");
            let _ = previous.tx.send(Message::Close(None));
        }
        connection_id
    }

    /// Forget a socket, unless a newer one already took its place.
    pub fn unregister(&self, player_id: &str, connection_id: Uuid) {
        self.connections
            .remove_if(player_id, |_, connection| {
                connection.connection_id == connection_id
            });
    }

    /// Tell every player socket to log out, then close and forget it.
    pub fn disconnect_all(&self) {
        self.connections.retain(|_, connection| {
            let _ = send_message_to_websocket(&connection.tx, &ServerMessage::ForceDisconnect);
            let _ = connection.tx.send(Message::Close(None));
            false
        });
    }

    /// Deliver to every player, the public stream and the admin stream.
    pub fn deliver_all(&self, message: ServerMessage) {
        if let Some(event) = to_event(&message) {
            self.public.broadcast(event.clone());
            self.admin.broadcast(event);
        }
        let _ = self.players.send(message);
    }

    /// Deliver to the admin stream only.
    pub fn deliver_admin(&self, message: ServerMessage) {
        if let Some(event) = to_event(&message) {
            self.admin.broadcast(event);
        }
    }

    /// Deliver to a single player; dropped when the player has no open socket.
    pub fn deliver(&self, player_id: &str, message: ServerMessage) {
        let Some(tx) = self
            .connections
            .get(player_id)
            .map(|connection| connection.tx.clone())
        else {
            debug!(player = %player_id, kind = message.event_name(), "player offline, dropping message");
            return;
        };

        if send_message_to_websocket(&tx, &message).is_err() {
            warn!(player = %player_id, "send failed (writer closed), removing player connection");
            self.connections.remove(player_id);
        }
    }
}

/// Writer side of a socket is gone.
#[derive(Debug)]
pub struct ConnectionClosed;

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; only a closed writer is reported.
pub fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

fn to_event(message: &ServerMessage) -> Option<ServerEvent> {
    match ServerEvent::from_message(message) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, kind = message.event_name(), "failed to serialize SSE event");
            None
        }
    }
}
