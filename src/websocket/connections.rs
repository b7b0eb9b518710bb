//! Registry of live participant connections per game.

use dashmap::DashMap;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{GameId, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,
    #[error("outbound queue full")]
    Full,
}

/// Outbound half of a transport. Implementations must not block.
pub trait MessageSink: Send + Sync {
    fn send_text(&self, text: &str) -> Result<(), SendError>;
}

/// One live transport link. The id distinguishes two sockets opened with the
/// same auth token.
#[derive(Clone)]
pub struct Connection {
    id: Uuid,
    sink: Arc<dyn MessageSink>,
}

impl Connection {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self::with_id(Uuid::new_v4(), sink)
    }

    pub fn with_id(id: Uuid, sink: Arc<dyn MessageSink>) -> Self {
        Self { id, sink }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn send_text(&self, text: &str) -> Result<(), SendError> {
        self.sink.send_text(text)
    }

    /// Serializes and sends a single message. Serialization failures are
    /// logged and reported as success; the connection itself is fine.
    pub fn send(&self, message: &ServerMessage) -> Result<(), SendError> {
        match serde_json::to_string(message) {
            Ok(text) => self.send_text(&text),
            Err(e) => {
                warn!("Error serializing message: {}", e);
                Ok(())
            }
        }
    }
}

/// gameID -> (auth token -> connection). Games with no connections are
/// removed from the map.
#[derive(Default)]
pub struct ConnectionRegistry {
    games: DashMap<GameId, HashMap<String, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `connection` for `auth_token`, replacing any earlier
    /// connection with the same token on this game.
    pub fn add(&self, game_id: GameId, auth_token: &str, connection: Connection) {
        let mut connections = self.games.entry(game_id).or_default();
        if connections
            .insert(auth_token.to_string(), connection)
            .is_some()
        {
            debug!("Replaced existing connection for token on game {}", game_id);
        }
        info!(
            "Game {} now has {} connection(s)",
            game_id,
            connections.len()
        );
    }

    pub fn remove(&self, game_id: GameId, auth_token: &str) -> Option<Connection> {
        let removed = self
            .games
            .get_mut(&game_id)
            .and_then(|mut connections| connections.remove(auth_token));
        self.prune(game_id);
        removed
    }

    /// Removes the token's entry only if it still belongs to `connection_id`.
    pub fn remove_connection(&self, game_id: GameId, auth_token: &str, connection_id: Uuid) -> bool {
        let removed = match self.games.get_mut(&game_id) {
            Some(mut connections) => {
                if connections.get(auth_token).map(Connection::id) == Some(connection_id) {
                    connections.remove(auth_token);
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        self.prune(game_id);
        removed
    }

    /// Sends `message` to every connection on the game except
    /// `exclude_token`. Returns how many sends succeeded.
    pub fn broadcast(&self, game_id: GameId, exclude_token: &str, message: &ServerMessage) -> usize {
        self.deliver(game_id, Some(exclude_token), message)
    }

    pub fn broadcast_all(&self, game_id: GameId, message: &ServerMessage) -> usize {
        self.deliver(game_id, None, message)
    }

    pub fn contains_game(&self, game_id: GameId) -> bool {
        self.games.contains_key(&game_id)
    }

    pub fn connection_count(&self, game_id: GameId) -> usize {
        self.games.get(&game_id).map_or(0, |c| c.len())
    }

    pub fn is_connected(&self, game_id: GameId, auth_token: &str) -> bool {
        self.games
            .get(&game_id)
            .map_or(false, |c| c.contains_key(auth_token))
    }

    fn deliver(&self, game_id: GameId, exclude: Option<&str>, message: &ServerMessage) -> usize {
        // Serialize the message once
        let text = match serde_json::to_string(message) {
            Ok(s) => s,
            Err(e) => {
                warn!("Error serializing message: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        {
            let Some(mut connections) = self.games.get_mut(&game_id) else {
                debug!("No connections found for game {}", game_id);
                return 0;
            };

            let mut failed = Vec::new();
            for (token, connection) in connections.iter() {
                if Some(token.as_str()) == exclude {
                    continue;
                }
                match connection.send_text(&text) {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        warn!(
                            "Dropping connection {} from game {}: {}",
                            connection.id(),
                            game_id,
                            e
                        );
                        failed.push(token.clone());
                    }
                }
            }

            for token in failed {
                connections.remove(&token);
            }
        }

        self.prune(game_id);
        debug!(
            "Broadcast {:?} to {} connection(s) on game {}",
            message.message_type, delivered, game_id
        );
        delivered
    }

    fn prune(&self, game_id: GameId) {
        if self
            .games
            .remove_if(&game_id, |_, connections| connections.is_empty())
            .is_some()
        {
            info!("No more connections for game {}. Cleaning up.", game_id);
        }
    }
}
