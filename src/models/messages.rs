use actix::Message;
use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::game::{ChessGame, ChessMove};
use crate::models::GameId;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    Connect,
    MakeMove,
    Leave,
    Resign,
}

/// Message sent from client to server
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClientMessage {
    pub command_type: CommandType,
    pub auth_token: String,
    pub game_id: GameId,
    #[serde(default, rename = "move", skip_serializing_if = "Option::is_none")]
    pub chess_move: Option<ChessMove>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessageType {
    LoadGame,
    Error,
    Notification,
}

/// Message sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerMessage {
    pub message_type: ServerMessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<ChessGame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServerMessage {
    pub fn load_game(game: ChessGame) -> Self {
        Self {
            message_type: ServerMessageType::LoadGame,
            game: Some(game),
            error_message: None,
            message: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            message_type: ServerMessageType::Error,
            game: None,
            error_message: Some(text.into()),
            message: None,
        }
    }

    pub fn notification(text: impl Into<String>) -> Self {
        Self {
            message_type: ServerMessageType::Notification,
            game: None,
            error_message: None,
            message: Some(text.into()),
        }
    }
}

/// The ERROR frame sent back for a rejected command.
impl From<&CommandError> for ServerMessage {
    fn from(err: &CommandError) -> Self {
        ServerMessage::error(format!("Error: {}", err))
    }
}

/// Message type for WebSocket communication
#[derive(Message)]
#[rtype(result = "()")]
pub struct ChessWebSocketMessage(pub String);
