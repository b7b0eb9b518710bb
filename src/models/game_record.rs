use serde::{Deserialize, Serialize};

use crate::game::{ChessGame, Color};

pub type GameId = u32;

/// A persisted game: who is seated, the board, and whether it has ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: GameId,
    pub white_username: Option<String>,
    pub black_username: Option<String>,
    pub game_name: String,
    pub game: ChessGame,
    pub game_over: bool,
}

impl GameRecord {
    pub fn new(game_id: GameId, game_name: impl Into<String>) -> Self {
        Self {
            game_id,
            white_username: None,
            black_username: None,
            game_name: game_name.into(),
            game: ChessGame::new(),
            game_over: false,
        }
    }

    /// The color `username` plays, if seated.
    pub fn seat_of(&self, username: &str) -> Option<Color> {
        if self.white_username.as_deref() == Some(username) {
            Some(Color::White)
        } else if self.black_username.as_deref() == Some(username) {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn username_for(&self, color: Color) -> Option<&str> {
        match color {
            Color::White => self.white_username.as_deref(),
            Color::Black => self.black_username.as_deref(),
        }
    }

    pub fn set_username(&mut self, color: Color, username: Option<String>) {
        match color {
            Color::White => self.white_username = username,
            Color::Black => self.black_username = username,
        }
    }
}

/// Listing view of a game, without the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub game_id: GameId,
    pub white_username: Option<String>,
    pub black_username: Option<String>,
    pub game_name: String,
    pub game_over: bool,
}

impl From<&GameRecord> for GameSummary {
    fn from(record: &GameRecord) -> Self {
        Self {
            game_id: record.game_id,
            white_username: record.white_username.clone(),
            black_username: record.black_username.clone(),
            game_name: record.game_name.clone(),
            game_over: record.game_over,
        }
    }
}
