use crate::game::{ChessMove, Color, Position};

/// Failures raised by the rules engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    #[error("no piece at {0}")]
    NoPiece(Position),

    #[error("it is {expected}'s turn, not {found}'s")]
    WrongTurn { expected: Color, found: Color },

    #[error("illegal move {0}")]
    IllegalMove(ChessMove),

    /// The board lost a king. Never a normal game outcome.
    #[error("no {0} king on the board")]
    MissingKing(Color),
}

impl RulesError {
    /// Whether the error means the game state itself is corrupt rather than
    /// the requested move being bad.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RulesError::MissingKing(_))
    }
}

/// Failures reported by the auth, user and game stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already taken")]
    AlreadyTaken(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Why a websocket command was rejected. The coordinator turns these into
/// `ERROR` messages for the originating connection only.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid move: {0}")]
    InvalidMove(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed command: {0}")]
    Protocol(String),

    #[error("{0}")]
    Internal(String),
}

impl From<RulesError> for CommandError {
    fn from(err: RulesError) -> Self {
        if err.is_fatal() {
            CommandError::Internal("corrupt game state".to_string())
        } else {
            CommandError::InvalidMove(err.to_string())
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthorized => CommandError::Unauthorized("bad or expired auth token".to_string()),
            StoreError::NotFound(what) => CommandError::NotFound(what),
            StoreError::AlreadyTaken(what) => CommandError::InvalidMove(format!("{} already taken", what)),
            StoreError::BadRequest(reason) => CommandError::Protocol(reason),
        }
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        CommandError::Protocol(err.to_string())
    }
}
