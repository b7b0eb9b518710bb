pub mod board;
pub mod moves;
pub mod rules;

pub use board::{Board, ChessMove, Color, Piece, PieceType, Position};
pub use moves::pseudo_legal_moves;
pub use rules::{ChessGame, GameStatus};
