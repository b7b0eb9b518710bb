//! Game state machine: whose turn it is, which moves are legal, and whether
//! a side is in check, checkmate or stalemate.

use serde::{Deserialize, Serialize};

use super::board::{Board, ChessMove, Color, Position};
use super::moves::{is_attacked_by, pseudo_legal_moves};
use crate::error::RulesError;

/// Derived status of one side, evaluated after each move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Ongoing,
    Check,
    Checkmate,
    Stalemate,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Checkmate | GameStatus::Stalemate)
    }
}

/// A board plus the side to move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChessGame {
    team_turn: Color,
    board: Board,
}

impl Default for ChessGame {
    fn default() -> Self {
        Self::new()
    }
}

impl ChessGame {
    /// Fresh game from the starting position, white to move.
    pub fn new() -> Self {
        Self {
            team_turn: Color::White,
            board: Board::starting(),
        }
    }

    pub fn from_board(board: Board, team_turn: Color) -> Self {
        Self { team_turn, board }
    }

    pub fn team_turn(&self) -> Color {
        self.team_turn
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Legal moves for the piece on `from`, or an empty list when the square
    /// is empty. Each candidate is tried on a scratch copy of the board; the
    /// live board is never touched.
    pub fn legal_moves(&self, from: Position) -> Result<Vec<ChessMove>, RulesError> {
        let Some(piece) = self.board.get(from) else {
            return Ok(Vec::new());
        };

        let mut legal = Vec::new();
        for mv in pseudo_legal_moves(&self.board, from) {
            let mut scratch = self.board;
            scratch.apply(&mv);
            if !king_attacked(&scratch, piece.color)? {
                legal.push(mv);
            }
        }
        Ok(legal)
    }

    /// Every legal move available to `color`, regardless of whose turn it is.
    pub fn all_legal_moves(&self, color: Color) -> Result<Vec<ChessMove>, RulesError> {
        let mut all = Vec::new();
        for (from, _) in self.board.pieces(color) {
            all.extend(self.legal_moves(from)?);
        }
        Ok(all)
    }

    pub fn is_valid_move(&self, mv: &ChessMove) -> Result<bool, RulesError> {
        Ok(self.legal_moves(mv.start_position)?.contains(mv))
    }

    /// Applies `mv` if it is legal for the side to move, then passes the turn.
    pub fn make_move(&mut self, mv: &ChessMove) -> Result<(), RulesError> {
        let piece = self
            .board
            .get(mv.start_position)
            .ok_or(RulesError::NoPiece(mv.start_position))?;

        if piece.color != self.team_turn {
            return Err(RulesError::WrongTurn {
                expected: self.team_turn,
                found: piece.color,
            });
        }

        if !self.legal_moves(mv.start_position)?.contains(mv) {
            return Err(RulesError::IllegalMove(*mv));
        }

        self.board.apply(mv);
        self.team_turn = self.team_turn.opposite();
        Ok(())
    }

    /// Whether any opposing piece could move onto `color`'s king. Uses
    /// pseudo-legal moves so check detection never recurses into legality.
    pub fn is_in_check(&self, color: Color) -> Result<bool, RulesError> {
        king_attacked(&self.board, color)
    }

    pub fn is_in_checkmate(&self, color: Color) -> Result<bool, RulesError> {
        Ok(self.is_in_check(color)? && self.has_no_legal_moves(color)?)
    }

    pub fn is_in_stalemate(&self, color: Color) -> Result<bool, RulesError> {
        Ok(!self.is_in_check(color)? && self.has_no_legal_moves(color)?)
    }

    pub fn status(&self, color: Color) -> Result<GameStatus, RulesError> {
        let in_check = self.is_in_check(color)?;
        let stuck = self.has_no_legal_moves(color)?;
        Ok(match (in_check, stuck) {
            (true, true) => GameStatus::Checkmate,
            (false, true) => GameStatus::Stalemate,
            (true, false) => GameStatus::Check,
            (false, false) => GameStatus::Ongoing,
        })
    }

    fn has_no_legal_moves(&self, color: Color) -> Result<bool, RulesError> {
        for (from, _) in self.board.pieces(color) {
            if !self.legal_moves(from)?.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn king_attacked(board: &Board, color: Color) -> Result<bool, RulesError> {
    let king = board
        .king_position(color)
        .ok_or(RulesError::MissingKing(color))?;
    Ok(is_attacked_by(board, king, color.opposite()))
}
