//! Per-piece move generation.
//!
//! Moves produced here obey piece geometry, blocking and capture rules but
//! know nothing about check. King safety is filtered one layer up in
//! [`crate::game::rules`].

use super::board::{Board, ChessMove, Color, PieceType, Position};

const ORTHOGONAL: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAGONAL: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ADJACENT: [(i8, i8); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];
const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (2, 1),
    (2, -1),
    (-2, 1),
    (-2, -1),
    (1, 2),
    (1, -2),
    (-1, 2),
    (-1, -2),
];

/// Moves available to the piece on `from`, ignoring whether they leave its
/// own king attacked. Empty when the square is empty.
pub fn pseudo_legal_moves(board: &Board, from: Position) -> Vec<ChessMove> {
    let Some(piece) = board.get(from) else {
        return Vec::new();
    };

    let mut moves = Vec::new();
    match piece.piece_type {
        PieceType::King => step_moves(board, from, piece.color, &ADJACENT, &mut moves),
        PieceType::Knight => step_moves(board, from, piece.color, &KNIGHT_JUMPS, &mut moves),
        PieceType::Rook => ray_moves(board, from, piece.color, &ORTHOGONAL, &mut moves),
        PieceType::Bishop => ray_moves(board, from, piece.color, &DIAGONAL, &mut moves),
        PieceType::Queen => {
            ray_moves(board, from, piece.color, &ORTHOGONAL, &mut moves);
            ray_moves(board, from, piece.color, &DIAGONAL, &mut moves);
        }
        PieceType::Pawn => pawn_moves(board, from, piece.color, &mut moves),
    }
    moves
}

/// True when `target` is reachable by some `color` piece's pseudo-legal move.
pub fn is_attacked_by(board: &Board, target: Position, color: Color) -> bool {
    board.pieces(color).any(|(from, _)| {
        pseudo_legal_moves(board, from)
            .iter()
            .any(|mv| mv.end_position == target)
    })
}

fn can_land(board: &Board, target: Position, color: Color) -> bool {
    board.get(target).map_or(true, |occupant| occupant.color != color)
}

fn step_moves(
    board: &Board,
    from: Position,
    color: Color,
    offsets: &[(i8, i8)],
    moves: &mut Vec<ChessMove>,
) {
    for &(d_row, d_col) in offsets {
        if let Some(to) = from.offset(d_row, d_col) {
            if can_land(board, to, color) {
                moves.push(ChessMove::new(from, to, None));
            }
        }
    }
}

fn ray_moves(
    board: &Board,
    from: Position,
    color: Color,
    directions: &[(i8, i8)],
    moves: &mut Vec<ChessMove>,
) {
    for &(d_row, d_col) in directions {
        let mut cursor = from.offset(d_row, d_col);
        while let Some(to) = cursor {
            match board.get(to) {
                None => moves.push(ChessMove::new(from, to, None)),
                Some(occupant) => {
                    if occupant.color != color {
                        moves.push(ChessMove::new(from, to, None));
                    }
                    break;
                }
            }
            cursor = to.offset(d_row, d_col);
        }
    }
}

fn pawn_moves(board: &Board, from: Position, color: Color, moves: &mut Vec<ChessMove>) {
    let forward = color.forward();

    if let Some(one) = from.offset(forward, 0) {
        if board.is_empty(one) {
            push_pawn_move(from, one, color, moves);

            if from.row() == color.pawn_row() {
                if let Some(two) = from.offset(2 * forward, 0) {
                    if board.is_empty(two) {
                        moves.push(ChessMove::new(from, two, None));
                    }
                }
            }
        }
    }

    for d_col in [-1, 1] {
        if let Some(to) = from.offset(forward, d_col) {
            if matches!(board.get(to), Some(occupant) if occupant.color != color) {
                push_pawn_move(from, to, color, moves);
            }
        }
    }
}

/// Pushes a pawn move, fanning out into one move per promotion piece when it
/// lands on the far rank.
fn push_pawn_move(from: Position, to: Position, color: Color, moves: &mut Vec<ChessMove>) {
    if to.row() == color.promotion_row() {
        for promotion in PieceType::PROMOTIONS {
            moves.push(ChessMove::new(from, to, Some(promotion)));
        }
    } else {
        moves.push(ChessMove::new(from, to, None));
    }
}
