use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub const fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Row a pawn of this color advances toward.
    pub(crate) const fn forward(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    /// Row this color's pawns start on.
    pub(crate) const fn pawn_row(self) -> u8 {
        match self {
            Color::White => 2,
            Color::Black => 7,
        }
    }

    /// The opponent's back rank, where this color's pawns promote.
    pub(crate) const fn promotion_row(self) -> u8 {
        match self {
            Color::White => 8,
            Color::Black => 1,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceType {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
    Pawn,
}

impl PieceType {
    /// Pieces a pawn may promote to.
    pub const PROMOTIONS: [PieceType; 4] = [
        PieceType::Queen,
        PieceType::Rook,
        PieceType::Bishop,
        PieceType::Knight,
    ];

    fn letter(self) -> char {
        match self {
            PieceType::King => 'k',
            PieceType::Queen => 'q',
            PieceType::Rook => 'r',
            PieceType::Bishop => 'b',
            PieceType::Knight => 'n',
            PieceType::Pawn => 'p',
        }
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PieceType::King => "KING",
            PieceType::Queen => "QUEEN",
            PieceType::Rook => "ROOK",
            PieceType::Bishop => "BISHOP",
            PieceType::Knight => "KNIGHT",
            PieceType::Pawn => "PAWN",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub piece_type: PieceType,
}

impl Piece {
    pub const fn new(color: Color, piece_type: PieceType) -> Self {
        Self { color, piece_type }
    }

    /// FEN-style letter: uppercase for white, lowercase for black.
    pub fn symbol(&self) -> char {
        let letter = self.piece_type.letter();
        match self.color {
            Color::White => letter.to_ascii_uppercase(),
            Color::Black => letter,
        }
    }
}

/// A square on the board. Row and column both run 1 through 8; row 1 is
/// white's back rank and column 1 is the a-file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPosition")]
pub struct Position {
    row: u8,
    column: u8,
}

#[derive(Deserialize)]
struct RawPosition {
    row: i64,
    column: i64,
}

impl TryFrom<RawPosition> for Position {
    type Error = String;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        let in_range = |v: i64| (1..=8).contains(&v);
        if in_range(raw.row) && in_range(raw.column) {
            Ok(Position {
                row: raw.row as u8,
                column: raw.column as u8,
            })
        } else {
            Err(format!(
                "position ({}, {}) is off the board",
                raw.row, raw.column
            ))
        }
    }
}

impl Position {
    /// Returns `None` when either coordinate is outside 1..=8.
    pub fn new(row: u8, column: u8) -> Option<Self> {
        if (1..=8).contains(&row) && (1..=8).contains(&column) {
            Some(Self { row, column })
        } else {
            None
        }
    }

    pub fn row(&self) -> u8 {
        self.row
    }

    pub fn column(&self) -> u8 {
        self.column
    }

    /// The square `(d_row, d_col)` away, if it is still on the board.
    pub fn offset(&self, d_row: i8, d_col: i8) -> Option<Self> {
        let row = self.row as i8 + d_row;
        let column = self.column as i8 + d_col;
        if (1..=8).contains(&row) && (1..=8).contains(&column) {
            Some(Self {
                row: row as u8,
                column: column as u8,
            })
        } else {
            None
        }
    }

    /// All 64 squares, row by row from a1.
    pub fn all() -> impl Iterator<Item = Position> {
        (1..=8u8).flat_map(|row| (1..=8u8).map(move |column| Position { row, column }))
    }

    fn index(&self) -> (usize, usize) {
        (self.row as usize - 1, self.column as usize - 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = (b'a' + self.column - 1) as char;
        write!(f, "{}{}", file, self.row)
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.trim().as_bytes();
        if bytes.len() != 2 {
            return Err(format!("invalid square: {}", s));
        }
        let column = bytes[0].to_ascii_lowercase().wrapping_sub(b'a').wrapping_add(1);
        let row = bytes[1].wrapping_sub(b'0');
        Position::new(row, column).ok_or_else(|| format!("invalid square: {}", s))
    }
}

/// A move from one square to another, with the piece to promote to when a
/// pawn reaches the far rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChessMove {
    pub start_position: Position,
    pub end_position: Position,
    #[serde(default)]
    pub promotion_piece: Option<PieceType>,
}

impl ChessMove {
    pub fn new(start: Position, end: Position, promotion: Option<PieceType>) -> Self {
        Self {
            start_position: start,
            end_position: end,
            promotion_piece: promotion,
        }
    }
}

impl fmt::Display for ChessMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start_position, self.end_position)?;
        if let Some(promotion) = self.promotion_piece {
            write!(f, " (promote to {})", promotion)?;
        }
        Ok(())
    }
}

/// 8x8 grid of optional pieces. Holds no rules; see [`crate::game::rules`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Board {
    squares: [[Option<Piece>; 8]; 8],
}

impl Board {
    /// Standard starting setup.
    pub fn starting() -> Self {
        const BACK_RANK: [PieceType; 8] = [
            PieceType::Rook,
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Queen,
            PieceType::King,
            PieceType::Bishop,
            PieceType::Knight,
            PieceType::Rook,
        ];

        let mut board = Board::default();
        for (i, piece_type) in BACK_RANK.iter().enumerate() {
            board.squares[0][i] = Some(Piece::new(Color::White, *piece_type));
            board.squares[1][i] = Some(Piece::new(Color::White, PieceType::Pawn));
            board.squares[6][i] = Some(Piece::new(Color::Black, PieceType::Pawn));
            board.squares[7][i] = Some(Piece::new(Color::Black, *piece_type));
        }
        board
    }

    pub fn get(&self, position: Position) -> Option<Piece> {
        let (r, c) = position.index();
        self.squares[r][c]
    }

    pub fn set(&mut self, position: Position, piece: Option<Piece>) {
        let (r, c) = position.index();
        self.squares[r][c] = piece;
    }

    pub fn is_empty(&self, position: Position) -> bool {
        self.get(position).is_none()
    }

    /// Relocates whatever stands on the start square, replacing it with the
    /// promotion piece if one is named. Performs no validation.
    pub fn apply(&mut self, mv: &ChessMove) {
        let moving = self.get(mv.start_position);
        let placed = match (moving, mv.promotion_piece) {
            (Some(piece), Some(promotion)) => Some(Piece::new(piece.color, promotion)),
            (piece, _) => piece,
        };
        self.set(mv.start_position, None);
        self.set(mv.end_position, placed);
    }

    /// Every occupied square holding a piece of `color`.
    pub fn pieces(&self, color: Color) -> impl Iterator<Item = (Position, Piece)> + '_ {
        Position::all().filter_map(move |pos| match self.get(pos) {
            Some(piece) if piece.color == color => Some((pos, piece)),
            _ => None,
        })
    }

    pub fn king_position(&self, color: Color) -> Option<Position> {
        self.pieces(color)
            .find(|(_, piece)| piece.piece_type == PieceType::King)
            .map(|(pos, _)| pos)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..8).rev() {
            let line: String = self.squares[row]
                .iter()
                .map(|square| square.map_or('.', |p| p.symbol()))
                .collect();
            writeln!(f, "{} {}", row + 1, line)?;
        }
        write!(f, "  abcdefgh")
    }
}
