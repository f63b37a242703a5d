//! Board geometry and the shared piece/move data model.
//!
//! Every game in the crate is played on an 8x8 grid and moves pieces along
//! diagonals, so the coordinate helpers and the board snapshot here are
//! shared by all rule engines.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Board dimension (rows and columns).
pub const BOARD_SIZE: i8 = 8;

/// The four diagonal directions as `(row, col)` deltas.
pub const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// A square on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: i8,
    pub col: i8,
}

impl Position {
    pub const fn new(row: i8, col: i8) -> Self {
        Self { row, col }
    }

    /// Check if position is within the board.
    pub fn is_valid(&self) -> bool {
        (0..BOARD_SIZE).contains(&self.row) && (0..BOARD_SIZE).contains(&self.col)
    }

    /// Dark squares are the playable ones: `(row + col)` is odd.
    pub fn is_dark(&self) -> bool {
        (i16::from(self.row) + i16::from(self.col)).rem_euclid(2) == 1
    }

    /// The square `(dr, dc)` away, if it is on the board.
    pub fn offset(&self, dr: i8, dc: i8) -> Option<Position> {
        let next = Position::new(self.row.checked_add(dr)?, self.col.checked_add(dc)?);
        next.is_valid().then_some(next)
    }

    /// Walk the diagonal starting one step away from this square, stopping
    /// at the edge of the board.
    pub fn ray(&self, dr: i8, dc: i8) -> Ray {
        Ray {
            next: self.offset(dr, dc),
            dr,
            dc,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Successive squares along one diagonal.
#[derive(Debug, Clone)]
pub struct Ray {
    next: Option<Position>,
    dr: i8,
    dc: i8,
}

impl Iterator for Ray {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        let current = self.next?;
        self.next = current.offset(self.dr, self.dc);
        Some(current)
    }
}

/// One of the two sides of a match.
///
/// Dark pieces start on the low rows and travel toward row 7; light pieces
/// start on the high rows and travel toward row 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Dark,
    Light,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Dark, Side::Light];

    pub fn opponent(self) -> Side {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    /// Row delta of a forward step.
    pub fn forward(self) -> i8 {
        match self {
            Self::Dark => 1,
            Self::Light => -1,
        }
    }

    /// The row on which an uncrowned piece of this side is promoted.
    pub fn far_row(self) -> i8 {
        match self {
            Self::Dark => BOARD_SIZE - 1,
            Self::Light => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Game-specific piece kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    /// Uncrowned draughts piece
    #[serde(rename = "normal")]
    Man,
    /// Crowned draughts piece (flying king)
    King,
    Mouse,
    Cat,
}

/// A piece on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub id: String,
    pub color: Side,
    #[serde(rename = "type")]
    pub kind: PieceKind,
    pub position: Position,
}

impl Piece {
    pub fn new(id: impl Into<String>, color: Side, kind: PieceKind, position: Position) -> Self {
        Self {
            id: id.into(),
            color,
            kind,
            position,
        }
    }

    /// A copy of this piece standing on `to`, crowned if `promote` is set.
    pub fn moved_to(&self, to: Position, promote: bool) -> Piece {
        Piece {
            id: self.id.clone(),
            color: self.color,
            kind: if promote { PieceKind::King } else { self.kind },
            position: to,
        }
    }
}

/// A pure description of one step of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub from: Position,
    pub to: Position,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captured_pieces: Vec<Position>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub promotion: bool,
}

impl Move {
    /// A non-capturing move.
    pub fn step(from: Position, to: Position) -> Self {
        Self {
            from,
            to,
            captured_pieces: Vec::new(),
            promotion: false,
        }
    }

    /// A capturing move.
    pub fn capture(from: Position, to: Position, captured: Vec<Position>) -> Self {
        Self {
            from,
            to,
            captured_pieces: captured,
            promotion: false,
        }
    }

    pub fn promoting(mut self, promotion: bool) -> Self {
        self.promotion = promotion;
        self
    }

    pub fn is_capture(&self) -> bool {
        !self.captured_pieces.is_empty()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)?;
        for captured in &self.captured_pieces {
            write!(f, " x{}", captured)?;
        }
        if self.promotion {
            write!(f, " =K")?;
        }
        Ok(())
    }
}

/// Board invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("two pieces share square {0}")]
    Overlap(Position),
    #[error("piece `{id}` is off the board at {position}")]
    OutOfBounds { id: String, position: Position },
    #[error("duplicate piece id `{0}`")]
    DuplicateId(String),
}

/// Snapshot of every live piece.
///
/// No two pieces share a square and every piece is on the board. The
/// invariants are checked whenever a board is built from outside data,
/// including deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Piece>", into = "Vec<Piece>")]
pub struct Board {
    pieces: Vec<Piece>,
}

impl Board {
    /// Build a board, validating its invariants.
    pub fn new(pieces: Vec<Piece>) -> Result<Self, BoardError> {
        let mut squares = HashSet::with_capacity(pieces.len());
        let mut ids = HashSet::with_capacity(pieces.len());

        for piece in &pieces {
            if !piece.position.is_valid() {
                return Err(BoardError::OutOfBounds {
                    id: piece.id.clone(),
                    position: piece.position,
                });
            }
            if !squares.insert(piece.position) {
                return Err(BoardError::Overlap(piece.position));
            }
            if !ids.insert(piece.id.as_str()) {
                return Err(BoardError::DuplicateId(piece.id.clone()));
            }
        }

        Ok(Self { pieces })
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Get the piece standing on a square.
    pub fn piece_at(&self, position: Position) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.position == position)
    }

    /// Check if a square is on the board and unoccupied.
    pub fn is_vacant(&self, position: Position) -> bool {
        position.is_valid() && self.piece_at(position).is_none()
    }

    /// Pieces belonging to one side.
    pub fn pieces_of(&self, side: Side) -> impl Iterator<Item = &Piece> + '_ {
        self.pieces.iter().filter(move |p| p.color == side)
    }

    /// Count pieces belonging to one side.
    pub fn count(&self, side: Side) -> usize {
        self.pieces_of(side).count()
    }

    /// The snapshot after `mv`: the moved piece relocated (and crowned if the
    /// move promotes), every captured square emptied. `self` is untouched.
    pub fn with_move(&self, mv: &Move) -> Board {
        let pieces = self
            .pieces
            .iter()
            .filter(|p| !mv.captured_pieces.contains(&p.position))
            .map(|p| {
                if p.position == mv.from {
                    p.moved_to(mv.to, mv.promotion)
                } else {
                    p.clone()
                }
            })
            .collect();
        Board { pieces }
    }
}

impl TryFrom<Vec<Piece>> for Board {
    type Error = BoardError;

    fn try_from(pieces: Vec<Piece>) -> Result<Self, Self::Error> {
        Board::new(pieces)
    }
}

impl From<Board> for Vec<Piece> {
    fn from(board: Board) -> Self {
        board.pieces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn man(id: &str, color: Side, row: i8, col: i8) -> Piece {
        Piece::new(id, color, PieceKind::Man, Position::new(row, col))
    }

    #[test]
    fn test_position_bounds_and_parity() {
        assert!(Position::new(0, 0).is_valid());
        assert!(Position::new(7, 7).is_valid());
        assert!(!Position::new(8, 0).is_valid());
        assert!(!Position::new(0, -1).is_valid());

        assert!(Position::new(0, 1).is_dark());
        assert!(Position::new(7, 4).is_dark());
        assert!(!Position::new(0, 0).is_dark());
    }

    #[test]
    fn test_offset_stops_at_edge() {
        assert_eq!(Position::new(3, 3).offset(1, -1), Some(Position::new(4, 2)));
        assert_eq!(Position::new(0, 3).offset(-1, 1), None);
        assert_eq!(Position::new(i8::MAX, 0).offset(1, 0), None);
    }

    #[test]
    fn test_ray_walks_to_edge() {
        let squares: Vec<Position> = Position::new(5, 2).ray(1, 1).collect();
        assert_eq!(
            squares,
            vec![Position::new(6, 3), Position::new(7, 4)]
        );

        assert_eq!(Position::new(0, 0).ray(-1, -1).count(), 0);
    }

    #[test]
    fn test_side_directions() {
        assert_eq!(Side::Dark.forward(), 1);
        assert_eq!(Side::Light.forward(), -1);
        assert_eq!(Side::Dark.far_row(), 7);
        assert_eq!(Side::Light.far_row(), 0);
        assert_eq!(Side::Dark.opponent(), Side::Light);
    }

    #[test]
    fn test_board_rejects_overlap() {
        let result = Board::new(vec![
            man("a", Side::Dark, 2, 1),
            man("b", Side::Light, 2, 1),
        ]);
        assert_eq!(result, Err(BoardError::Overlap(Position::new(2, 1))));
    }

    #[test]
    fn test_board_rejects_out_of_bounds() {
        let result = Board::new(vec![man("a", Side::Dark, 8, 1)]);
        assert!(matches!(result, Err(BoardError::OutOfBounds { .. })));
    }

    #[test]
    fn test_with_move_replaces_and_removes() {
        let board = Board::new(vec![
            man("d", Side::Dark, 4, 4),
            man("l", Side::Light, 5, 5),
            man("x", Side::Light, 0, 1),
        ])
        .unwrap();
        let mv = Move::capture(
            Position::new(4, 4),
            Position::new(6, 6),
            vec![Position::new(5, 5)],
        );

        let after = board.with_move(&mv);

        assert_eq!(after.len(), 2);
        assert_eq!(after.piece_at(Position::new(6, 6)).unwrap().id, "d");
        assert!(after.piece_at(Position::new(5, 5)).is_none());
        assert!(after.piece_at(Position::new(0, 1)).is_some());
        // Input snapshot untouched
        assert_eq!(board.len(), 3);
        assert!(board.piece_at(Position::new(4, 4)).is_some());
    }

    #[test]
    fn test_with_move_crowns() {
        let board = Board::new(vec![man("d", Side::Dark, 6, 1)]).unwrap();
        let mv = Move::step(Position::new(6, 1), Position::new(7, 2)).promoting(true);

        let after = board.with_move(&mv);
        assert_eq!(
            after.piece_at(Position::new(7, 2)).unwrap().kind,
            PieceKind::King
        );
    }

    #[test]
    fn test_move_wire_format() {
        let mv = Move::capture(
            Position::new(4, 4),
            Position::new(6, 6),
            vec![Position::new(5, 5)],
        );
        let json = serde_json::to_value(&mv).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "from": {"row": 4, "col": 4},
                "to": {"row": 6, "col": 6},
                "capturedPieces": [{"row": 5, "col": 5}]
            })
        );

        let plain: Move =
            serde_json::from_str(r#"{"from":{"row":2,"col":1},"to":{"row":3,"col":0}}"#).unwrap();
        assert_eq!(plain, Move::step(Position::new(2, 1), Position::new(3, 0)));
    }

    #[test]
    fn test_board_deserialize_validates() {
        let json = r#"[
            {"id":"a","color":"dark","type":"normal","position":{"row":1,"col":0}},
            {"id":"b","color":"light","type":"king","position":{"row":1,"col":0}}
        ]"#;
        assert!(serde_json::from_str::<Board>(json).is_err());
    }
}
