//! Checkers and Come-Come.
//!
//! Both games share one engine. Men step one square diagonally forward and
//! capture by jumping an adjacent enemy; kings fly along open diagonals.
//! Capturing is mandatory and chains while the landing square offers
//! another capture. The games differ only in which way men may capture:
//! in checkers any diagonal, in come-come forward only.

use crate::board::{Board, Move, Piece, PieceKind, Position, Side, BOARD_SIZE, DIAGONALS};

use super::{starting_board, GameType, RuleEngine};

/// Rows holding the dark pieces at the start.
const DARK_START_ROWS: [i8; 3] = [0, 1, 2];

/// Rows holding the light pieces at the start.
const LIGHT_START_ROWS: [i8; 3] = [5, 6, 7];

/// Directions in which an uncrowned piece may capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManCaptures {
    /// All four diagonals (checkers)
    AllDirections,
    /// The two forward diagonals (come-come)
    ForwardOnly,
}

/// Draughts rule engine.
#[derive(Debug, Clone, Copy)]
pub struct Draughts {
    game: GameType,
    man_captures: ManCaptures,
}

impl Draughts {
    pub const fn checkers() -> Self {
        Self {
            game: GameType::Checkers,
            man_captures: ManCaptures::AllDirections,
        }
    }

    pub const fn come_come() -> Self {
        Self {
            game: GameType::ComeCome,
            man_captures: ManCaptures::ForwardOnly,
        }
    }

    fn capture_directions(&self, side: Side) -> Vec<(i8, i8)> {
        match self.man_captures {
            ManCaptures::AllDirections => DIAGONALS.to_vec(),
            ManCaptures::ForwardOnly => vec![(side.forward(), -1), (side.forward(), 1)],
        }
    }

    fn capture_moves(&self, piece: &Piece, board: &Board) -> Vec<Move> {
        match piece.kind {
            PieceKind::King => king_captures(piece, board),
            _ => self.man_captures_for(piece, board),
        }
    }

    fn man_captures_for(&self, piece: &Piece, board: &Board) -> Vec<Move> {
        self.capture_directions(piece.color)
            .into_iter()
            .filter_map(|(dr, dc)| {
                let over = piece.position.offset(dr, dc)?;
                let land = over.offset(dr, dc)?;
                let victim = board.piece_at(over)?;
                (victim.color != piece.color && board.is_vacant(land)).then(|| {
                    Move::capture(piece.position, land, vec![over])
                        .promoting(promotes(piece, land))
                })
            })
            .collect()
    }

    fn has_capture(&self, piece: &Piece, board: &Board) -> bool {
        !self.capture_moves(piece, board).is_empty()
    }
}

/// Flying-king captures: along each diagonal skip empty squares, take the
/// first enemy met, then land on any empty square beyond it up to the next
/// piece.
fn king_captures(piece: &Piece, board: &Board) -> Vec<Move> {
    let mut moves = Vec::new();

    for (dr, dc) in DIAGONALS {
        let mut victim: Option<Position> = None;

        for square in piece.position.ray(dr, dc) {
            match (board.piece_at(square), victim) {
                (None, None) => {}
                (None, Some(taken)) => {
                    moves.push(Move::capture(piece.position, square, vec![taken]));
                }
                (Some(other), None) if other.color != piece.color => victim = Some(square),
                // Own piece, or a second piece behind the victim
                (Some(_), _) => break,
            }
        }
    }

    moves
}

fn step_moves(piece: &Piece, board: &Board) -> Vec<Move> {
    match piece.kind {
        PieceKind::King => DIAGONALS
            .into_iter()
            .flat_map(move |(dr, dc)| {
                piece
                    .position
                    .ray(dr, dc)
                    .take_while(move |square| board.piece_at(*square).is_none())
            })
            .map(|to| Move::step(piece.position, to))
            .collect(),
        _ => [-1, 1]
            .into_iter()
            .filter_map(|dc| piece.position.offset(piece.color.forward(), dc))
            .filter(|to| board.piece_at(*to).is_none())
            .map(|to| Move::step(piece.position, to).promoting(promotes(piece, to)))
            .collect(),
    }
}

fn promotes(piece: &Piece, to: Position) -> bool {
    piece.kind == PieceKind::Man && to.row == piece.color.far_row()
}

fn owned(board: &Board, at: Position, side: Side) -> Option<&Piece> {
    board
        .piece_at(at)
        .filter(|p| p.color == side && matches!(p.kind, PieceKind::Man | PieceKind::King))
}

impl RuleEngine for Draughts {
    fn game_type(&self) -> GameType {
        self.game
    }

    fn initialize(&self, _first_side: Side) -> Board {
        let mut pieces = Vec::with_capacity(24);

        for (side, rows) in [(Side::Dark, DARK_START_ROWS), (Side::Light, LIGHT_START_ROWS)] {
            let squares = rows.into_iter().flat_map(|row| {
                (0..BOARD_SIZE)
                    .map(move |col| Position::new(row, col))
                    .filter(Position::is_dark)
            });
            for (n, position) in squares.enumerate() {
                pieces.push(Piece::new(
                    format!("{}-{}", side, n),
                    side,
                    PieceKind::Man,
                    position,
                ));
            }
        }

        starting_board(self.game, pieces)
    }

    fn valid_moves(&self, position: Position, board: &Board, side: Side) -> Vec<Move> {
        let Some(piece) = owned(board, position, side) else {
            return Vec::new();
        };

        if self.any_capture_available(board, side) {
            self.capture_moves(piece, board)
        } else {
            step_moves(piece, board)
        }
    }

    fn any_capture_available(&self, board: &Board, side: Side) -> bool {
        board
            .pieces_of(side)
            .any(|piece| self.has_capture(piece, board))
    }

    fn chain_captures(&self, from: Position, board: &Board, side: Side) -> Vec<Move> {
        owned(board, from, side)
            .map(|piece| self.capture_moves(piece, board))
            .unwrap_or_default()
    }

    fn side_has_no_moves(&self, board: &Board, side: Side) -> bool {
        if board.count(side) == 0 {
            return true;
        }
        if self.any_capture_available(board, side) {
            return false;
        }
        board
            .pieces_of(side)
            .all(|piece| step_moves(piece, board).is_empty())
    }
}
