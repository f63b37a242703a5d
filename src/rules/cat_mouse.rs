//! Cat and mouse.
//!
//! One mouse against four cats, no captures. The mouse steps diagonally in
//! any direction; cats only step away from their home row. The mouse wins
//! by reaching that row, the cats win by leaving it no move.

use crate::board::{Board, Move, Piece, PieceKind, Position, Side, DIAGONALS};

use super::{starting_board, GameType, RuleEngine};

pub const MOUSE_SIDE: Side = Side::Dark;
pub const CAT_SIDE: Side = Side::Light;

pub const MOUSE_START: Position = Position::new(7, 4);
pub const CAT_STARTS: [Position; 4] = [
    Position::new(0, 1),
    Position::new(0, 3),
    Position::new(0, 5),
    Position::new(0, 7),
];

/// Row the cats start on and the mouse is trying to reach.
pub const CAT_HOME_ROW: i8 = 0;

/// Row delta of a cat step.
const CAT_STEP: i8 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct CatAndMouse;

impl CatAndMouse {
    fn mouse(board: &Board) -> Option<&Piece> {
        board.pieces().iter().find(|p| p.kind == PieceKind::Mouse)
    }

    fn steps(piece: &Piece, board: &Board) -> Vec<Move> {
        let directions: &[(i8, i8)] = match piece.kind {
            PieceKind::Mouse => &DIAGONALS,
            PieceKind::Cat => &[(CAT_STEP, -1), (CAT_STEP, 1)],
            _ => &[],
        };

        directions
            .iter()
            .filter_map(|&(dr, dc)| piece.position.offset(dr, dc))
            .filter(|to| to.is_dark() && board.is_vacant(*to))
            .map(|to| Move::step(piece.position, to))
            .collect()
    }
}

impl RuleEngine for CatAndMouse {
    fn game_type(&self) -> GameType {
        GameType::CatAndMouse
    }

    fn initialize(&self, _first_side: Side) -> Board {
        let mut pieces = vec![Piece::new("mouse", MOUSE_SIDE, PieceKind::Mouse, MOUSE_START)];
        pieces.extend(
            CAT_STARTS
                .iter()
                .enumerate()
                .map(|(n, at)| Piece::new(format!("cat-{}", n), CAT_SIDE, PieceKind::Cat, *at)),
        );
        starting_board(GameType::CatAndMouse, pieces)
    }

    fn valid_moves(&self, position: Position, board: &Board, side: Side) -> Vec<Move> {
        board
            .piece_at(position)
            .filter(|piece| piece.color == side)
            .map(|piece| Self::steps(piece, board))
            .unwrap_or_default()
    }

    fn any_capture_available(&self, _board: &Board, _side: Side) -> bool {
        false
    }

    fn chain_captures(&self, _from: Position, _board: &Board, _side: Side) -> Vec<Move> {
        Vec::new()
    }

    fn side_has_no_moves(&self, board: &Board, side: Side) -> bool {
        let Some(mouse) = Self::mouse(board) else {
            return board.count(side) == 0;
        };

        if mouse.color == side {
            Self::steps(mouse, board).is_empty()
        } else {
            mouse.position.row == CAT_HOME_ROW || self.legal_moves(board, side).is_empty()
        }
    }

    fn side_role(&self, side: Side) -> &'static str {
        if side == MOUSE_SIDE {
            "mouse"
        } else {
            "cats"
        }
    }
}
