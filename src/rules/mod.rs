//! Rule engines.
//!
//! Every game implements [`RuleEngine`]; the session never branches on the
//! game type itself, it asks [`engine_for`] for the engine and drives the
//! match through the trait. Adding a game means adding an engine and a
//! [`GameType`] tag, nothing in the session changes.

pub mod cat_mouse;
pub mod draughts;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::board::{Board, Move, Piece, Position, Side};

pub use cat_mouse::CatAndMouse;
pub use draughts::{Draughts, ManCaptures};

/// Game-type tag, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameType {
    #[default]
    Checkers,
    ComeCome,
    CatAndMouse,
    /// Recognised but has no engine
    Chess,
}

impl GameType {
    pub const ALL: [GameType; 4] = [
        GameType::Checkers,
        GameType::ComeCome,
        GameType::CatAndMouse,
        GameType::Chess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checkers => "checkers",
            Self::ComeCome => "come-come",
            Self::CatAndMouse => "cat-and-mouse",
            Self::Chess => "chess",
        }
    }

    /// Check if a rule engine exists for this game.
    pub fn is_playable(&self) -> bool {
        engine_for(*self).is_ok()
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|game| game.as_str() == s.trim())
            .ok_or_else(|| RulesError::UnknownGame(s.to_string()))
    }
}

/// Rule engine lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    #[error("{0} has no rule engine")]
    Unsupported(GameType),
    #[error("unknown game type `{0}`")]
    UnknownGame(String),
}

/// The capability contract shared by every game.
///
/// Engines are stateless; every operation is a function of the board
/// snapshot passed in.
pub trait RuleEngine: Send + Sync + fmt::Debug {
    fn game_type(&self) -> GameType;

    /// Side that moves first. Fixed per game so both peers agree on it
    /// without exchanging a message.
    fn starting_side(&self) -> Side {
        Side::Dark
    }

    /// Deterministic starting layout. The layout is tied to colors, not to
    /// which player asked for which color.
    fn initialize(&self, first_side: Side) -> Board;

    /// Legal continuations for the piece at `position`, or nothing if no
    /// piece of `side` stands there.
    fn valid_moves(&self, position: Position, board: &Board, side: Side) -> Vec<Move>;

    /// Whether any piece of `side` can capture.
    fn any_capture_available(&self, board: &Board, side: Side) -> bool;

    /// Apply a move to a snapshot, returning the new snapshot.
    fn apply(&self, mv: &Move, board: &Board) -> Board {
        board.with_move(mv)
    }

    /// Capture continuations for the piece that just landed on `from`.
    fn chain_captures(&self, from: Position, board: &Board, side: Side) -> Vec<Move>;

    /// Loss condition for `side` when it is its turn to move.
    fn side_has_no_moves(&self, board: &Board, side: Side) -> bool {
        self.legal_moves(board, side).is_empty()
    }

    /// Winner once `side_has_no_moves(board, loser)` holds.
    fn winning_side(&self, _board: &Board, loser: Side) -> Side {
        loser.opponent()
    }

    /// Every legal move of every piece of `side`.
    fn legal_moves(&self, board: &Board, side: Side) -> Vec<Move> {
        board
            .pieces_of(side)
            .flat_map(|piece| self.valid_moves(piece.position, board, side))
            .collect()
    }

    /// Human label for the side's role in this game.
    fn side_role(&self, side: Side) -> &'static str {
        side.as_str()
    }
}

/// Board for a fixed starting layout. A layout that fails validation is an
/// engine bug: it is logged and the match starts on an empty board.
fn starting_board(game: GameType, pieces: Vec<Piece>) -> Board {
    Board::new(pieces).unwrap_or_else(|e| {
        warn!(game = %game, error = %e, "Starting layout rejected");
        Board::default()
    })
}

static CHECKERS: Draughts = Draughts::checkers();
static COME_COME: Draughts = Draughts::come_come();
static CAT_AND_MOUSE: CatAndMouse = CatAndMouse;

/// Look up the rule engine for a game type.
pub fn engine_for(game: GameType) -> Result<&'static dyn RuleEngine, RulesError> {
    match game {
        GameType::Checkers => Ok(&CHECKERS),
        GameType::ComeCome => Ok(&COME_COME),
        GameType::CatAndMouse => Ok(&CAT_AND_MOUSE),
        GameType::Chess => Err(RulesError::Unsupported(game)),
    }
}
