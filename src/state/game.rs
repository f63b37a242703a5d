//! Match state.
//!
//! Tracks one match between the two seated peers: board, side to move,
//! capture lock, winner and history. Every move, local or remote, goes
//! through [`Match::play`], so both peers advance their copies with the
//! same sequence of checks.

use chrono::{DateTime, Utc};

use crate::board::{Board, Move, Position, Side};
use crate::rules::{engine_for, GameType, RuleEngine, RulesError};

/// Match status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStatus {
    #[default]
    InProgress,
    /// Ended with a winner
    Finished,
    /// Ended without a winner (opponent gone)
    Abandoned,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
            Self::Abandoned => "abandoned",
        }
    }

    /// Check if the match accepts moves.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Check if the match can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Abandoned)
    }
}

/// A participant in a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: String,

    /// Display name
    pub name: String,

    /// Fixed for the whole match
    pub color: Side,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: Side) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "color": self.color.as_str(),
        })
    }
}

/// What a played move did to the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Same side again, with the piece that just landed
    Continue { piece: Position },
    /// Turn passed to `next`
    Passed { next: Side },
    /// The side to move lost
    Won { winner: Side },
}

/// One recorded step of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    pub side: Side,
    pub mv: Move,
}

/// Match state.
#[derive(Debug, Clone)]
pub struct Match {
    pub game_type: GameType,

    engine: &'static dyn RuleEngine,

    board: Board,

    /// The local player
    pub local: Player,

    /// The remote player
    pub opponent: Player,

    /// Side to move
    turn: Side,

    /// Whether the side to move is bound to capture
    must_capture: bool,

    /// Piece locked into a chained capture
    continuation: Option<Position>,

    winner: Option<Side>,

    pub status: MatchStatus,

    history: Vec<PlayedMove>,

    pub started_at: DateTime<Utc>,

    pub ended_at: Option<DateTime<Utc>>,
}

impl Match {
    /// Start a fresh match from the engine's layout.
    pub fn new(game_type: GameType, local: Player, opponent: Player) -> Result<Self, MatchError> {
        let engine = engine_for(game_type)?;
        let first = engine.starting_side();
        let board = engine.initialize(first);
        Self::resume(game_type, board, first, local, opponent)
    }

    /// Adopt a match announced by the other peer.
    pub fn resume(
        game_type: GameType,
        board: Board,
        turn: Side,
        local: Player,
        opponent: Player,
    ) -> Result<Self, MatchError> {
        if local.color == opponent.color {
            return Err(MatchError::ColorClash(local.color));
        }

        let engine = engine_for(game_type)?;
        let must_capture = engine.any_capture_available(&board, turn);

        Ok(Self {
            game_type,
            engine,
            board,
            local,
            opponent,
            turn,
            must_capture,
            continuation: None,
            winner: None,
            status: MatchStatus::InProgress,
            history: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Side {
        self.turn
    }

    pub fn must_capture(&self) -> bool {
        self.must_capture
    }

    /// Whether a chained capture is under way.
    pub fn continuous_capture(&self) -> bool {
        self.continuation.is_some()
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    pub fn history(&self) -> &[PlayedMove] {
        &self.history
    }

    pub fn move_count(&self) -> usize {
        self.history.len()
    }

    /// Check if it's the local player's turn.
    pub fn is_local_turn(&self) -> bool {
        self.status.is_active() && self.turn == self.local.color
    }

    /// The player holding a color.
    pub fn player(&self, side: Side) -> &Player {
        if self.local.color == side {
            &self.local
        } else {
            &self.opponent
        }
    }

    /// Map the winning color back to the player holding it.
    pub fn winner_player(&self) -> Option<&Player> {
        self.winner.map(|side| self.player(side))
    }

    /// Legal moves for the piece at `position`, honouring the capture lock.
    pub fn moves_from(&self, position: Position) -> Vec<Move> {
        if !self.status.is_active() {
            return Vec::new();
        }

        match self.continuation {
            Some(locked) if locked != position => Vec::new(),
            Some(locked) => self.engine.chain_captures(locked, &self.board, self.turn),
            None => self.engine.valid_moves(position, &self.board, self.turn),
        }
    }

    /// Every legal move for the side to move.
    pub fn legal_moves(&self) -> Vec<Move> {
        match self.continuation {
            Some(locked) => self.moves_from(locked),
            None if self.status.is_active() => self.engine.legal_moves(&self.board, self.turn),
            None => Vec::new(),
        }
    }

    pub fn is_legal(&self, mv: &Move) -> bool {
        self.moves_from(mv.from).contains(mv)
    }

    /// Play a move for the side to move.
    pub fn play(&mut self, mv: &Move) -> Result<TurnOutcome, MatchError> {
        if !self.status.is_active() {
            return Err(MatchError::NotActive);
        }
        if !self.is_legal(mv) {
            return Err(MatchError::Illegal(mv.clone()));
        }

        self.board = self.engine.apply(mv, &self.board);
        self.history.push(PlayedMove {
            side: self.turn,
            mv: mv.clone(),
        });

        if mv.is_capture()
            && !self
                .engine
                .chain_captures(mv.to, &self.board, self.turn)
                .is_empty()
        {
            self.continuation = Some(mv.to);
            self.must_capture = true;
            return Ok(TurnOutcome::Continue { piece: mv.to });
        }

        self.continuation = None;
        self.turn = self.turn.opponent();
        self.must_capture = self.engine.any_capture_available(&self.board, self.turn);

        if self.engine.side_has_no_moves(&self.board, self.turn) {
            let winner = self.engine.winning_side(&self.board, self.turn);
            self.finish(Some(winner), MatchStatus::Finished);
            return Ok(TurnOutcome::Won { winner });
        }

        Ok(TurnOutcome::Passed { next: self.turn })
    }

    /// End the match with `side` giving up.
    pub fn concede(&mut self, side: Side) -> Result<Side, MatchError> {
        if !self.status.is_active() {
            return Err(MatchError::NotActive);
        }
        let winner = side.opponent();
        self.finish(Some(winner), MatchStatus::Finished);
        Ok(winner)
    }

    /// End the match without a winner.
    pub fn abandon(&mut self) {
        if self.status.is_active() {
            self.finish(None, MatchStatus::Abandoned);
        }
    }

    fn finish(&mut self, winner: Option<Side>, status: MatchStatus) {
        self.winner = winner;
        self.status = status;
        self.continuation = None;
        self.ended_at = Some(Utc::now());
    }

    /// Convert full match state to JSON snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "game_type": self.game_type.as_str(),
            "status": self.status.as_str(),
            "pieces": self.board,
            "players": [self.local.to_json(), self.opponent.to_json()],
            "current_turn": self.turn.as_str(),
            "must_capture": self.must_capture,
            "continuous_capture": self.continuous_capture(),
            "winner": self.winner_player().map(|p| p.name.as_str()),
            "move_count": self.move_count(),
            "started_at": self.started_at.to_rfc3339(),
            "ended_at": self.ended_at.map(|t| t.to_rfc3339()),
        })
    }
}

/// Match errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error(transparent)]
    Rules(#[from] RulesError),
    #[error("both players hold {0}")]
    ColorClash(Side),
    #[error("match is not active")]
    NotActive,
    #[error("illegal move {0}")]
    Illegal(Move),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Piece, PieceKind};
    use pretty_assertions::assert_eq;

    fn pos(row: i8, col: i8) -> Position {
        Position::new(row, col)
    }

    fn players() -> (Player, Player) {
        (
            Player::new("host", "Ana", Side::Dark),
            Player::new("guest", "Bo", Side::Light),
        )
    }

    fn custom(game_type: GameType, pieces: Vec<Piece>, turn: Side) -> Match {
        let (local, opponent) = players();
        Match::resume(game_type, Board::new(pieces).unwrap(), turn, local, opponent).unwrap()
    }

    #[test]
    fn test_match_new() {
        let (local, opponent) = players();
        let game = Match::new(GameType::Checkers, local, opponent).unwrap();

        assert_eq!(game.status, MatchStatus::InProgress);
        assert_eq!(game.turn(), Side::Dark);
        assert!(game.is_local_turn());
        assert!(!game.must_capture());
        assert_eq!(game.board().len(), 24);
        assert_eq!(game.move_count(), 0);
    }

    #[test]
    fn test_match_rejects_chess_and_clash() {
        let (local, opponent) = players();
        assert_eq!(
            Match::new(GameType::Chess, local.clone(), opponent).unwrap_err(),
            MatchError::Rules(RulesError::Unsupported(GameType::Chess))
        );

        let clash = Player::new("guest", "Bo", Side::Dark);
        assert_eq!(
            Match::new(GameType::Checkers, local, clash).unwrap_err(),
            MatchError::ColorClash(Side::Dark)
        );
    }

    #[test]
    fn test_turn_passes() {
        let (local, opponent) = players();
        let mut game = Match::new(GameType::Checkers, local, opponent).unwrap();

        let outcome = game.play(&Move::step(pos(2, 1), pos(3, 0))).unwrap();
        assert_eq!(outcome, TurnOutcome::Passed { next: Side::Light });
        assert!(!game.is_local_turn());
        assert_eq!(game.history()[0].side, Side::Dark);

        // Dark cannot move twice
        let again = Move::step(pos(2, 3), pos(3, 4));
        assert_eq!(game.play(&again), Err(MatchError::Illegal(again.clone())));
    }

    #[test]
    fn test_illegal_move_leaves_state() {
        let (local, opponent) = players();
        let mut game = Match::new(GameType::Checkers, local, opponent).unwrap();
        let before = game.board().clone();

        let sideways = Move::step(pos(2, 1), pos(2, 3));
        assert!(game.play(&sideways).is_err());
        assert_eq!(game.board(), &before);
        assert_eq!(game.turn(), Side::Dark);
        assert_eq!(game.move_count(), 0);
    }

    #[test]
    fn test_chain_capture_locks_piece() {
        let mut game = custom(
            GameType::Checkers,
            vec![
                Piece::new("d", Side::Dark, PieceKind::Man, pos(2, 1)),
                Piece::new("d2", Side::Dark, PieceKind::Man, pos(0, 7)),
                Piece::new("l1", Side::Light, PieceKind::Man, pos(3, 2)),
                Piece::new("l2", Side::Light, PieceKind::Man, pos(5, 4)),
                Piece::new("l3", Side::Light, PieceKind::Man, pos(7, 0)),
            ],
            Side::Dark,
        );
        assert!(game.must_capture());

        let first = Move::capture(pos(2, 1), pos(4, 3), vec![pos(3, 2)]);
        assert_eq!(
            game.play(&first).unwrap(),
            TurnOutcome::Continue { piece: pos(4, 3) }
        );
        assert!(game.continuous_capture());
        assert_eq!(game.turn(), Side::Dark);

        // Other pieces are frozen during the chain
        assert!(game.moves_from(pos(0, 7)).is_empty());

        let second = Move::capture(pos(4, 3), pos(6, 5), vec![pos(5, 4)]);
        assert_eq!(
            game.play(&second).unwrap(),
            TurnOutcome::Passed { next: Side::Light }
        );
        assert!(!game.continuous_capture());
        assert_eq!(game.board().count(Side::Light), 1);
    }

    #[test]
    fn test_win_when_opponent_has_no_pieces() {
        let mut game = custom(
            GameType::Checkers,
            vec![
                Piece::new("d", Side::Dark, PieceKind::Man, pos(4, 4)),
                Piece::new("l", Side::Light, PieceKind::Man, pos(5, 5)),
            ],
            Side::Dark,
        );

        let outcome = game
            .play(&Move::capture(pos(4, 4), pos(6, 6), vec![pos(5, 5)]))
            .unwrap();

        assert_eq!(outcome, TurnOutcome::Won { winner: Side::Dark });
        assert_eq!(game.status, MatchStatus::Finished);
        assert_eq!(game.winner_player().unwrap().name, "Ana");
        assert!(game.ended_at.is_some());
        assert!(game.legal_moves().is_empty());
    }

    #[test]
    fn test_mouse_reaching_home_row_wins() {
        let mut game = custom(
            GameType::CatAndMouse,
            vec![
                Piece::new("mouse", Side::Dark, PieceKind::Mouse, pos(1, 2)),
                Piece::new("cat-0", Side::Light, PieceKind::Cat, pos(3, 0)),
            ],
            Side::Dark,
        );

        let outcome = game.play(&Move::step(pos(1, 2), pos(0, 1))).unwrap();
        assert_eq!(outcome, TurnOutcome::Won { winner: Side::Dark });
    }

    #[test]
    fn test_concede_and_abandon() {
        let (local, opponent) = players();
        let mut game = Match::new(GameType::ComeCome, local.clone(), opponent.clone()).unwrap();

        assert_eq!(game.concede(Side::Dark).unwrap(), Side::Light);
        assert_eq!(game.winner_player().unwrap().name, "Bo");
        assert_eq!(game.concede(Side::Dark), Err(MatchError::NotActive));

        let mut game = Match::new(GameType::ComeCome, local, opponent).unwrap();
        game.abandon();
        assert_eq!(game.status, MatchStatus::Abandoned);
        assert!(game.winner().is_none());
        assert!(game.status.is_terminal());
    }

    #[test]
    fn test_to_json() {
        let (local, opponent) = players();
        let game = Match::new(GameType::CatAndMouse, local, opponent).unwrap();
        let json = game.to_json();

        assert_eq!(json["game_type"], "cat-and-mouse");
        assert_eq!(json["current_turn"], "dark");
        assert_eq!(json["pieces"].as_array().unwrap().len(), 5);
        assert!(json["winner"].is_null());
    }
}
