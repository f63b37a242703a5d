//! One peer's view of a room and its matches.
//!
//! The session is synchronous and owns no I/O. UI operations and incoming
//! envelopes mutate it; envelopes for the other peer are queued in an
//! outbox and human-facing notices in a notice queue, both drained by the
//! driver. The host is authoritative for match setup: it picks colors,
//! builds the board and announces the match, the guest adopts it verbatim.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::board::{Board, Move, Position, Side};
use crate::config::SessionConfig;
use crate::protocol::Envelope;
use crate::rules::{engine_for, GameType, RulesError};
use crate::state::{
    InvalidTransition, Match, MatchError, Phase, PhaseEvent, PhaseState, Player, Role, Room,
    RoomError, RoomMember, TurnOutcome,
};

/// Terminal or transient conditions surfaced to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The guest's link went away; the room is open again
    OpponentDisconnected,
    /// The link dropped and the guest is redialing
    Reconnecting,
    /// Redialing failed; back in the lobby
    ConnectionLost,
    OpponentSurrendered,
    /// The other peer left the finished match for the room
    OpponentReturnedToRoom,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Self::OpponentDisconnected => "Your opponent disconnected.",
            Self::Reconnecting => "Connection lost. Reconnecting...",
            Self::ConnectionLost => "Could not reconnect to the room.",
            Self::OpponentSurrendered => "Your opponent surrendered.",
            Self::OpponentReturnedToRoom => "Your opponent returned to the room.",
        }
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
    #[error("not in a room")]
    NotInRoom,
    #[error("no opponent in the room")]
    OpponentMissing,
    #[error("no match running")]
    NoMatch,
    #[error("not your turn")]
    NotYourTurn,
    #[error("link is down, reconnecting")]
    Reconnecting,
    #[error("illegal move {0}")]
    IllegalMove(Move),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Rules(#[from] RulesError),
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Session state for the local peer.
#[derive(Debug)]
pub struct Session {
    local_name: String,

    phase: PhaseState,

    room: Option<Room>,

    game: Option<Match>,

    /// Piece highlighted by the UI
    selected_piece: Option<Position>,

    /// Envelopes waiting to be sent
    outbox: VecDeque<Envelope>,

    notices: VecDeque<Notice>,

    /// The guest's link dropped and a redial is pending
    reconnecting: bool,

    rng: StdRng,
}

impl Session {
    pub fn new(local_name: impl Into<String>, config: &SessionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            local_name: local_name.into(),
            phase: PhaseState::new(),
            room: None,
            game: None,
            selected_piece: None,
            outbox: VecDeque::new(),
            notices: VecDeque::new(),
            reconnecting: false,
            rng,
        }
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn phase(&self) -> Phase {
        self.phase.phase()
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.room.as_ref().map(Room::role)
    }

    pub fn game(&self) -> Option<&Match> {
        self.game.as_ref()
    }

    pub fn selected_piece(&self) -> Option<Position> {
        self.selected_piece
    }

    pub fn selected_game(&self) -> Option<GameType> {
        self.room.as_ref().and_then(|r| r.selected_game)
    }

    /// Side to move in the running match.
    pub fn turn(&self) -> Option<Side> {
        self.game.as_ref().map(Match::turn)
    }

    pub fn winner(&self) -> Option<&Player> {
        self.game.as_ref().and_then(Match::winner_player)
    }

    pub fn is_local_turn(&self) -> bool {
        !self.reconnecting
            && self.phase.is_playing()
            && self.game.as_ref().is_some_and(Match::is_local_turn)
    }

    /// Check if the link dropped and is being redialed.
    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting
    }

    /// Take every queued envelope, oldest first.
    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        self.outbox.drain(..).collect()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    fn send(&mut self, envelope: Envelope) {
        debug!(kind = envelope.kind(), "Queued envelope");
        self.outbox.push_back(envelope);
    }

    fn room_mut(&mut self) -> Result<&mut Room, SessionError> {
        self.room.as_mut().ok_or(SessionError::NotInRoom)
    }

    // Room formation

    /// Host side: open a room under a claimed identifier.
    pub fn open_room(
        &mut self,
        name: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.phase.apply_mut(PhaseEvent::OpenRoom)?;
        let room = Room::new(name, id, RoomMember::new(self.local_name.clone(), Role::Host));
        info!(room_id = %room.id, "Room opened");
        self.room = Some(room);
        Ok(())
    }

    /// Guest side: enter a room over a fresh link and introduce ourselves.
    pub fn enter_room(
        &mut self,
        name: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.phase.apply_mut(PhaseEvent::OpenRoom)?;
        let room = Room::new(name, id, RoomMember::new(self.local_name.clone(), Role::Guest));
        info!(room_id = %room.id, "Room entered");
        self.room = Some(room);
        self.send(Envelope::Join {
            player_name: self.local_name.clone(),
        });
        Ok(())
    }

    /// Choose the game for the next match.
    pub fn select_game(&mut self, game: GameType) -> Result<(), SessionError> {
        engine_for(game)?;
        if self.phase.is_playing() {
            return Err(InvalidTransition {
                from: self.phase(),
                event: PhaseEvent::StartMatch,
                reason: "Match already running",
            }
            .into());
        }
        self.room_mut()?.selected_game = Some(game);
        debug!(game = %game, "Game selected");
        Ok(())
    }

    /// Confirm the selected game. The host starts right away; the guest
    /// asks the host, who has the final say.
    pub fn choose_color_and_start(&mut self, color: Option<Side>) -> Result<(), SessionError> {
        let room = self.room.as_ref().ok_or(SessionError::NotInRoom)?;
        if room.opponent().is_none() {
            return Err(SessionError::OpponentMissing);
        }
        // Validate before anything is queued
        self.phase.apply(PhaseEvent::StartMatch)?;

        let game = room.selected_game.unwrap_or_default();
        engine_for(game)?;

        match room.role() {
            Role::Host => self.start_match(game, color),
            Role::Guest => {
                info!(game = %game, color = ?color, "Requesting match start");
                self.send(Envelope::RequestStartGame {
                    game_type: game,
                    color,
                });
                Ok(())
            }
        }
    }

    /// Host side: assign colors, build the board and announce the match.
    fn start_match(&mut self, game: GameType, local_color: Option<Side>) -> Result<(), SessionError> {
        let next = self.phase.apply(PhaseEvent::StartMatch)?;
        let room = self.room.as_ref().ok_or(SessionError::NotInRoom)?;
        let opponent = room.opponent().ok_or(SessionError::OpponentMissing)?;

        let local_color = match local_color {
            Some(color) => color,
            None => {
                if self.rng.gen::<bool>() {
                    Side::Dark
                } else {
                    Side::Light
                }
            }
        };

        let local = Player::new(Role::Host.as_str(), self.local_name.clone(), local_color);
        let remote = Player::new(
            Role::Guest.as_str(),
            opponent.name.clone(),
            local_color.opponent(),
        );
        let game_match = Match::new(game, local, remote)?;

        info!(
            game = %game,
            color = %local_color,
            first = %game_match.turn(),
            "Match started"
        );

        let announce = Envelope::StartGame {
            game_type: game,
            your_color: local_color.opponent(),
            pieces: game_match.board().clone(),
            current_turn: game_match.turn(),
            opponent_name: self.local_name.clone(),
        };

        self.room_mut()?.selected_game = Some(game);
        self.game = Some(game_match);
        self.selected_piece = None;
        self.phase = next;
        self.send(announce);
        Ok(())
    }

    // Play

    /// Highlight a piece of the local side and return its legal moves.
    pub fn select_piece(&mut self, position: Position) -> Result<Vec<Move>, SessionError> {
        if self.reconnecting {
            return Err(SessionError::Reconnecting);
        }
        let game = self.game.as_ref().ok_or(SessionError::NoMatch)?;
        if !self.phase.is_playing() || !game.is_local_turn() {
            return Err(SessionError::NotYourTurn);
        }

        let moves = game.moves_from(position);
        self.selected_piece = (!moves.is_empty()).then_some(position);
        Ok(moves)
    }

    /// Every legal move for the local side, or nothing if it is not its turn.
    pub fn available_moves(&self) -> Vec<Move> {
        match &self.game {
            Some(game) if self.is_local_turn() => game.legal_moves(),
            _ => Vec::new(),
        }
    }

    /// Play a local move. Illegal moves leave the session untouched and
    /// send nothing.
    pub fn submit_move(&mut self, mv: Move) -> Result<TurnOutcome, SessionError> {
        if self.reconnecting {
            return Err(SessionError::Reconnecting);
        }
        let game = self.game.as_ref().ok_or(SessionError::NoMatch)?;
        if !self.phase.is_playing() || !game.is_local_turn() {
            return Err(SessionError::NotYourTurn);
        }
        if !game.is_legal(&mv) {
            debug!(mv = %mv, "Rejected illegal move");
            return Err(SessionError::IllegalMove(mv));
        }

        let outcome = self.play(&mv)?;
        self.send(Envelope::Move { mv });
        Ok(outcome)
    }

    /// Give up the running match.
    pub fn surrender(&mut self) -> Result<(), SessionError> {
        let next = self.phase.apply(PhaseEvent::MatchOver)?;
        let game = self.game.as_mut().ok_or(SessionError::NoMatch)?;
        let color = game.local.color;
        game.concede(color)?;

        info!(color = %color, "Surrendered");
        self.phase = next;
        self.selected_piece = None;
        self.send(Envelope::Surrender { color });
        Ok(())
    }

    /// Leave the match (running or finished) for the room.
    pub fn return_to_room(&mut self) -> Result<(), SessionError> {
        self.leave_match()?;
        self.send(Envelope::ReturnRoom);
        Ok(())
    }

    /// Tear everything down. The driver disconnects the transport.
    pub fn reset_to_lobby(&mut self) {
        if let Some(game) = self.game.as_mut() {
            game.abandon();
        }
        // Teardown is valid from every phase
        let _ = self.phase.apply_mut(PhaseEvent::Teardown);
        self.room = None;
        self.game = None;
        self.selected_piece = None;
        self.outbox.clear();
        self.reconnecting = false;
        info!("Back in the lobby");
    }

    fn leave_match(&mut self) -> Result<(), SessionError> {
        self.phase.apply_mut(PhaseEvent::ReturnToRoom)?;
        if let Some(mut game) = self.game.take() {
            game.abandon();
        }
        self.selected_piece = None;
        debug!("Returned to the room");
        Ok(())
    }

    /// Shared by local and remote moves.
    fn play(&mut self, mv: &Move) -> Result<TurnOutcome, SessionError> {
        let game = self.game.as_mut().ok_or(SessionError::NoMatch)?;
        let outcome = game.play(mv)?;

        match outcome {
            TurnOutcome::Continue { piece } => {
                debug!(mv = %mv, "Capture continues");
                self.selected_piece = Some(piece);
            }
            TurnOutcome::Passed { next } => {
                debug!(mv = %mv, next = %next, "Turn passed");
                self.selected_piece = None;
            }
            TurnOutcome::Won { winner } => {
                info!(mv = %mv, winner = %winner, "Match over");
                self.selected_piece = None;
                self.phase.apply_mut(PhaseEvent::MatchOver)?;
            }
        }

        Ok(outcome)
    }

    // Incoming

    /// Handle an envelope from the other peer. Anything that does not fit
    /// the current phase or role is dropped.
    pub fn receive(&mut self, envelope: Envelope) {
        let kind = envelope.kind();
        let role = self.role();
        let phase = self.phase();

        let handled = match (role, envelope) {
            (_, Envelope::Ping) => Ok(false),

            (Some(Role::Host), Envelope::Join { player_name }) => self.on_join(player_name),
            (Some(Role::Guest), Envelope::Welcome { host_name }) => self.on_welcome(host_name),
            (Some(Role::Host), Envelope::RequestStartGame { game_type, color }) => {
                self.on_start_request(game_type, color)
            }
            (
                Some(Role::Guest),
                Envelope::StartGame {
                    game_type,
                    your_color,
                    pieces,
                    current_turn,
                    opponent_name,
                },
            ) => self.on_start_game(game_type, your_color, pieces, current_turn, opponent_name),
            (Some(_), Envelope::Move { mv }) => self.on_remote_move(mv),
            (Some(_), Envelope::ReturnRoom) => self.on_return_room(),
            (Some(_), Envelope::Surrender { color }) => self.on_surrender(color),

            _ => Ok(false),
        };

        match handled {
            Ok(true) => debug!(kind, phase = %phase, "Handled envelope"),
            Ok(false) => debug!(kind, phase = %phase, role = ?role, "Ignored envelope"),
            Err(e) => warn!(kind, phase = %phase, error = %e, "Dropped envelope"),
        }
    }

    fn on_join(&mut self, player_name: String) -> Result<bool, SessionError> {
        if self.phase() != Phase::RoomWaiting {
            return Ok(false);
        }

        self.room_mut()?
            .seat_opponent(RoomMember::new(player_name.clone(), Role::Guest))?;
        self.phase.apply_mut(PhaseEvent::Paired)?;
        info!(guest = %player_name, "Guest joined");
        self.send(Envelope::Welcome {
            host_name: self.local_name.clone(),
        });
        Ok(true)
    }

    fn on_welcome(&mut self, host_name: String) -> Result<bool, SessionError> {
        if self.phase() != Phase::RoomWaiting {
            return Ok(false);
        }

        self.room_mut()?
            .seat_opponent(RoomMember::new(host_name.clone(), Role::Host))?;
        self.phase.apply_mut(PhaseEvent::Paired)?;
        info!(host = %host_name, "Welcomed by host");
        Ok(true)
    }

    fn on_start_request(
        &mut self,
        game: GameType,
        guest_color: Option<Side>,
    ) -> Result<bool, SessionError> {
        // Lost the race, or a match is already over and not yet left
        if self.phase() != Phase::RoomReady {
            return Ok(false);
        }

        self.start_match(game, guest_color.map(Side::opponent))?;
        Ok(true)
    }

    fn on_start_game(
        &mut self,
        game: GameType,
        your_color: Side,
        pieces: Board,
        current_turn: Side,
        opponent_name: String,
    ) -> Result<bool, SessionError> {
        if self.phase() != Phase::RoomReady {
            return Ok(false);
        }

        let next = self.phase.apply(PhaseEvent::StartMatch)?;
        let local = Player::new(Role::Guest.as_str(), self.local_name.clone(), your_color);
        let remote = Player::new(Role::Host.as_str(), opponent_name, your_color.opponent());
        let game_match = Match::resume(game, pieces, current_turn, local, remote)?;

        info!(game = %game, color = %your_color, first = %current_turn, "Match started by host");
        self.room_mut()?.selected_game = Some(game);
        self.game = Some(game_match);
        self.selected_piece = None;
        self.phase = next;
        Ok(true)
    }

    fn on_remote_move(&mut self, mv: Move) -> Result<bool, SessionError> {
        let Some(game) = self.game.as_ref() else {
            return Ok(false);
        };
        // Only the remote side's turn, and only what it could legally play
        if !self.phase.is_playing() || game.is_local_turn() || !game.is_legal(&mv) {
            return Ok(false);
        }

        self.play(&mv)?;
        Ok(true)
    }

    fn on_return_room(&mut self) -> Result<bool, SessionError> {
        if !matches!(self.phase(), Phase::InProgress | Phase::Finished) {
            return Ok(false);
        }
        self.leave_match()?;
        self.notices.push_back(Notice::OpponentReturnedToRoom);
        Ok(true)
    }

    fn on_surrender(&mut self, color: Side) -> Result<bool, SessionError> {
        let Some(game) = self.game.as_mut() else {
            return Ok(false);
        };
        if !self.phase.is_playing() || color != game.opponent.color {
            return Ok(false);
        }

        game.concede(color)?;
        self.phase.apply_mut(PhaseEvent::MatchOver)?;
        self.selected_piece = None;
        self.notices.push_back(Notice::OpponentSurrendered);
        info!(color = %color, "Opponent surrendered");
        Ok(true)
    }

    // Link events

    /// The link to the other peer closed.
    pub fn on_link_dropped(&mut self, reconnecting: bool) {
        if reconnecting {
            self.reconnecting = true;
            self.selected_piece = None;
            self.notices.push_back(Notice::Reconnecting);
            return;
        }
        if self.room.is_none() {
            return;
        }

        warn!(phase = %self.phase(), "Opponent disconnected");
        self.vacate_seat();
        self.notices.push_back(Notice::OpponentDisconnected);
    }

    /// The guest's link came back; rejoin the room from scratch.
    pub fn on_reconnected(&mut self) {
        self.reconnecting = false;
        if self.room.is_none() {
            return;
        }

        info!("Reconnected, rejoining room");
        self.vacate_seat();
        self.send(Envelope::Join {
            player_name: self.local_name.clone(),
        });
    }

    /// The link is gone for good.
    pub fn on_link_lost(&mut self) {
        warn!("Connection lost");
        self.notices.push_back(Notice::ConnectionLost);
        self.reset_to_lobby();
    }

    fn vacate_seat(&mut self) {
        if let Some(mut game) = self.game.take() {
            game.abandon();
        }
        if let Some(room) = self.room.as_mut() {
            room.vacate_opponent();
        }
        if self.phase.is_paired() {
            let _ = self.phase.apply_mut(PhaseEvent::OpponentLeft);
        }
        self.selected_piece = None;
        self.outbox.clear();
    }

    /// Convert to JSON for the UI.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "player_name": self.local_name,
            "phase": self.phase().as_str(),
            "room": self.room.as_ref().map(Room::to_json),
            "game": self.game.as_ref().map(Match::to_json),
            "selected_piece": self.selected_piece,
            "reconnecting": self.reconnecting,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Piece, PieceKind};
    use pretty_assertions::assert_eq;

    const ROOM_ID: &str = "versus-board-v1-friday";

    fn seeded(name: &str, seed: u64) -> Session {
        Session::new(name, &SessionConfig { seed: Some(seed) })
    }

    /// Shuttle queued envelopes both ways until nothing is left.
    fn pump(host: &mut Session, guest: &mut Session) {
        loop {
            let to_guest = host.drain_outbox();
            let to_host = guest.drain_outbox();
            if to_guest.is_empty() && to_host.is_empty() {
                break;
            }
            for env in to_guest {
                guest.receive(env);
            }
            for env in to_host {
                host.receive(env);
            }
        }
    }

    fn paired() -> (Session, Session) {
        let mut host = seeded("Ana", 1);
        let mut guest = seeded("Bo", 2);
        host.open_room("Friday", ROOM_ID).unwrap();
        guest.enter_room("Friday", ROOM_ID).unwrap();
        pump(&mut host, &mut guest);
        (host, guest)
    }

    fn started(game: GameType, host_color: Side) -> (Session, Session) {
        let (mut host, mut guest) = paired();
        host.select_game(game).unwrap();
        host.choose_color_and_start(Some(host_color)).unwrap();
        pump(&mut host, &mut guest);
        (host, guest)
    }

    #[test]
    fn test_room_formation() {
        let (host, guest) = paired();

        assert_eq!(host.phase(), Phase::RoomReady);
        assert_eq!(guest.phase(), Phase::RoomReady);
        assert_eq!(host.room().unwrap().opponent().unwrap().name, "Bo");
        assert_eq!(guest.room().unwrap().opponent().unwrap().name, "Ana");
        assert_eq!(guest.role(), Some(Role::Guest));
    }

    #[test]
    fn test_start_requires_opponent() {
        let mut host = seeded("Ana", 1);
        host.open_room("Friday", ROOM_ID).unwrap();

        assert_eq!(
            host.choose_color_and_start(None),
            Err(SessionError::OpponentMissing)
        );
        assert!(host.drain_outbox().is_empty());
    }

    #[test]
    fn test_host_start_with_chosen_color() {
        let (host, guest) = started(GameType::Checkers, Side::Light);

        assert_eq!(host.phase(), Phase::InProgress);
        assert_eq!(guest.phase(), Phase::InProgress);
        assert_eq!(host.game().unwrap().local.color, Side::Light);
        assert_eq!(guest.game().unwrap().local.color, Side::Dark);
        assert_eq!(guest.game().unwrap().opponent.name, "Ana");
        assert_eq!(host.game().unwrap().board(), guest.game().unwrap().board());
        assert_eq!(guest.turn(), Some(Side::Dark));
        assert!(guest.is_local_turn());
        assert!(!host.is_local_turn());
    }

    #[test]
    fn test_guest_request_gets_complement() {
        let (mut host, mut guest) = paired();
        guest.select_game(GameType::CatAndMouse).unwrap();
        guest.choose_color_and_start(Some(Side::Dark)).unwrap();
        // Nothing starts until the host answers
        assert_eq!(guest.phase(), Phase::RoomReady);

        pump(&mut host, &mut guest);

        assert_eq!(host.phase(), Phase::InProgress);
        assert_eq!(host.selected_game(), Some(GameType::CatAndMouse));
        assert_eq!(guest.game().unwrap().game_type, GameType::CatAndMouse);
        assert_eq!(guest.game().unwrap().local.color, Side::Dark);
        assert_eq!(host.game().unwrap().local.color, Side::Light);
    }

    #[test]
    fn test_random_colors_are_complementary() {
        let (mut host, mut guest) = paired();
        host.choose_color_and_start(None).unwrap();
        pump(&mut host, &mut guest);

        let host_color = host.game().unwrap().local.color;
        assert_eq!(guest.game().unwrap().local.color, host_color.opponent());
        assert_eq!(host.selected_game(), Some(GameType::Checkers));
    }

    #[test]
    fn test_start_race_host_wins() {
        let (mut host, mut guest) = paired();
        host.choose_color_and_start(Some(Side::Dark)).unwrap();
        guest
            .choose_color_and_start(Some(Side::Dark))
            .unwrap();
        pump(&mut host, &mut guest);

        assert_eq!(host.game().unwrap().local.color, Side::Dark);
        assert_eq!(guest.game().unwrap().local.color, Side::Light);
        assert_eq!(host.game().unwrap().move_count(), 0);
    }

    #[test]
    fn test_chess_is_unsupported() {
        let (mut host, _guest) = paired();
        assert_eq!(
            host.select_game(GameType::Chess),
            Err(SessionError::Rules(RulesError::Unsupported(GameType::Chess)))
        );
    }

    #[test]
    fn test_move_exchange() {
        let (mut host, mut guest) = started(GameType::Checkers, Side::Light);

        let moves = guest.select_piece(Position::new(2, 1)).unwrap();
        let opening = Move::step(Position::new(2, 1), Position::new(3, 0));
        assert!(moves.contains(&opening));
        assert_eq!(guest.selected_piece(), Some(Position::new(2, 1)));

        let outcome = guest.submit_move(opening.clone()).unwrap();
        assert_eq!(outcome, TurnOutcome::Passed { next: Side::Light });
        pump(&mut host, &mut guest);

        assert_eq!(host.game().unwrap().board(), guest.game().unwrap().board());
        assert!(host.is_local_turn());
        assert_eq!(host.game().unwrap().history()[0].mv, opening);
    }

    #[test]
    fn test_illegal_move_is_rejected_and_not_sent() {
        let (_host, mut guest) = started(GameType::Checkers, Side::Light);
        let before = guest.game().unwrap().board().clone();

        let bad = Move::step(Position::new(2, 1), Position::new(4, 3));
        assert_eq!(
            guest.submit_move(bad.clone()),
            Err(SessionError::IllegalMove(bad))
        );
        assert_eq!(guest.game().unwrap().board(), &before);
        assert!(guest.drain_outbox().is_empty());
    }

    #[test]
    fn test_out_of_turn() {
        let (mut host, _guest) = started(GameType::Checkers, Side::Light);
        let mv = Move::step(Position::new(5, 0), Position::new(4, 1));
        assert_eq!(host.submit_move(mv), Err(SessionError::NotYourTurn));
        assert_eq!(
            host.select_piece(Position::new(5, 0)),
            Err(SessionError::NotYourTurn)
        );
    }

    #[test]
    fn test_duplicate_remote_move_is_harmless() {
        let (mut host, mut guest) = started(GameType::Checkers, Side::Light);
        let opening = Move::step(Position::new(2, 1), Position::new(3, 0));
        guest.submit_move(opening.clone()).unwrap();
        pump(&mut host, &mut guest);

        host.receive(Envelope::Move { mv: opening });
        assert_eq!(host.game().unwrap().move_count(), 1);
        assert_eq!(host.game().unwrap().board(), guest.game().unwrap().board());
    }

    #[test]
    fn test_remote_move_not_echoed() {
        let (mut host, mut guest) = started(GameType::Checkers, Side::Light);
        guest
            .submit_move(Move::step(Position::new(2, 1), Position::new(3, 0)))
            .unwrap();
        for env in guest.drain_outbox() {
            host.receive(env);
        }
        assert!(host.drain_outbox().is_empty());
    }

    #[test]
    fn test_surrender() {
        let (mut host, mut guest) = started(GameType::ComeCome, Side::Dark);
        host.surrender().unwrap();
        pump(&mut host, &mut guest);

        assert_eq!(host.phase(), Phase::Finished);
        assert_eq!(guest.phase(), Phase::Finished);
        assert_eq!(host.winner().unwrap().name, "Bo");
        assert_eq!(guest.winner().unwrap().name, "Bo");
        assert_eq!(guest.drain_notices(), vec![Notice::OpponentSurrendered]);
    }

    #[test]
    fn test_return_to_room_both_sides() {
        let (mut host, mut guest) = started(GameType::Checkers, Side::Dark);
        guest.return_to_room().unwrap();
        pump(&mut host, &mut guest);

        assert_eq!(host.phase(), Phase::RoomReady);
        assert_eq!(guest.phase(), Phase::RoomReady);
        assert!(host.game().is_none());

        // A new match can start from here
        host.choose_color_and_start(Some(Side::Light)).unwrap();
        pump(&mut host, &mut guest);
        assert_eq!(guest.phase(), Phase::InProgress);
    }

    #[test]
    fn test_finished_match_via_remote_move() {
        let (mut host, mut guest) = started(GameType::Checkers, Side::Light);

        // Replace both boards with a one-capture endgame
        let board = Board::new(vec![
            Piece::new("d", Side::Dark, PieceKind::Man, Position::new(4, 4)),
            Piece::new("l", Side::Light, PieceKind::Man, Position::new(5, 5)),
        ])
        .unwrap();
        for session in [&mut host, &mut guest] {
            let game = session.game.as_mut().unwrap();
            *game = Match::resume(
                GameType::Checkers,
                board.clone(),
                Side::Dark,
                game.local.clone(),
                game.opponent.clone(),
            )
            .unwrap();
        }

        let capture = Move::capture(
            Position::new(4, 4),
            Position::new(6, 6),
            vec![Position::new(5, 5)],
        );
        assert_eq!(guest.available_moves(), vec![capture.clone()]);
        guest.submit_move(capture).unwrap();
        pump(&mut host, &mut guest);

        assert_eq!(guest.phase(), Phase::Finished);
        assert_eq!(host.phase(), Phase::Finished);
        assert_eq!(host.winner().unwrap().name, "Bo");
    }

    #[test]
    fn test_host_link_drop_reopens_room() {
        let (mut host, _guest) = started(GameType::Checkers, Side::Dark);
        host.on_link_dropped(false);

        assert_eq!(host.phase(), Phase::RoomWaiting);
        assert!(host.game().is_none());
        assert!(host.room().unwrap().opponent().is_none());
        assert_eq!(host.drain_notices(), vec![Notice::OpponentDisconnected]);
    }

    #[test]
    fn test_guest_reconnect_rejoins() {
        let (mut host, mut guest) = started(GameType::Checkers, Side::Dark);

        guest.on_link_dropped(true);
        assert_eq!(guest.phase(), Phase::InProgress);
        host.on_link_dropped(false);
        guest.on_reconnected();
        assert_eq!(guest.phase(), Phase::RoomWaiting);

        pump(&mut host, &mut guest);
        assert_eq!(host.phase(), Phase::RoomReady);
        assert_eq!(guest.phase(), Phase::RoomReady);
        assert_eq!(
            guest.drain_notices(),
            vec![Notice::Reconnecting]
        );
    }

    #[test]
    fn test_no_local_play_while_redialing() {
        let (_host, mut guest) = started(GameType::Checkers, Side::Light);
        let before = guest.game().unwrap().board().clone();
        guest.on_link_dropped(true);

        let opening = Move::step(Position::new(2, 1), Position::new(3, 0));
        assert!(guest.is_reconnecting());
        assert!(!guest.is_local_turn());
        assert!(guest.available_moves().is_empty());
        assert_eq!(
            guest.select_piece(Position::new(2, 1)),
            Err(SessionError::Reconnecting)
        );
        assert_eq!(guest.submit_move(opening), Err(SessionError::Reconnecting));
        assert_eq!(guest.game().unwrap().board(), &before);
        assert!(guest.drain_outbox().is_empty());

        guest.on_reconnected();
        assert!(!guest.is_reconnecting());
    }

    #[test]
    fn test_link_lost_resets() {
        let (_host, mut guest) = started(GameType::Checkers, Side::Dark);
        guest.on_link_lost();

        assert_eq!(guest.phase(), Phase::Lobby);
        assert!(guest.room().is_none());
        assert_eq!(guest.drain_notices(), vec![Notice::ConnectionLost]);
    }

    #[test]
    fn test_unexpected_envelopes_ignored() {
        let mut host = seeded("Ana", 1);
        host.receive(Envelope::Welcome {
            host_name: "x".into(),
        });
        host.receive(Envelope::Ping);
        assert_eq!(host.phase(), Phase::Lobby);

        let (mut host, _guest) = paired();
        // Guests never send start_game
        host.receive(Envelope::StartGame {
            game_type: GameType::Checkers,
            your_color: Side::Dark,
            pieces: Board::default(),
            current_turn: Side::Dark,
            opponent_name: "x".into(),
        });
        assert_eq!(host.phase(), Phase::RoomReady);
    }

    #[test]
    fn test_reset_to_lobby() {
        let (mut host, _guest) = started(GameType::Checkers, Side::Dark);
        host.reset_to_lobby();

        assert_eq!(host.phase(), Phase::Lobby);
        assert!(host.game().is_none());
        assert!(host.room().is_none());
        let json = host.to_json();
        assert_eq!(json["phase"], "lobby");
    }
}
