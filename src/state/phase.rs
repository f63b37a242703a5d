//! Session phase machine.
//!
//! Tracks where the local peer is, from the lobby to a finished match, and
//! validates every transition.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────────┐  open_room   ┌──────────────┐  paired   ┌────────────┐
//! │  Lobby   │─────────────▶│ RoomWaiting  │──────────▶│ RoomReady  │◀─────┐
//! └──────────┘              └──────────────┘           └─────┬──────┘      │
//!      ▲                           ▲                         │ start_match │
//!      │                           │ opponent_left           ▼             │
//!      │                           │                   ┌────────────┐      │
//!      │                           ├───────────────────│ InProgress │──────┤
//!      │                           │                   └─────┬──────┘      │
//!      │                           │                         │ match_over  │
//!      │                           │                         ▼             │
//!      │                           │                   ┌────────────┐      │
//!      │                           └───────────────────│  Finished  │──────┘
//!      │                                               └────────────┘ return_to_room
//!      │ teardown (from any phase)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the local peer is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Lobby,
    /// In a room, waiting for the other peer
    RoomWaiting,
    /// Both peers present, no match running
    RoomReady,
    InProgress,
    Finished,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::RoomWaiting => "room-waiting",
            Self::RoomReady => "room-ready",
            Self::InProgress => "in-progress",
            Self::Finished => "finished",
        }
    }

    /// Check if both peers are in the room.
    pub fn is_paired(&self) -> bool {
        matches!(self, Self::RoomReady | Self::InProgress | Self::Finished)
    }

    pub fn is_in_room(&self) -> bool {
        !matches!(self, Self::Lobby)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase transition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    OpenRoom,
    Paired,
    OpponentLeft,
    StartMatch,
    MatchOver,
    ReturnToRoom,
    Teardown,
}

/// Error when a phase transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition from {from} via {event:?}: {reason}")]
pub struct InvalidTransition {
    pub from: Phase,
    pub event: PhaseEvent,
    pub reason: &'static str,
}

/// Phase state machine.
#[derive(Debug, Clone, Default)]
pub struct PhaseState {
    phase: Phase,
}

impl PhaseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state at a specific phase.
    pub fn at(phase: Phase) -> Self {
        Self { phase }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Apply an event, returning the new state or an error.
    pub fn apply(&self, event: PhaseEvent) -> Result<Self, InvalidTransition> {
        Ok(Self {
            phase: self.transition(event)?,
        })
    }

    /// Apply an event in place, returning error if invalid.
    pub fn apply_mut(&mut self, event: PhaseEvent) -> Result<(), InvalidTransition> {
        self.phase = self.transition(event)?;
        Ok(())
    }

    fn transition(&self, event: PhaseEvent) -> Result<Phase, InvalidTransition> {
        use Phase::*;
        use PhaseEvent::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.phase,
            event,
            reason,
        };

        match (self.phase, event) {
            // Teardown: any -> Lobby
            (_, Teardown) => Ok(Lobby),

            // OpenRoom: Lobby -> RoomWaiting
            (Lobby, OpenRoom) => Ok(RoomWaiting),
            (_, OpenRoom) => Err(invalid("Already in a room")),

            // Paired: RoomWaiting -> RoomReady
            (RoomWaiting, Paired) => Ok(RoomReady),
            (Lobby, Paired) => Err(invalid("Not in a room")),
            (_, Paired) => Err(invalid("Already paired")),

            // OpponentLeft: paired -> RoomWaiting
            (RoomReady | InProgress | Finished, OpponentLeft) => Ok(RoomWaiting),
            (_, OpponentLeft) => Err(invalid("No opponent in the room")),

            // StartMatch: RoomReady -> InProgress
            (RoomReady, StartMatch) => Ok(InProgress),
            (InProgress, StartMatch) => Err(invalid("Match already running")),
            (Finished, StartMatch) => Err(invalid("Must return to the room first")),
            (_, StartMatch) => Err(invalid("Waiting for an opponent")),

            // MatchOver: InProgress -> Finished
            (InProgress, MatchOver) => Ok(Finished),
            (_, MatchOver) => Err(invalid("No match running")),

            // ReturnToRoom: RoomReady/InProgress/Finished -> RoomReady
            (RoomReady | InProgress | Finished, ReturnToRoom) => Ok(RoomReady),
            (_, ReturnToRoom) => Err(invalid("No opponent in the room")),
        }
    }

    pub fn is_paired(&self) -> bool {
        self.phase.is_paired()
    }

    pub fn is_in_room(&self) -> bool {
        self.phase.is_in_room()
    }

    pub fn is_playing(&self) -> bool {
        self.phase.is_playing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = PhaseState::new();
        assert_eq!(state.phase(), Phase::Lobby);
        assert!(!state.is_in_room());
    }

    #[test]
    fn test_full_match_flow() {
        let mut state = PhaseState::new();

        state.apply_mut(PhaseEvent::OpenRoom).unwrap();
        assert_eq!(state.phase(), Phase::RoomWaiting);
        assert!(state.is_in_room());
        assert!(!state.is_paired());

        state.apply_mut(PhaseEvent::Paired).unwrap();
        state.apply_mut(PhaseEvent::StartMatch).unwrap();
        assert!(state.is_playing());

        state.apply_mut(PhaseEvent::MatchOver).unwrap();
        assert_eq!(state.phase(), Phase::Finished);

        state.apply_mut(PhaseEvent::ReturnToRoom).unwrap();
        assert_eq!(state.phase(), Phase::RoomReady);

        state.apply_mut(PhaseEvent::Teardown).unwrap();
        assert_eq!(state.phase(), Phase::Lobby);
    }

    #[test]
    fn test_opponent_left_mid_match() {
        let state = PhaseState::at(Phase::InProgress);
        let state = state.apply(PhaseEvent::OpponentLeft).unwrap();
        assert_eq!(state.phase(), Phase::RoomWaiting);
    }

    #[test]
    fn test_invalid_transitions() {
        let lobby = PhaseState::new();
        assert!(lobby.apply(PhaseEvent::StartMatch).is_err());
        assert!(lobby.apply(PhaseEvent::Paired).is_err());

        let waiting = lobby.apply(PhaseEvent::OpenRoom).unwrap();
        let err = waiting.apply(PhaseEvent::StartMatch).unwrap_err();
        assert_eq!(err.from, Phase::RoomWaiting);
        assert_eq!(err.reason, "Waiting for an opponent");

        let finished = PhaseState::at(Phase::Finished);
        assert!(finished.apply(PhaseEvent::StartMatch).is_err());
        assert!(finished.apply(PhaseEvent::MatchOver).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Phase::RoomWaiting.to_string(), "room-waiting");
        let err = PhaseState::new().apply(PhaseEvent::MatchOver).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid transition from lobby via MatchOver: No match running"
        );
    }
}
