//! State types for one peer.
//!
//! - `phase` - Session phase machine (where is the local peer?)
//! - `room` - The two-seat room a match is played in
//! - `game` - The running match: board, turn, capture lock, winner
//! - `connection` - Transport status and link health
//! - `directory` - Listing of open rooms
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Session                                │
//! │                                                                   │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐   │
//! │  │  PhaseState  │   │     Room     │   │        Match         │   │
//! │  │              │   │              │   │                      │   │
//! │  │ Lobby ──▶    │   │ local seat   │   │ engine (RuleEngine)  │   │
//! │  │ RoomWaiting  │   │ opponent     │   │ board, turn          │   │
//! │  │ RoomReady ◀─┐│   │ selected     │   │ must_capture         │   │
//! │  │ InProgress  ││   │   game       │   │ continuation         │   │
//! │  │ Finished ───┘│   │              │   │ winner, history      │   │
//! │  └──────────────┘   └──────────────┘   └──────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//!            ▲ envelopes / link events                │ envelopes
//!            │                                        ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                 PeerTransport (ConnectionStatus)                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod connection;
pub mod directory;
pub mod game;
pub mod phase;
pub mod room;

pub use connection::{ConnectionStatus, LinkHealth};
pub use directory::{
    DirectoryAction, DirectoryError, DirectoryRequest, ListedRoom, RoomDirectory,
    ROOM_RETENTION_SECS,
};
pub use game::{Match, MatchError, MatchStatus, PlayedMove, Player, TurnOutcome};
pub use phase::{InvalidTransition, Phase, PhaseEvent, PhaseState};
pub use room::{Role, Room, RoomError, RoomMember};
