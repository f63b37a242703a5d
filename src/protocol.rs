//! Wire messages exchanged between the two peers.
//!
//! Every frame is a JSON object tagged by `type`. Field names are
//! camelCase so frames stay readable from non-Rust peers.

use serde::{Deserialize, Serialize};

use crate::board::{Board, Move, Side};
use crate::rules::GameType;

/// A single protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Envelope {
    /// Guest introduces itself after the channel opens
    Join { player_name: String },
    /// Host acknowledges the guest
    Welcome { host_name: String },
    /// Guest asks the host to start a match
    RequestStartGame {
        game_type: GameType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<Side>,
    },
    /// Host announces the match; the guest adopts it verbatim
    StartGame {
        game_type: GameType,
        your_color: Side,
        pieces: Board,
        current_turn: Side,
        opponent_name: String,
    },
    Move {
        #[serde(rename = "move")]
        mv: Move,
    },
    ReturnRoom,
    /// The side giving up
    Surrender { color: Side },
    /// Keepalive, never surfaced past the transport
    Ping,
}

impl Envelope {
    /// Wire tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Welcome { .. } => "welcome",
            Self::RequestStartGame { .. } => "request_start_game",
            Self::StartGame { .. } => "start_game",
            Self::Move { .. } => "move",
            Self::ReturnRoom => "return_room",
            Self::Surrender { .. } => "surrender",
            Self::Ping => "ping",
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Ping)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Serialize an envelope to a text frame.
pub fn encode(envelope: &Envelope) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(envelope)?)
}

/// Parse a text frame. Unknown `type` tags and missing fields are errors.
pub fn decode(frame: &str) -> Result<Envelope, ProtocolError> {
    Ok(serde_json::from_str(frame)?)
}
