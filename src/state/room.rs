//! Room state.
//!
//! A room is the two-seat container a match is played in. The host opens
//! it, the guest takes the second seat, and it survives across matches
//! until either side tears the session down.

use chrono::{DateTime, Utc};

use crate::rules::GameType;

/// Which end of the link this peer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Claimed the room identifier
    Host,
    /// Dialed the host
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Guest => "guest",
        }
    }
}

/// A peer seated in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMember {
    /// Display name
    pub name: String,

    pub role: Role,

    /// When the member took the seat
    pub joined_at: DateTime<Utc>,
}

impl RoomMember {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            joined_at: Utc::now(),
        }
    }
}

/// Room state as seen from the local peer.
#[derive(Debug, Clone)]
pub struct Room {
    /// Name as typed by the user
    pub name: String,

    /// Rendezvous identifier derived from the name
    pub id: String,

    /// The local peer's seat
    pub local: RoomMember,

    /// The other seat, once filled
    opponent: Option<RoomMember>,

    /// Game chosen for the next match
    pub selected_game: Option<GameType>,

    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(name: impl Into<String>, id: impl Into<String>, local: RoomMember) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            local,
            opponent: None,
            selected_game: None,
            created_at: Utc::now(),
        }
    }

    /// Fill the second seat.
    pub fn seat_opponent(&mut self, member: RoomMember) -> Result<(), RoomError> {
        if member.role == self.local.role {
            return Err(RoomError::SameRole(member.role));
        }
        if let Some(current) = &self.opponent {
            if current.name != member.name {
                return Err(RoomError::Full);
            }
        }
        self.opponent = Some(member);
        Ok(())
    }

    /// Free the second seat.
    pub fn vacate_opponent(&mut self) -> Option<RoomMember> {
        self.opponent.take()
    }

    pub fn opponent(&self) -> Option<&RoomMember> {
        self.opponent.as_ref()
    }

    pub fn is_full(&self) -> bool {
        self.opponent.is_some()
    }

    pub fn is_host(&self) -> bool {
        self.local.role == Role::Host
    }

    pub fn role(&self) -> Role {
        self.local.role
    }

    /// Convert to JSON for display.
    pub fn to_json(&self) -> serde_json::Value {
        let member = |m: &RoomMember| {
            serde_json::json!({
                "name": m.name,
                "role": m.role.as_str(),
                "joined_at": m.joined_at.to_rfc3339(),
            })
        };

        serde_json::json!({
            "room_id": self.id,
            "room_name": self.name,
            "local": member(&self.local),
            "opponent": self.opponent.as_ref().map(member),
            "selected_game": self.selected_game.map(|g| g.as_str()),
            "created_at": self.created_at.to_rfc3339(),
        })
    }
}

/// Room errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room is full")]
    Full,
    #[error("both seats cannot be {}", .0.as_str())]
    SameRole(Role),
}
