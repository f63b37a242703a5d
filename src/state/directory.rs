//! Room directory.
//!
//! In-memory listing of open rooms so players can find each other without
//! sharing names out of band. Entries expire after a fixed retention
//! window; registering a name that is already listed replaces the entry.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rules::GameType;

/// How long an entry stays listed, in seconds.
pub const ROOM_RETENTION_SECS: i64 = 2 * 60 * 60;

/// A listed room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedRoom {
    /// Rendezvous identifier
    pub id: String,

    /// Human readable name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_type: Option<GameType>,

    pub created_at: DateTime<Utc>,
}

/// Request action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryAction {
    Register,
    Unregister,
}

/// A register/unregister request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRequest {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub game_type: Option<GameType>,

    #[serde(rename = "type")]
    pub action: DirectoryAction,
}

impl DirectoryRequest {
    pub fn register(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            game_type: None,
            action: DirectoryAction::Register,
        }
    }

    pub fn unregister(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
            game_type: None,
            action: DirectoryAction::Unregister,
        }
    }

    /// Parse a request body. Unknown `type` values are rejected.
    pub fn from_json(body: &str) -> Result<Self, DirectoryError> {
        serde_json::from_str(body).map_err(|e| DirectoryError::Malformed(e.to_string()))
    }
}

/// Directory errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("malformed request: {0}")]
    Malformed(String),
}

/// Room directory - tracks all listed rooms.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    /// Rooms by id
    rooms: HashMap<String, ListedRoom>,

    /// Name to id mapping
    name_index: HashMap<String, String>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// List a room, replacing any entry with the same name.
    pub fn register(&mut self, room: ListedRoom) {
        if let Some(previous) = self.name_index.remove(&room.name) {
            self.rooms.remove(&previous);
        }
        if let Some(stale) = self.rooms.remove(&room.id) {
            self.name_index.remove(&stale.name);
        }

        debug!(room_id = %room.id, name = %room.name, "Room listed");
        self.name_index.insert(room.name.clone(), room.id.clone());
        self.rooms.insert(room.id.clone(), room);
    }

    /// Remove a room by id.
    pub fn unregister(&mut self, id: &str) -> Option<ListedRoom> {
        let room = self.rooms.remove(id)?;
        self.name_index.remove(&room.name);
        debug!(room_id = %id, "Room unlisted");
        Some(room)
    }

    /// Drop entries past retention at `now`, returning the removed ids.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let retention = Duration::seconds(ROOM_RETENTION_SECS);
        let expired: Vec<String> = self
            .rooms
            .values()
            .filter(|r| now - r.created_at >= retention)
            .map(|r| r.id.clone())
            .collect();

        for id in &expired {
            self.unregister(id);
        }

        expired
    }

    /// Live entries at `now`, oldest first.
    pub fn list_at(&mut self, now: DateTime<Utc>) -> Vec<ListedRoom> {
        self.expire(now);
        let mut rooms: Vec<ListedRoom> = self.rooms.values().cloned().collect();
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        rooms
    }

    pub fn list(&mut self) -> Vec<ListedRoom> {
        self.list_at(Utc::now())
    }

    /// Handle a request received at `now`.
    pub fn apply_at(
        &mut self,
        request: DirectoryRequest,
        now: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        let id = request
            .id
            .filter(|id| !id.is_empty())
            .ok_or(DirectoryError::MissingField("id"))?;

        match request.action {
            DirectoryAction::Register => {
                let name = request
                    .name
                    .filter(|name| !name.is_empty())
                    .ok_or(DirectoryError::MissingField("name"))?;
                self.register(ListedRoom {
                    id,
                    name,
                    game_type: request.game_type,
                    created_at: now,
                });
            }
            DirectoryAction::Unregister => {
                self.unregister(&id);
            }
        }

        Ok(())
    }

    pub fn apply(&mut self, request: DirectoryRequest) -> Result<(), DirectoryError> {
        self.apply_at(request, Utc::now())
    }

    pub fn get(&self, id: &str) -> Option<&ListedRoom> {
        self.rooms.get(id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ListedRoom> {
        self.name_index.get(name).and_then(|id| self.rooms.get(id))
    }

    pub fn count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap()
    }

    #[test]
    fn test_register_and_list() {
        let mut directory = RoomDirectory::new();
        directory
            .apply_at(DirectoryRequest::register("versus-board-v1-a", "A"), t0())
            .unwrap();
        directory
            .apply_at(
                DirectoryRequest::register("versus-board-v1-b", "B"),
                t0() + Duration::minutes(1),
            )
            .unwrap();

        let listed = directory.list_at(t0() + Duration::minutes(5));
        let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["versus-board-v1-a", "versus-board-v1-b"]);
    }

    #[test]
    fn test_register_same_name_replaces() {
        let mut directory = RoomDirectory::new();
        directory
            .apply_at(DirectoryRequest::register("old-id", "Friday"), t0())
            .unwrap();
        directory
            .apply_at(DirectoryRequest::register("new-id", "Friday"), t0())
            .unwrap();

        assert_eq!(directory.count(), 1);
        assert_eq!(directory.get_by_name("Friday").unwrap().id, "new-id");
        assert!(directory.get("old-id").is_none());
    }

    #[test]
    fn test_unregister() {
        let mut directory = RoomDirectory::new();
        directory
            .apply_at(DirectoryRequest::register("a", "A"), t0())
            .unwrap();
        directory
            .apply_at(DirectoryRequest::unregister("a"), t0())
            .unwrap();

        assert_eq!(directory.count(), 0);
        assert!(directory.get_by_name("A").is_none());
    }

    #[test]
    fn test_entries_expire_after_retention() {
        let mut directory = RoomDirectory::new();
        directory
            .apply_at(DirectoryRequest::register("a", "A"), t0())
            .unwrap();
        directory
            .apply_at(
                DirectoryRequest::register("b", "B"),
                t0() + Duration::hours(1),
            )
            .unwrap();

        let listed = directory.list_at(t0() + Duration::hours(2));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "b");
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut directory = RoomDirectory::new();

        let no_name = DirectoryRequest::from_json(r#"{"id":"a","type":"register"}"#).unwrap();
        assert_eq!(
            directory.apply(no_name),
            Err(DirectoryError::MissingField("name"))
        );

        let no_id = DirectoryRequest::from_json(r#"{"type":"unregister"}"#).unwrap();
        assert_eq!(
            directory.apply(no_id),
            Err(DirectoryError::MissingField("id"))
        );

        assert!(matches!(
            DirectoryRequest::from_json(r#"{"id":"a","type":"rename"}"#),
            Err(DirectoryError::Malformed(_))
        ));
        assert_eq!(directory.count(), 0);
    }
}
