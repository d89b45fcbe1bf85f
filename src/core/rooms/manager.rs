// src/core/rooms/manager.rs

//! An in-process room coordinator keeping a roster of connection ids per room.

use super::RoomMembership;
use crate::config::{GeneralConfig, RoomAuth};
use crate::core::RoomHubError;
use crate::core::id::ConnectionId;
use crate::core::state::Connection;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use indexmap::IndexSet;
use tracing::debug;

#[derive(Debug, Default)]
struct Room {
    auth: RoomAuth,
    members: IndexSet<ConnectionId>,
}

/// `RoomManager` owns every room roster. It uses `DashMap` so that joins and
/// leaves in different rooms do not contend.
#[derive(Debug, Default)]
pub struct RoomManager {
    rooms: DashMap<String, Room>,
}

impl RoomManager {
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates the rooms listed in `general.starting_rooms`.
    pub fn from_config(general: &GeneralConfig) -> Self {
        let manager = Self::new();
        for (name, auth) in &general.starting_rooms {
            manager.add_room(name, auth.clone());
        }
        manager
    }

    /// Creates a room. Returns false if it already exists.
    pub fn add_room(&self, name: &str, auth: RoomAuth) -> bool {
        match self.rooms.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Room {
                    auth,
                    members: IndexSet::new(),
                });
                debug!("Room '{}' created.", name);
                true
            }
        }
    }

    /// Deletes a room, returning the ids that were still in it.
    pub fn remove_room(&self, name: &str) -> Option<Vec<ConnectionId>> {
        self.rooms
            .remove(name)
            .map(|(_, room)| room.members.into_iter().collect())
    }

    pub fn room_exists(&self, name: &str) -> bool {
        self.rooms.contains_key(name)
    }

    pub fn room_names(&self) -> Vec<String> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }

    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|r| r.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, |r| r.members.len())
    }

    pub fn is_member(&self, room: &str, id: &ConnectionId) -> bool {
        self.rooms.get(room).is_some_and(|r| r.members.contains(id))
    }

    fn authorize(room_name: &str, auth: &RoomAuth, conn: &Connection) -> Result<(), RoomHubError> {
        let (Some(key), Some(value)) = (&auth.auth_key, &auth.auth_value) else {
            return Ok(());
        };
        match conn.room_match() {
            (Some(k), Some(v)) if &k == key && &v == value => Ok(()),
            _ => Err(RoomHubError::RoomJoinRejected {
                room: room_name.to_string(),
                reason: format!("requires {key}={value}"),
            }),
        }
    }
}

#[async_trait]
impl RoomMembership for RoomManager {
    async fn room_add_member(&self, conn: &Connection) -> Result<bool, RoomHubError> {
        let room_name = conn.room();
        let mut room = self
            .rooms
            .get_mut(&room_name)
            .ok_or_else(|| RoomHubError::RoomNotFound(room_name.clone()))?;
        Self::authorize(&room_name, &room.auth, conn)?;
        Ok(room.members.insert(conn.id().clone()))
    }

    async fn room_remove_member(&self, conn: &Connection) -> Result<bool, RoomHubError> {
        let mut removed = false;
        for mut room in self.rooms.iter_mut() {
            removed |= room.members.shift_remove(conn.id());
        }
        Ok(removed)
    }
}
