// src/core/rooms/mod.rs

//! Room membership.
//! The connection core only registers and deregisters members; rosters,
//! authorization, and broadcasting belong to the coordinator behind
//! [`RoomMembership`].

use crate::core::RoomHubError;
use crate::core::state::Connection;
use async_trait::async_trait;

pub mod manager;

pub use manager::RoomManager;

/// The two hooks the connection lifecycle needs from a room coordinator.
///
/// Implementations must synchronize internally; they may be called
/// concurrently for different connections, but never concurrently for the
/// same one. They must keep only the connection id, never the entity itself.
#[async_trait]
pub trait RoomMembership: Send + Sync + std::fmt::Debug {
    /// Adds `conn` to its primary room.
    ///
    /// `Ok(false)` means the coordinator declined without an error (for
    /// example, the connection was already a member). An `Err` is a rejection
    /// or failure; neither is fatal to the connection.
    async fn room_add_member(&self, conn: &Connection) -> Result<bool, RoomHubError>;

    /// Removes `conn` from every roster that lists it.
    ///
    /// Must return `Ok(false)` for a connection that was never added.
    async fn room_remove_member(&self, conn: &Connection) -> Result<bool, RoomHubError>;
}
