// src/core/mod.rs

//! The central module containing the connection lifecycle and room membership logic.

pub mod errors;
pub mod id;
pub mod lifecycle;
pub mod metrics;
pub mod policy;
pub mod rooms;
pub mod state;
pub mod tasks;

pub use errors::RoomHubError;
pub use id::ConnectionId;
pub use lifecycle::{Connections, JoinOutcome};
