// src/core/errors.rs

//! Defines the primary error type for the connection and room core.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all failures the core can report.
#[derive(Error, Debug)]
pub enum RoomHubError {
    /// A transport handed over connection data without one of the required fields.
    #[error("{0} is required to create a new connection object")]
    MissingField(&'static str),

    #[error("room '{0}' does not exist")]
    RoomNotFound(String),

    #[error("not authorized to join room '{room}': {reason}")]
    RoomJoinRejected { room: String, reason: String },

    #[error("Room removal failed: {0}")]
    RoomRemoval(String),

    #[error("too many pending actions for this connection (limit {limit})")]
    TooManyPendingActions { limit: usize },

    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for RoomHubError {
    fn clone(&self) -> Self {
        match self {
            RoomHubError::MissingField(f) => RoomHubError::MissingField(f),
            RoomHubError::RoomNotFound(r) => RoomHubError::RoomNotFound(r.clone()),
            RoomHubError::RoomJoinRejected { room, reason } => RoomHubError::RoomJoinRejected {
                room: room.clone(),
                reason: reason.clone(),
            },
            RoomHubError::RoomRemoval(s) => RoomHubError::RoomRemoval(s.clone()),
            RoomHubError::TooManyPendingActions { limit } => {
                RoomHubError::TooManyPendingActions { limit: *limit }
            }
            RoomHubError::Io(e) => RoomHubError::Io(Arc::clone(e)),
            RoomHubError::Internal(s) => RoomHubError::Internal(s.clone()),
        }
    }
}

impl PartialEq for RoomHubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RoomHubError::MissingField(a), RoomHubError::MissingField(b)) => a == b,
            (RoomHubError::RoomNotFound(a), RoomHubError::RoomNotFound(b)) => a == b,
            (
                RoomHubError::RoomJoinRejected { room: r1, reason: s1 },
                RoomHubError::RoomJoinRejected { room: r2, reason: s2 },
            ) => r1 == r2 && s1 == s2,
            (RoomHubError::RoomRemoval(a), RoomHubError::RoomRemoval(b)) => a == b,
            (
                RoomHubError::TooManyPendingActions { limit: a },
                RoomHubError::TooManyPendingActions { limit: b },
            ) => a == b,
            (RoomHubError::Io(e1), RoomHubError::Io(e2)) => e1.to_string() == e2.to_string(),
            (RoomHubError::Internal(a), RoomHubError::Internal(b)) => a == b,
            _ => false,
        }
    }
}

impl From<std::io::Error> for RoomHubError {
    fn from(e: std::io::Error) -> Self {
        RoomHubError::Io(Arc::new(e))
    }
}

impl From<tokio_util::codec::LinesCodecError> for RoomHubError {
    fn from(e: tokio_util::codec::LinesCodecError) -> Self {
        match e {
            tokio_util::codec::LinesCodecError::Io(io) => io.into(),
            other => RoomHubError::Internal(other.to_string()),
        }
    }
}
