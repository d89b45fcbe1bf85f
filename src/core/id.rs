// src/core/id.rs

//! Generation of connection identifiers.

use std::fmt;
use uuid::Uuid;

/// An opaque, process-unique connection identifier.
///
/// Identifiers are random (UUID v4) strings, so two concurrent calls to
/// [`generate`] never hand out the same value and an id is never reused
/// while the process runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        ConnectionId(s.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        ConnectionId(s)
    }
}

/// Produces a fresh connection identifier.
///
/// Panics only if the OS entropy source is unavailable, which is treated as a
/// fatal condition for the whole process rather than a per-call error.
pub fn generate() -> ConnectionId {
    ConnectionId(Uuid::new_v4().to_string())
}
