// src/core/policy.rs

//! Transport-aware rules for joining the default room and for what
//! destroying a connection means.
//!
//! | transport | web TTL      | join on connect | destroy                    | kept after disconnect |
//! |-----------|--------------|-----------------|----------------------------|-----------------------|
//! | `web`     | unset        | no              | registry only              | no                    |
//! | `web`     | zero         | no              | room removal, then registry| no                    |
//! | `web`     | set          | yes             | room removal, then registry| for the TTL           |
//! | any other | any          | yes             | room removal, then registry| no                    |
//!
//! Callers pass the effective TTL from `WebConfig::ttl`, which already maps a
//! zero TTL to unset.

use crate::core::state::TransportKind;
use std::time::Duration;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum JoinDecision {
    Join,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DestroyMode {
    /// Drop the registry entry without touching room rosters.
    Immediate,
    /// Ask the room coordinator to remove the member first, then drop the
    /// registry entry whatever the coordinator answered.
    AfterRoomRemoval,
}

/// Decides whether a freshly constructed connection joins its default room.
pub fn join_on_connect(kind: &TransportKind, web_ttl: Option<Duration>) -> JoinDecision {
    match kind {
        TransportKind::Web if web_ttl.is_none_or(|ttl| ttl.is_zero()) => JoinDecision::Skip,
        _ => JoinDecision::Join,
    }
}

/// Decides how a connection is torn down.
pub fn destroy_mode(kind: &TransportKind, web_ttl: Option<Duration>) -> DestroyMode {
    match kind {
        TransportKind::Web if web_ttl.is_none() => DestroyMode::Immediate,
        _ => DestroyMode::AfterRoomRemoval,
    }
}

/// How long a connection outlives its transport link, if at all.
pub fn grace_period(kind: &TransportKind, web_ttl: Option<Duration>) -> Option<Duration> {
    match kind {
        TransportKind::Web => web_ttl.filter(|ttl| !ttl.is_zero()),
        _ => None,
    }
}
