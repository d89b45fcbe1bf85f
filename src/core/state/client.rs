// src/core/state/client.rs

//! Contains the connection entity: one record per client session, built from
//! the fields a transport hands over plus server-side defaults.

use crate::core::RoomHubError;
use crate::core::id::{self, ConnectionId};
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use parking_lot::{Mutex, MutexGuard};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use strum_macros::EnumString;

/// An opaque handle to the transport object behind a connection.
///
/// The transport owns it; the entity only keeps a reference so the transport
/// can find its own state again (see [`Connection::raw_connection`]).
pub type RawConnection = Arc<dyn Any + Send + Sync>;

/// The kind of transport a connection arrived on.
///
/// Parsing is case-insensitive and never fails: unknown names become `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TransportKind {
    Web,
    Tcp,
    WebSocket,
    #[strum(default)]
    Other(String),
}

impl TransportKind {
    pub fn as_str(&self) -> &str {
        match self {
            TransportKind::Web => "web",
            TransportKind::Tcp => "tcp",
            TransportKind::WebSocket => "websocket",
            TransportKind::Other(name) => name,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw fields a transport supplies when it accepts a client link.
///
/// Every field is required; they are optional here only so that a missing one
/// can be reported by name instead of being a compile error at the call site.
#[derive(Debug, Clone, Default)]
pub struct ConnectionData {
    pub kind: Option<TransportKind>,
    pub remote_port: Option<u16>,
    pub remote_ip: Option<IpAddr>,
    pub raw_connection: Option<RawConnection>,
}

impl ConnectionData {
    pub fn new(
        kind: TransportKind,
        remote_port: u16,
        remote_ip: IpAddr,
        raw_connection: RawConnection,
    ) -> Self {
        Self {
            kind: Some(kind),
            remote_port: Some(remote_port),
            remote_ip: Some(remote_ip),
            raw_connection: Some(raw_connection),
        }
    }
}

/// The mutable, per-session part of a connection.
///
/// Only the task that drives the connection's request cycle writes here.
#[derive(Debug)]
pub struct SessionSlots {
    /// The last error raised while serving this connection.
    pub error: Option<RoomHubError>,
    pub params: Map<String, Value>,
    pub response: Map<String, Value>,
    pub pending_actions: usize,
    pub total_actions: u64,
    pub message_count: u64,
    pub additional_listening_rooms: IndexSet<String>,
    pub room_match_key: Option<String>,
    pub room_match_value: Option<String>,
    /// The primary room.
    pub room: String,
    /// Set when the transport let go of the client but the connection is kept
    /// for a grace period.
    pub released_at: Option<Instant>,
}

impl SessionSlots {
    fn new(default_room: &str) -> Self {
        Self {
            error: None,
            params: Map::new(),
            response: Map::new(),
            pending_actions: 0,
            total_actions: 0,
            message_count: 0,
            additional_listening_rooms: IndexSet::new(),
            room_match_key: None,
            room_match_value: None,
            room: default_room.to_string(),
            released_at: None,
        }
    }
}

/// One client session.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    kind: TransportKind,
    remote_port: u16,
    remote_ip: IpAddr,
    raw_connection: RawConnection,
    connected_at: DateTime<Utc>,
    slots: Mutex<SessionSlots>,
    destroyed: AtomicBool,
}

impl Connection {
    /// Builds a connection from transport data.
    ///
    /// Fields are checked in the order type, remote port, remote IP, raw
    /// connection; the first missing one is reported. Nothing is registered
    /// here, so a failure has no side effects.
    pub fn new(data: ConnectionData, default_room: &str) -> Result<Self, RoomHubError> {
        let kind = data.kind.ok_or(RoomHubError::MissingField("type"))?;
        let remote_port = data
            .remote_port
            .ok_or(RoomHubError::MissingField("remotePort"))?;
        let remote_ip = data
            .remote_ip
            .ok_or(RoomHubError::MissingField("remoteIP"))?;
        let raw_connection = data
            .raw_connection
            .ok_or(RoomHubError::MissingField("rawConnection"))?;

        Ok(Self {
            id: id::generate(),
            kind,
            remote_port,
            remote_ip,
            raw_connection,
            connected_at: Utc::now(),
            slots: Mutex::new(SessionSlots::new(default_room)),
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn kind(&self) -> &TransportKind {
        &self.kind
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    pub fn remote_ip(&self) -> IpAddr {
        self.remote_ip
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn raw_handle(&self) -> &RawConnection {
        &self.raw_connection
    }

    /// Returns the transport object behind this connection if it is a `T`.
    pub fn raw_connection<T: Any + Send + Sync>(&self) -> Option<&T> {
        (*self.raw_connection).downcast_ref::<T>()
    }

    /// Locks the mutable session state.
    ///
    /// The guard must not be held across an `.await`.
    pub fn slots(&self) -> MutexGuard<'_, SessionSlots> {
        self.slots.lock()
    }

    pub fn room(&self) -> String {
        self.slots.lock().room.clone()
    }

    pub fn set_room(&self, room: impl Into<String>) {
        self.slots.lock().room = room.into();
    }

    /// The `(room_match_key, room_match_value)` filter the room coordinator
    /// checks on join.
    pub fn room_match(&self) -> (Option<String>, Option<String>) {
        let slots = self.slots.lock();
        (slots.room_match_key.clone(), slots.room_match_value.clone())
    }

    pub fn set_room_match(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut slots = self.slots.lock();
        slots.room_match_key = Some(key.into());
        slots.room_match_value = Some(value.into());
    }

    /// Adds a room beyond the primary one. Returns false if already listening.
    pub fn listen_to_room(&self, room: impl Into<String>) -> bool {
        self.slots
            .lock()
            .additional_listening_rooms
            .insert(room.into())
    }

    pub fn stop_listening(&self, room: &str) -> bool {
        self.slots
            .lock()
            .additional_listening_rooms
            .shift_remove(room)
    }

    pub fn additional_rooms(&self) -> Vec<String> {
        self.slots
            .lock()
            .additional_listening_rooms
            .iter()
            .cloned()
            .collect()
    }

    /// Claims an action slot, bounded by `limit` concurrent actions.
    pub fn begin_action(&self, limit: usize) -> Result<(), RoomHubError> {
        let mut slots = self.slots.lock();
        if slots.pending_actions >= limit {
            let err = RoomHubError::TooManyPendingActions { limit };
            slots.error = Some(err.clone());
            return Err(err);
        }
        slots.pending_actions += 1;
        slots.total_actions += 1;
        Ok(())
    }

    pub fn end_action(&self) {
        let mut slots = self.slots.lock();
        slots.pending_actions = slots.pending_actions.saturating_sub(1);
    }

    pub fn pending_actions(&self) -> usize {
        self.slots.lock().pending_actions
    }

    pub fn total_actions(&self) -> u64 {
        self.slots.lock().total_actions
    }

    /// Counts one message routed to or through this connection.
    pub fn record_message(&self) -> u64 {
        let mut slots = self.slots.lock();
        slots.message_count += 1;
        slots.message_count
    }

    pub fn message_count(&self) -> u64 {
        self.slots.lock().message_count
    }

    pub fn record_error(&self, err: RoomHubError) {
        self.slots.lock().error = Some(err);
    }

    pub fn error(&self) -> Option<RoomHubError> {
        self.slots.lock().error.clone()
    }

    /// Clears the per-request working state ahead of the next request cycle.
    pub fn reset_request_state(&self) {
        let mut slots = self.slots.lock();
        slots.error = None;
        slots.params.clear();
        slots.response.clear();
    }

    pub(crate) fn mark_released(&self, at: Instant) {
        self.slots.lock().released_at = Some(at);
    }

    /// Clears the released mark, e.g. when a polling client comes back.
    /// Returns false once destruction has begun.
    pub(crate) fn reactivate(&self) -> bool {
        let mut slots = self.slots.lock();
        if self.is_destroyed() {
            return false;
        }
        slots.released_at = None;
        true
    }

    /// Claims a released connection for destruction if its grace period
    /// ended at or before `now`.
    ///
    /// The check and the claim happen under the slot lock, so a concurrent
    /// [`Connection::reactivate`] either wins and keeps the connection or
    /// observes it as destroyed. A deadline past the end of `Instant` never
    /// expires.
    pub(crate) fn claim_expired(&self, ttl: Duration, now: Instant) -> bool {
        let slots = self.slots.lock();
        let expired = slots
            .released_at
            .and_then(|at| at.checked_add(ttl))
            .is_some_and(|deadline| deadline <= now);
        expired && self.set_destroyed()
    }

    pub fn released_at(&self) -> Option<Instant> {
        self.slots.lock().released_at
    }

    /// Flags the connection as being destroyed. Returns true only for the
    /// first caller.
    pub(crate) fn mark_destroyed(&self) -> bool {
        let _slots = self.slots.lock();
        self.set_destroyed()
    }

    // Callers hold the slot lock.
    fn set_destroyed(&self) -> bool {
        !self.destroyed.swap(true, Ordering::AcqRel)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}
