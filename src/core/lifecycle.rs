// src/core/lifecycle.rs

//! Construction and destruction of connection entities.
//!
//! `Connections` ties the registry, the room coordinator, and the transport
//! policy together. Transports call [`Connections::construct`] when they
//! accept a client link and [`Connections::release`] (or
//! [`Connections::destroy`]) when it goes away.

use crate::config::Config;
use crate::core::RoomHubError;
use crate::core::id::ConnectionId;
use crate::core::metrics;
use crate::core::policy::{self, DestroyMode, JoinDecision};
use crate::core::rooms::RoomMembership;
use crate::core::state::{Connection, ConnectionData, ConnectionRegistry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long destruction waits on the room coordinator before dropping the
/// registry entry anyway.
pub const ROOM_REMOVAL_TIMEOUT: Duration = Duration::from_secs(5);

/// What happened to the default-room join during construction.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Joined,
    /// The coordinator answered without error but did not add the member.
    Declined,
    /// The transport policy says this connection does not join rooms.
    Skipped,
    /// The coordinator rejected or failed the join. The connection stays
    /// registered without room membership.
    Failed(RoomHubError),
}

impl JoinOutcome {
    pub fn joined(&self) -> bool {
        matches!(self, JoinOutcome::Joined)
    }
}

/// The settings the lifecycle reads from configuration.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub default_room: String,
    /// The effective web TTL; `None` when unset or zero.
    pub web_ttl: Option<Duration>,
    pub room_removal_timeout: Duration,
}

impl LifecycleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_room: config.general.default_room.clone(),
            web_ttl: config.web.ttl(),
            room_removal_timeout: ROOM_REMOVAL_TIMEOUT,
        }
    }
}

/// The connection lifecycle service shared by every transport task.
#[derive(Debug)]
pub struct Connections {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<dyn RoomMembership>,
    settings: LifecycleSettings,
}

impl Connections {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<dyn RoomMembership>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            registry,
            rooms,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn rooms(&self) -> &Arc<dyn RoomMembership> {
        &self.rooms
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Builds a connection from transport data, registers it, and tries to
    /// put it in its default room.
    ///
    /// Only a missing field makes this fail, and in that case the registry is
    /// left untouched. Room errors come back inside the [`JoinOutcome`] and
    /// are also recorded in the connection's error slot.
    pub async fn construct(
        &self,
        data: ConnectionData,
    ) -> Result<(Arc<Connection>, JoinOutcome), RoomHubError> {
        let conn = Arc::new(Connection::new(data, &self.settings.default_room)?);

        if let Some(previous) = self.registry.insert(conn.clone()) {
            // Ids are unique, so this only happens if an entity is re-registered.
            warn!(
                "Connection {} was already registered; skipping the default-room join.",
                previous.id()
            );
            return Ok((conn, JoinOutcome::Skipped));
        }
        metrics::CONNECTIONS_CREATED_TOTAL.inc();
        metrics::CONNECTED_CLIENTS.inc();
        debug!(
            "Registered {} connection {} from {}:{}",
            conn.kind(),
            conn.id(),
            conn.remote_ip(),
            conn.remote_port()
        );

        let outcome = match policy::join_on_connect(conn.kind(), self.settings.web_ttl) {
            JoinDecision::Skip => JoinOutcome::Skipped,
            JoinDecision::Join => match self.rooms.room_add_member(&conn).await {
                Ok(true) => JoinOutcome::Joined,
                Ok(false) => JoinOutcome::Declined,
                Err(e) => {
                    warn!(
                        "Connection {} could not join room '{}': {}",
                        conn.id(),
                        conn.room(),
                        e
                    );
                    metrics::ROOM_JOIN_FAILURES_TOTAL.inc();
                    conn.record_error(e.clone());
                    JoinOutcome::Failed(e)
                }
            },
        };

        Ok((conn, outcome))
    }

    /// Destroys a connection. Never fails from the caller's point of view.
    ///
    /// Web connections without a TTL are dropped from the registry directly.
    /// Everything else is first removed from its rooms; the registry entry is
    /// dropped once that call returns, errors, or times out. A second call on
    /// the same connection does nothing.
    pub async fn destroy(&self, conn: &Arc<Connection>) {
        if !conn.mark_destroyed() {
            debug!("Connection {} is already being destroyed.", conn.id());
            return;
        }
        self.teardown(conn).await;
    }

    // The caller has already won `mark_destroyed` (or `claim_expired`).
    async fn teardown(&self, conn: &Arc<Connection>) {
        if !self.registry.holds(conn) {
            debug!("Connection {} is not registered; nothing to destroy.", conn.id());
            return;
        }

        let mode = policy::destroy_mode(conn.kind(), self.settings.web_ttl);
        if mode == DestroyMode::AfterRoomRemoval {
            let removal = tokio::time::timeout(
                self.settings.room_removal_timeout,
                self.rooms.room_remove_member(conn),
            )
            .await
            .unwrap_or_else(|_| {
                Err(RoomHubError::RoomRemoval(format!(
                    "timed out after {:?}",
                    self.settings.room_removal_timeout
                )))
            });
            match removal {
                Ok(was_removed) => debug!(
                    "Room removal for connection {} finished (removed: {}).",
                    conn.id(),
                    was_removed
                ),
                Err(e) => {
                    warn!("Room removal for connection {} failed: {}", conn.id(), e);
                    metrics::ROOM_REMOVAL_FAILURES_TOTAL.inc();
                    conn.record_error(e);
                }
            }
        }

        if self.unregister(conn) {
            debug!("Connection {} destroyed ({}).", conn.id(), mode);
        }
    }

    fn unregister(&self, conn: &Arc<Connection>) -> bool {
        let removed = self.registry.remove_entity(conn);
        if removed {
            metrics::CONNECTIONS_DESTROYED_TOTAL.inc();
            metrics::CONNECTED_CLIENTS.dec();
        }
        removed
    }

    /// Drops the registry entry without asking the room coordinator.
    ///
    /// For callers that cannot await, such as a guard dropped outside a
    /// runtime. Rosters may keep the stale id afterwards. Returns false if the
    /// connection was already being destroyed or was not registered.
    pub fn purge(&self, conn: &Arc<Connection>) -> bool {
        if !conn.mark_destroyed() {
            return false;
        }
        let removed = self.unregister(conn);
        if removed {
            warn!(
                "Connection {} purged without room removal; rosters may still list it.",
                conn.id()
            );
        }
        removed
    }

    /// Runs [`Connections::destroy`] on a separate task.
    pub fn spawn_destroy(self: &Arc<Self>, conn: Arc<Connection>) {
        let connections = self.clone();
        tokio::spawn(async move {
            connections.destroy(&conn).await;
        });
    }

    /// Called by a transport when the client link goes away.
    ///
    /// Connections with a grace period stay registered (and in their rooms)
    /// until they are touched again, expired, or reaped. All others are
    /// destroyed now.
    pub async fn release(&self, conn: &Arc<Connection>) {
        match policy::grace_period(conn.kind(), self.settings.web_ttl) {
            Some(ttl) => {
                conn.mark_released(Instant::now());
                debug!("Connection {} released; kept for {:?}.", conn.id(), ttl);
            }
            None => self.destroy(conn).await,
        }
    }

    /// Marks a released connection as in use again. Returns false if the
    /// connection is no longer registered.
    pub fn touch(&self, conn: &Arc<Connection>) -> bool {
        self.registry.holds(conn) && conn.reactivate()
    }

    /// Destroys the connection registered under `id`, if any.
    pub async fn expire(&self, id: &ConnectionId) -> bool {
        match self.registry.get(id) {
            Some(conn) => {
                self.destroy(&conn).await;
                true
            }
            None => false,
        }
    }

    /// Destroys every released connection whose grace period ended at or
    /// before `now`. Returns how many were destroyed.
    pub async fn reap_expired(&self, now: Instant) -> usize {
        let mut reaped = 0;
        for conn in self.registry.snapshot() {
            let Some(ttl) = policy::grace_period(conn.kind(), self.settings.web_ttl) else {
                continue;
            };
            if conn.claim_expired(ttl, now) {
                self.teardown(&conn).await;
                reaped += 1;
            }
        }
        reaped
    }

    /// Destroys every registered connection. Used at shutdown.
    pub async fn destroy_all(&self) -> usize {
        let remaining = self.registry.snapshot();
        let count = remaining.len();
        for conn in remaining {
            self.destroy(&conn).await;
        }
        count
    }
}
