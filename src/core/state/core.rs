// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared server-wide state.

use super::registry::ConnectionRegistry;
use super::stats::StatsState;
use crate::config::Config;
use crate::core::lifecycle::{Connections, LifecycleSettings};
use crate::core::rooms::{RoomManager, RoomMembership};
use std::sync::Arc;
use tracing::info;

/// The central struct holding all shared, server-wide state.
/// This struct is wrapped in an `Arc` and handed to every transport task and
/// background task. Nothing here is reachable through a global.
#[derive(Debug)]
pub struct ServerState {
    /// The configuration, resolved once at startup.
    pub config: Arc<Config>,
    /// Construction and destruction of connections, and the registry behind them.
    pub connections: Arc<Connections>,
    /// Holds all server-wide statistics.
    pub stats: StatsState,
}

impl ServerState {
    /// Builds the state with the in-process [`RoomManager`] as coordinator,
    /// seeded with the configured starting rooms.
    pub fn initialize(config: Config) -> Arc<Self> {
        let rooms = Arc::new(RoomManager::from_config(&config.general));
        info!(
            "Created {} starting room(s); default room is '{}'.",
            rooms.room_names().len(),
            config.general.default_room
        );
        Self::with_rooms(config, rooms)
    }

    /// Builds the state around an arbitrary room coordinator.
    pub fn with_rooms(config: Config, rooms: Arc<dyn RoomMembership>) -> Arc<Self> {
        let settings = LifecycleSettings::from_config(&config);
        let registry = Arc::new(ConnectionRegistry::new());
        Arc::new(Self {
            config: Arc::new(config),
            connections: Arc::new(Connections::new(registry, rooms, settings)),
            stats: StatsState::new(),
        })
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.connections.registry()
    }
}
