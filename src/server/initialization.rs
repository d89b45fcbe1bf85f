// src/server/initialization.rs

//! Builds the server state and binds the listener.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::state::ServerState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Initializes all server components and binds the configured address.
pub async fn setup(config: Config) -> Result<ServerContext> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    Ok(setup_with_listener(config, listener))
}

/// Initializes all server components around an already bound listener.
pub fn setup_with_listener(config: Config, listener: TcpListener) -> ServerContext {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let connection_permits = Arc::new(Semaphore::new(config.max_clients));
    let state = ServerState::initialize(config);
    info!("Server state initialized.");

    match listener.local_addr() {
        Ok(addr) => info!("RoomHub server listening on {}", addr),
        Err(e) => warn!("Listener bound, but its local address is unknown: {}", e),
    }

    ServerContext {
        state,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        connection_permits,
    }
}

fn log_startup_info(config: &Config) {
    info!(
        "Default room '{}', {} starting room(s), up to {} simultaneous actions per connection.",
        config.general.default_room,
        config.general.starting_rooms.len(),
        config.general.simultaneous_actions
    );
    match config.web.ttl() {
        Some(ttl) => info!("Web clients are kept for {:?} after they disconnect.", ttl),
        None => info!("Web clients are one-shot: no TTL is configured."),
    }
}
