// src/core/tasks/reaper.rs

//! A background task that destroys released web connections once their grace
//! period has run out.

use crate::core::state::ServerState;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub struct ConnectionReaperTask {
    state: Arc<ServerState>,
}

impl ConnectionReaperTask {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    /// The main run loop for the reaper task.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let Some(ttl) = self.state.connections.settings().web_ttl else {
            info!("Connection reaper idle: web clients have no TTL.");
            let _ = shutdown_rx.recv().await;
            return;
        };

        info!("Connection reaper task started (web TTL {:?}).", ttl);
        let mut interval = tokio::time::interval(self.state.config.reaper.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.perform_reap_cycle().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Connection reaper task shutting down.");
                    return;
                }
            }
        }
    }

    /// Runs one sweep over the registry and returns how many connections it destroyed.
    pub async fn perform_reap_cycle(&self) -> usize {
        let reaped = self
            .state
            .connections
            .reap_expired(Instant::now())
            .await;
        if reaped > 0 {
            debug!("Reaped {} expired web connection(s).", reaped);
        }
        reaped
    }
}
