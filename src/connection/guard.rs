// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard that releases a connection when
//! its transport task exits.

use crate::core::Connections;
use crate::core::state::Connection;
use std::sync::Arc;
use tracing::{debug, warn};

/// Releases the connection back to the lifecycle when dropped, however the
/// handler's scope is exited (clean close, error, or cancellation).
pub struct ConnectionGuard {
    connections: Arc<Connections>,
    conn: Option<Arc<Connection>>,
}

impl ConnectionGuard {
    pub fn new(connections: Arc<Connections>, conn: Arc<Connection>) -> Self {
        Self {
            connections,
            conn: Some(conn),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        debug!("ConnectionGuard dropping, releasing connection {}", conn.id());

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let connections = self.connections.clone();
                handle.spawn(async move {
                    connections.release(&conn).await;
                });
            }
            Err(_) => {
                warn!(
                    "No runtime available to release connection {}; purging it directly.",
                    conn.id()
                );
                self.connections.purge(&conn);
            }
        }
    }
}
