// src/connection/handler.rs

//! Defines the `ConnectionHandler`, a line-oriented TCP transport that hands
//! its client links to the connection lifecycle.

use super::guard::ConnectionGuard;
use crate::core::RoomHubError;
use crate::core::state::{Connection, ConnectionData, ServerState, TransportKind};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

/// The longest line a TCP client may send.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// The transport object stored as the raw connection of every TCP client.
///
/// It is owned by the transport; the connection entity only references it.
#[derive(Debug)]
pub struct TcpLink {
    pub peer: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl TcpLink {
    /// Asks the handler serving this link to close it.
    pub fn disconnect(&self) -> bool {
        self.shutdown_tx.send(()).is_ok()
    }
}

/// The next step for the connection's main loop to take.
enum NextAction {
    Continue,
    ExitLoop,
}

/// Serves one TCP client from accept to disconnect.
pub struct ConnectionHandler {
    framed: Framed<TcpStream, LinesCodec>,
    addr: SocketAddr,
    state: Arc<ServerState>,
    global_shutdown_rx: broadcast::Receiver<()>,
}

impl ConnectionHandler {
    pub fn new(
        socket: TcpStream,
        addr: SocketAddr,
        state: Arc<ServerState>,
        global_shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            framed: Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            addr,
            state,
            global_shutdown_rx,
        }
    }

    /// The main event loop for the connection.
    pub async fn run(&mut self) -> Result<(), RoomHubError> {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let link = Arc::new(TcpLink {
            peer: self.addr,
            shutdown_tx,
        });
        let data = ConnectionData::new(TransportKind::Tcp, self.addr.port(), self.addr.ip(), link);

        let (conn, outcome) = self.state.connections.construct(data).await?;
        let _guard = ConnectionGuard::new(self.state.connections.clone(), conn.clone());
        debug!(
            "Connection {} for {} constructed (join: {:?}).",
            conn.id(),
            self.addr,
            outcome
        );

        let action_limit = self.state.config.general.simultaneous_actions;
        let welcome = self.state.config.general.welcome_message.clone();
        self.framed.send(welcome).await?;
        self.framed.send(format!("id {}", conn.id())).await?;

        loop {
            tokio::select! {
                biased;
                _ = self.global_shutdown_rx.recv() => {
                    info!("Connection handler for {} received GLOBAL shutdown signal.", self.addr);
                    let _ = self.framed.send("Server is shutting down".to_string()).await;
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Connection handler for {} received kill signal.", self.addr);
                    break;
                }
                result = self.framed.next() => {
                    match result {
                        Some(Ok(line)) => {
                            conn.record_message();
                            self.state.stats.increment_total_messages();
                            conn.reset_request_state();
                            if let Err(e) = conn.begin_action(action_limit) {
                                self.framed.send(e.to_string()).await?;
                                continue;
                            }
                            let result = self.process_line(&conn, line.trim()).await;
                            conn.end_action();
                            match result {
                                Ok(NextAction::Continue) => {}
                                Ok(NextAction::ExitLoop) => break,
                                Err(e) => {
                                    conn.record_error(e.clone());
                                    return Err(e);
                                }
                            }
                        }
                        Some(Err(e)) => {
                            warn!("Connection error for {}: {}", self.addr, e);
                            break;
                        }
                        None => {
                            debug!("Connection from {} closed by peer.", self.addr);
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn process_line(
        &mut self,
        conn: &Connection,
        line: &str,
    ) -> Result<NextAction, RoomHubError> {
        let reply = match line.to_ascii_lowercase().as_str() {
            "" => return Ok(NextAction::Continue),
            "quit" | "exit" | "close" => {
                self.framed.send("Bye!".to_string()).await?;
                return Ok(NextAction::ExitLoop);
            }
            "id" => conn.id().to_string(),
            "room" => conn.room(),
            "messages" => conn.message_count().to_string(),
            "actions" => conn.total_actions().to_string(),
            other => format!("unknown command '{other}'"),
        };
        self.framed.send(reply).await?;
        Ok(NextAction::Continue)
    }
}
