// src/server/connection_loop.rs

//! Contains the main server loop for accepting connections and handling graceful shutdown.

use super::context::ServerContext;
use crate::connection::ConnectionHandler;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// The main server loop. Accepts connections until `shutdown` resolves or a
/// background task dies, then tears everything down.
pub async fn run<F>(mut ctx: ServerContext, shutdown: F)
where
    F: Future<Output = ()> + Send,
{
    let mut client_tasks = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown requested, initiating graceful shutdown.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        let permit = match ctx.connection_permits.clone().try_acquire_owned() {
                            Ok(permit) => permit,
                            Err(_) => {
                                warn!("Rejecting connection from {}: max_clients reached.", addr);
                                drop(socket);
                                continue;
                            }
                        };
                        info!("Accepted new connection from: {}", addr);
                        ctx.state.stats.increment_total_connections();

                        let state_clone = ctx.state.clone();
                        let global_shutdown_rx = ctx.shutdown_tx.subscribe();
                        client_tasks.spawn(async move {
                            let _permit = permit;
                            let mut handler = ConnectionHandler::new(socket, addr, state_clone, global_shutdown_rx);
                            if let Err(e) = handler.run().await {
                                warn!("Connection from {} terminated unexpectedly: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A client handler panicked: {e:?}");
                }
            },
        }
    }

    info!("Shutting down. Sending signal to all tasks.");
    if ctx.shutdown_tx.send(()).is_err() {
        warn!("No task was listening for the shutdown signal.");
    }

    if tokio::time::timeout(Duration::from_secs(5), async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for client handlers; aborting the rest.");
        client_tasks.shutdown().await;
    }
    info!("All client connections closed.");

    let purged = ctx.state.connections.destroy_all().await;
    if purged > 0 {
        info!("Destroyed {} connection(s) still registered at shutdown.", purged);
    }

    info!("Waiting for background tasks to finish...");
    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    };
    info!(
        "Server shutdown complete. Served {} connection(s) and {} message(s).",
        ctx.state.stats.get_total_connections(),
        ctx.state.stats.get_total_messages()
    );
}
