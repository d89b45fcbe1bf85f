// src/server/mod.rs

use crate::config::Config;
use crate::core::state::ServerState;
use anyhow::{Result, anyhow};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod spawner;

use context::ServerContext;

/// A fully initialized server that has bound its listener but not yet started
/// accepting connections.
pub struct Server {
    ctx: ServerContext,
}

impl Server {
    /// Initializes server state and binds the configured host and port.
    pub async fn bind(config: Config) -> Result<Self> {
        let ctx = initialization::setup(config).await?;
        Ok(Self { ctx })
    }

    /// Initializes server state around an already bound listener.
    pub fn from_listener(config: Config, listener: TcpListener) -> Self {
        Self {
            ctx: initialization::setup_with_listener(config, listener),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.ctx.listener.local_addr()
    }

    pub fn state(&self) -> Arc<ServerState> {
        self.ctx.state.clone()
    }

    /// Spawns the background tasks and serves clients until `shutdown` resolves.
    pub async fn serve<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        spawner::spawn_all(&mut self.ctx)?;
        connection_loop::run(self.ctx, shutdown).await;
        Ok(())
    }
}

/// The main server startup function: binds, serves, and stops on SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))?;

    let server = Server::bind(config).await?;
    server
        .serve(async move {
            tokio::select! {
                _ = sigint.recv() => info!("SIGINT received."),
                _ = sigterm.recv() => info!("SIGTERM received."),
            }
        })
        .await
}
