// src/core/state/mod.rs

//! Defines the central `ServerState` struct and the connection state it owns.

mod client;
mod core;
mod registry;
mod stats;

pub use client::*;
pub use core::ServerState;
pub use registry::ConnectionRegistry;
pub use stats::StatsState;
