// src/connection/mod.rs

//! The reference TCP transport: serves one client link per task and hands the
//! link to the connection lifecycle.

mod guard;
mod handler;

pub use guard::ConnectionGuard;
pub use handler::{ConnectionHandler, TcpLink};
