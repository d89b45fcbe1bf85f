// src/core/tasks/mod.rs

//! Long-running background tasks that support the connection lifecycle.

pub mod reaper;
