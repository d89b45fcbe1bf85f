// src/core/metrics.rs

//! Defines and registers Prometheus metrics for connection monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, TextEncoder, register_counter, register_gauge};

lazy_static! {
    /// The number of connections currently present in the registry.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("roomhub_connected_clients", "Number of currently registered connections.").unwrap();

    /// The total number of connection entities constructed since startup.
    pub static ref CONNECTIONS_CREATED_TOTAL: Counter =
        register_counter!("roomhub_connections_created_total", "Total number of connections constructed.").unwrap();
    /// The total number of connection entities removed from the registry since startup.
    pub static ref CONNECTIONS_DESTROYED_TOTAL: Counter =
        register_counter!("roomhub_connections_destroyed_total", "Total number of connections destroyed.").unwrap();
    /// Default-room joins that were rejected or failed.
    pub static ref ROOM_JOIN_FAILURES_TOTAL: Counter =
        register_counter!("roomhub_room_join_failures_total", "Total number of failed default-room joins.").unwrap();
    /// Room removals that failed or timed out during destruction.
    pub static ref ROOM_REMOVAL_FAILURES_TOTAL: Counter =
        register_counter!("roomhub_room_removal_failures_total", "Total number of failed room removals.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
