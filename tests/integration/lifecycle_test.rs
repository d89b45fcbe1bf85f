// tests/integration/lifecycle_test.rs

//! Construction and destruction of connections against a recording room coordinator.

use super::test_helpers::*;
use roomhub::connection::ConnectionGuard;
use roomhub::core::state::{ConnectionData, TransportKind};
use roomhub::core::{JoinOutcome, RoomHubError};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_construct_registers_connection_with_defaults() {
    let ctx = TestContext::new();
    let (conn, outcome) = ctx.state.connections.construct(tcp_data(5000)).await.unwrap();

    assert_eq!(outcome, JoinOutcome::Joined);
    assert_eq!(conn.kind(), &TransportKind::Tcp);
    assert_eq!(conn.remote_port(), 5000);
    assert_eq!(conn.remote_ip(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(conn.room(), "defaultRoom");
    assert_eq!(conn.pending_actions(), 0);
    assert_eq!(conn.total_actions(), 0);
    assert_eq!(conn.message_count(), 0);
    assert!(conn.error().is_none());

    let found = ctx.registry().get(conn.id()).expect("connection should be registered");
    assert!(Arc::ptr_eq(&found, &conn));
    assert_eq!(ctx.registry().size(), 1);
}

#[tokio::test]
async fn test_construct_joins_after_registration() {
    let ctx = TestContext::new();
    let conn = ctx.construct(tcp_data(5000)).await;
    assert_eq!(ctx.rooms.calls(), vec![RoomCall::Add(conn.id().clone())]);
}

#[tokio::test]
async fn test_construct_missing_field_leaves_registry_untouched() {
    let ctx = TestContext::new();
    ctx.construct(tcp_data(4000)).await;
    let calls_before = ctx.rooms.calls().len();

    let cases: Vec<(ConnectionData, &'static str)> = vec![
        (
            ConnectionData {
                kind: None,
                ..tcp_data(5000)
            },
            "type",
        ),
        (
            ConnectionData {
                remote_port: None,
                ..tcp_data(5000)
            },
            "remotePort",
        ),
        (
            ConnectionData {
                remote_ip: None,
                ..tcp_data(5000)
            },
            "remoteIP",
        ),
        (
            ConnectionData {
                raw_connection: None,
                ..tcp_data(5000)
            },
            "rawConnection",
        ),
    ];

    for (data, field) in cases {
        let err = ctx.state.connections.construct(data).await.unwrap_err();
        assert_eq!(err, RoomHubError::MissingField(field));
        assert_eq!(ctx.registry().size(), 1, "registry changed for missing {field}");
    }
    assert_eq!(ctx.rooms.calls().len(), calls_before);
}

#[tokio::test]
async fn test_web_without_ttl_skips_join_and_destroys_immediately() {
    let ctx = TestContext::with_web_ttl(None);
    let (conn, outcome) = ctx.state.connections.construct(web_data(443)).await.unwrap();

    assert_eq!(outcome, JoinOutcome::Skipped);
    assert!(ctx.registry().contains(conn.id()));

    ctx.state.connections.destroy(&conn).await;
    assert!(!ctx.registry().contains(conn.id()));
    assert!(ctx.rooms.calls().is_empty());
}

#[tokio::test]
async fn test_web_with_zero_ttl_behaves_as_unset() {
    let ctx = TestContext::with_web_ttl(Some(Duration::ZERO));
    let (conn, outcome) = ctx.state.connections.construct(web_data(443)).await.unwrap();
    assert_eq!(outcome, JoinOutcome::Skipped);

    ctx.state.connections.destroy(&conn).await;
    assert_eq!(ctx.registry().size(), 0);
    assert!(ctx.rooms.calls().is_empty());
}

#[tokio::test]
async fn test_web_with_ttl_joins_and_removes_from_rooms_first() {
    let ctx = TestContext::with_web_ttl(Some(Duration::from_secs(60)));
    let (conn, outcome) = ctx.state.connections.construct(web_data(443)).await.unwrap();
    assert_eq!(outcome, JoinOutcome::Joined);

    ctx.state.connections.destroy(&conn).await;
    assert_eq!(ctx.rooms.remove_calls(), 1);
    assert_eq!(ctx.rooms.registered_during_remove(), vec![true]);
    assert!(!ctx.registry().contains(conn.id()));
}

#[tokio::test]
async fn test_tcp_destroy_removes_from_rooms_before_registry() {
    let ctx = TestContext::new();
    let conn = ctx.construct(tcp_data(5000)).await;

    ctx.state.connections.destroy(&conn).await;

    assert_eq!(
        ctx.rooms.calls(),
        vec![
            RoomCall::Add(conn.id().clone()),
            RoomCall::Remove(conn.id().clone())
        ]
    );
    assert_eq!(ctx.rooms.registered_during_remove(), vec![true]);
    assert!(!ctx.registry().contains(conn.id()));
    assert!(conn.is_destroyed());
}

#[tokio::test]
async fn test_other_transport_kinds_use_room_removal() {
    let ctx = TestContext::new();
    let ws = ctx.construct(data(TransportKind::WebSocket, 80, [10, 0, 0, 3])).await;
    let custom = ctx
        .construct(data(TransportKind::Other("udp".into()), 81, [10, 0, 0, 4]))
        .await;

    ctx.state.connections.destroy(&ws).await;
    ctx.state.connections.destroy(&custom).await;

    assert_eq!(ctx.rooms.add_calls(), 2);
    assert_eq!(ctx.rooms.remove_calls(), 2);
    assert!(ctx.registry().is_empty());
}

#[tokio::test]
async fn test_destroy_twice_is_a_noop() {
    let ctx = TestContext::new();
    let keep = ctx.construct(tcp_data(4000)).await;
    let conn = ctx.construct(tcp_data(5000)).await;

    ctx.state.connections.destroy(&conn).await;
    assert_eq!(ctx.registry().size(), 1);

    ctx.state.connections.destroy(&conn).await;
    assert_eq!(ctx.registry().size(), 1);
    assert_eq!(ctx.rooms.remove_calls(), 1);
    assert!(ctx.registry().contains(keep.id()));
}

#[tokio::test]
async fn test_concurrent_destroy_issues_one_room_removal() {
    let ctx = TestContext::new();
    ctx.rooms.set_remove_delay(Duration::from_millis(50));
    let conn = ctx.construct(tcp_data(5000)).await;

    let connections = ctx.state.connections.clone();
    tokio::join!(connections.destroy(&conn), connections.destroy(&conn));

    assert_eq!(ctx.rooms.remove_calls(), 1);
    assert!(ctx.registry().is_empty());
}

#[tokio::test]
async fn test_join_failure_is_not_fatal() {
    let ctx = TestContext::new();
    ctx.rooms.fail_add.store(true, Ordering::SeqCst);

    let (conn, outcome) = ctx.state.connections.construct(tcp_data(5000)).await.unwrap();

    assert!(matches!(outcome, JoinOutcome::Failed(RoomHubError::RoomJoinRejected { .. })));
    assert!(!outcome.joined());
    assert!(ctx.registry().contains(conn.id()));
    assert!(matches!(
        conn.error(),
        Some(RoomHubError::RoomJoinRejected { .. })
    ));
}

#[tokio::test]
async fn test_declined_join_is_reported() {
    let ctx = TestContext::new();
    ctx.rooms.decline_add.store(true, Ordering::SeqCst);

    let (conn, outcome) = ctx.state.connections.construct(tcp_data(5000)).await.unwrap();
    assert_eq!(outcome, JoinOutcome::Declined);
    assert!(ctx.registry().contains(conn.id()));
    assert!(conn.error().is_none());
}

#[tokio::test]
async fn test_room_removal_failure_still_unregisters() {
    let ctx = TestContext::new();
    ctx.rooms.fail_remove.store(true, Ordering::SeqCst);
    let conn = ctx.construct(tcp_data(5000)).await;

    ctx.state.connections.destroy(&conn).await;

    assert!(!ctx.registry().contains(conn.id()));
    assert_eq!(
        conn.error(),
        Some(RoomHubError::RoomRemoval("test failure".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_room_removal_times_out_and_unregisters() {
    let ctx = TestContext::new();
    ctx.rooms.set_remove_delay(Duration::from_secs(3600));
    let conn = ctx.construct(tcp_data(5000)).await;

    ctx.state.connections.destroy(&conn).await;

    assert!(!ctx.registry().contains(conn.id()));
    assert!(matches!(conn.error(), Some(RoomHubError::RoomRemoval(_))));
}

#[tokio::test]
async fn test_slow_room_removal_does_not_block_other_connections() {
    let ctx = TestContext::new();
    ctx.rooms.set_remove_delay(Duration::from_millis(200));
    let slow = ctx.construct(tcp_data(5000)).await;

    let connections = ctx.state.connections.clone();
    let slow_clone = slow.clone();
    let destroying = tokio::spawn(async move { connections.destroy(&slow_clone).await });

    assert!(wait_until(Duration::from_secs(1), || ctx.rooms.removes_in_flight() == 1).await);

    // Registry operations for other connections proceed while the removal is pending.
    let other = ctx.construct(tcp_data(5001)).await;
    assert!(ctx.registry().contains(other.id()));
    assert!(ctx.registry().contains(slow.id()));

    destroying.await.unwrap();
    assert!(!ctx.registry().contains(slow.id()));
    assert!(ctx.registry().contains(other.id()));
}

#[tokio::test]
async fn test_expire_by_id() {
    let ctx = TestContext::new();
    let conn = ctx.construct(tcp_data(5000)).await;

    assert!(ctx.state.connections.expire(conn.id()).await);
    assert!(!ctx.registry().contains(conn.id()));
    assert!(!ctx.state.connections.expire(conn.id()).await);
    assert_eq!(ctx.rooms.remove_calls(), 1);
}

#[tokio::test]
async fn test_destroy_all_empties_registry() {
    let ctx = TestContext::with_web_ttl(Some(Duration::from_secs(60)));
    for port in 0..5 {
        ctx.construct(tcp_data(port)).await;
        ctx.construct(web_data(port)).await;
    }
    assert_eq!(ctx.registry().size(), 10);

    let destroyed = ctx.state.connections.destroy_all().await;
    assert_eq!(destroyed, 10);
    assert!(ctx.registry().is_empty());
    assert_eq!(ctx.rooms.remove_calls(), 10);
}

#[tokio::test]
async fn test_concurrent_constructions_get_distinct_ids() {
    let ctx = TestContext::new();
    let mut handles = Vec::new();
    for port in 0..64u16 {
        let connections = ctx.state.connections.clone();
        handles.push(tokio::spawn(async move {
            let (conn, _) = connections.construct(tcp_data(port)).await.unwrap();
            conn.id().clone()
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        assert!(ids.insert(handle.await.unwrap()));
    }
    assert_eq!(ctx.registry().size(), 64);
}

#[test]
fn test_guard_dropped_outside_runtime_purges_connection() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = TestContext::new();
    let conn = rt.block_on(ctx.construct(tcp_data(5000)));

    drop(ConnectionGuard::new(ctx.state.connections.clone(), conn.clone()));

    assert!(!ctx.registry().contains(conn.id()));
    assert!(conn.is_destroyed());
    assert_eq!(ctx.rooms.remove_calls(), 0);

    // Later destruction attempts are no-ops.
    rt.block_on(ctx.state.connections.destroy(&conn));
    assert_eq!(ctx.rooms.remove_calls(), 0);
}

#[tokio::test]
async fn test_purge_is_idempotent_and_skips_rooms() {
    let ctx = TestContext::new();
    let keep = ctx.construct(tcp_data(4000)).await;
    let conn = ctx.construct(tcp_data(5000)).await;

    assert!(ctx.state.connections.purge(&conn));
    assert!(!ctx.state.connections.purge(&conn));
    assert!(!ctx.state.connections.expire(conn.id()).await);

    assert_eq!(ctx.registry().size(), 1);
    assert!(ctx.registry().contains(keep.id()));
    assert_eq!(ctx.rooms.remove_calls(), 0);
}

#[tokio::test]
async fn test_guard_drop_inside_runtime_releases_connection() {
    let ctx = TestContext::new();
    let conn = ctx.construct(tcp_data(5000)).await;

    drop(ConnectionGuard::new(ctx.state.connections.clone(), conn.clone()));

    let registry = ctx.registry().clone();
    let id = conn.id().clone();
    assert!(wait_until(Duration::from_secs(1), || !registry.contains(&id)).await);
    assert_eq!(ctx.rooms.remove_calls(), 1);
}
