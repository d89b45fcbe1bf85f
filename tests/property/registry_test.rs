// tests/property/registry_test.rs

//! Property-based tests for the connection registry
//! Tests that the registry agrees with a simple model after any operation mix

use proptest::prelude::*;
use roomhub::core::state::{Connection, ConnectionData, ConnectionRegistry, TransportKind};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Insert,
    Remove(usize),
    Reinsert(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Insert),
        2 => any::<usize>().prop_map(Op::Remove),
        1 => any::<usize>().prop_map(Op::Reinsert),
    ]
}

fn new_conn() -> Arc<Connection> {
    let data = ConnectionData::new(
        TransportKind::Tcp,
        1,
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        Arc::new(()),
    );
    Arc::new(Connection::new(data, "defaultRoom").unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 500,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_registry_matches_model(ops in prop::collection::vec(op_strategy(), 1..=100)) {
        let registry = ConnectionRegistry::new();
        let mut created: Vec<Arc<Connection>> = Vec::new();
        let mut live = HashSet::new();

        for op in ops {
            match op {
                Op::Insert => {
                    let conn = new_conn();
                    prop_assert!(registry.insert(conn.clone()).is_none());
                    live.insert(conn.id().clone());
                    created.push(conn);
                }
                Op::Remove(i) if !created.is_empty() => {
                    let conn = &created[i % created.len()];
                    let was_live = live.remove(conn.id());
                    prop_assert_eq!(registry.remove(conn.id()).is_some(), was_live);
                }
                Op::Reinsert(i) if !created.is_empty() => {
                    let conn = created[i % created.len()].clone();
                    let was_live = !live.insert(conn.id().clone());
                    prop_assert_eq!(registry.insert(conn).is_some(), was_live);
                }
                _ => {}
            }

            prop_assert_eq!(registry.size(), live.len());
        }

        for conn in &created {
            prop_assert_eq!(registry.contains(conn.id()), live.contains(conn.id()));
        }
    }

    #[test]
    fn test_ids_never_repeat(count in 1usize..=500) {
        let ids: HashSet<_> = (0..count).map(|_| new_conn().id().clone()).collect();
        prop_assert_eq!(ids.len(), count);
    }
}
