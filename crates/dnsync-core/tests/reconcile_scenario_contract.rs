//! Contract Test: End-to-End Reconciliation
//!
//! Verifies a full pass from sources to store calls.
//!
//! Constraints verified:
//! - Only the difference between desired and actual is applied
//! - Records identical on both sides are never touched
//! - Source failures abort the run before any target is contacted
//! - Concurrent execution reaches the same end state as sequential

mod common;

use common::*;
use dnsync_core::engine::Operation;
use dnsync_core::{Alias, Binding, Error, FixedIpClient, Reconciler};
use std::sync::Arc;

#[tokio::test]
async fn only_differences_are_applied() {
    let store = Arc::new(
        MockRecordStore::new("primary")
            .with_bindings(&[("h1.home.arpa", "1.1.1.1"), ("h3.home.arpa", "3.3.3.3")]),
    );

    let (reconciler, _events) = Reconciler::new(
        Box::new(StaticFixedIpSource::from_pairs(&[("h1", "1.1.1.1"), ("h2", "2.2.2.2")])),
        Box::new(StaticAliasSource::new(&[])),
        vec![as_target(&store)],
        naming(),
        &engine_config(1),
    )
    .expect("reconciler construction succeeds");

    let report = reconciler.run().await.expect("desired state builds");

    assert!(report.all_converged());
    assert_eq!(
        store.mutations(),
        vec![
            Operation::CreateBinding(Binding::new("h2.home.arpa", "2.2.2.2")),
            Operation::DeleteBinding(Binding::new("h3.home.arpa", "3.3.3.3")),
        ]
    );
    assert!(
        store
            .mutations()
            .iter()
            .all(|op| !op.to_string().contains("h1.home.arpa")),
        "h1 is already correct and must not be touched"
    );
    assert_eq!(
        store.records().bindings,
        binding_set(&[("h1.home.arpa", "1.1.1.1"), ("h2.home.arpa", "2.2.2.2")])
    );
}

#[tokio::test]
async fn clients_and_domains_become_records() {
    let store = Arc::new(
        MockRecordStore::new("primary").with_aliases(&[("old.example.com", "edge.home.arpa")]),
    );

    let clients = vec![
        FixedIpClient::new("Bob's PC", "10.0.0.5", true),
        FixedIpClient::new("Guest Phone", "10.0.0.77", false),
    ];

    let (reconciler, _events) = Reconciler::new(
        Box::new(StaticFixedIpSource::new(clients)),
        Box::new(StaticAliasSource::new(&["app.example.com", "other.net"])),
        vec![as_target(&store)],
        naming(),
        &engine_config(1),
    )
    .unwrap();

    reconciler.run().await.unwrap();

    let records = store.records();
    assert_eq!(
        records.bindings,
        binding_set(&[("bob-s-pc.home.arpa", "10.0.0.5")])
    );
    assert_eq!(
        records.aliases.into_iter().collect::<Vec<_>>(),
        vec![Alias::new("app.example.com", "edge.home.arpa")]
    );
}

#[tokio::test]
async fn fixed_ip_source_failure_touches_no_target() {
    let store = Arc::new(MockRecordStore::new("primary"));

    let (reconciler, _events) = Reconciler::new(
        Box::new(StaticFixedIpSource::failing()),
        Box::new(StaticAliasSource::new(&["app.example.com"])),
        vec![as_target(&store)],
        naming(),
        &engine_config(1),
    )
    .unwrap();

    let err = reconciler.run().await.unwrap_err();

    assert!(matches!(err, Error::SourceFetch { .. }));
    assert!(store.calls().is_empty(), "no target may be contacted");
}

#[tokio::test]
async fn alias_source_failure_is_reported_as_source_error() {
    let store = Arc::new(MockRecordStore::new("primary"));

    let (reconciler, _events) = Reconciler::new(
        Box::new(StaticFixedIpSource::from_pairs(&[("nas", "10.0.0.5")])),
        Box::new(StaticAliasSource::failing()),
        vec![as_target(&store)],
        naming(),
        &engine_config(1),
    )
    .unwrap();

    let err = reconciler.run().await.unwrap_err();

    match err {
        Error::SourceFetch { source_name, .. } => assert_eq!(source_name, "static-alias"),
        other => panic!("expected SourceFetch, got {other:?}"),
    }
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn concurrent_targets_reach_the_same_state() {
    let stores: Vec<Arc<MockRecordStore>> = (0..4)
        .map(|i| {
            Arc::new(
                MockRecordStore::new(&format!("pihole-{i}"))
                    .with_bindings(&[("stale.home.arpa", "10.0.0.99")]),
            )
        })
        .collect();

    let (reconciler, _events) = Reconciler::new(
        Box::new(StaticFixedIpSource::from_pairs(&[("nas", "10.0.0.5")])),
        Box::new(StaticAliasSource::new(&["app.example.com"])),
        stores.iter().map(as_target).collect(),
        naming(),
        &engine_config(2),
    )
    .unwrap();

    let report = reconciler.run().await.unwrap();

    assert!(report.all_converged());
    let names: Vec<_> = report.targets.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(names, vec!["pihole-0", "pihole-1", "pihole-2", "pihole-3"]);

    for store in &stores {
        assert_eq!(
            store.mutations(),
            vec![
                Operation::CreateBinding(Binding::new("nas.home.arpa", "10.0.0.5")),
                Operation::DeleteBinding(Binding::new("stale.home.arpa", "10.0.0.99")),
                Operation::CreateAlias(Alias::new("app.example.com", "edge.home.arpa")),
            ]
        );
    }
}

#[tokio::test]
async fn reconciler_requires_targets() {
    let result = Reconciler::new(
        Box::new(StaticFixedIpSource::from_pairs(&[])),
        Box::new(StaticAliasSource::new(&[])),
        Vec::new(),
        naming(),
        &engine_config(1),
    );
    assert!(result.is_err());
}
