//! Integration tests for the label store
//!
//! The mock tests pin down the store contract the reconciler relies on.
//! The live test requires a cluster with the NamespaceLabel CRD installed and
//! a kubeconfig pointing at it.

use std::collections::BTreeMap;

use kube::ResourceExt;
use label_store::{KubeLabelStore, LabelStoreTrait, MockLabelStore, StoreError, StoreEvent, StoreOp};

fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_stale_namespace_write_conflicts() {
    let store = MockLabelStore::new();
    store.create_namespace("team-a", &[("env", "dev")]);

    let read = store.get_namespace("team-a").await.unwrap();
    store.edit_namespace("team-a", |ns| {
        ns.metadata.labels.get_or_insert_with(BTreeMap::new).insert("owner".to_string(), "ops".to_string());
    });

    let mut stale = read.clone();
    stale.metadata.labels = Some(map(&[("env", "prod")]));
    let err = store.update_namespace(&stale).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(store.namespace_labels("team-a"), map(&[("env", "dev"), ("owner", "ops")]));
}

#[tokio::test]
async fn test_unchanged_write_is_noop() {
    let store = MockLabelStore::new();
    store.create_namespace("team-a", &[("env", "dev")]);
    store.clear_events();

    let ns = store.get_namespace("team-a").await.unwrap();
    let written = store.update_namespace(&ns).await.unwrap();

    assert_eq!(written.metadata.resource_version, ns.metadata.resource_version);
    assert_eq!(store.pending_events(), 0);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_effective_write_emits_event() {
    let store = MockLabelStore::new();
    store.create_namespace("team-a", &[]);
    store.clear_events();

    let mut ns = store.get_namespace("team-a").await.unwrap();
    ns.metadata.labels = Some(map(&[("env", "dev")]));
    let written = store.update_namespace(&ns).await.unwrap();

    assert_ne!(written.metadata.resource_version, ns.metadata.resource_version);
    assert_eq!(store.pop_event(), Some(StoreEvent::Namespace { name: "team-a".to_string() }));
    assert_eq!(store.namespace_writes().len(), 1);
}

#[tokio::test]
async fn test_deletion_waits_for_finalizer() {
    let store = MockLabelStore::new();
    store.create_namespace("team-a", &[]);
    store.create_namespace_label("team-a", "nl", &[("a", "1")]);

    let mut nl = store.get_namespace_label("team-a", "nl").await.unwrap();
    assert!(nl.add_finalizer());
    store.update_namespace_label(&nl).await.unwrap();

    store.request_deletion("team-a", "nl");
    let mut nl = store.get_namespace_label("team-a", "nl").await.unwrap();
    assert!(nl.is_deleting());

    assert!(nl.remove_finalizer());
    store.update_namespace_label(&nl).await.unwrap();
    let err = store.get_namespace_label("team-a", "nl").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_deletion_without_finalizer_is_immediate() {
    let store = MockLabelStore::new();
    store.create_namespace_label("team-a", "nl", &[]);
    store.request_deletion("team-a", "nl");
    assert!(store.namespace_label("team-a", "nl").is_none());
}

#[tokio::test]
async fn test_last_applied_round_trip() {
    let store = MockLabelStore::new();
    store.create_namespace_label("team-a", "nl", &[("a", "1")]);

    let nl = store.get_namespace_label("team-a", "nl").await.unwrap();
    let updated = store.update_last_applied(&nl, &map(&[("a", "1")])).await.unwrap();
    assert_eq!(updated.last_applied_labels(), map(&[("a", "1")]));

    // Status writes do not touch the spec or the finalizers
    assert_eq!(updated.desired_labels(), nl.desired_labels());
    assert_eq!(updated.finalizers(), nl.finalizers());

    // Second write from the stale copy conflicts
    let err = store.update_last_applied(&nl, &map(&[])).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_list_is_scoped_to_namespace() {
    let store = MockLabelStore::new();
    store.create_namespace_label("team-a", "one", &[]);
    store.create_namespace_label("team-a", "two", &[]);
    store.create_namespace_label("team-b", "three", &[]);

    let mut names: Vec<String> = store
        .list_namespace_labels("team-a")
        .await
        .unwrap()
        .iter()
        .map(|nl| nl.name_any())
        .collect();
    names.sort();
    assert_eq!(names, vec!["one".to_string(), "two".to_string()]);
}

#[tokio::test]
async fn test_injected_failure_applies_once() {
    let store = MockLabelStore::new();
    store.create_namespace("team-a", &[]);
    store.fail_next(StoreOp::GetNamespace, StoreError::Unavailable("apiserver down".to_string()));

    assert_eq!(
        store.get_namespace("team-a").await.unwrap_err(),
        StoreError::Unavailable("apiserver down".to_string())
    );
    assert!(store.get_namespace("team-a").await.is_ok());
    assert_eq!(store.call_count(StoreOp::GetNamespace), 2);
}

#[tokio::test]
#[ignore] // Requires a cluster with the NamespaceLabel CRD installed
async fn test_live_cluster_read_paths() {
    let namespace = std::env::var("NAMESPACE_LABEL_TEST_NAMESPACE")
        .unwrap_or_else(|_| "default".to_string());

    let client = kube::Client::try_default().await.expect("Failed to create client");
    let store = KubeLabelStore::new(client);

    let ns = store.get_namespace(&namespace).await.expect("Failed to get namespace");
    assert_eq!(ns.name_any(), namespace);

    let requests = store.list_namespace_labels(&namespace).await
        .expect("Failed to list NamespaceLabels");
    println!("Found {} NamespaceLabels in {}", requests.len(), namespace);

    let missing = store.get_namespace("namespace-label-test-does-not-exist").await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}
