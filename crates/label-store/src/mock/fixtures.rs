//! Helper functions for building bare objects in mock implementations and tests

use std::collections::BTreeMap;

use crds::{NamespaceLabel, NamespaceLabelSpec};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ObjectMeta;

fn to_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A namespace carrying `labels`, with no server-populated metadata.
pub fn namespace(name: &str, labels: &[(&str, &str)]) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: if labels.is_empty() { None } else { Some(to_map(labels)) },
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A `NamespaceLabel` in `namespace` requesting `labels`.
pub fn namespace_label(namespace: &str, name: &str, labels: &[(&str, &str)]) -> NamespaceLabel {
    let mut nl = NamespaceLabel::new(name, NamespaceLabelSpec { labels: to_map(labels) });
    nl.metadata.namespace = Some(namespace.to_string());
    nl
}
