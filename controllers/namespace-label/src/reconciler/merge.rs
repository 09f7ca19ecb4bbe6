//! Label merge engine.
//!
//! Computes what a single request wants changed on its namespace, with no
//! knowledge of other requests. Arbitration narrows the result afterwards.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::core::v1::Namespace;

/// Labels to write and label keys to delete on a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelDelta {
    /// Keys to set, with the value to set them to
    pub to_add: BTreeMap<String, String>,
    /// Keys to delete
    pub to_remove: BTreeSet<String>,
}

impl LabelDelta {
    /// Whether applying the delta would change nothing.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Diffs one request against the namespace.
///
/// - `to_add`: desired entries the namespace does not already hold with the
///   same value
/// - `to_remove`: keys in `last_applied` that are no longer desired and are
///   still on the namespace
pub fn merge(
    desired: &BTreeMap<String, String>,
    last_applied: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
) -> LabelDelta {
    let to_add = desired
        .iter()
        .filter(|(key, value)| current.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let to_remove = last_applied
        .keys()
        .filter(|key| !desired.contains_key(*key) && current.contains_key(*key))
        .cloned()
        .collect();

    LabelDelta { to_add, to_remove }
}

/// Applies `delta` to the namespace labels in place.
///
/// Returns `true` if the label set changed.
pub fn apply_label_delta(namespace: &mut Namespace, delta: &LabelDelta) -> bool {
    let labels = namespace.metadata.labels.get_or_insert_with(BTreeMap::new);
    let mut changed = false;

    for (key, value) in &delta.to_add {
        if labels.get(key) != Some(value) {
            labels.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    for key in &delta.to_remove {
        changed |= labels.remove(key).is_some();
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::labels;
    use label_store::mock::namespace;

    #[test]
    fn test_first_pass_adds_everything() {
        let delta = merge(&labels(&[("a", "1"), ("b", "2")]), &labels(&[]), &labels(&[]));
        assert_eq!(delta.to_add, labels(&[("a", "1"), ("b", "2")]));
        assert!(delta.to_remove.is_empty());
    }

    #[test]
    fn test_dropped_key_is_removed() {
        let delta = merge(
            &labels(&[("a", "1")]),
            &labels(&[("a", "1"), ("b", "2")]),
            &labels(&[("a", "1"), ("b", "2"), ("unmanaged", "x")]),
        );
        assert!(delta.to_add.is_empty());
        assert_eq!(delta.to_remove, BTreeSet::from(["b".to_string()]));
    }

    #[test]
    fn test_drifted_value_is_refreshed() {
        let delta = merge(
            &labels(&[("a", "1")]),
            &labels(&[("a", "1")]),
            &labels(&[("a", "edited")]),
        );
        assert_eq!(delta.to_add, labels(&[("a", "1")]));
    }

    #[test]
    fn test_converged_state_is_empty() {
        let desired = labels(&[("a", "1")]);
        let delta = merge(&desired, &desired, &labels(&[("a", "1"), ("other", "x")]));
        assert!(delta.is_empty());
    }

    #[test]
    fn test_removed_key_already_gone() {
        let delta = merge(&labels(&[]), &labels(&[("b", "2")]), &labels(&[]));
        assert!(delta.is_empty());
    }

    #[test]
    fn test_value_change_is_an_add() {
        let delta = merge(
            &labels(&[("a", "2")]),
            &labels(&[("a", "1")]),
            &labels(&[("a", "1")]),
        );
        assert_eq!(delta.to_add, labels(&[("a", "2")]));
        assert!(delta.to_remove.is_empty());
    }

    #[test]
    fn test_apply_label_delta_initialises_missing_map() {
        let mut ns = namespace("team-a", &[]);
        assert!(ns.metadata.labels.is_none());

        let delta = LabelDelta {
            to_add: labels(&[("a", "1")]),
            to_remove: BTreeSet::from(["missing".to_string()]),
        };
        assert!(apply_label_delta(&mut ns, &delta));
        assert_eq!(ns.metadata.labels, Some(labels(&[("a", "1")])));

        // Second application changes nothing
        assert!(!apply_label_delta(&mut ns, &delta));
    }

    #[test]
    fn test_apply_label_delta_removes() {
        let mut ns = namespace("team-a", &[("a", "1"), ("b", "2")]);
        let delta = LabelDelta {
            to_add: BTreeMap::new(),
            to_remove: BTreeSet::from(["b".to_string()]),
        };
        assert!(apply_label_delta(&mut ns, &delta));
        assert_eq!(ns.metadata.labels, Some(labels(&[("a", "1")])));
    }
}
