//! Multi-source arbitration.
//!
//! When several requests in one namespace ask for the same key, the oldest
//! active request owns it. Age is `(creationTimestamp, name)`, which gives a
//! total order even for requests created in the same second. Requests being
//! deleted never own anything.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};

use crds::NamespaceLabel;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

use super::merge::LabelDelta;

/// Sorts requests oldest first.
pub fn sort_by_priority<R: Borrow<NamespaceLabel>>(requests: &mut [R]) {
    requests.sort_by(|a, b| priority_key(a.borrow()).cmp(&priority_key(b.borrow())));
}

fn priority_key(request: &NamespaceLabel) -> (Option<&Time>, Option<&str>) {
    (
        request.metadata.creation_timestamp.as_ref(),
        request.metadata.name.as_deref(),
    )
}

/// Active requests of one namespace in priority order.
#[derive(Debug, Default)]
pub struct Claims<'a> {
    claimants: Vec<(&'a str, &'a BTreeMap<String, String>)>,
}

/// A delta narrowed down to what one request may actually do.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Changes this request is entitled to make
    pub delta: LabelDelta,
    /// Keys this request retracts but another active request still wants;
    /// they stay on the namespace for the next owner to claim
    pub handoff: BTreeSet<String>,
}

impl<'a> Claims<'a> {
    /// Builds the claim table, skipping requests that are being deleted.
    pub fn new(requests: impl IntoIterator<Item = &'a NamespaceLabel>) -> Self {
        let mut active: Vec<&NamespaceLabel> = requests
            .into_iter()
            .filter(|r| !r.is_deleting())
            .collect();
        sort_by_priority(&mut active);

        let claimants = active
            .into_iter()
            .filter_map(|r| Some((r.metadata.name.as_deref()?, r.desired_labels())))
            .collect();
        Self { claimants }
    }

    /// Name of the request owning `key`, if any active request wants it.
    pub fn owner_of(&self, key: &str) -> Option<&'a str> {
        self.claimants
            .iter()
            .find(|(_, desired)| desired.contains_key(key))
            .map(|(name, _)| *name)
    }

    /// Whether an active request other than `name` wants `key`.
    pub fn wanted_by_other(&self, key: &str, name: &str) -> bool {
        self.claimants
            .iter()
            .any(|(other, desired)| *other != name && desired.contains_key(key))
    }

    /// Narrows `delta`, computed for request `name`, to what that request may do.
    ///
    /// The owner of a key always writes it. Anyone else only writes it into an
    /// empty slot. Keys wanted by another active request are never removed.
    pub fn resolve(&self, delta: LabelDelta, name: &str, current: &BTreeMap<String, String>) -> Resolution {
        let LabelDelta { to_add, to_remove } = delta;

        let to_add = to_add
            .into_iter()
            .filter(|(key, _)| self.owner_of(key) == Some(name) || !current.contains_key(key))
            .collect();

        let (handoff, to_remove): (BTreeSet<String>, BTreeSet<String>) = to_remove
            .into_iter()
            .partition(|key| self.wanted_by_other(key, name));

        Resolution {
            delta: LabelDelta { to_add, to_remove },
            handoff,
        }
    }
}
