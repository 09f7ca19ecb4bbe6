//! Admission rules for NamespaceLabel objects.
//!
//! Label keys under a reserved prefix belong to Kubernetes itself and may not
//! be requested. An admission front-end calls [`NamespaceLabel::validate_create`]
//! and [`NamespaceLabel::validate_update`]; the controller never re-validates.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::NamespaceLabel;

/// Label key prefixes a `NamespaceLabel` may not request.
pub const DISALLOWED_LABEL_PREFIXES: &[&str] = &["kubernetes.io/"];

/// Errors returned when a `NamespaceLabel` is rejected at admission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A requested label key starts with a reserved prefix
    #[error("label with key {key:?} is not allowed to have the '{prefix}' prefix")]
    DisallowedPrefix {
        /// Offending label key
        key: String,
        /// Reserved prefix it matched
        prefix: &'static str,
    },
}

/// Checks every key in `labels` against [`DISALLOWED_LABEL_PREFIXES`].
///
/// Keys are visited in sorted order, so the reported key is deterministic when
/// several are invalid.
pub fn validate_labels(labels: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    for key in labels.keys() {
        if let Some(prefix) = DISALLOWED_LABEL_PREFIXES
            .iter()
            .copied()
            .find(|prefix| key.starts_with(*prefix))
        {
            return Err(ValidationError::DisallowedPrefix {
                key: key.clone(),
                prefix,
            });
        }
    }
    Ok(())
}

impl NamespaceLabel {
    /// Validates a new object.
    pub fn validate_create(&self) -> Result<(), ValidationError> {
        validate_labels(&self.spec.labels)
    }

    /// Validates an update. Same rules as create; the old object is irrelevant.
    pub fn validate_update(&self, _old: &NamespaceLabel) -> Result<(), ValidationError> {
        self.validate_create()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NamespaceLabelSpec;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_rejects_disallowed_prefix() {
        let err = validate_labels(&labels(&[("kubernetes.io/some-label", "value")])).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DisallowedPrefix {
                key: "kubernetes.io/some-label".to_string(),
                prefix: "kubernetes.io/",
            }
        );
        assert_eq!(
            err.to_string(),
            "label with key \"kubernetes.io/some-label\" is not allowed to have the 'kubernetes.io/' prefix"
        );
    }

    #[test]
    fn test_allows_other_prefixes() {
        assert!(validate_labels(&labels(&[
            ("some-allowed-prefix/some-label", "value"),
            ("name", "namespacelabel1"),
            // Only a leading match counts
            ("example.com/kubernetes.io", "x"),
        ]))
        .is_ok());
        assert!(validate_labels(&BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_update_uses_create_rules() {
        let old = NamespaceLabel::new("nl", NamespaceLabelSpec::default());
        let new = NamespaceLabel::new(
            "nl",
            NamespaceLabelSpec {
                labels: labels(&[("kubernetes.io/metadata.name", "x")]),
            },
        );
        assert!(old.validate_create().is_ok());
        assert!(new.validate_update(&old).is_err());
    }
}
