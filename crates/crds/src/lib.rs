//! NamespaceLabel CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the namespace label controller,
//! plus the well-known names shared between the controller and any
//! admission front-end.

pub mod namespace_label;
pub mod validation;

pub use namespace_label::*;
pub use validation::*;

/// Finalizer attached to every `NamespaceLabel` before any label is written.
///
/// While it is present the controller owns the right to let the object go,
/// which guarantees owned labels are retracted before the request disappears.
pub const NAMESPACE_LABEL_FINALIZER: &str = "namespacelabeller.dana.io/finalizer";

/// Annotation the controller sets on a `Namespace` right before writing it.
///
/// A namespace change event that still carries this annotation was caused by
/// the controller itself.
pub const CONTROLLER_UPDATE_ANNOTATION: &str = "namespacelabeler.dana.io/controller-update";

/// Value stored under [`CONTROLLER_UPDATE_ANNOTATION`].
pub const CONTROLLER_UPDATE_VALUE: &str = "true";
