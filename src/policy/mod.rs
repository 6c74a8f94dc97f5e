//! Mutation policy
//!
//! Decides from a pod's metadata alone whether the injector should touch it.
//! Pods in ignored namespaces and pods already carrying the injection marker
//! are admitted unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::info;

use crate::INJECTED_STATUS;

/// Why the policy reached its decision
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionReason {
    /// The pod lives in an ignored (system) namespace
    SystemNamespace,
    /// The pod already carries the injection marker
    AlreadyInjected,
    /// Nothing prevents mutation
    Required,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionReason::SystemNamespace => "system namespace",
            DecisionReason::AlreadyInjected => "already injected",
            DecisionReason::Required => "mutation required",
        };
        f.write_str(s)
    }
}

/// Outcome of [`evaluate`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MutationDecision {
    /// Whether the pod must be mutated
    pub required: bool,
    /// Why
    pub reason: DecisionReason,
}

impl MutationDecision {
    fn skip(reason: DecisionReason) -> Self {
        Self {
            required: false,
            reason,
        }
    }

    fn required() -> Self {
        Self {
            required: true,
            reason: DecisionReason::Required,
        }
    }
}

/// Decide whether an object must be mutated
///
/// Rules, first match wins:
/// 1. `namespace` is in `ignored_namespaces` → not required
/// 2. `annotations[annotation_key]` equals `injected` (any case) → not required
/// 3. otherwise required
///
/// A missing annotation map counts as "not injected".
pub fn evaluate(
    namespace: &str,
    annotations: Option<&BTreeMap<String, String>>,
    ignored_namespaces: &BTreeSet<String>,
    annotation_key: &str,
) -> MutationDecision {
    if ignored_namespaces.contains(namespace) {
        return MutationDecision::skip(DecisionReason::SystemNamespace);
    }

    let status = annotations
        .and_then(|a| a.get(annotation_key))
        .map(String::as_str)
        .unwrap_or_default();

    if status.eq_ignore_ascii_case(INJECTED_STATUS) {
        MutationDecision::skip(DecisionReason::AlreadyInjected)
    } else {
        MutationDecision::required()
    }
}

/// [`evaluate`] with a log line carrying the object identity
pub fn evaluate_logged(
    namespace: &str,
    name: &str,
    annotations: Option<&BTreeMap<String, String>>,
    ignored_namespaces: &BTreeSet<String>,
    annotation_key: &str,
) -> MutationDecision {
    let decision = evaluate(namespace, annotations, ignored_namespaces, annotation_key);
    let status = annotations.and_then(|a| a.get(annotation_key));

    info!(
        namespace = %namespace,
        name = %name,
        status = ?status,
        required = decision.required,
        reason = %decision.reason,
        "Evaluated mutation policy"
    );
    decision
}
