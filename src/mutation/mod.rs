//! Mutation orchestration
//!
//! One call per admission request: policy check, template fill, config parse,
//! patch build, serialization. Nothing here is shared between requests except
//! the read-only [`InjectorSettings`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, error, info};

use crate::config;
use crate::patch::{add_containers, init_containers_path, update_annotations};
use crate::policy::{evaluate_logged, DecisionReason};
use crate::template::InitContainerTemplate;
use crate::{Result, DEFAULT_IGNORED_NAMESPACES, INJECTED_STATUS, INJECTION_STATUS_ANNOTATION};

/// Process-wide settings, built once at startup and shared read-only
#[derive(Clone, Debug)]
pub struct InjectorSettings {
    /// Namespaces that are never mutated
    pub ignored_namespaces: BTreeSet<String>,
    /// Annotation read for prior injection and written after injection
    pub annotation_key: String,
    /// Value written to `annotation_key`
    pub annotation_value: String,
    /// Init-container template
    pub template: InitContainerTemplate,
}

impl Default for InjectorSettings {
    fn default() -> Self {
        Self {
            ignored_namespaces: DEFAULT_IGNORED_NAMESPACES
                .iter()
                .map(|ns| ns.to_string())
                .collect(),
            annotation_key: INJECTION_STATUS_ANNOTATION.to_string(),
            annotation_value: INJECTED_STATUS.to_string(),
            template: InitContainerTemplate::default(),
        }
    }
}

impl InjectorSettings {
    /// Replace the init-container template
    pub fn with_template(mut self, template: InitContainerTemplate) -> Self {
        self.template = template;
        self
    }

    /// Replace the ignored namespace set
    pub fn with_ignored_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }
}

/// Why a pod was admitted without a patch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Policy said no (system namespace or already injected)
    Policy(DecisionReason),
    /// No volume mount or no group ID to fix
    NoMutationTarget,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Policy(reason) => fmt::Display::fmt(reason, f),
            SkipReason::NoMutationTarget => f.write_str("no volume mount or security context"),
        }
    }
}

/// Outcome of [`decide`]
#[derive(Debug)]
pub enum PatchResult {
    /// Allowed, no patch
    Unchanged {
        /// Why nothing was patched
        reason: SkipReason,
    },
    /// Allowed, with patch
    Patched {
        /// Patch operations in replay order
        operations: json_patch::Patch,
        /// The same operations serialized as a JSON array
        patch: Vec<u8>,
    },
    /// Denied with message
    Denied {
        /// Human-readable reason returned to the API server
        message: String,
    },
}

impl PatchResult {
    /// Whether the pod is admitted
    pub fn is_allowed(&self) -> bool {
        !matches!(self, PatchResult::Denied { .. })
    }
}

/// Decide how to mutate a pod
///
/// Benign non-matches (policy, nothing to fix) admit the pod unchanged; a
/// configuration that fails to parse or a patch that fails to serialize
/// denies it.
pub fn decide(pod: &Pod, settings: &InjectorSettings) -> PatchResult {
    let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
    let name = pod.metadata.name.as_deref().unwrap_or_default();

    let decision = evaluate_logged(
        namespace,
        name,
        pod.metadata.annotations.as_ref(),
        &settings.ignored_namespaces,
        &settings.annotation_key,
    );
    if !decision.required {
        info!(namespace, name, reason = %decision.reason, "Skipping mutation due to policy check");
        return PatchResult::Unchanged {
            reason: SkipReason::Policy(decision.reason),
        };
    }

    let spec = pod.spec.as_ref();
    let containers = spec.map(|s| s.containers.as_slice()).unwrap_or_default();
    let pod_security_context = spec.and_then(|s| s.security_context.as_ref());

    let Some(text) = settings.template.synthesize(pod_security_context, containers) else {
        info!(
            namespace,
            name, "Skipping mutation, pod has no volume mount or security context to fix"
        );
        return PatchResult::Unchanged {
            reason: SkipReason::NoMutationTarget,
        };
    };

    match build_patch(pod, &text, settings) {
        Ok((operations, patch)) => {
            debug!(namespace, name, patch = %String::from_utf8_lossy(&patch), "Built patch");
            info!(
                namespace,
                name,
                patch_ops = operations.0.len(),
                "Injecting volume permissions init container"
            );
            PatchResult::Patched { operations, patch }
        }
        Err(e) => {
            error!(namespace, name, error = %e, "Failed to build patch, denying");
            PatchResult::Denied {
                message: e.to_string(),
            }
        }
    }
}

fn build_patch(
    pod: &Pod,
    text: &str,
    settings: &InjectorSettings,
) -> Result<(json_patch::Patch, Vec<u8>)> {
    let init_config = config::parse(text)?;

    let existing = pod
        .spec
        .as_ref()
        .and_then(|s| s.init_containers.as_deref())
        .unwrap_or_default();

    let mut marker = BTreeMap::new();
    marker.insert(
        settings.annotation_key.clone(),
        settings.annotation_value.clone(),
    );

    let mut ops = add_containers(existing, &init_config.init_containers, &init_containers_path())?;
    ops.extend(update_annotations(pod.metadata.annotations.as_ref(), &marker));

    let operations = json_patch::Patch(ops);
    let patch = serde_json::to_vec(&operations)?;
    Ok((operations, patch))
}
