//! Init-container template
//!
//! The injected init container is described by a small YAML document with
//! three placeholders. Only the first application container and its first
//! volume mount are looked at; later containers and mounts are ignored.

use k8s_openapi::api::core::v1::{Container, PodSecurityContext};

use crate::{Error, Result};

/// Placeholder replaced by the resolved group ID
pub const PERMISSION_TOKEN: &str = "replace-permission";

/// Placeholder replaced by the volume mount path (the token carries its own slash)
pub const MOUNT_PATH_TOKEN: &str = "/replace-mountPath";

/// Placeholder replaced by the volume mount name
pub const MOUNT_NAME_TOKEN: &str = "replace-mountName";

/// Common prefix of every placeholder; any survivor means the template is incomplete
pub const PLACEHOLDER_PREFIX: &str = "replace-";

/// Built-in init-container template
pub const DEFAULT_INIT_CONTAINER_TEMPLATE: &str = r#"initContainers:
- command:
  - /bin/bash
  - -ec
  - |-
    chown -R replace-permission:replace-permission /replace-mountPath
  image: docker.io/bitnami/bitnami-shell:10
  imagePullPolicy: Always
  name: volume-permissions
  securityContext:
    runAsUser: 0
  volumeMounts:
  - mountPath: /replace-mountPath
    name: replace-mountName
"#;

/// Where a resolved permission ID came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionSource {
    /// `securityContext.runAsGroup` of the first container
    ContainerGroup,
    /// `securityContext.fsGroup` of the pod
    PodFsGroup,
}

/// Numeric ID that will own the mounted volume
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermissionDescriptor {
    /// User/group ID written into the `chown` command
    pub id: i64,
    /// Which security context supplied it
    pub source: PermissionSource,
}

/// Resolve the permission ID for a container
///
/// The container's `runAsGroup` wins over the pod's `fsGroup`.
pub fn resolve_permission(
    container: &Container,
    pod_security_context: Option<&PodSecurityContext>,
) -> Option<PermissionDescriptor> {
    let container_group = container
        .security_context
        .as_ref()
        .and_then(|sc| sc.run_as_group)
        .map(|id| PermissionDescriptor {
            id,
            source: PermissionSource::ContainerGroup,
        });

    container_group.or_else(|| {
        pod_security_context
            .and_then(|sc| sc.fs_group)
            .map(|id| PermissionDescriptor {
                id,
                source: PermissionSource::PodFsGroup,
            })
    })
}

/// Init-container template text, validated once at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitContainerTemplate {
    text: String,
}

impl Default for InitContainerTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_INIT_CONTAINER_TEMPLATE.to_string(),
        }
    }
}

impl InitContainerTemplate {
    /// Wrap a custom template, checking that every placeholder is present
    pub fn from_text(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let missing: Vec<&str> = [PERMISSION_TOKEN, MOUNT_PATH_TOKEN, MOUNT_NAME_TOKEN]
            .into_iter()
            .filter(|token| !text.contains(token))
            .collect();

        if !missing.is_empty() {
            return Err(Error::config(format!(
                "init container template is missing placeholders: {}",
                missing.join(", ")
            )));
        }
        Ok(Self { text })
    }

    /// Raw template text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Fill the template from the first container of a pod
    ///
    /// Returns `None` when there is nothing to fix: no containers, no volume
    /// mount on the first container, or no group ID to chown to. A partially
    /// filled template is never returned.
    pub fn synthesize(
        &self,
        pod_security_context: Option<&PodSecurityContext>,
        containers: &[Container],
    ) -> Option<String> {
        let container = containers.first()?;
        let mount = container.volume_mounts.as_ref()?.first()?;

        let mut text = self
            .text
            .replace(MOUNT_PATH_TOKEN, &mount.mount_path)
            .replace(MOUNT_NAME_TOKEN, &mount.name);

        if let Some(permission) = resolve_permission(container, pod_security_context) {
            text = text.replace(PERMISSION_TOKEN, &permission.id.to_string());
        }

        if text.contains(PLACEHOLDER_PREFIX) {
            return None;
        }
        Some(text)
    }
}

/// Fill the built-in template; see [`InitContainerTemplate::synthesize`]
pub fn synthesize(
    pod_security_context: Option<&PodSecurityContext>,
    containers: &[Container],
) -> Option<String> {
    InitContainerTemplate::default().synthesize(pod_security_context, containers)
}
