//! Init-container configuration
//!
//! Parses a filled template into the container specs that get injected.

use aws_lc_rs::digest::{digest, SHA256};
use k8s_openapi::api::core::v1::Container;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::template::PLACEHOLDER_PREFIX;
use crate::{Error, Result};

/// Containers to insert into a pod's `spec.initContainers`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitContainerConfig {
    /// Init container specs, in insertion order
    #[serde(default)]
    pub init_containers: Vec<Container>,
}

/// Hex SHA-256 of a configuration document
pub fn fingerprint(text: &str) -> String {
    let hash = digest(&SHA256, text.as_bytes());
    hash.as_ref()
        .iter()
        .fold(String::with_capacity(64), |mut s, b| {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
            s
        })
}

/// Parse a YAML document into an [`InitContainerConfig`]
///
/// Fails on malformed YAML, on an empty `initContainers` list, and on any
/// placeholder left unfilled.
pub fn parse(text: &str) -> Result<InitContainerConfig> {
    info!(sha256 = %fingerprint(text), "Loading init container configuration");

    if text.contains(PLACEHOLDER_PREFIX) {
        return Err(Error::parse(format!(
            "configuration contains unresolved '{PLACEHOLDER_PREFIX}' placeholders"
        )));
    }

    let config: InitContainerConfig = serde_yaml::from_str(text)?;
    if config.init_containers.is_empty() {
        return Err(Error::parse("configuration declares no initContainers"));
    }

    Ok(config)
}
