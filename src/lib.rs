//! Volume Permissions Injector - mutating admission webhook for Pods
//!
//! Pods that mount a volume and declare a group identity get an init container
//! that `chown`s the mount to that group before the application starts. The
//! injector decides whether a pod needs it, fills in the init-container
//! template from the pod's own fields, and answers with a JSON Patch.
//!
//! # Architecture
//!
//! ```text
//! AdmissionReview ──► webhook ──► mutation::decide ──► AdmissionResponse
//!                                   │
//!                                   ├─ policy    (namespace / annotation check)
//!                                   ├─ template  (first container, first mount)
//!                                   ├─ config    (YAML → InitContainerConfig)
//!                                   └─ patch     (RFC 6902 operations)
//! ```
//!
//! # Modules
//!
//! - [`policy`] - Decides whether a pod must be mutated
//! - [`template`] - Fills the init-container template from pod fields
//! - [`config`] - Parses the filled template into container specs
//! - [`patch`] - Builds JSON Patch operations for containers and annotations
//! - [`mutation`] - Composes the above into one admission decision
//! - [`webhook`] - Axum router for the `/mutate` endpoint
//! - [`server`] - HTTPS server lifecycle
//! - [`error`] - Error types for the injector

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod mutation;
pub mod patch;
pub mod policy;
pub mod server;
pub mod template;
pub mod webhook;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// Default port for the webhook HTTPS server
pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;

/// Default path of the TLS certificate served by the webhook
pub const DEFAULT_TLS_CERT_FILE: &str = "/etc/webhook/certs/cert.pem";

/// Default path of the TLS private key matching [`DEFAULT_TLS_CERT_FILE`]
pub const DEFAULT_TLS_KEY_FILE: &str = "/etc/webhook/certs/key.pem";

/// Annotation used both to detect a previous injection and to mark a new one
pub const INJECTION_STATUS_ANNOTATION: &str =
    "volume-permissions-container-injector-webhook.malston.me/status";

/// Value written to [`INJECTION_STATUS_ANNOTATION`] after a successful injection
pub const INJECTED_STATUS: &str = "injected";

/// Namespaces that are never mutated
pub const DEFAULT_IGNORED_NAMESPACES: [&str; 2] = ["kube-system", "kube-public"];
