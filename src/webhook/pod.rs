//! Pod Mutation Webhook
//!
//! Handles AdmissionReview requests for Pods, delegating the decision to
//! [`crate::mutation::decide`] and encoding the outcome as an AdmissionResponse.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{extract::State, Json};
use k8s_openapi::api::core::v1::Pod;
use kube::core::{
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
    DynamicObject,
};
use tracing::{debug, error, info};

use crate::mutation::{decide, InjectorSettings, PatchResult};

use super::WebhookState;

/// Handle mutating admission review for Pods
///
/// This handler:
/// 1. Extracts the Pod from the admission review
/// 2. Runs the mutation decision against it
/// 3. Returns the response, with a JSON patch when the pod needs fixing
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<Pod>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<Pod> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = mutate_pod(&state.settings, &req);
    Json(response.into_review())
}

/// Process a single pod mutation request
fn mutate_pod(settings: &InjectorSettings, request: &AdmissionRequest<Pod>) -> AdmissionResponse {
    let uid = request.uid.clone();

    info!(
        uid = %uid,
        kind = %request.kind.kind,
        namespace = ?request.namespace,
        name = %request.name,
        operation = ?request.operation,
        user = ?request.user_info.username,
        "AdmissionReview received"
    );

    let pod = match &request.object {
        Some(p) => p,
        None => {
            debug!(uid = %uid, "No pod object in request, allowing unchanged");
            return AdmissionResponse::from(request);
        }
    };

    // Pods created through a controller often carry the namespace only on the request
    let pod = match (&pod.metadata.namespace, &request.namespace) {
        (None, Some(ns)) => {
            let mut owned = pod.clone();
            owned.metadata.namespace = Some(ns.clone());
            Cow::Owned(owned)
        }
        _ => Cow::Borrowed(pod),
    };

    match decide(&pod, settings) {
        PatchResult::Unchanged { reason } => {
            debug!(uid = %uid, reason = %reason, "Allowing pod unchanged");
            AdmissionResponse::from(request)
        }
        PatchResult::Patched { operations, patch } => {
            info!(uid = %uid, patch_bytes = patch.len(), "Applying patch to pod");
            match AdmissionResponse::from(request).with_patch(operations) {
                Ok(response) => response,
                Err(e) => {
                    error!(uid = %uid, error = %e, "Failed to serialize patch");
                    AdmissionResponse::from(request)
                        .deny(format!("patch serialization error: {e}"))
                }
            }
        }
        PatchResult::Denied { message } => {
            error!(uid = %uid, message = %message, "Denying pod");
            AdmissionResponse::from(request).deny(message)
        }
    }
}
