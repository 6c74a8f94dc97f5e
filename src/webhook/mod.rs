//! Mutating Admission Webhook
//!
//! Intercepts Pod create requests and injects a volume-permissions init
//! container when the pod mounts a volume and declares a group identity.

pub mod pod;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::mutation::InjectorSettings;

/// Shared state for webhook handlers
#[derive(Clone, Debug)]
pub struct WebhookState {
    /// Injection settings fixed at startup
    pub settings: Arc<InjectorSettings>,
}

impl WebhookState {
    /// Create a new webhook state with the given settings
    pub fn new(settings: InjectorSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

/// Create the webhook router
///
/// - POST /mutate - Mutate Pods
/// - GET /healthz - Liveness probe
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate", post(pod::mutate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn integration_healthz() {
        let router = webhook_router(Arc::new(WebhookState::new(InjectorSettings::default())));

        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn integration_unknown_route_is_404() {
        let router = webhook_router(Arc::new(WebhookState::new(InjectorSettings::default())));

        let request = Request::builder()
            .method("POST")
            .uri("/validate")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_webhook_state_shares_settings() {
        let state = WebhookState::new(InjectorSettings::default());
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.settings, &cloned.settings));
    }
}
