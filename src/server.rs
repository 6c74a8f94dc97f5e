//! Webhook HTTPS server

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tracing::{error, info};

use crate::mutation::InjectorSettings;
use crate::webhook::{webhook_router, WebhookState};
use crate::{Error, Result};

/// How long in-flight admission requests get to finish after a shutdown signal
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the server
    pub addr: SocketAddr,
    /// TLS certificate PEM
    pub cert_pem: Vec<u8>,
    /// TLS private key PEM
    pub key_pem: Vec<u8>,
}

impl ServerConfig {
    /// Read the certificate and key from disk
    pub async fn load(addr: SocketAddr, cert_file: &Path, key_file: &Path) -> Result<Self> {
        let cert_pem = tokio::fs::read(cert_file).await.map_err(|e| {
            Error::config(format!(
                "failed to read TLS certificate {}: {e}",
                cert_file.display()
            ))
        })?;
        let key_pem = tokio::fs::read(key_file).await.map_err(|e| {
            Error::config(format!(
                "failed to read TLS key {}: {e}",
                key_file.display()
            ))
        })?;

        Ok(Self {
            addr,
            cert_pem,
            key_pem,
        })
    }
}

/// Start the webhook server and run until SIGINT/SIGTERM
pub async fn start_server(config: ServerConfig, settings: InjectorSettings) -> Result<()> {
    let app = webhook_router(Arc::new(WebhookState::new(settings)));

    let tls_config = RustlsConfig::from_pem(config.cert_pem, config.key_pem)
        .await
        .map_err(|e| Error::config(format!("TLS config error: {}", e)))?;

    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    info!(addr = %config.addr, "Starting webhook server");

    axum_server::bind_rustls(config.addr, tls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|e| Error::server(e.to_string()))?;

    info!("Webhook server stopped");
    Ok(())
}

async fn shutdown_on_signal(handle: Handle) {
    wait_for_signal().await;
    info!("Got OS shutdown signal, shutting down webhook server gracefully");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler, waiting for Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
