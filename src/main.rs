//! Volume Permissions Injector - mutating admission webhook for Pods

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use volume_permissions_injector::mutation::InjectorSettings;
use volume_permissions_injector::server::{start_server, ServerConfig};
use volume_permissions_injector::template::InitContainerTemplate;
use volume_permissions_injector::{
    DEFAULT_IGNORED_NAMESPACES, DEFAULT_TLS_CERT_FILE, DEFAULT_TLS_KEY_FILE, DEFAULT_WEBHOOK_PORT,
};

/// Injects a volume-permissions init container into pods that need one
#[derive(Parser, Debug)]
#[command(name = "volume-permissions-injector", version, about, long_about = None)]
struct Cli {
    /// Webhook server port
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = DEFAULT_WEBHOOK_PORT)]
    port: u16,

    /// File containing the x509 certificate for HTTPS
    #[arg(long, env = "TLS_CERT_FILE", default_value = DEFAULT_TLS_CERT_FILE)]
    tls_cert_file: PathBuf,

    /// File containing the x509 private key matching --tls-cert-file
    #[arg(long, env = "TLS_KEY_FILE", default_value = DEFAULT_TLS_KEY_FILE)]
    tls_key_file: PathBuf,

    /// File containing the init container template (built-in template if unset)
    ///
    /// The template must contain the `replace-permission`, `/replace-mountPath`
    /// and `replace-mountName` placeholders.
    #[arg(long, env = "INIT_CONTAINER_TEMPLATE")]
    init_container_template: Option<PathBuf>,

    /// Namespace whose pods are never mutated (repeatable)
    #[arg(long = "ignored-namespace", default_values_t = DEFAULT_IGNORED_NAMESPACES.map(String::from))]
    ignored_namespaces: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install aws-lc-rs crypto provider: {:?}", e);
        std::process::exit(1);
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let template = match &cli.init_container_template {
        Some(path) => {
            let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                anyhow::anyhow!("Failed to read init container template {:?}: {}", path, e)
            })?;
            tracing::info!(path = ?path, "Loaded init container template");
            InitContainerTemplate::from_text(text)?
        }
        None => InitContainerTemplate::default(),
    };

    let settings = InjectorSettings::default()
        .with_template(template)
        .with_ignored_namespaces(cli.ignored_namespaces);

    tracing::info!(
        ignored_namespaces = ?settings.ignored_namespaces,
        annotation = %settings.annotation_key,
        "Injector settings"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let config = ServerConfig::load(addr, &cli.tls_cert_file, &cli.tls_key_file).await?;

    start_server(config, settings).await?;
    Ok(())
}
