//! Application bootstrapper
//!
//! Handles all initialization and setup for the helm wrapper server.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::HelmConfig;
use crate::services::credentials::ClusterProbe;
use crate::services::repository::RepoManager;
use crate::settings::{KubeArgs, Settings};
use crate::state::AppState;

/// How long in-flight requests may keep running after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(
    name = "helm-wrapper",
    about = "HTTP front-end for Helm chart lifecycle operations",
    version
)]
pub struct Cli {
    /// Address the server binds to
    #[arg(long, default_value = "0.0.0.0")]
    pub addr: IpAddr,

    /// Port the server listens on
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Path to the server configuration file
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    #[command(flatten)]
    pub kube: KubeArgs,
}

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helm_wrapper=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Bootstrap and run the application
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!("Starting helm wrapper v{}", env!("CARGO_PKG_VERSION"));

    let probe = ClusterProbe::default();
    let settings = Settings::new(cli.kube, &probe);

    let config = HelmConfig::load(&cli.config)?;
    let upload_dir = config.upload_dir()?;
    ensure_upload_dir(&upload_dir)?;
    tracing::info!("Upload directory: {}", upload_dir.display());

    register_repositories(&settings, &config).await?;

    let state = AppState::new(settings, probe, upload_dir);
    let app = api::create_app(state);

    let addr = SocketAddr::new(cli.addr, cli.port);
    serve(app, addr).await
}

fn ensure_upload_dir(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create upload directory {}", dir.display()))
}

/// Register every configured chart repository with helm
async fn register_repositories(settings: &Settings, config: &HelmConfig) -> anyhow::Result<()> {
    let repos = RepoManager::new(settings);
    for entry in &config.helm_repos {
        repos.add(entry).await.with_context(|| {
            format!(
                "failed to register helm repository '{}' ({})",
                entry.name, entry.url
            )
        })?;
        tracing::info!("Registered helm repository '{}' ({})", entry.name, entry.url);
    }
    Ok(())
}

/// Start the HTTP server
async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    tokio::select! {
        result = server => result.context("server error")?,
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            tracing::warn!(
                "graceful shutdown did not finish within {:?}, dropping remaining requests",
                SHUTDOWN_GRACE
            );
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on the first SIGINT or SIGTERM
async fn shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT, shutting down"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
    }
}
