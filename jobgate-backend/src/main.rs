//! jobgate backend server
//!
//! Entry point: configuration loading, automation registration, and HTTP
//! server startup with graceful shutdown.

use std::sync::Arc;

use clap::Parser;
use jobgate_job_queue::JobQueueClient;
use tokio::net::TcpListener;

use jobgate_backend::state::AppState;
use jobgate_backend::{build_router_with_options, RouterOptions};

mod auth_builder;
mod cli;
mod config_helpers;
mod tracing_setup;

use auth_builder::build_authenticator_from_config;
use cli::CliArgs;
use config_helpers::{automations_from_config, parse_bind_address, prepare_directories};
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config = load_config(args.config_path.as_deref())?;
    jobgate_config::validate_config(&config)
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    install_tracing_from_config(&config.logging);
    tracing::info!(
        config_path = args.config_path.as_deref().unwrap_or("-"),
        "configuration loaded"
    );

    let (authenticator, info) = build_authenticator_from_config(&config)
        .map_err(|reason| anyhow::anyhow!("authentication configuration: {reason}"))?;
    tracing::info!(
        auth_mode = %info.mode,
        key_fingerprint = info.fingerprint.as_deref().unwrap_or("-"),
        key_type = info.key_type.as_deref().unwrap_or("-"),
        "authentication configured"
    );

    let (uploads_dir, work_root) = prepare_directories(&config).await?;
    tracing::info!(
        uploads_dir = %uploads_dir.display(),
        work_root = %work_root.display(),
        "storage directories ready"
    );

    let job_queue = JobQueueClient::new();
    let automations = automations_from_config(&config);
    if automations.is_empty() {
        tracing::warn!("no automation is enabled; every submission will be rejected");
    }
    jobgate_jobs::register_automations(&job_queue, automations).await;

    let state = Arc::new(AppState::new(
        authenticator,
        job_queue,
        uploads_dir,
        work_root,
    ));
    let app = build_router_with_options(state, RouterOptions::from_config(&config));

    let addr = parse_bind_address(&config.server.host, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Load configuration from file or defaults.
fn load_config(path: Option<&str>) -> anyhow::Result<jobgate_config::Config> {
    jobgate_config::load_config(path).map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
