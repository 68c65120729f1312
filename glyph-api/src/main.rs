//! glyph-api - handwritten character inference service
//!
//! Accepts 28x28 pixel vectors over HTTP, dispatches them to the LR, CNN or
//! RNN backend executable, and records every result in `results.csv`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use glyph_api::{build_router, AppState, BackendInvoker, InferencePipeline};
use glyph_common::config::{self, RootFolder, TomlConfig};

/// Command-line arguments for glyph-api
#[derive(Parser, Debug)]
#[command(name = "glyph-api")]
#[command(about = "Handwritten character inference service")]
#[command(version)]
struct Args {
    /// Root folder holding results.csv, tmp/ and models/
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Path to glyph.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8000
    #[arg(short, long, env = "GLYPH_BIND_ADDRESS")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config::config_file_path(args.config.as_deref());
    let toml_config = TomlConfig::load_or_default(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level)),
        )
        .init();

    // Build identification first, before any filesystem work
    info!(
        "Starting glyph-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if config_path.exists() {
        info!("Config file: {}", config_path.display());
    } else {
        warn!("Config file {} not found, using defaults", config_path.display());
    }

    let root = RootFolder::new(config::resolve_root_folder(
        args.root_folder.as_deref(),
        &toml_config,
    ))
    .with_models_dir(toml_config.models_dir.clone());
    root.ensure_directories()
        .with_context(|| format!("Failed to create root folder {}", root.path().display()))?;
    info!("Root folder: {}", root.path().display());
    info!("Models directory: {}", root.models_dir().display());

    let invoker = BackendInvoker::from_config(&toml_config, &root);
    match invoker.timeout() {
        Some(limit) => info!("Backend timeout: {}s", limit.as_secs()),
        None => warn!("Backend timeout disabled"),
    }

    let pipeline = InferencePipeline::for_root(&root, invoker);
    if let Err(e) = pipeline.prepare().await {
        error!("Failed to prepare result ledger: {}", e);
        return Err(e.into());
    }
    info!("Result ledger: {}", pipeline.ledger().path().display());

    for status in pipeline.invoker().status() {
        if status.available {
            info!("✓ {} backend available", status.kind.display_name());
        } else {
            warn!(
                "✗ {} backend unavailable: {}",
                status.kind.display_name(),
                status.detail.unwrap_or_default()
            );
        }
    }

    let allowed_origins = toml_config.allowed_origins();
    info!("Allowed origins: {}", allowed_origins.join(", "));

    let state = AppState::new(pipeline, allowed_origins);
    let app = build_router(state);

    let bind_address = args.bind.unwrap_or_else(|| toml_config.bind_address());
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("glyph-api listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
