// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Edge router server.
//!
//! Environment:
//! - `FLOODGATE_CONFIG`: path to a YAML/JSON config file (defaults apply if unset)
//! - `RUST_LOG`: tracing filter (default `info,floodgate_sync=debug`)
//! - `LOG_FORMAT=json`: JSON log lines

use anyhow::{Context, Result};
use floodgate_sync::edge::{app, EdgeRouter, HttpUpstream};
use floodgate_sync::SyncConfig;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match std::env::var("FLOODGATE_CONFIG") {
        Ok(path) => SyncConfig::load(&path).with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => {
            let config = SyncConfig::default();
            config.validate().context("Default configuration is invalid")?;
            config
        }
    };

    let upstream = HttpUpstream::from_config(&config.edge).context("Failed to create upstream client")?;
    let router = Arc::new(EdgeRouter::new(upstream, config.edge.clone()));

    tracing::info!(
        listen = %config.edge.listen_addr,
        default_origin = %config.edge.default_origin,
        preview_origin = %config.edge.preview_origin,
        "Starting edge router"
    );

    let listener = tokio::net::TcpListener::bind(&config.edge.listen_addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app(router))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Edge router stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,floodgate_sync=debug".into());
    let json = std::env::var("LOG_FORMAT").map_or(false, |v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
