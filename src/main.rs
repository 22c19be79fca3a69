// =============================================================================
// Trade Dashboard — Main Entry Point
// =============================================================================
//
// Serves per-symbol technical analysis over HTTP.  Engine settings come from
// a JSON file (written with defaults on first start); process settings come
// from TRADEDASH_* environment variables.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod error;
mod fundamentals;
mod history;
mod indicators;
mod market_data;
mod projection;
mod runtime_config;
mod signals;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::YahooSource;
use crate::runtime_config::{EngineConfig, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ─────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Trade Dashboard — Starting Up                     ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let server = ServerConfig::from_env()?;

    // ── 2. Engine config ─────────────────────────────────────────────────
    let engine_config = if server.config_path.exists() {
        EngineConfig::load(&server.config_path).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load engine config, using defaults");
            EngineConfig::default()
        })
    } else {
        let defaults = EngineConfig::default();
        if let Err(e) = defaults.save(&server.config_path) {
            error!(error = %e, "Failed to write default engine config");
        }
        defaults
    };

    info!(
        rsi = engine_config.rsi_period,
        sma_short = engine_config.sma_short_period,
        sma_long = engine_config.sma_long_period,
        horizon = engine_config.projection_horizon,
        "Engine config ready"
    );

    // ── 3. Market data source ────────────────────────────────────────────
    let source = YahooSource::new(server.provider_url.clone(), server.provider_timeout)?;
    info!(provider = %server.provider_url, "Market data source ready");

    // ── 4. Shared state & router ─────────────────────────────────────────
    let state = Arc::new(AppState::new(Arc::new(source), engine_config));
    let app = api::router(state);

    // ── 5. Serve until Ctrl+C ────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind API server on {}", server.bind_addr))?;
    info!(addr = %server.bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Shutdown signal received");
        })
        .await
        .context("API server failed")?;

    info!("Trade Dashboard stopped.");
    Ok(())
}
