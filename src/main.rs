// =============================================================================
// Candle Chart Service — Main Entry Point
// =============================================================================
//
// Loads the default pair once at startup, then serves the active chart and
// accepts symbol changes over HTTP. A failed initial load is not fatal: the
// service starts with an empty table for the default pair.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod indicators;
mod market_data;
mod runtime_config;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::{AppState, LoadOutcome};
use crate::binance::BinanceClient;
use crate::runtime_config::{ChartConfig, CONFIG_FILE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Candle chart service starting up");

    let mut config = ChartConfig::load(CONFIG_FILE).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        ChartConfig::default()
    });
    config.apply_env(|key| std::env::var(key).ok());

    info!(
        default_symbol = %config.default_symbol,
        base_url = %config.base_url,
        interval = types::DAILY_INTERVAL,
        lookback_days = types::LOOKBACK_DAYS,
        "Configured quote source window"
    );

    // ── 2. Build quote source & shared state ─────────────────────────────
    let client = BinanceClient::new(&config).context("failed to build Binance client")?;
    let bind_addr = config.bind_addr.clone();
    let default_symbol = config.default_symbol.clone();
    let state = Arc::new(AppState::new(config, Arc::new(client)));

    // ── 3. Initial load ──────────────────────────────────────────────────
    match state.load_symbol(&default_symbol).await {
        LoadOutcome::Loaded { rows } => info!(symbol = %default_symbol, rows, "Initial chart ready"),
        LoadOutcome::Retained(e) => {
            warn!(symbol = %default_symbol, error = %e, "Initial load failed; serving empty chart")
        }
    }

    // ── 4. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, app).await.context("API server failed")?;
    Ok(())
}
