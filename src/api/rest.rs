// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. This is the read/update contract the
// chart page consumes: it reads the active table with a chosen set of
// overlays, and submits base-asset tokens to switch symbol.
//
// CORS is configured permissively so a page served from anywhere can poll.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::app_state::{AppState, LoadOutcome};
use crate::market_data::Candle;
use crate::types::Overlay;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/indicators", get(indicators))
        .route("/api/v1/chart", get(chart))
        .route("/api/v1/symbol", post(load_symbol))
        .route("/api/v1/errors", get(errors))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    symbol: String,
    rows: usize,
    uptime_secs: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.snapshot();
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        symbol: session.symbol().to_string(),
        rows: session.table().len(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// =============================================================================
// Indicator names
// =============================================================================

async fn indicators() -> impl IntoResponse {
    Json(Overlay::ALL)
}

// =============================================================================
// Chart snapshot
// =============================================================================

#[derive(Deserialize)]
struct ChartQuery {
    /// Comma-separated overlay names, e.g. `21MA,Bollinger Bands`.
    #[serde(default)]
    indicators: Option<String>,
}

#[derive(Serialize)]
struct OverlaySeries {
    overlay: Overlay,
    column: &'static str,
    values: Vec<Option<f64>>,
}

#[derive(Serialize)]
struct ChartResponse {
    symbol: String,
    interval: String,
    state_version: u64,
    candles: Vec<Candle>,
    overlays: Vec<OverlaySeries>,
}

fn parse_overlays(raw: Option<&str>) -> Result<Vec<Overlay>, String> {
    let mut overlays = Vec::new();
    for name in raw.unwrap_or_default().split(',').filter(|s| !s.trim().is_empty()) {
        let overlay: Overlay = name.parse().map_err(|e| format!("{e}"))?;
        if !overlays.contains(&overlay) {
            overlays.push(overlay);
        }
    }
    Ok(overlays)
}

async fn chart(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChartQuery>,
) -> impl IntoResponse {
    let selected = match parse_overlays(query.indicators.as_deref()) {
        Ok(o) => o,
        Err(message) => {
            let body = serde_json::json!({ "error": message, "valid": Overlay::ALL });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let session = state.snapshot();
    let table = session.table();

    let overlays = selected
        .iter()
        .flat_map(|&overlay| {
            table
                .indicators
                .series(overlay)
                .into_iter()
                .map(move |(column, values)| OverlaySeries {
                    overlay,
                    column,
                    values: values.to_vec(),
                })
        })
        .collect();

    debug!(symbol = %session.symbol(), overlays = ?selected, "chart snapshot served");

    Json(ChartResponse {
        symbol: session.symbol().to_string(),
        interval: table.candles.interval().to_string(),
        state_version: state.current_state_version(),
        candles: table.rows().to_vec(),
        overlays,
    })
    .into_response()
}

// =============================================================================
// Symbol change
// =============================================================================

#[derive(Deserialize)]
struct SymbolRequest {
    /// Base asset ticker as typed by the user, e.g. `eth`.
    #[serde(default)]
    token: Option<String>,
}

#[derive(Serialize)]
struct SymbolResponse {
    loaded: bool,
    symbol: String,
    rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn load_symbol(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SymbolRequest>,
) -> impl IntoResponse {
    let pair = req
        .token
        .as_deref()
        .and_then(|t| state.config.qualify_pair(t));

    let (loaded, error) = match pair {
        Some(pair) => {
            info!(pair = %pair, "symbol change requested");
            match state.load_symbol(&pair).await {
                LoadOutcome::Loaded { .. } => (true, None),
                LoadOutcome::Retained(e) => (false, Some(e.to_string())),
            }
        }
        None => (false, None),
    };

    let session = state.snapshot();
    Json(SymbolResponse {
        loaded,
        symbol: session.symbol().to_string(),
        rows: session.table().len(),
        error,
    })
}

// =============================================================================
// Recent failures
// =============================================================================

async fn errors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let errors = state.recent_errors.read().clone();
    Json(errors)
}
