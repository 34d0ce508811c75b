// =============================================================================
// Session State — Candle Chart Service
// =============================================================================
//
// `Session` is a plain value: the active symbol and its computed table.
// `Session::load_symbol` consumes a session and hands back its successor,
// which is the old session untouched whenever the fetch fails.
//
// `AppState` hosts one session behind the HTTP API:
//   - a tokio Mutex serialises the fetch -> compute -> swap sequence, so two
//     loads never interleave their read-modify-write;
//   - a parking_lot RwLock guards the installed session, which readers clone
//     (an `Arc` bump) and render from without holding the lock.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::indicators::{compute_indicators, ChartTable};
use crate::market_data::{CandleTable, FetchError, KlineSource};
use crate::runtime_config::ChartConfig;
use crate::types::DAILY_INTERVAL;

// =============================================================================
// Session
// =============================================================================

/// What a load attempt did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// A new table was installed for the requested symbol.
    Loaded { rows: usize },
    /// The fetch failed; the previous symbol and table are still active.
    Retained(FetchError),
}

impl LoadOutcome {
    #[cfg(test)]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// The active symbol and its table with every indicator column attached.
#[derive(Debug, Clone)]
pub struct Session {
    symbol: String,
    table: Arc<ChartTable>,
}

impl Session {
    /// A session for `symbol` with no rows yet.
    pub fn new(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        let table = compute_indicators(CandleTable::empty(symbol.clone(), DAILY_INTERVAL));
        Self {
            symbol,
            table: Arc::new(table),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn table(&self) -> &Arc<ChartTable> {
        &self.table
    }

    /// Fetch `requested`, compute its indicators and return the session that
    /// results.
    ///
    /// On success both the symbol and the table are replaced together. On
    /// failure `self` comes back unchanged.
    pub async fn load_symbol(self, source: &dyn KlineSource, requested: &str) -> (Self, LoadOutcome) {
        match source.fetch(requested).await {
            Ok(candles) => {
                let table = compute_indicators(candles);
                let rows = table.len();
                info!(symbol = %requested, previous = %self.symbol, rows, "symbol loaded");
                let next = Self {
                    symbol: requested.to_string(),
                    table: Arc::new(table),
                };
                (next, LoadOutcome::Loaded { rows })
            }
            Err(e) => {
                warn!(
                    symbol = %requested,
                    active = %self.symbol,
                    error = %e,
                    "load failed; keeping active chart"
                );
                (self, LoadOutcome::Retained(e))
            }
        }
    }
}

// =============================================================================
// Error Record
// =============================================================================

/// A failed load, kept for a presentation layer that wants to show it.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// Trading pair whose load failed.
    pub symbol: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// AppState
// =============================================================================

/// Shared state of the HTTP service, typically wrapped in `Arc`.
pub struct AppState {
    /// Incremented on every successful swap so pollers can detect a new chart.
    pub state_version: AtomicU64,

    pub config: ChartConfig,

    source: Arc<dyn KlineSource>,
    session: RwLock<Session>,
    load_gate: tokio::sync::Mutex<()>,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Instant when the service was started.
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Build the state with an empty session for the configured default
    /// symbol. Call [`AppState::load_symbol`] to fill it.
    pub fn new(config: ChartConfig, source: Arc<dyn KlineSource>) -> Self {
        let session = Session::new(config.default_symbol.clone());
        Self {
            state_version: AtomicU64::new(1),
            config,
            source,
            session: RwLock::new(session),
            load_gate: tokio::sync::Mutex::new(()),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Session ─────────────────────────────────────────────────────────

    /// Snapshot of the active session for rendering.
    pub fn snapshot(&self) -> Session {
        self.session.read().clone()
    }

    /// Run one serialised load of `symbol` (already a full trading pair).
    pub async fn load_symbol(&self, symbol: &str) -> LoadOutcome {
        let _gate = self.load_gate.lock().await;

        let current = self.snapshot();
        let (next, outcome) = current.load_symbol(self.source.as_ref(), symbol).await;

        match &outcome {
            LoadOutcome::Loaded { .. } => {
                *self.session.write() = next;
                self.increment_version();
            }
            LoadOutcome::Retained(e) => self.push_error(symbol, e),
        }
        outcome
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record a failed load. The log is capped at [`MAX_RECENT_ERRORS`];
    /// oldest entries are evicted first.
    pub fn push_error(&self, symbol: &str, error: &FetchError) {
        let record = ErrorRecord {
            message: error.to_string(),
            symbol: symbol.to_string(),
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }
}
