// =============================================================================
// Runtime Configuration — chart service settings
// =============================================================================
//
// Every field carries `#[serde(default)]` so that a partial (or empty) JSON
// file still loads. Environment variables override the file after loading.
//
// The kline interval, lookback and record limit are not configurable: they
// live in `types` as constants.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "chart_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_quote_suffix() -> String {
    "USDT".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_bind_addr() -> String {
    "0.0.0.0:8050".to_string()
}

// =============================================================================
// ChartConfig
// =============================================================================

/// Settings of the chart service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartConfig {
    /// Root URL of the quote source REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Fully-qualified pair loaded at startup.
    #[serde(default = "default_symbol")]
    pub default_symbol: String,

    /// Quote currency appended to user-entered base tickers.
    #[serde(default = "default_quote_suffix")]
    pub quote_suffix: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Listen address of the HTTP API.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_symbol: default_symbol(),
            quote_suffix: default_quote_suffix(),
            request_timeout_secs: default_request_timeout_secs(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl ChartConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read chart config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse chart config from {}", path.display()))?;

        info!(
            path = %path.display(),
            default_symbol = %config.default_symbol,
            base_url = %config.base_url,
            "chart config loaded"
        );

        Ok(config)
    }

    /// Apply `CHART_BIND_ADDR`, `CHART_DEFAULT_SYMBOL` and `CHART_BASE_URL`
    /// overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("CHART_BIND_ADDR").filter(|s| !s.trim().is_empty()) {
            self.bind_addr = addr.trim().to_string();
        }
        if let Some(sym) = lookup("CHART_DEFAULT_SYMBOL").filter(|s| !s.trim().is_empty()) {
            self.default_symbol = sym.trim().to_uppercase();
        }
        if let Some(url) = lookup("CHART_BASE_URL").filter(|s| !s.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
    }

    /// Turn a user-entered base ticker into a trading pair: `eth` ->
    /// `ETHUSDT`. Returns `None` for blank input.
    pub fn qualify_pair(&self, token: &str) -> Option<String> {
        let base = token.trim();
        if base.is_empty() {
            return None;
        }
        Some(format!("{}{}", base.to_uppercase(), self.quote_suffix))
    }
}
