// =============================================================================
// Quote source seam
// =============================================================================
//
// The session never talks to an exchange directly: it asks a `KlineSource`
// for one fully-qualified trading pair and gets back either a complete table
// or a `FetchError`. Nothing partial ever crosses this boundary.
// =============================================================================

use async_trait::async_trait;
use thiserror::Error;

use super::CandleTable;

/// Why a fetch produced no table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request never produced a response (connect, timeout, TLS ...).
    #[error("quote source request failed: {0}")]
    Transport(String),

    /// The quote source rejected the pair.
    #[error("invalid symbol '{symbol}': {message}")]
    InvalidSymbol { symbol: String, message: String },

    /// Any other non-success status.
    #[error("quote source returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The body could not be read as an array of kline records.
    #[error("malformed kline payload: {0}")]
    Malformed(String),

    /// The body was a valid, but empty, array.
    #[error("no klines returned for '{0}'")]
    Empty(String),
}

/// Something that can produce the daily candle history of a trading pair.
#[async_trait]
pub trait KlineSource: Send + Sync {
    /// Fetch the fixed daily history window for `symbol` (e.g. `BTCUSDT`).
    async fn fetch(&self, symbol: &str) -> Result<CandleTable, FetchError>;
}
