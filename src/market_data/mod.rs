pub mod candle_table;
pub mod source;

// Re-export for convenient access (e.g. `use crate::market_data::CandleTable`).
pub use candle_table::{date_from_millis, Candle, CandleTable};
pub use source::{FetchError, KlineSource};
