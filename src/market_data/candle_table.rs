use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use tracing::warn;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single daily OHLCV candle. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    /// Period start, truncated to the UTC calendar date.
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Typical price: `(high + low + close) / 3`.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Map a period open time in milliseconds since the epoch to its UTC date.
///
/// Sub-day precision is dropped; two periods inside one day would share a
/// date, which cannot happen at the daily interval.
pub fn date_from_millis(open_time_ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(open_time_ms).map(|dt| dt.date_naive())
}

// ---------------------------------------------------------------------------
// CandleTable
// ---------------------------------------------------------------------------

/// Ascending, date-indexed candles of one symbol at one fixed interval.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleTable {
    symbol: String,
    interval: String,
    candles: Vec<Candle>,
}

impl CandleTable {
    /// Build a table from candles in the order the source returned them.
    ///
    /// The source already sends ascending order, so no sorting happens here.
    /// A repeated date is logged and kept.
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>, candles: Vec<Candle>) -> Self {
        let symbol = symbol.into();
        for pair in candles.windows(2) {
            if pair[1].date <= pair[0].date {
                warn!(
                    symbol = %symbol,
                    previous = %pair[0].date,
                    date = %pair[1].date,
                    "candle dates are not strictly ascending"
                );
            }
        }
        Self {
            symbol,
            interval: interval.into(),
            candles,
        }
    }

    /// Table with no rows, used before the first successful load.
    pub fn empty(symbol: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            candles: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn typical_prices(&self) -> Vec<f64> {
        self.candles.iter().map(Candle::typical_price).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(day: u32, close: f64) -> Candle {
        Candle {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close + 3.0,
            low: close - 3.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn open_time_truncates_to_utc_date() {
        // 2023-11-14T22:13:20Z
        let date = date_from_millis(1_700_000_000_000).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 11, 14).unwrap());
        // Last millisecond of the same day.
        let late = date_from_millis(1_700_006_399_999).unwrap();
        assert_eq!(late, date);
    }

    #[test]
    fn typical_price_averages_high_low_close() {
        let c = Candle {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            open: 0.0,
            high: 12.0,
            low: 6.0,
            close: 9.0,
            volume: 0.0,
        };
        assert!((c.typical_price() - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn table_keeps_source_order_and_dates() {
        let table = CandleTable::new("BTCUSDT", "1d", vec![candle(1, 100.0), candle(2, 101.0)]);
        assert_eq!(table.symbol(), "BTCUSDT");
        assert_eq!(table.interval(), "1d");
        assert_eq!(table.len(), 2);
        assert_eq!(table.closes(), vec![100.0, 101.0]);
        let dates: Vec<NaiveDate> = table.candles().iter().map(|c| c.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
            ]
        );
    }

    #[test]
    fn empty_table_has_no_rows() {
        let table = CandleTable::empty("BTCUSDT", "1d");
        assert!(table.is_empty());
        assert!(table.candles().is_empty());
        assert_eq!(table.symbol(), "BTCUSDT");
    }
}
