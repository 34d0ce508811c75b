// =============================================================================
// Indicator Engine
// =============================================================================
//
// Pure, side-effect-free derivation of the overlay columns from a freshly
// fetched candle table. Every column is aligned one-to-one with the table's
// rows; positions without a full window hold `None`.

pub mod bollinger;
pub mod sma;

use crate::market_data::{Candle, CandleTable};
use crate::types::{Overlay, BOLLINGER_WIDTH, BOLLINGER_WINDOW};

use self::bollinger::calculate_bollinger;
use self::sma::rolling_mean;

/// Derived columns of one [`CandleTable`].
///
/// Field names follow the table columns: `21MA`, `50MA`, `100MA`, `200MA`,
/// `TP`, `STD`, `MID`, `BOLU`, `BOLD`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorColumns {
    pub ma21: Vec<Option<f64>>,
    pub ma50: Vec<Option<f64>>,
    pub ma100: Vec<Option<f64>>,
    pub ma200: Vec<Option<f64>>,
    /// Typical price, one value per row.
    pub tp: Vec<f64>,
    pub std: Vec<Option<f64>>,
    /// Rolling mean of `TP`, the Bollinger middle band.
    pub mid: Vec<Option<f64>>,
    pub bolu: Vec<Option<f64>>,
    pub bold: Vec<Option<f64>>,
}

impl IndicatorColumns {
    /// Column of a moving-average overlay. `None` for Bollinger Bands, which
    /// renders two columns; use [`IndicatorColumns::series`] for those.
    pub fn moving_average(&self, overlay: Overlay) -> Option<&[Option<f64>]> {
        match overlay {
            Overlay::Ma21 => Some(self.ma21.as_slice()),
            Overlay::Ma50 => Some(self.ma50.as_slice()),
            Overlay::Ma100 => Some(self.ma100.as_slice()),
            Overlay::Ma200 => Some(self.ma200.as_slice()),
            Overlay::BollingerBands => None,
        }
    }

    /// Named columns an overlay draws, in [`Overlay::columns`] order.
    pub fn series(&self, overlay: Overlay) -> Vec<(&'static str, &[Option<f64>])> {
        let columns: Vec<&[Option<f64>]> = match overlay {
            Overlay::BollingerBands => vec![self.bolu.as_slice(), self.bold.as_slice()],
            ma => self.moving_average(ma).into_iter().collect(),
        };
        overlay.columns().iter().copied().zip(columns).collect()
    }
}

/// A candle table together with its indicator columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartTable {
    pub candles: CandleTable,
    pub indicators: IndicatorColumns,
}

impl ChartTable {
    #[cfg(test)]
    pub fn symbol(&self) -> &str {
        self.candles.symbol()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn rows(&self) -> &[Candle] {
        self.candles.candles()
    }
}

/// Attach every indicator column to `table`.
///
/// Deterministic and infallible: a table shorter than a window simply gets
/// an all-`None` column for it.
pub fn compute_indicators(table: CandleTable) -> ChartTable {
    let closes = table.closes();
    let tp = table.typical_prices();

    let [ma21, ma50, ma100, ma200] =
        Overlay::MOVING_AVERAGES.map(|overlay| rolling_mean(&closes, overlay.window()));

    let bands = calculate_bollinger(&tp, BOLLINGER_WINDOW, BOLLINGER_WIDTH);

    ChartTable {
        candles: table,
        indicators: IndicatorColumns {
            ma21,
            ma50,
            ma100,
            ma200,
            tp,
            std: bands.std_dev,
            mid: bands.middle,
            bolu: bands.upper,
            bold: bands.lower,
        },
    }
}
