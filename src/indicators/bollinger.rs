// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Built on the typical price TP = (high + low + close) / 3:
//
//   MID  = SMA(TP, n)
//   STD  = sample standard deviation of TP over the same n rows (n - 1 divisor)
//   BOLU = MID + k * STD
//   BOLD = MID - k * STD
//
// With the usual n = 20, k = 2 the band spread BOLU - BOLD is exactly 4 * STD.
// =============================================================================

use super::sma::{rolling_mean, window_mean};

/// Per-row Bollinger series, aligned one-to-one with the input.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSeries {
    pub middle: Vec<Option<f64>>,
    pub std_dev: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Rolling sample standard deviation (unbiased, `n - 1` divisor).
///
/// Returns all `None` when `period < 2` (a single observation has no sample
/// deviation) or when there are fewer than `period` values. A window that
/// contains a non-finite value yields `None`.
pub fn rolling_sample_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if period < 2 || values.len() < period {
        return result;
    }

    for (offset, window) in values.windows(period).enumerate() {
        let Some(mean) = window_mean(window) else {
            continue;
        };
        let sum_sq: f64 = window.iter().map(|x| (x - mean).powi(2)).sum();
        let std_dev = (sum_sq / (period - 1) as f64).sqrt();
        if std_dev.is_finite() {
            result[offset + period - 1] = Some(std_dev);
        }
    }
    result
}

/// Compute Bollinger Bands of `typical_prices` over `period` rows with the
/// outer bands `num_std` deviations away from the middle band.
pub fn calculate_bollinger(typical_prices: &[f64], period: usize, num_std: f64) -> BollingerSeries {
    let middle = rolling_mean(typical_prices, period);
    let std_dev = rolling_sample_std(typical_prices, period);

    let (upper, lower) = middle
        .iter()
        .zip(&std_dev)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => (Some(m + num_std * s), Some(m - num_std * s)),
            _ => (None, None),
        })
        .unzip();

    BollingerSeries {
        middle,
        std_dev,
        upper,
        lower,
    }
}
