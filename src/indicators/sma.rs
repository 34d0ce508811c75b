// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Rolling arithmetic mean over the trailing `period` values, current value
// included:
//
//   SMA_i = (x_{i-period+1} + ... + x_i) / period        for i >= period - 1
//
// The first `period - 1` positions have no full window and are `None`.
// =============================================================================

/// Compute the SMA series for `values`, aligned one-to-one with the input.
///
/// # Edge cases
/// - `period == 0` => every position is `None`
/// - `values.len() < period` => every position is `None`
/// - A window containing a non-finite value yields `None` at that position.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return result;
    }

    for (offset, window) in values.windows(period).enumerate() {
        result[offset + period - 1] = window_mean(window);
    }
    result
}

/// Mean of a full window, or `None` if any element is not finite.
pub(crate) fn window_mean(window: &[f64]) -> Option<f64> {
    if window.is_empty() || window.iter().any(|x| !x.is_finite()) {
        return None;
    }
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    mean.is_finite().then_some(mean)
}
