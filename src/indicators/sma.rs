// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Unweighted mean of the `period` most recent closes.  The window sum is kept
// rolling so the whole series is computed in linear time.
//
//   SMA_i = (close_{i-period+1} + ... + close_i) / period     for i >= period-1
// =============================================================================

use super::Series;

/// Compute the SMA series for `closes` over `period`.
///
/// The output always has `closes.len()` elements.  Indices `0..period-1` are
/// `None`; when the input is shorter than `period` (or `period == 0`) every
/// element is `None`.
pub fn calculate_sma(closes: &[f64], period: usize) -> Series {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return result;
    }

    let period_f = period as f64;
    let mut sum: f64 = closes[..period].iter().sum();
    result[period - 1] = Some(sum / period_f);

    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        result[i] = Some(sum / period_f);
    }

    result
}
