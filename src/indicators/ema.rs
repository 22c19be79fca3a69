// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   k     = 2 / (period + 1)
//   EMA_t = EMA_{t-1} + (close_t - EMA_{t-1}) * k
//
// The first EMA value (index `period - 1`) is seeded with the SMA of the first
// `period` closes.
// =============================================================================

use super::Series;

/// Compute the EMA series for the given `closes` slice and look-back `period`.
///
/// Returns an empty `Vec` when the input is shorter than `period` or the
/// period is zero.  Otherwise the result is index-aligned to `closes`, with
/// `None` before index `period - 1`.
pub fn calculate_ema(closes: &[f64], period: usize) -> Series {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period + 1) as f64;
    let seed = closes[..period].iter().sum::<f64>() / period as f64;

    let mut result = vec![None; closes.len()];
    result[period - 1] = Some(seed);

    let mut prev = seed;
    for (i, &close) in closes.iter().enumerate().skip(period) {
        let ema = prev + (close - prev) * k;
        result[i] = Some(ema);
        prev = ema;
    }

    result
}
