// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Seed average gain / average loss with the simple average of the
//          first `period` gains / losses.
// Step 3 — Apply Wilder's exponential smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS),   or 100 when avg_loss == 0
// =============================================================================

use super::Series;

/// Compute the RSI series for the given `closes` and `period`.
///
/// The result is index-aligned to `closes`: the first defined value sits at
/// index `period` (after `period` deltas) and everything before it is `None`.
///
/// # Edge cases
/// - `period == 0` or `closes.len() < period + 1` => every element is `None`
///   (insufficient data, not an error).
/// - Average loss of zero (no down moves, including a perfectly flat market)
///   yields RSI = 100.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Series {
    let mut result = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return result;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let (sum_gain, sum_loss) = deltas[..period].iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
        if d > 0.0 {
            (g + d, l)
        } else {
            (g, l + d.abs())
        }
    });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;
    result[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for (i, &delta) in deltas.iter().enumerate().skip(period) {
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { delta.abs() } else { 0.0 };

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        // Delta `i` spans closes[i]..closes[i + 1].
        result[i + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    result
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
