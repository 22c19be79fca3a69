// =============================================================================
// Rolling Population Standard Deviation
// =============================================================================
//
// σ_i = sqrt( Σ (close_j - mean_i)^2 / period )   for j in (i-period, i]
//
// The mean is NOT recomputed here: `mean` must be the SMA series of the same
// period, index-aligned to `closes`.  Both Bollinger bands are derived from
// that one mean so that the bands are centred exactly on the plotted SMA.
// =============================================================================

use super::Series;

/// Rolling population standard deviation around a precomputed mean series.
///
/// Element `i` is `None` when `mean[i]` is absent or the window ending at `i`
/// is incomplete.  The output has `closes.len()` elements.
pub fn rolling_std_dev(closes: &[f64], period: usize, mean: &[Option<f64>]) -> Series {
    let mut result = vec![None; closes.len()];
    if period == 0 {
        return result;
    }

    let period_f = period as f64;
    for i in period.saturating_sub(1)..closes.len() {
        let Some(m) = mean.get(i).copied().flatten() else {
            continue;
        };
        let window = &closes[i + 1 - period..=i];
        let variance = window.iter().map(|c| (c - m).powi(2)).sum::<f64>() / period_f;
        result[i] = Some(variance.sqrt());
    }

    result
}
