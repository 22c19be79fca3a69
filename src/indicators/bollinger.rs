// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ).  The bands here are assembled from series the
// caller has already computed, so the middle band is the very SMA series that
// is plotted and used by the decision logic.

use serde::Serialize;

use super::Series;

/// Upper and lower band series, index-aligned to the input.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BollingerBands {
    pub upper: Series,
    pub lower: Series,
}

/// Combine a middle-band SMA and matching σ series into Bollinger Bands.
///
/// Both bands are `None` wherever either input is absent.  Output length is
/// `middle.len()`.
pub fn bollinger_bands(middle: &[Option<f64>], std_dev: &[Option<f64>], num_std: f64) -> BollingerBands {
    let (upper, lower) = middle
        .iter()
        .enumerate()
        .map(|(i, m)| match (*m, std_dev.get(i).copied().flatten()) {
            (Some(m), Some(sd)) => (Some(m + num_std * sd), Some(m - num_std * sd)),
            _ => (None, None),
        })
        .unzip();

    BollingerBands { upper, lower }
}

impl BollingerBands {
    /// Band width (upper - lower) at `index`, if both bands are defined.
    pub fn width_at(&self, index: usize) -> Option<f64> {
        let upper = super::value_at(&self.upper, index)?;
        let lower = super::value_at(&self.lower, index)?;
        Some(upper - lower)
    }
}
