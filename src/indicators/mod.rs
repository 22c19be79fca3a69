// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators used by the
// analysis engine.  Every series function returns a `Series`: one
// `Option<f64>` per input close, index-aligned to it.  `None` marks the
// warm-up window where the indicator does not yet have enough history; it is
// a structural property of the series, never an error.

pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod sma;
pub mod stddev;

pub use bollinger::{bollinger_bands, BollingerBands};
pub use ema::calculate_ema;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::rolling_std_dev;

/// Index-aligned indicator output.
pub type Series = Vec<Option<f64>>;

/// Value of `series` at `index`, treating out-of-range indices as absent.
///
/// Lets callers read a too-short (empty) series the same way as a warm-up
/// gap.
pub fn value_at(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten()
}

/// Most recent value of `series`, if defined.
pub fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

#[cfg(test)]
pub(crate) fn assert_approx(actual: Option<f64>, expected: f64) {
    match actual {
        Some(v) => assert!((v - expected).abs() < 1e-9, "got {v}, expected {expected}"),
        None => panic!("expected {expected}, got None"),
    }
}
