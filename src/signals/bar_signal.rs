// =============================================================================
// Per-bar Signal Annotation
// =============================================================================
//
// BUY  when RSI < buy_rsi_below  AND close <= lower band × lower_band_tolerance
// SELL when RSI > sell_rsi_above AND close >= upper band × upper_band_tolerance
//
// Anything else, including bars where RSI or a band is still warming up, is
// "no signal".  No state is carried between bars.

use crate::indicators::{value_at, BollingerBands};
use crate::runtime_config::SignalThresholds;
use crate::types::Signal;

/// Classify a single bar.
pub fn bar_signal(
    close: f64,
    rsi: Option<f64>,
    upper: Option<f64>,
    lower: Option<f64>,
    thresholds: &SignalThresholds,
) -> Option<Signal> {
    let rsi = rsi?;

    if rsi < thresholds.buy_rsi_below {
        let lower = lower?;
        return (close <= lower * thresholds.lower_band_tolerance).then_some(Signal::Buy);
    }
    if rsi > thresholds.sell_rsi_above {
        let upper = upper?;
        return (close >= upper * thresholds.upper_band_tolerance).then_some(Signal::Sell);
    }
    None
}

/// Classify every bar of a series.  Output is index-aligned to `closes`.
pub fn classify_bars(
    closes: &[f64],
    rsi: &[Option<f64>],
    bands: &BollingerBands,
    thresholds: &SignalThresholds,
) -> Vec<Option<Signal>> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            bar_signal(
                close,
                value_at(rsi, i),
                value_at(&bands.upper, i),
                value_at(&bands.lower, i),
                thresholds,
            )
        })
        .collect()
}
