// =============================================================================
// Band Projection
// =============================================================================
//
// Extends the Bollinger envelope a few bars past the last real bar for
// charting.  The middle band follows the recent SMA slope; the band width is
// frozen at its last observed value (volatility is not re-estimated forward).
//
//   slope    = (SMA[last] - SMA[last - lookback]) / lookback     (0 if either absent)
//   center_k = baseline + slope × k
//   upper_k  = center_k + width / 2
//   lower_k  = center_k - width / 2
//
// The projection never feeds the trade-setup decision.
// =============================================================================

use chrono::{DateTime, Months};
use serde::Serialize;

use crate::indicators::{value_at, BollingerBands};
use crate::types::Interval;

const SECONDS_PER_DAY: i64 = 86_400;

/// One synthetic future point of the projected envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectedBand {
    pub timestamp: i64,
    pub center: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Project `horizon` future band points from the end of the real series.
///
/// `sma` and `bands` must be index-aligned to the real bars; `last_close` and
/// `last_timestamp` describe the final real bar.  Returns an empty vec when
/// there are no real bars.
pub fn project_bands(
    sma: &[Option<f64>],
    bands: &BollingerBands,
    last_close: f64,
    last_timestamp: i64,
    interval: Interval,
    horizon: usize,
    slope_lookback: usize,
) -> Vec<ProjectedBand> {
    let Some(last) = sma.len().checked_sub(1) else {
        return Vec::new();
    };

    let slope = match last.checked_sub(slope_lookback) {
        Some(start) if slope_lookback > 0 => match (value_at(sma, last), value_at(sma, start)) {
            (Some(end), Some(begin)) => (end - begin) / slope_lookback as f64,
            _ => 0.0,
        },
        _ => 0.0,
    };
    let half_width = bands.width_at(last).unwrap_or(0.0) / 2.0;
    let baseline = value_at(sma, last).unwrap_or(last_close);

    (1..=horizon)
        .map(|k| {
            let center = baseline + slope * k as f64;
            ProjectedBand {
                timestamp: step_timestamp(last_timestamp, interval, k),
                center,
                upper: center + half_width,
                lower: center - half_width,
            }
        })
        .collect()
}

/// Timestamp `steps` interval units after `timestamp`.
///
/// Monthly steps are calendar months; if the date falls outside chrono's
/// range a 30-day month is used instead.
pub fn step_timestamp(timestamp: i64, interval: Interval, steps: usize) -> i64 {
    let steps_i = steps as i64;
    match interval {
        Interval::Daily => timestamp + steps_i * SECONDS_PER_DAY,
        Interval::Weekly => timestamp + steps_i * 7 * SECONDS_PER_DAY,
        Interval::Monthly => u32::try_from(steps)
            .ok()
            .and_then(|m| DateTime::from_timestamp(timestamp, 0)?.checked_add_months(Months::new(m)))
            .map(|dt| dt.timestamp())
            .unwrap_or(timestamp + steps_i * 30 * SECONDS_PER_DAY),
    }
}
