// =============================================================================
// Fundamentals — valuation snapshots and as-of alignment
// =============================================================================
//
// Valuation data arrives once per reporting period while prices arrive every
// bar.  `align_fundamentals` maps each bar to the latest snapshot that was
// already effective at the bar's own time (no lookahead).
//
//   Graham Number = sqrt(22.5 × EPS × BVPS)     (only for positive EPS and BVPS)
//   Lynch Line    = 15 × EPS
// =============================================================================

use serde::{Deserialize, Serialize};

/// Graham's P/E × P/B ceiling (15 × 1.5).
const GRAHAM_MULTIPLIER: f64 = 22.5;

/// Lynch's fair P/E.
const LYNCH_PE: f64 = 15.0;

/// Per-share valuation figures effective from `effective_date` onward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    /// Seconds since the UNIX epoch.
    pub effective_date: i64,
    pub earnings_per_share: f64,
    pub book_value_per_share: f64,
    pub graham_number: Option<f64>,
    pub lynch_line: f64,
}

impl FundamentalSnapshot {
    /// Build a snapshot from per-share figures, deriving both fair-value lines.
    pub fn from_per_share(effective_date: i64, eps: f64, bvps: f64) -> Self {
        let graham_number = (eps > 0.0 && bvps > 0.0).then(|| (GRAHAM_MULTIPLIER * eps * bvps).sqrt());
        Self {
            effective_date,
            earnings_per_share: eps,
            book_value_per_share: bvps,
            graham_number,
            lynch_line: LYNCH_PE * eps,
        }
    }
}

/// Fair-value pair attached to one bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AlignedFundamental {
    pub graham_number: Option<f64>,
    pub lynch_line: Option<f64>,
}

impl From<&FundamentalSnapshot> for AlignedFundamental {
    fn from(s: &FundamentalSnapshot) -> Self {
        Self {
            graham_number: s.graham_number,
            lynch_line: Some(s.lynch_line),
        }
    }
}

/// For each timestamp, select the most recent snapshot with
/// `effective_date <= timestamp`.
///
/// Both inputs must be sorted ascending.  A single forward-only cursor walks
/// the snapshots, so the pass is O(n + m) and never selects a snapshot dated
/// after the bar.  Bars that precede the first snapshot get an empty pair.
pub fn align_fundamentals(
    timestamps: &[i64],
    snapshots: &[FundamentalSnapshot],
) -> Vec<AlignedFundamental> {
    let mut aligned = Vec::with_capacity(timestamps.len());
    let mut cursor: Option<usize> = None;

    for &ts in timestamps {
        let mut next = cursor.map_or(0, |c| c + 1);
        while next < snapshots.len() && snapshots[next].effective_date <= ts {
            cursor = Some(next);
            next += 1;
        }
        aligned.push(cursor.map(|c| AlignedFundamental::from(&snapshots[c])).unwrap_or_default());
    }

    aligned
}
