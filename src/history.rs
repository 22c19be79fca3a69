// =============================================================================
// History Assembler — one analysis call end to end
// =============================================================================
//
// Pipeline (all request-scoped, nothing shared between calls):
//   1. validate the price series
//   2. compute every indicator series over the closes
//   3. align fundamentals onto the bar timeline
//   4. annotate each bar with its historical signal
//   5. evaluate the trade setup on the latest bar
//   6. append the projected band points
//
// `analyze` never fails: contract violations become a single top-level error
// response with no history and no trade setup.
// =============================================================================

use chrono::DateTime;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::fundamentals::{align_fundamentals, AlignedFundamental, FundamentalSnapshot};
use crate::indicators::{
    bollinger_bands, calculate_ema, calculate_rsi, calculate_sma, last_value, rolling_std_dev,
    value_at, BollingerBands, Series,
};
use crate::projection::{project_bands, ProjectedBand};
use crate::runtime_config::EngineConfig;
use crate::signals::{classify_bars, evaluate_trade_setup, SetupInputs, TradeSetup};
use crate::types::{Interval, PriceBar, Signal};

const INSUFFICIENT_RSI_WARNING: &str = "Insufficient data for RSI";

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One row of the merged output: a real bar or a projected point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub time: i64,
    pub date: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub rsi: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_200: Option<f64>,
    pub upper_band: Option<f64>,
    pub lower_band: Option<f64>,
    pub graham_number: Option<f64>,
    pub lynch_line: Option<f64>,
    pub signal: Option<Signal>,
    pub is_projection: bool,
}

/// Latest value of every indicator at the last real bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatestIndicators {
    pub rsi: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_200: Option<f64>,
    pub upper_band: Option<f64>,
    pub lower_band: Option<f64>,
    pub graham_number: Option<f64>,
    pub lynch_line: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Complete result of one analysis call, as returned to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub symbol: String,
    pub interval: Interval,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub history: Vec<HistoryRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(flatten)]
    pub latest: LatestIndicators,
    pub signal: Signal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_setup: Option<TradeSetup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl AnalysisResponse {
    /// Top-level error result: no history, no trade setup.
    pub fn error(symbol: impl Into<String>, interval: Interval, detail: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            status: Status::Error,
            detail: Some(detail.into()),
            history: Vec::new(),
            current_price: None,
            latest: LatestIndicators::default(),
            signal: Signal::Hold,
            trade_setup: None,
            warning: None,
        }
    }
}

/// Engine output before it is wrapped for the API.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub history: Vec<HistoryRecord>,
    pub current_price: f64,
    pub latest: LatestIndicators,
    /// `None` when RSI is undefined at the latest bar.
    pub trade_setup: Option<TradeSetup>,
}

// ---------------------------------------------------------------------------
// Indicator set
// ---------------------------------------------------------------------------

/// Every series the engine derives from the closes, index-aligned.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub rsi: Series,
    pub sma_short: Series,
    pub sma_long: Series,
    pub sma_macro: Series,
    pub ema_macro: Series,
    pub bands: BollingerBands,
}

impl IndicatorSet {
    pub fn compute(closes: &[f64], config: &EngineConfig) -> Self {
        let sma_short = calculate_sma(closes, config.sma_short_period);
        let std_dev = rolling_std_dev(closes, config.sma_short_period, &sma_short);
        let bands = bollinger_bands(&sma_short, &std_dev, config.bollinger_k);

        Self {
            rsi: calculate_rsi(closes, config.rsi_period),
            sma_long: calculate_sma(closes, config.sma_long_period),
            sma_macro: calculate_sma(closes, config.sma_macro_period),
            ema_macro: calculate_ema(closes, config.ema_macro_period),
            sma_short,
            bands,
        }
    }

    fn latest(&self, last: usize, fundamental: AlignedFundamental) -> LatestIndicators {
        LatestIndicators {
            rsi: value_at(&self.rsi, last),
            sma_20: value_at(&self.sma_short, last),
            sma_50: value_at(&self.sma_long, last),
            sma_200: value_at(&self.sma_macro, last),
            ema_200: value_at(&self.ema_macro, last),
            upper_band: last_value(&self.bands.upper),
            lower_band: last_value(&self.bands.lower),
            graham_number: fundamental.graham_number,
            lynch_line: fundamental.lynch_line,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Analyse one symbol.  Always returns a response; engine errors become a
/// `status = "error"` result.
pub fn analyze(
    symbol: &str,
    bars: &[PriceBar],
    fundamentals: &[FundamentalSnapshot],
    interval: Interval,
    config: &EngineConfig,
) -> AnalysisResponse {
    match build_analysis(bars, fundamentals, interval, config) {
        Ok(analysis) => {
            let signal = analysis
                .trade_setup
                .as_ref()
                .map_or(Signal::Hold, |s| s.recommendation.signal());
            let warning = analysis
                .trade_setup
                .is_none()
                .then(|| INSUFFICIENT_RSI_WARNING.to_string());

            AnalysisResponse {
                symbol: symbol.to_string(),
                interval,
                status: Status::Ok,
                detail: None,
                history: analysis.history,
                current_price: Some(analysis.current_price),
                latest: analysis.latest,
                signal,
                trade_setup: analysis.trade_setup,
                warning,
            }
        }
        Err(e) => {
            warn!(symbol, error = %e, "analysis rejected input");
            AnalysisResponse::error(symbol, interval, e.to_string())
        }
    }
}

/// Run the full pipeline over one price series.
pub fn build_analysis(
    bars: &[PriceBar],
    fundamentals: &[FundamentalSnapshot],
    interval: Interval,
    config: &EngineConfig,
) -> Result<Analysis, AnalysisError> {
    validate_bars(bars)?;
    let last = bars.len() - 1;
    let last_bar = bars[last];

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp).collect();

    let ind = IndicatorSet::compute(&closes, config);

    let mut snapshots = fundamentals.to_vec();
    snapshots.sort_by_key(|s| s.effective_date);
    let aligned = align_fundamentals(&timestamps, &snapshots);

    let signals = classify_bars(&closes, &ind.rsi, &ind.bands, &config.thresholds);

    let latest = ind.latest(last, aligned[last]);
    let trade_setup = evaluate_trade_setup(
        &SetupInputs {
            close: last_bar.close,
            volume: last_bar.volume,
            rsi: latest.rsi,
            sma_long: latest.sma_50,
            upper_band: latest.upper_band,
            lower_band: latest.lower_band,
            ema_macro: latest.ema_200,
        },
        &config.thresholds,
    );

    let projection = project_bands(
        &ind.sma_short,
        &ind.bands,
        last_bar.close,
        last_bar.timestamp,
        interval,
        config.projection_horizon,
        config.slope_lookback,
    );

    let mut history = Vec::with_capacity(bars.len() + projection.len());
    for (i, bar) in bars.iter().enumerate() {
        history.push(HistoryRecord {
            time: bar.timestamp,
            date: format_date(bar.timestamp),
            open: Some(bar.open),
            high: Some(bar.high),
            low: Some(bar.low),
            close: Some(bar.close),
            volume: Some(bar.volume),
            rsi: value_at(&ind.rsi, i),
            sma_20: value_at(&ind.sma_short, i),
            sma_50: value_at(&ind.sma_long, i),
            sma_200: value_at(&ind.sma_macro, i),
            ema_200: value_at(&ind.ema_macro, i),
            upper_band: value_at(&ind.bands.upper, i),
            lower_band: value_at(&ind.bands.lower, i),
            graham_number: aligned[i].graham_number,
            lynch_line: aligned[i].lynch_line,
            signal: signals[i],
            is_projection: false,
        });
    }
    history.extend(
        projection
            .iter()
            .map(|p| projection_record(p, aligned[last])),
    );

    debug!(
        bars = bars.len(),
        projected = projection.len(),
        snapshots = snapshots.len(),
        has_setup = trade_setup.is_some(),
        "history assembled"
    );

    Ok(Analysis {
        history,
        current_price: last_bar.close,
        latest,
        trade_setup,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_bars(bars: &[PriceBar]) -> Result<(), AnalysisError> {
    if bars.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    for (index, bar) in bars.iter().enumerate() {
        if !bar.close.is_finite() {
            return Err(AnalysisError::NonFiniteClose { index });
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(AnalysisError::NonMonotonicTimestamps {
                index,
                previous: bars[index - 1].timestamp,
                timestamp: bar.timestamp,
            });
        }
    }
    Ok(())
}

fn projection_record(p: &ProjectedBand, fundamental: AlignedFundamental) -> HistoryRecord {
    HistoryRecord {
        time: p.timestamp,
        date: format_date(p.timestamp),
        open: None,
        high: None,
        low: None,
        close: None,
        volume: None,
        rsi: None,
        sma_20: Some(p.center),
        sma_50: None,
        sma_200: None,
        ema_200: None,
        upper_band: Some(p.upper),
        lower_band: Some(p.lower),
        graham_number: fundamental.graham_number,
        lynch_line: fundamental.lynch_line,
        signal: None,
        is_projection: true,
    }
}

fn format_date(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::RecommendationTier;
    use crate::types::Trend;

    const DAY: i64 = 86_400;
    // 2024-01-01T00:00:00Z
    const START: i64 = 1_704_067_200;

    fn bars_from(closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                volume: 1_000.0,
                ..PriceBar::from_close(START + i as i64 * DAY, c)
            })
            .collect()
    }

    fn run(closes: &[f64]) -> AnalysisResponse {
        analyze("TEST", &bars_from(closes), &[], Interval::Daily, &EngineConfig::default())
    }

    #[test]
    fn flat_series_end_to_end() {
        let resp = run(&[10.0; 60]);
        assert_eq!(resp.status, Status::Ok);
        assert_eq!(resp.history.len(), 65);

        let real = &resp.history[..60];
        assert!(real[..14].iter().all(|r| r.rsi.is_none()));
        assert!(real[14..].iter().all(|r| r.rsi == Some(100.0)));
        assert_eq!(real[59].sma_50, Some(10.0));
        assert_eq!(real[59].upper_band, Some(10.0));
        assert_eq!(real[59].lower_band, Some(10.0));

        let setup = resp.trade_setup.expect("trade setup");
        assert_eq!(setup.trend, Trend::Neutral);
        assert_eq!(setup.recommendation, RecommendationTier::RiskyBounce);
        assert_eq!(setup.target_entry, 10.0);
        assert_eq!(setup.stop_loss, 10.0 * 0.97);
        assert_eq!(setup.take_profit, 10.0);
        assert!(resp.warning.is_none());
    }

    #[test]
    fn rising_then_flattening_enters_near_support() {
        // 40 rising bars, then 20 bars alternating 140 / 138 (mean 139, σ 1).
        let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        closes.extend((0..20).map(|i| if i % 2 == 0 { 140.0 } else { 138.0 }));

        let resp = run(&closes);
        let setup = resp.trade_setup.expect("trade setup");
        let sma_50 = resp.latest.sma_50.unwrap();
        let lower = resp.latest.lower_band.unwrap();
        let support = sma_50.max(lower);

        assert_eq!(setup.trend, Trend::Bullish);
        assert_eq!(lower, 137.0);
        assert!(138.0 / support > 1.0 && 138.0 / support <= 1.02);
        assert_eq!(setup.recommendation, RecommendationTier::EnterNow);
        assert_eq!(setup.target_entry, 138.0);
        assert_eq!(setup.stop_loss, setup.target_entry * 0.96);
        assert_eq!(setup.take_profit, 141.0);
        assert_eq!(resp.signal, Signal::Buy);
    }

    #[test]
    fn empty_input_is_error_result() {
        let resp = analyze("NONE", &[], &[], Interval::Daily, &EngineConfig::default());
        assert_eq!(resp.status, Status::Error);
        assert_eq!(resp.detail.as_deref(), Some("No valid data found"));
        assert!(resp.history.is_empty());
        assert!(resp.trade_setup.is_none());
        assert!(resp.current_price.is_none());
    }

    #[test]
    fn out_of_order_timestamps_are_rejected() {
        let mut bars = bars_from(&[1.0, 2.0, 3.0]);
        bars[2].timestamp = bars[1].timestamp;
        let err = build_analysis(&bars, &[], Interval::Daily, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::NonMonotonicTimestamps { index: 2, .. }));
    }

    #[test]
    fn non_finite_close_is_rejected() {
        let bars = bars_from(&[1.0, f64::NAN, 3.0]);
        let err = build_analysis(&bars, &[], Interval::Daily, &EngineConfig::default()).unwrap_err();
        assert_eq!(err, AnalysisError::NonFiniteClose { index: 1 });
    }

    #[test]
    fn short_history_reports_insufficient_data() {
        let resp = run(&[5.0, 5.5, 6.0, 5.8, 6.1]);
        assert_eq!(resp.status, Status::Ok);
        assert!(resp.trade_setup.is_none());
        assert_eq!(resp.warning.as_deref(), Some(INSUFFICIENT_RSI_WARNING));
        assert_eq!(resp.signal, Signal::Hold);
        assert_eq!(resp.current_price, Some(6.1));
        // Real bars plus projection, all indicator slots absent on real bars.
        assert_eq!(resp.history.len(), 10);
        assert!(resp.history[..5].iter().all(|r| r.sma_20.is_none() && r.rsi.is_none()));
    }

    #[test]
    fn projection_records_follow_real_bars() {
        let closes: Vec<f64> = (0..30).map(|i| 50.0 + (i % 4) as f64).collect();
        let resp = run(&closes);
        let (real, projected) = resp.history.split_at(30);

        assert!(real.iter().all(|r| !r.is_projection));
        assert_eq!(projected.len(), 5);
        for (k, p) in projected.iter().enumerate() {
            assert!(p.is_projection);
            assert!(p.close.is_none() && p.open.is_none() && p.volume.is_none());
            assert!(p.rsi.is_none() && p.sma_50.is_none());
            assert!(p.upper_band.is_some() && p.lower_band.is_some());
            assert_eq!(p.time, real[29].time + (k as i64 + 1) * DAY);
        }
    }

    #[test]
    fn fundamentals_align_and_carry_into_projection() {
        let bars = bars_from(&[20.0; 30]);
        let snaps = [
            FundamentalSnapshot::from_per_share(START + 20 * DAY, 2.0, 10.0),
            FundamentalSnapshot::from_per_share(START + 10 * DAY, 1.0, 10.0),
        ];
        let analysis = build_analysis(&bars, &snaps, Interval::Daily, &EngineConfig::default()).unwrap();
        let h = &analysis.history;

        assert_eq!(h[9].lynch_line, None);
        assert_eq!(h[10].lynch_line, Some(15.0));
        assert_eq!(h[19].lynch_line, Some(15.0));
        assert_eq!(h[20].lynch_line, Some(30.0));
        assert_eq!(h[34].lynch_line, Some(30.0));
        assert!(h[34].is_projection);
        assert_eq!(analysis.latest.graham_number, h[29].graham_number);
    }

    #[test]
    fn concurrent_calls_are_independent() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + ((i * 13) % 17) as f64).collect();
        let bars = bars_from(&closes);
        let config = EngineConfig::default();

        let (a, b) = std::thread::scope(|s| {
            let ha = s.spawn(|| build_analysis(&bars, &[], Interval::Daily, &config).unwrap());
            let hb = s.spawn(|| build_analysis(&bars, &[], Interval::Weekly, &config).unwrap());
            (ha.join().unwrap(), hb.join().unwrap())
        });

        assert_eq!(a.history[..120], b.history[..120]);
        assert_eq!(a.trade_setup, b.trade_setup);
        assert_eq!(b.history[120].time, bars[119].timestamp + 7 * DAY);
    }

    #[test]
    fn response_serialises_flat_latest_values() {
        let json = serde_json::to_value(run(&[10.0; 60])).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["signal"], "BUY");
        assert_eq!(json["sma_50"], 10.0);
        assert_eq!(json["trade_setup"]["recommendation"], "RISKY_BOUNCE");
        assert_eq!(json["history"][0]["date"], "2024-01-01");
        assert!(json.get("warning").is_none());
    }
}
