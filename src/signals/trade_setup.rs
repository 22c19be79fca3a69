// =============================================================================
// Trade Setup — current trend and a single entry / stop / target triple
// =============================================================================
//
// Evaluated on the latest bar only.  The trend (close vs long SMA) and the
// distance to support / the lower band select exactly one tier:
//
//   BULLISH, close <= support × 1.02   => EnterNow         entry = close
//   BULLISH, otherwise                 => WaitForPullback  entry = support
//   not BULLISH, close <= lower × 1.01 => RiskyBounce      entry = close
//   not BULLISH, otherwise             => AvoidOrSell      entry = lower band
//
// support = max(SMA_long, lower band).  A missing band is replaced by a fixed
// fraction of the close; a missing long SMA makes the trend NEUTRAL and uses
// the close as the reference level.  The tier is the single source of truth:
// the headline signal and the rationale text are both rendered from it (the
// rationale also names a NEUTRAL trend as such).
// =============================================================================

use serde::Serialize;
use tracing::debug;

use crate::runtime_config::SignalThresholds;
use crate::types::{Signal, Trend};

/// Recommendation tier selected by the decision tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationTier {
    EnterNow,
    WaitForPullback,
    RiskyBounce,
    AvoidOrSell,
}

impl RecommendationTier {
    /// Short label shown to the user.
    pub fn label(self) -> &'static str {
        match self {
            Self::EnterNow => "Enter now",
            Self::WaitForPullback => "Wait for pullback",
            Self::RiskyBounce => "Risky bounce",
            Self::AvoidOrSell => "Avoid / sell",
        }
    }

    /// Headline action implied by the tier.
    pub fn signal(self) -> Signal {
        match self {
            Self::EnterNow | Self::RiskyBounce => Signal::Buy,
            Self::WaitForPullback => Signal::Hold,
            Self::AvoidOrSell => Signal::Sell,
        }
    }
}

impl std::fmt::Display for RecommendationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Latest-bar values the decision tree reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetupInputs {
    pub close: f64,
    pub volume: f64,
    pub rsi: Option<f64>,
    pub sma_long: Option<f64>,
    pub upper_band: Option<f64>,
    pub lower_band: Option<f64>,
    pub ema_macro: Option<f64>,
}

/// The recommended trade for the latest bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeSetup {
    pub trend: Trend,
    pub macro_trend: Trend,
    pub recommendation: RecommendationTier,
    pub label: &'static str,
    pub target_entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub rationale: String,
}

/// Run the decision tree for the latest bar.
///
/// Returns `None` when RSI is not yet defined (insufficient history); in every
/// other case all three price levels are finite numbers.
pub fn evaluate_trade_setup(inputs: &SetupInputs, t: &SignalThresholds) -> Option<TradeSetup> {
    let rsi = inputs.rsi?;
    let close = inputs.close;

    let upper = inputs.upper_band.unwrap_or(close * t.upper_band_fallback);
    let lower = inputs.lower_band.unwrap_or(close * t.lower_band_fallback);

    let (trend, reference) = match inputs.sma_long {
        Some(sma) if close > sma => (Trend::Bullish, sma),
        Some(sma) if close < sma => (Trend::Bearish, sma),
        Some(sma) => (Trend::Neutral, sma),
        None => (Trend::Neutral, close),
    };

    let (tier, target_entry, stop_loss, take_profit) = match trend {
        Trend::Bullish => {
            let support = reference.max(lower);
            if close <= support * t.near_support_tolerance {
                (RecommendationTier::EnterNow, close, close * t.bullish_stop_multiplier, upper)
            } else {
                (
                    RecommendationTier::WaitForPullback,
                    support,
                    support * t.bullish_stop_multiplier,
                    upper,
                )
            }
        }
        Trend::Bearish | Trend::Neutral => {
            if close <= lower * t.at_floor_tolerance {
                (RecommendationTier::RiskyBounce, close, close * t.bounce_stop_multiplier, reference)
            } else {
                (RecommendationTier::AvoidOrSell, lower, lower * t.avoid_stop_multiplier, reference)
            }
        }
    };

    let macro_trend = macro_trend(close, inputs.ema_macro.or(inputs.sma_long));

    debug!(
        trend = %trend,
        macro_trend = %macro_trend,
        tier = %tier,
        entry = target_entry,
        stop = stop_loss,
        target = take_profit,
        "trade setup evaluated"
    );

    Some(TradeSetup {
        trend,
        macro_trend,
        recommendation: tier,
        label: tier.label(),
        target_entry,
        stop_loss,
        take_profit,
        rationale: render_rationale(tier, trend, macro_trend, close, rsi, inputs.volume),
    })
}

fn macro_trend(close: f64, reference: Option<f64>) -> Trend {
    match reference {
        Some(r) if close > r => Trend::Bullish,
        Some(r) if close < r => Trend::Bearish,
        _ => Trend::Neutral,
    }
}

fn render_rationale(
    tier: RecommendationTier,
    trend: Trend,
    macro_trend: Trend,
    close: f64,
    rsi: f64,
    volume: f64,
) -> String {
    let directionless = trend == Trend::Neutral;
    let headline = match tier {
        RecommendationTier::EnterNow => format!(
            "Good entry: the short-term trend is up and price ({close:.2}) is sitting on support."
        ),
        RecommendationTier::WaitForPullback => format!(
            "Be patient: the short-term trend is up but price ({close:.2}) is stretched above support. \
             Wait for a dip towards the entry level."
        ),
        RecommendationTier::RiskyBounce if directionless => format!(
            "Aggressive setup: price ({close:.2}) has no clear trend and is sitting on the lower band. \
             Keep the position small and the stop tight."
        ),
        RecommendationTier::RiskyBounce => format!(
            "Aggressive setup: price ({close:.2}) has fallen to the lower band and may bounce. \
             Keep the position small and the stop tight."
        ),
        RecommendationTier::AvoidOrSell if directionless => format!(
            "Stay away: price ({close:.2}) has no clear trend and is not yet at the floor."
        ),
        RecommendationTier::AvoidOrSell => format!(
            "Stay away: price ({close:.2}) is trending down and is not yet at the floor."
        ),
    };
    format!(
        "{headline} RSI {rsi:.1}, volume {:.0}k. Macro trend: {macro_trend}.",
        volume / 1000.0
    )
}
