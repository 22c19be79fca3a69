// =============================================================================
// Signals Module
// =============================================================================
//
// Decision logic layered on top of the indicator series:
// - Per-bar historical BUY / SELL annotation (stateless, one bar at a time)
// - Current trend classification and trade setup for the latest bar

pub mod bar_signal;
pub mod trade_setup;

pub use bar_signal::{bar_signal, classify_bars};
pub use trade_setup::{evaluate_trade_setup, RecommendationTier, SetupInputs, TradeSetup};
