// =============================================================================
// Runtime Configuration — Engine settings with atomic save
// =============================================================================
//
// Every tunable parameter of the analysis engine lives here: indicator
// periods, projection horizon, and the signal / trade-setup thresholds.
// The thresholds have varied between strategy generations, so they are data,
// not constants.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_rsi_period() -> usize {
    14
}

fn default_sma_short_period() -> usize {
    20
}

fn default_sma_long_period() -> usize {
    50
}

fn default_macro_period() -> usize {
    200
}

fn default_bollinger_k() -> f64 {
    2.0
}

fn default_projection_horizon() -> usize {
    5
}

fn default_slope_lookback() -> usize {
    5
}

fn default_buy_rsi_below() -> f64 {
    40.0
}

fn default_sell_rsi_above() -> f64 {
    60.0
}

fn default_lower_band_tolerance() -> f64 {
    1.02
}

fn default_upper_band_tolerance() -> f64 {
    0.98
}

fn default_near_support_tolerance() -> f64 {
    1.02
}

fn default_at_floor_tolerance() -> f64 {
    1.01
}

fn default_bullish_stop_multiplier() -> f64 {
    0.96
}

fn default_bounce_stop_multiplier() -> f64 {
    0.97
}

fn default_avoid_stop_multiplier() -> f64 {
    0.95
}

fn default_lower_band_fallback() -> f64 {
    0.95
}

fn default_upper_band_fallback() -> f64 {
    1.05
}

// =============================================================================
// SignalThresholds
// =============================================================================

/// Thresholds for the per-bar signal and the trade-setup decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    /// Per-bar BUY requires RSI strictly below this.
    #[serde(default = "default_buy_rsi_below")]
    pub buy_rsi_below: f64,

    /// Per-bar SELL requires RSI strictly above this.
    #[serde(default = "default_sell_rsi_above")]
    pub sell_rsi_above: f64,

    /// Per-bar BUY requires close <= lower band × this.
    #[serde(default = "default_lower_band_tolerance")]
    pub lower_band_tolerance: f64,

    /// Per-bar SELL requires close >= upper band × this.
    #[serde(default = "default_upper_band_tolerance")]
    pub upper_band_tolerance: f64,

    /// Bullish trend: close <= support × this counts as "near support".
    #[serde(default = "default_near_support_tolerance")]
    pub near_support_tolerance: f64,

    /// Non-bullish trend: close <= lower band × this counts as "at the floor".
    #[serde(default = "default_at_floor_tolerance")]
    pub at_floor_tolerance: f64,

    /// Stop for both bullish tiers, as a multiple of the entry.
    #[serde(default = "default_bullish_stop_multiplier")]
    pub bullish_stop_multiplier: f64,

    /// Stop for the risky-bounce tier, as a multiple of the close.
    #[serde(default = "default_bounce_stop_multiplier")]
    pub bounce_stop_multiplier: f64,

    /// Stop for the avoid/sell tier, as a multiple of the entry.
    #[serde(default = "default_avoid_stop_multiplier")]
    pub avoid_stop_multiplier: f64,

    /// Stand-in for a missing lower band, as a multiple of the close.
    #[serde(default = "default_lower_band_fallback")]
    pub lower_band_fallback: f64,

    /// Stand-in for a missing upper band, as a multiple of the close.
    #[serde(default = "default_upper_band_fallback")]
    pub upper_band_fallback: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            buy_rsi_below: default_buy_rsi_below(),
            sell_rsi_above: default_sell_rsi_above(),
            lower_band_tolerance: default_lower_band_tolerance(),
            upper_band_tolerance: default_upper_band_tolerance(),
            near_support_tolerance: default_near_support_tolerance(),
            at_floor_tolerance: default_at_floor_tolerance(),
            bullish_stop_multiplier: default_bullish_stop_multiplier(),
            bounce_stop_multiplier: default_bounce_stop_multiplier(),
            avoid_stop_multiplier: default_avoid_stop_multiplier(),
            lower_band_fallback: default_lower_band_fallback(),
            upper_band_fallback: default_upper_band_fallback(),
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level configuration for one analysis call.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// RSI look-back (Wilder).
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// SMA period of the Bollinger middle band.
    #[serde(default = "default_sma_short_period")]
    pub sma_short_period: usize,

    /// SMA period that defines the short-term trend.
    #[serde(default = "default_sma_long_period")]
    pub sma_long_period: usize,

    /// Long-term SMA, reported only.
    #[serde(default = "default_macro_period")]
    pub sma_macro_period: usize,

    /// EMA used for the macro-trend note in the rationale.
    #[serde(default = "default_macro_period")]
    pub ema_macro_period: usize,

    /// Bollinger band multiplier k.
    #[serde(default = "default_bollinger_k")]
    pub bollinger_k: f64,

    /// Number of synthetic bars appended after the last real bar.
    #[serde(default = "default_projection_horizon")]
    pub projection_horizon: usize,

    /// Bars over which the projection slope of the middle band is measured.
    #[serde(default = "default_slope_lookback")]
    pub slope_lookback: usize,

    #[serde(default)]
    pub thresholds: SignalThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            sma_short_period: default_sma_short_period(),
            sma_long_period: default_sma_long_period(),
            sma_macro_period: default_macro_period(),
            ema_macro_period: default_macro_period(),
            bollinger_k: default_bollinger_k(),
            projection_horizon: default_projection_horizon(),
            slope_lookback: default_slope_lookback(),
            thresholds: SignalThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            rsi_period = config.rsi_period,
            sma_long_period = config.sma_long_period,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write (write to
    /// `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }
}

// =============================================================================
// ServerConfig
// =============================================================================

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_CONFIG_PATH: &str = "engine_config.json";
const DEFAULT_PROVIDER_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Process-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub config_path: PathBuf,
    pub provider_url: String,
    pub provider_timeout: Duration,
}

impl ServerConfig {
    /// Read `TRADEDASH_*` variables, falling back to defaults for any that are
    /// unset.  A variable that is set but malformed is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind = lookup("TRADEDASH_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind
            .parse()
            .with_context(|| format!("invalid TRADEDASH_BIND_ADDR '{bind}'"))?;

        let timeout_secs = match lookup("TRADEDASH_PROVIDER_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid TRADEDASH_PROVIDER_TIMEOUT_SECS '{raw}'"))?,
            None => DEFAULT_PROVIDER_TIMEOUT_SECS,
        };

        Ok(Self {
            bind_addr,
            config_path: lookup("TRADEDASH_CONFIG")
                .unwrap_or_else(|| DEFAULT_CONFIG_PATH.into())
                .into(),
            provider_url: lookup("TRADEDASH_PROVIDER_URL")
                .unwrap_or_else(|| DEFAULT_PROVIDER_URL.into()),
            provider_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
