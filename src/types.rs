// =============================================================================
// Shared types used across the TradeDash analysis engine
// =============================================================================

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single OHLCV bar as delivered by the market-data source.
///
/// `timestamp` is seconds since the UNIX epoch. Within one series timestamps
/// are strictly increasing and unique; the engine never mutates a bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl PriceBar {
    /// Convenience constructor for a bar where only the close is known.
    pub fn from_close(timestamp: i64, close: f64) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }
}

/// Bar interval requested by the caller.
///
/// Only the projection time step and the history range asked of the provider
/// depend on it; the indicator math is interval-agnostic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1wk")]
    Weekly,
    #[serde(rename = "1mo")]
    Monthly,
}

impl Interval {
    /// Provider code for this interval.
    pub fn code(self) -> &'static str {
        match self {
            Self::Daily => "1d",
            Self::Weekly => "1wk",
            Self::Monthly => "1mo",
        }
    }

    /// History range requested from the provider for this interval.
    pub fn history_range(self) -> &'static str {
        match self {
            Self::Daily => "1y",
            Self::Weekly => "5y",
            Self::Monthly => "10y",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Interval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" | "d" | "daily" => Ok(Self::Daily),
            "1wk" | "1w" | "w" | "weekly" => Ok(Self::Weekly),
            "1mo" | "mo" | "monthly" => Ok(Self::Monthly),
            other => anyhow::bail!("unsupported interval '{other}' (expected 1d, 1wk or 1mo)"),
        }
    }
}

/// Direction of the short-term trend relative to the long SMA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Action tag attached to a bar or to the overall analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parses_provider_codes() {
        assert_eq!("1d".parse::<Interval>().unwrap(), Interval::Daily);
        assert_eq!("1WK".parse::<Interval>().unwrap(), Interval::Weekly);
        assert_eq!(" 1mo ".parse::<Interval>().unwrap(), Interval::Monthly);
        assert!("5m".parse::<Interval>().is_err());
    }

    #[test]
    fn minute_codes_are_not_monthly() {
        // The provider uses 1m for one minute.
        assert!("1m".parse::<Interval>().is_err());
        assert!("m".parse::<Interval>().is_err());
        assert_eq!("monthly".parse::<Interval>().unwrap(), Interval::Monthly);
    }

    #[test]
    fn interval_serialises_as_code() {
        let json = serde_json::to_string(&Interval::Weekly).unwrap();
        assert_eq!(json, "\"1wk\"");
        assert_eq!(Interval::default(), Interval::Daily);
    }

    #[test]
    fn enums_serialise_uppercase() {
        assert_eq!(serde_json::to_string(&Trend::Bullish).unwrap(), "\"BULLISH\"");
        assert_eq!(serde_json::to_string(&Signal::Hold).unwrap(), "\"HOLD\"");
        assert_eq!(Trend::Neutral.to_string(), "NEUTRAL");
    }
}
