// =============================================================================
// Market Data Sources
// =============================================================================
//
// The engine only needs an ordered price series and, optionally, a sparse
// fundamentals series.  Where they come from is hidden behind
// `MarketDataSource` so the HTTP layer can be exercised without a network.

pub mod yahoo;

use anyhow::Result;
use async_trait::async_trait;

use crate::fundamentals::FundamentalSnapshot;
use crate::types::{Interval, PriceBar};

pub use yahoo::YahooSource;

/// Provider of price bars and valuation snapshots for a symbol.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Ordered (ascending timestamp) OHLCV bars for `symbol`.
    async fn fetch_prices(&self, symbol: &str, interval: Interval) -> Result<Vec<PriceBar>>;

    /// Valuation snapshots for `symbol`, ascending by effective date.
    async fn fetch_fundamentals(&self, symbol: &str) -> Result<Vec<FundamentalSnapshot>>;
}
