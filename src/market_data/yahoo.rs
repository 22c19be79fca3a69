// =============================================================================
// Yahoo Finance client — chart and quoteSummary endpoints
// =============================================================================
//
// Public, unsigned endpoints.  The chart endpoint returns parallel arrays
// (timestamp, open, high, low, close, volume) in which non-trading slots are
// `null`; those bars are dropped.  Fundamentals are assembled from annual
// income statements and balance sheets divided by shares outstanding.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::MarketDataSource;
use crate::fundamentals::FundamentalSnapshot;
use crate::types::{Interval, PriceBar};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const FUNDAMENTAL_MODULES: &str = "incomeStatementHistory,balanceSheetHistory,defaultKeyStatistics";

/// Yahoo Finance market-data client.
#[derive(Clone)]
pub struct YahooSource {
    base_url: Url,
    client: reqwest::Client,
}

impl YahooSource {
    /// Create a client against `base_url` (e.g. `https://query1.finance.yahoo.com`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        let raw_url = base_url.into();
        let base_url =
            Url::parse(&raw_url).with_context(|| format!("invalid provider URL '{raw_url}'"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("provider URL '{raw_url}' cannot carry a path");
        }
        debug!(base_url = %base_url, "YahooSource initialised");

        Ok(Self { base_url, client })
    }

    /// `base/<path...>/<symbol>`, with the symbol escaped as a single segment.
    fn endpoint(&self, path: &[&str], symbol: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path).push(symbol);
        }
        url
    }

    fn chart_url(&self, symbol: &str, interval: Interval) -> Url {
        let mut url = self.endpoint(&["v8", "finance", "chart"], symbol);
        url.query_pairs_mut()
            .append_pair("range", interval.history_range())
            .append_pair("interval", interval.code());
        url
    }

    fn quote_summary_url(&self, symbol: &str) -> Url {
        let mut url = self.endpoint(&["v10", "finance", "quoteSummary"], symbol);
        url.query_pairs_mut().append_pair("modules", FUNDAMENTAL_MODULES);
        url
    }

    async fn get_json(&self, url: Url, what: &str) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {what} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("HTTP Error {} from {what}", status.as_u16());
        }

        resp.json()
            .await
            .with_context(|| format!("failed to parse {what} response"))
    }
}

#[async_trait]
impl MarketDataSource for YahooSource {
    #[instrument(skip(self), name = "yahoo::fetch_prices")]
    async fn fetch_prices(&self, symbol: &str, interval: Interval) -> Result<Vec<PriceBar>> {
        let body = self.get_json(self.chart_url(symbol, interval), "chart").await?;
        let bars = parse_chart(&body)?;
        debug!(symbol, interval = %interval, count = bars.len(), "chart fetched");
        Ok(bars)
    }

    #[instrument(skip(self), name = "yahoo::fetch_fundamentals")]
    async fn fetch_fundamentals(&self, symbol: &str) -> Result<Vec<FundamentalSnapshot>> {
        let body = self
            .get_json(self.quote_summary_url(symbol), "quoteSummary")
            .await?;
        let snapshots = parse_quote_summary(&body)?;
        debug!(symbol, count = snapshots.len(), "fundamentals fetched");
        Ok(snapshots)
    }
}

impl std::fmt::Debug for YahooSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooSource")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Envelope parsing
// -----------------------------------------------------------------------------

/// Parse a `/v8/finance/chart` envelope into bars.
///
/// Slots with a null close are skipped; null open/high/low fall back to the
/// close and a null volume to zero.
pub fn parse_chart(body: &Value) -> Result<Vec<PriceBar>> {
    let chart = &body["chart"];
    if let Some(desc) = chart["error"]["description"].as_str() {
        anyhow::bail!("provider error: {desc}");
    }

    let result = chart["result"]
        .get(0)
        .context("Invalid data format from API: chart.result is empty")?;

    // A symbol with no trading history has no timestamp array at all.
    let Some(timestamps) = result["timestamp"].as_array() else {
        return Ok(Vec::new());
    };

    let quote = result["indicators"]["quote"]
        .get(0)
        .context("Invalid data format from API: missing indicators.quote")?;
    let closes = quote["close"]
        .as_array()
        .context("Invalid data format from API: missing close array")?;

    let field = |name: &str, i: usize| quote[name].get(i).and_then(Value::as_f64);

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let Some(close) = closes.get(i).and_then(Value::as_f64) else {
            continue;
        };
        let timestamp = ts
            .as_i64()
            .with_context(|| format!("Invalid data format from API: timestamp[{i}]"))?;

        let mut bar = PriceBar::from_close(timestamp, close);
        bar.open = field("open", i).unwrap_or(close);
        bar.high = field("high", i).unwrap_or(close);
        bar.low = field("low", i).unwrap_or(close);
        bar.volume = field("volume", i).unwrap_or(0.0);
        bars.push(bar);
    }

    Ok(bars)
}

/// Parse a `/v10/finance/quoteSummary` envelope into per-share snapshots.
///
/// Each annual income statement is paired with the latest balance sheet whose
/// end date is not after it.  Statements without a matching balance sheet, or
/// when shares outstanding is unknown, are skipped.
pub fn parse_quote_summary(body: &Value) -> Result<Vec<FundamentalSnapshot>> {
    let result = body["quoteSummary"]["result"]
        .get(0)
        .context("quoteSummary.result is empty")?;

    let shares = raw(&result["defaultKeyStatistics"]["sharesOutstanding"])
        .filter(|s| *s > 0.0)
        .context("sharesOutstanding missing from quoteSummary")?;

    let income = statements(&result["incomeStatementHistory"], "incomeStatementHistory", "netIncome");

    let balance_root = &result["balanceSheetHistory"];
    let mut balance = statements(balance_root, "balanceSheetStatements", "totalStockholderEquity");
    if balance.is_empty() {
        balance = statements(balance_root, "balanceSheetHistory", "totalStockholderEquity");
    }
    balance.sort_by_key(|(date, _)| *date);

    let mut snapshots: Vec<FundamentalSnapshot> = income
        .iter()
        .filter_map(|&(date, net_income)| {
            let equity = balance.iter().rev().find(|(d, _)| *d <= date).map(|(_, e)| *e);
            if equity.is_none() {
                warn!(date, "no balance sheet on or before income statement; skipping");
            }
            Some(FundamentalSnapshot::from_per_share(date, net_income / shares, equity? / shares))
        })
        .collect();

    snapshots.sort_by_key(|s| s.effective_date);
    snapshots.dedup_by_key(|s| s.effective_date);
    Ok(snapshots)
}

/// `(endDate, value)` pairs from a statement list under `root[list_key]`.
fn statements(root: &Value, list_key: &str, value_key: &str) -> Vec<(i64, f64)> {
    root[list_key]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|s| Some((raw(&s["endDate"])? as i64, raw(&s[value_key])?)))
                .collect()
        })
        .unwrap_or_default()
}

/// Yahoo wraps numbers as `{ "raw": 123.0, "fmt": "123" }`.
fn raw(v: &Value) -> Option<f64> {
    v["raw"].as_f64().or_else(|| v.as_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(base: &str) -> YahooSource {
        YahooSource::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn chart_url_carries_range_and_interval() {
        let url = source("https://query1.finance.yahoo.com/").chart_url("BRK-B", Interval::Weekly);
        assert_eq!(
            url.as_str(),
            "https://query1.finance.yahoo.com/v8/finance/chart/BRK-B?range=5y&interval=1wk"
        );
    }

    #[test]
    fn symbol_cannot_escape_its_path_segment() {
        let yahoo = source("https://query1.finance.yahoo.com");
        let url = yahoo.chart_url("../../v7/finance/quote?symbols=MSFT#", Interval::Daily);

        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 4);
        assert_eq!(&segments[..3], &["v8", "finance", "chart"]);
        assert!(!segments[3].contains('/'));
        assert_eq!(url.fragment(), None);

        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            query,
            vec![("range".into(), "1y".into()), ("interval".into(), "1d".into())]
        );

        let summary = yahoo.quote_summary_url("A/B#C");
        assert_eq!(summary.path_segments().unwrap().count(), 4);
        assert_eq!(summary.fragment(), None);
        assert_eq!(summary.query_pairs().count(), 1);
    }

    #[test]
    fn base_url_path_prefix_is_kept() {
        let url = source("http://127.0.0.1:9000/proxy").quote_summary_url("AAPL");
        assert!(url.as_str().starts_with("http://127.0.0.1:9000/proxy/v10/finance/quoteSummary/AAPL?modules="));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(YahooSource::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn chart_drops_null_closes_and_fills_ohlc() {
        let body = json!({
            "chart": {
                "result": [{
                    "timestamp": [100, 200, 300],
                    "indicators": { "quote": [{
                        "open":   [1.0, null, 3.0],
                        "high":   [1.5, null, null],
                        "low":    [0.5, null, 2.5],
                        "close":  [1.2, null, 2.8],
                        "volume": [1000, null, null]
                    }]}
                }],
                "error": null
            }
        });
        let bars = parse_chart(&body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, 100);
        assert_eq!(bars[0].volume, 1000.0);
        assert_eq!(bars[1].timestamp, 300);
        assert_eq!(bars[1].high, 2.8);
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn chart_error_is_reported() {
        let body = json!({ "chart": { "result": null, "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" } } });
        let err = parse_chart(&body).unwrap_err();
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn chart_without_result_is_invalid_format() {
        let err = parse_chart(&json!({ "foo": 1 })).unwrap_err();
        assert!(err.to_string().contains("Invalid data format"));
    }

    #[test]
    fn chart_without_timestamps_is_empty() {
        let body = json!({ "chart": { "result": [{ "indicators": { "quote": [{}] } }], "error": null } });
        assert!(parse_chart(&body).unwrap().is_empty());
    }

    #[test]
    fn quote_summary_builds_per_share_snapshots() {
        let body = json!({
            "quoteSummary": { "result": [{
                "defaultKeyStatistics": { "sharesOutstanding": { "raw": 100.0 } },
                "incomeStatementHistory": { "incomeStatementHistory": [
                    { "endDate": { "raw": 2000 }, "netIncome": { "raw": 400.0 } },
                    { "endDate": { "raw": 1000 }, "netIncome": { "raw": 200.0 } }
                ]},
                "balanceSheetHistory": { "balanceSheetStatements": [
                    { "endDate": { "raw": 1000 }, "totalStockholderEquity": { "raw": 1000.0 } },
                    { "endDate": { "raw": 2000 }, "totalStockholderEquity": { "raw": 250.0 } }
                ]}
            }]}
        });
        let snaps = parse_quote_summary(&body).unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].effective_date, 1000);
        assert_eq!(snaps[0].earnings_per_share, 2.0);
        assert_eq!(snaps[0].book_value_per_share, 10.0);
        assert_eq!(snaps[1].earnings_per_share, 4.0);
        // sqrt(22.5 × 4 × 2.5) = 15
        assert_eq!(snaps[1].graham_number, Some(15.0));
    }

    #[test]
    fn quote_summary_skips_statements_without_balance_sheet() {
        let body = json!({
            "quoteSummary": { "result": [{
                "defaultKeyStatistics": { "sharesOutstanding": { "raw": 10.0 } },
                "incomeStatementHistory": { "incomeStatementHistory": [
                    { "endDate": { "raw": 500 }, "netIncome": { "raw": 10.0 } }
                ]},
                "balanceSheetHistory": { "balanceSheetHistory": [
                    { "endDate": { "raw": 900 }, "totalStockholderEquity": { "raw": 100.0 } }
                ]}
            }]}
        });
        assert!(parse_quote_summary(&body).unwrap().is_empty());
    }

    #[test]
    fn quote_summary_requires_shares() {
        let body = json!({ "quoteSummary": { "result": [{ "defaultKeyStatistics": {} }] } });
        assert!(parse_quote_summary(&body).is_err());
    }
}
