// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
//   GET /                         banner
//   GET /api/v1/health            liveness + uptime
//   GET /analyze/:symbol          full analysis (?interval=1d|1wk|1mo)
//
// Malformed symbols and intervals are rejected with 400 before any provider
// call.  Provider failures are answered with a JSON error result and 502;
// engine errors come back exactly as the engine reports them (status "error",
// 200).
// CORS is permissive: the dashboard is served from a different origin.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::history::{analyze, AnalysisResponse, Status};
use crate::types::Interval;

// =============================================================================
// Router construction
// =============================================================================

/// Build the REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/api/v1/health", get(health))
        .route("/analyze/:symbol", get(analyze_symbol))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Banner / health
// =============================================================================

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Trade Dashboard API is running" }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.uptime_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Analysis
// =============================================================================

#[derive(Deserialize)]
struct AnalyzeQuery {
    #[serde(default)]
    interval: Option<String>,
}

async fn analyze_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<AnalyzeQuery>,
) -> Response {
    let symbol = symbol.trim().to_uppercase();
    if !is_ticker(&symbol) {
        warn!(symbol = %symbol, "rejected malformed symbol");
        let body = AnalysisResponse::error(&symbol, Interval::default(), "invalid symbol");
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    let interval = match query.interval.as_deref().map(str::parse::<Interval>).transpose() {
        Ok(interval) => interval.unwrap_or_default(),
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "rejected analysis request");
            let body = AnalysisResponse::error(&symbol, Interval::default(), e.to_string());
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    info!(symbol = %symbol, interval = %interval, "analysis requested");

    // Valuation lines are optional; they are fetched alongside the prices and
    // the analysis goes ahead without them.
    let (prices, fundamentals) = tokio::join!(
        state.source.fetch_prices(&symbol, interval),
        state.source.fetch_fundamentals(&symbol),
    );

    let bars = match prices {
        Ok(bars) => bars,
        Err(e) => {
            let detail = format!("{e:#}");
            warn!(symbol = %symbol, error = %detail, "price fetch failed");
            let body = AnalysisResponse::error(&symbol, interval, detail);
            return (StatusCode::BAD_GATEWAY, Json(body)).into_response();
        }
    };

    let fundamentals = fundamentals.unwrap_or_else(|e| {
        warn!(symbol = %symbol, error = %e, "fundamentals unavailable");
        Vec::new()
    });

    let response = analyze(&symbol, &bars, &fundamentals, interval, &state.engine_config);
    if response.status == Status::Ok {
        info!(
            symbol = %symbol,
            bars = bars.len(),
            signal = %response.signal,
            "analysis complete"
        );
    }

    Json(response).into_response()
}

/// Exchange tickers: letters, digits and `.^=-` (e.g. `BRK-B`, `^GSPC`, `EURUSD=X`).
fn is_ticker(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= 32
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '=' | '-'))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::fundamentals::FundamentalSnapshot;
    use crate::market_data::fixture::StaticSource;
    use crate::runtime_config::EngineConfig;
    use crate::types::PriceBar;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use crate::market_data::MarketDataSource;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Barrier;
    use tower::ServiceExt;

    const DAY: i64 = 86_400;

    fn app() -> Router {
        let mut source = StaticSource::default();
        let bars: Vec<PriceBar> = (0..60)
            .map(|i| PriceBar::from_close(1_704_067_200 + i * DAY, 100.0 + (i % 5) as f64))
            .collect();
        source.prices.insert("AAPL".into(), bars.clone());
        source.fundamentals.insert(
            "AAPL".into(),
            vec![FundamentalSnapshot::from_per_share(1_704_067_200, 6.0, 4.0)],
        );
        // No fundamentals registered for this one.
        source.prices.insert("BTC-USD".into(), bars);
        source.prices.insert("EMPTY".into(), Vec::new());

        router(Arc::new(AppState::new(Arc::new(source), EngineConfig::default())))
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn root_banner() {
        let (status, body) = get_json("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Trade Dashboard API is running");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = get_json("/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn analyze_returns_history_and_setup() {
        let (status, body) = get_json("/analyze/aapl?interval=1d").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "AAPL");
        assert_eq!(body["status"], "ok");
        assert_eq!(body["interval"], "1d");
        assert_eq!(body["history"].as_array().unwrap().len(), 65);
        assert!(body["trade_setup"]["target_entry"].is_number());
        // sqrt(22.5 × 6 × 4) = 23.2379...
        assert!(body["graham_number"].as_f64().unwrap() > 23.0);
        assert_eq!(body["lynch_line"], 90.0);
    }

    #[tokio::test]
    async fn missing_fundamentals_are_not_fatal() {
        let (status, body) = get_json("/analyze/BTC-USD").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["graham_number"].is_null());
    }

    #[tokio::test]
    async fn weekly_interval_steps_projection_by_weeks() {
        let (_, body) = get_json("/analyze/AAPL?interval=1wk").await;
        let history = body["history"].as_array().unwrap();
        let last_real = history[59]["time"].as_i64().unwrap();
        assert_eq!(history[60]["time"].as_i64().unwrap(), last_real + 7 * DAY);
        assert_eq!(history[60]["is_projection"], true);
    }

    #[tokio::test]
    async fn unknown_interval_is_bad_request() {
        let (status, body) = get_json("/analyze/AAPL?interval=5m").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn provider_failure_is_bad_gateway() {
        let (status, body) = get_json("/analyze/NOPE").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["status"], "error");
        assert!(body["detail"].as_str().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn path_escaping_symbol_is_bad_request() {
        let (status, body) =
            get_json("/analyze/..%2F..%2Fv7%2Ffinance%2Fquote%3Fsymbols=MSFT%23").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["detail"], "invalid symbol");
    }

    #[test]
    fn ticker_shapes() {
        for ok in ["AAPL", "BRK-B", "^GSPC", "EURUSD=X", "RDS.A", "BTC-USD"] {
            assert!(is_ticker(ok), "{ok}");
        }
        let too_long = "A".repeat(33);
        for bad in ["", "A/B", "A?B", "A#B", "A B", "../X", too_long.as_str()] {
            assert!(!is_ticker(bad), "{bad}");
        }
    }

    /// Each fetch blocks until the other one has started.
    struct RendezvousSource {
        barrier: Barrier,
        bars: Vec<PriceBar>,
    }

    #[async_trait]
    impl MarketDataSource for RendezvousSource {
        async fn fetch_prices(&self, _symbol: &str, _interval: Interval) -> anyhow::Result<Vec<PriceBar>> {
            self.barrier.wait().await;
            Ok(self.bars.clone())
        }

        async fn fetch_fundamentals(&self, _symbol: &str) -> anyhow::Result<Vec<FundamentalSnapshot>> {
            self.barrier.wait().await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn prices_and_fundamentals_are_fetched_together() {
        let source = RendezvousSource {
            barrier: Barrier::new(2),
            bars: (0..30)
                .map(|i| PriceBar::from_close(1_704_067_200 + i * DAY, 50.0 + (i % 3) as f64))
                .collect(),
        };
        let app = router(Arc::new(AppState::new(Arc::new(source), EngineConfig::default())));

        let request = Request::builder().uri("/analyze/MSFT").body(Body::empty()).unwrap();
        let resp = tokio::time::timeout(Duration::from_secs(5), app.oneshot(request))
            .await
            .expect("fetches did not overlap")
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_series_is_engine_error() {
        let (status, body) = get_json("/analyze/EMPTY").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert_eq!(body["detail"], "No valid data found");
        assert!(body["history"].as_array().unwrap().is_empty());
        assert!(body.get("trade_setup").is_none());
    }
}
