// =============================================================================
// Application State — shared, read-only handles for the API handlers
// =============================================================================
//
// Nothing here is mutated after startup.  Every analysis call builds its own
// series and cursors from scratch, so concurrent requests share only the
// data source handle and the immutable engine configuration.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use crate::market_data::MarketDataSource;
use crate::runtime_config::EngineConfig;

pub struct AppState {
    pub source: Arc<dyn MarketDataSource>,
    pub engine_config: Arc<EngineConfig>,
    /// Instant when the server was started. Used for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(source: Arc<dyn MarketDataSource>, engine_config: EngineConfig) -> Self {
        Self {
            source,
            engine_config: Arc::new(engine_config),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
