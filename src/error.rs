// =============================================================================
// Engine errors
// =============================================================================
//
// Only input that violates the price-series contract is an error.  Short
// history and missing indicator references are handled inside the engine as
// absent values and documented fallbacks.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("No valid data found")]
    EmptyInput,

    #[error("timestamps must be strictly increasing (bar {index}: {timestamp} after {previous})")]
    NonMonotonicTimestamps {
        index: usize,
        previous: i64,
        timestamp: i64,
    },

    #[error("close at bar {index} is not a finite number")]
    NonFiniteClose { index: usize },
}
