//! Analytics error types.

use thiserror::Error;

/// Errors reported by a [`crate::TextAnalyticsEngine`].
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine could not be reached or is not ready.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// The engine rejected or failed on this input.
    #[error("Engine failed: {0}")]
    Failed(String),
}

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while aggregating analytics.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The requested word cloud size is out of range.
    #[error("Invalid limit value, you must provide a number between 1 and 99: {0}")]
    InvalidLimit(String),

    /// The engine failed for the whole request rather than single entries.
    #[error("Text analytics unavailable: {0}")]
    UpstreamUnavailable(String),
}

/// Result type for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
