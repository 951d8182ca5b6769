//! Error taxonomy for the estimation engine.
//!
//! Missing scenes and empty reductions are not errors: the real-data path
//! reports them through [`crate::remote_sensing::RemoteOutcome`] so the
//! orchestrator can switch on the quality flag.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EstimationError {
    /// Malformed polygon or unparseable dates.
    #[error("invalid input: {0}")]
    Input(String),

    /// Backend not configured, not authenticated, or not reachable.
    #[error("geospatial backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Anything raised while talking to the backend mid-query.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),

    #[error("backend call timed out after {0} seconds")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EstimationError>;
