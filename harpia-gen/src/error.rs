//! Error types for the candidate generator
//!
//! Two severities:
//! - **Run-level** ([`GenerationError`]): too little data, degenerate weights,
//!   a second concurrent run, cancellation. Reported once as a terminal event.
//! - **Stage-level** ([`ServiceError`]): any external-service failure. Never
//!   propagated past the validator; it becomes a rejection reason and the
//!   budgeted retry loop carries on.

use thiserror::Error;

/// External data service failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("{service} returned HTTP {code}")]
    Status { service: &'static str, code: u16 },

    #[error("Rate limit exceeded by {0}")]
    RateLimited(&'static str),

    #[error("{service} error: {message}")]
    Api { service: &'static str, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout(e.to_string())
        } else if e.is_decode() {
            ServiceError::Parse(e.to_string())
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}

/// Run-level generation failure
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Fewer than two usable probable-nest observations
    #[error("Insufficient data: at least 2 probable nests are required, found {found}")]
    InsufficientData { found: usize },

    /// Weights sum to zero (or contain negative/non-finite values)
    #[error("Degenerate weighting: observation weights do not sum to a positive total")]
    ZeroWeightSum,

    /// Request parameters rejected before the run starts
    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),

    /// A generation run is already in progress
    #[error("A generation run is already in progress")]
    AlreadyRunning,

    /// Run stopped through its cancellation token
    #[error("Generation cancelled after {attempted} attempts")]
    Cancelled { attempted: u32 },

    /// HTTP client construction failed
    #[error("Service setup failed: {0}")]
    Service(#[from] ServiceError),

    /// Observation store failure
    #[error(transparent)]
    Store(#[from] harpia_common::Error),
}

pub type GenerationResult<T> = Result<T, GenerationError>;
