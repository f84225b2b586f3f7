//! Error types for the pickup network optimizer.
//!
//! Fatal conditions (bad input, broken invariants) abort the run through
//! `OptimizeError`. Degraded conditions (failed geocoding, oracle fallback,
//! dropped routes) are not errors: they are logged where they occur and
//! surfaced in the final report.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptimizeError {
    /// Required input is missing or malformed.
    #[error("input error: {0}")]
    Input(String),

    /// A structural guarantee was violated. Indicates a bug.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OptimizeError>;
