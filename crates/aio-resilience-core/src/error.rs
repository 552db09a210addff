//! Shared construction-time error taxonomy.
//!
//! Transport failures and timeouts never surface here — those are converted
//! to synthetic responses at the pipeline boundary (see `aio-resilience-pipeline`).
//! `CoreError` is reserved for programming errors: invalid configuration,
//! invalid input that should have been caught before a call chain ever
//! started.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid deadline_at {deadline_at}: should be >= {floor}")]
    InvalidDeadline { deadline_at: f64, floor: f64 },

    #[error("split factor must be >= 2, got {0}")]
    InvalidSplitFactor(u32),
}
