use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CircuitBreakerConfigError {
    #[error("failure_rate_threshold must be in (0, 1], got {0}")]
    InvalidFailureRateThreshold(f64),
    #[error("windows_count must be >= 1, got {0}")]
    InvalidWindowsCount(u32),
    #[error("minimum_throughput must be >= 1, got {0}")]
    InvalidMinimumThroughput(u32),
}
