use std::time::Duration;

use thiserror::Error;

/// `Duration` is unsigned, so the "delays must be non-negative" check the
/// source needs for its float-seconds delays has no counterpart here — the
/// type already rules it out.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PercentileDelayConfigError {
    #[error("min_delay ({min_delay:?}) must be <= max_delay ({max_delay:?})")]
    MinGreaterThanMax { min_delay: Duration, max_delay: Duration },
    #[error("percentile must be in (0.0, 1.0), got {0}")]
    InvalidPercentile(f64),
    #[error("window_size must be positive")]
    NonPositiveWindow,
    #[error("buckets_count must be positive")]
    ZeroBucketsCount,
}
