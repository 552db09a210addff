use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use http::Method;
use url::Url;

use aio_resilience_core::Response;

use crate::error::PercentileDelayConfigError;

type EndpointKey = (Method, Url);

struct Bucket {
    started_at: Instant,
    histogram: Histogram<u64>,
}

impl Bucket {
    fn new(now: Instant) -> Self {
        // 1 microsecond to 5 minutes, 3 significant digits: generous enough
        // for any HTTP call latency this provider will ever observe.
        Self { started_at: now, histogram: Histogram::new_with_bounds(1, 300_000_000, 3).expect("static histogram bounds are valid") }
    }
}

/// An attempt delay derived from recently-observed latency, rather than a
/// fixed schedule: `delay(attempt) = clamp(percentile_of_recent_latency) *
/// attempt`.
///
/// Latency is recorded per `(method, url)` key into a sliding window of
/// time-bucketed histograms; only the oldest live bucket in the window is
/// consulted, so a burst of very recent traffic doesn't immediately distort
/// the delay used for attempts already in flight.
pub struct PercentileDelayProvider {
    percentile: f64,
    min_delay: Duration,
    max_delay: Duration,
    bucket_size: Duration,
    bucket_ttl: Duration,
    buckets_by_endpoint: Mutex<HashMap<EndpointKey, VecDeque<Bucket>>>,
}

impl PercentileDelayProvider {
    pub fn builder() -> PercentileDelayProviderBuilder {
        PercentileDelayProviderBuilder::new()
    }

    /// The delay to use before attempt `attempt` against `method`/`url`.
    pub fn delay(&self, method: &Method, url: &Url, attempt: u32) -> Duration {
        let key = (method.clone(), url.clone());
        let mut buckets_by_endpoint = self.buckets_by_endpoint.lock().unwrap();
        let buckets = buckets_by_endpoint.entry(key).or_default();
        evict_stale(buckets, Instant::now(), self.bucket_ttl);

        let Some(oldest) = buckets.front() else {
            return self.min_delay;
        };

        let observed = Duration::from_micros(oldest.histogram.value_at_percentile(self.percentile));
        let per_attempt = observed.clamp(self.min_delay, self.max_delay);
        per_attempt * attempt
    }

    /// Folds a completed attempt's latency into this endpoint's histograms,
    /// unless its elapsed time is unknown or it wasn't successful.
    pub fn observe(&self, method: &Method, url: &Url, response: &dyn Response) {
        let elapsed = response.elapsed();
        if elapsed < 0.0 || !response.is_successful() {
            return;
        }

        let key = (method.clone(), url.clone());
        let now = Instant::now();
        let micros = (elapsed * 1_000_000.0).round().clamp(0.0, u64::MAX as f64) as u64;

        let mut buckets_by_endpoint = self.buckets_by_endpoint.lock().unwrap();
        let buckets = buckets_by_endpoint.entry(key).or_default();
        evict_stale(buckets, now, self.bucket_ttl);

        let needs_new_bucket = match buckets.back() {
            None => true,
            Some(last) => now.duration_since(last.started_at) >= self.bucket_size,
        };
        if needs_new_bucket {
            buckets.push_back(Bucket::new(now));
        }

        for bucket in buckets.iter_mut() {
            let _ = bucket.histogram.record(micros);
        }
    }
}

fn evict_stale(buckets: &mut VecDeque<Bucket>, now: Instant, ttl: Duration) {
    while let Some(oldest) = buckets.front() {
        if now.duration_since(oldest.started_at) > ttl {
            buckets.pop_front();
        } else {
            break;
        }
    }
}

pub struct PercentileDelayProviderBuilder {
    percentile: f64,
    min_delay: Duration,
    max_delay: Duration,
    window_size: Duration,
    buckets_count: u32,
}

impl PercentileDelayProviderBuilder {
    pub fn new() -> Self {
        Self {
            percentile: 0.95,
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(10),
            window_size: Duration::from_secs(5 * 60),
            buckets_count: 2,
        }
    }

    /// Default: 0.95
    pub fn percentile(mut self, percentile: f64) -> Self {
        self.percentile = percentile;
        self
    }

    /// Default: 50ms
    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Default: 10s
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Default: 5 minutes
    pub fn window_size(mut self, window_size: Duration) -> Self {
        self.window_size = window_size;
        self
    }

    /// Default: 2
    pub fn buckets_count(mut self, buckets_count: u32) -> Self {
        self.buckets_count = buckets_count;
        self
    }

    pub fn build(self) -> Result<PercentileDelayProvider, PercentileDelayConfigError> {
        if self.min_delay > self.max_delay {
            return Err(PercentileDelayConfigError::MinGreaterThanMax { min_delay: self.min_delay, max_delay: self.max_delay });
        }
        if !(0.0 < self.percentile && self.percentile < 1.0) {
            return Err(PercentileDelayConfigError::InvalidPercentile(self.percentile));
        }
        if self.window_size.is_zero() {
            return Err(PercentileDelayConfigError::NonPositiveWindow);
        }
        if self.buckets_count == 0 {
            return Err(PercentileDelayConfigError::ZeroBucketsCount);
        }

        let bucket_size = self.window_size / self.buckets_count;
        let bucket_ttl = self.window_size + bucket_size;

        Ok(PercentileDelayProvider {
            percentile: self.percentile * 100.0,
            min_delay: self.min_delay,
            max_delay: self.max_delay,
            bucket_size,
            bucket_ttl,
            buckets_by_endpoint: Mutex::new(HashMap::new()),
        })
    }
}

impl Default for PercentileDelayProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://example.com/test").unwrap()
    }

    #[test]
    fn validation_rejects_inverted_bounds() {
        let err = PercentileDelayProvider::builder().min_delay(Duration::from_secs(10)).max_delay(Duration::from_secs(1)).build();
        assert!(matches!(err, Err(PercentileDelayConfigError::MinGreaterThanMax { .. })));
    }

    #[test]
    fn validation_rejects_out_of_range_percentile() {
        let err = PercentileDelayProvider::builder().percentile(1.0).build();
        assert!(matches!(err, Err(PercentileDelayConfigError::InvalidPercentile(_))));
    }

    #[test]
    fn returns_min_delay_when_no_data() {
        let provider = PercentileDelayProvider::builder().min_delay(Duration::from_millis(100)).build().unwrap();
        assert_eq!(provider.delay(&Method::GET, &url(), 1), Duration::from_millis(100));
    }

    #[test]
    fn skips_unsuccessful_and_unknown_elapsed_responses() {
        let provider = PercentileDelayProvider::builder().min_delay(Duration::from_millis(100)).build().unwrap();

        provider.observe(&Method::GET, &url(), &SyntheticResponse { status: 500, elapsed: 0.5 });
        provider.observe(&Method::GET, &url(), &SyntheticResponse { status: 200, elapsed: -1.0 });

        assert_eq!(provider.delay(&Method::GET, &url(), 1), Duration::from_millis(100));
    }

    #[test]
    fn scales_with_attempt_number() {
        let provider = PercentileDelayProvider::builder()
            .percentile(0.5)
            .min_delay(Duration::from_millis(10))
            .max_delay(Duration::from_secs(100))
            .build()
            .unwrap();

        provider.observe(&Method::GET, &url(), &SyntheticResponse { status: 200, elapsed: 1.0 });

        assert_eq!(provider.delay(&Method::GET, &url(), 1), Duration::from_secs(1));
        assert_eq!(provider.delay(&Method::GET, &url(), 2), Duration::from_secs(2));
    }

    #[test]
    fn clamps_to_min_and_max_delay() {
        let low = PercentileDelayProvider::builder().percentile(0.5).min_delay(Duration::from_millis(500)).max_delay(Duration::from_secs(10)).build().unwrap();
        low.observe(&Method::GET, &url(), &SyntheticResponse { status: 200, elapsed: 0.001 });
        assert_eq!(low.delay(&Method::GET, &url(), 1), Duration::from_millis(500));

        let high = PercentileDelayProvider::builder().percentile(0.5).min_delay(Duration::from_millis(10)).max_delay(Duration::from_millis(500)).build().unwrap();
        high.observe(&Method::GET, &url(), &SyntheticResponse { status: 200, elapsed: 5.0 });
        assert_eq!(high.delay(&Method::GET, &url(), 1), Duration::from_millis(500));
    }

    struct SyntheticResponse {
        status: u16,
        elapsed: f64,
    }

    impl Response for SyntheticResponse {
        fn status(&self) -> u16 {
            self.status
        }
        fn headers(&self) -> &http::HeaderMap {
            static EMPTY: std::sync::OnceLock<http::HeaderMap> = std::sync::OnceLock::new();
            EMPTY.get_or_init(http::HeaderMap::new)
        }
        fn elapsed(&self) -> f64 {
            self.elapsed
        }
        fn read(&self) -> futures::future::BoxFuture<'_, bytes::Bytes> {
            Box::pin(async { bytes::Bytes::new() })
        }
        fn close(&self) -> futures::future::BoxFuture<'_, ()> {
            Box::pin(async {})
        }
    }
}
