//! Bucketed rolling success/failure counts over a sampling window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

struct Bucket {
    started_at: Instant,
    successes: u64,
    failures: u64,
}

/// A point-in-time view of the surviving buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub successes: u64,
    pub failures: u64,
}

impl MetricsSnapshot {
    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.failures as f64 / self.total() as f64
        }
    }
}

/// Tracks successes and failures over the trailing `sampling_duration`,
/// bucketed into `windows_count` sub-windows so old calls age out gradually
/// rather than all at once.
pub struct RollingMetrics {
    sampling_duration: Duration,
    window_duration: Duration,
    buckets: VecDeque<Bucket>,
}

impl RollingMetrics {
    pub fn new(sampling_duration: Duration, windows_count: u32) -> Self {
        let windows_count = windows_count.max(1);
        Self {
            sampling_duration,
            window_duration: sampling_duration / windows_count,
            buckets: VecDeque::new(),
        }
    }

    fn current_bucket(&mut self) -> &mut Bucket {
        let now = Instant::now();
        let needs_new = match self.buckets.back() {
            Some(b) => now.duration_since(b.started_at) >= self.window_duration,
            None => true,
        };
        if needs_new {
            self.buckets.push_back(Bucket { started_at: now, successes: 0, failures: 0 });
        }
        self.evict_stale(now);
        self.buckets.back_mut().expect("just pushed a bucket")
    }

    fn evict_stale(&mut self, now: Instant) {
        while let Some(front) = self.buckets.front() {
            if now.duration_since(front.started_at) >= self.sampling_duration {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record_success(&mut self) {
        self.current_bucket().successes += 1;
    }

    pub fn record_failure(&mut self) {
        self.current_bucket().failures += 1;
    }

    pub fn snapshot(&mut self) -> MetricsSnapshot {
        self.evict_stale(Instant::now());
        let mut snapshot = MetricsSnapshot::default();
        for bucket in &self.buckets {
            snapshot.successes += bucket.successes;
            snapshot.failures += bucket.failures;
        }
        snapshot
    }

    pub fn reset(&mut self) {
        self.buckets.clear();
    }
}
