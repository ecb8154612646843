//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Number of latency histogram buckets exposed in summaries
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps counters to get a consistent snapshot.
pub struct Metrics {
    /// Total reports ever received (monotonic)
    reports_total: AtomicU64,
    /// Reports since last report (reset on report)
    reports_since_report: AtomicU64,
    /// Reports dropped - channel full or outside the contestant's
    /// takeoff/finished-by window (monotonic)
    reports_dropped: AtomicU64,
    /// Sum of processing latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max processing latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Report processing latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Gates resolved as crossed (monotonic)
    gates_crossed: AtomicU64,
    /// Gates resolved as missed (monotonic)
    gates_missed: AtomicU64,
    /// Penalty points issued, in tenths of a point (monotonic)
    penalty_decipoints: AtomicU64,
    /// Score updates published to egress (monotonic)
    updates_published: AtomicU64,
    /// Time of last report, for rate calculation
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            reports_total: AtomicU64::new(0),
            reports_since_report: AtomicU64::new(0),
            reports_dropped: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            gates_crossed: AtomicU64::new(0),
            gates_missed: AtomicU64::new(0),
            penalty_decipoints: AtomicU64::new(0),
            updates_published: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a report received from the listener
    pub fn record_report_received(&self) {
        self.reports_total.fetch_add(1, Ordering::Relaxed);
        self.reports_since_report.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a report dropped (channel full or out of window)
    pub fn record_report_dropped(&self) {
        self.reports_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one report fully processed through the scoring pipeline
    pub fn record_report_processed(&self, latency_us: u64) {
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gates_crossed(&self, count: u64) {
        self.gates_crossed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_gates_missed(&self, count: u64) {
        self.gates_missed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record penalty points issued (tenth-of-a-point resolution)
    pub fn record_penalty_points(&self, points: f64) {
        self.penalty_decipoints.fetch_add((points * 10.0).round() as u64, Ordering::Relaxed);
    }

    pub fn record_update_published(&self) {
        self.updates_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Produce a summary and reset interval counters
    pub fn report(&self, active_tracks: usize) -> MetricsSummary {
        let mut last_time = self.last_report_time.lock();
        let elapsed = last_time.elapsed();
        *last_time = Instant::now();
        drop(last_time);

        let interval_reports = self.reports_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let latency_max = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);
        let processed: u64 = lat_buckets.iter().sum();

        MetricsSummary {
            reports_total: self.reports_total.load(Ordering::Relaxed),
            reports_per_sec: if elapsed.as_secs_f64() > 0.0 {
                interval_reports as f64 / elapsed.as_secs_f64()
            } else {
                0.0
            },
            reports_dropped: self.reports_dropped.load(Ordering::Relaxed),
            avg_process_latency_us: if processed > 0 { latency_sum / processed } else { 0 },
            max_process_latency_us: latency_max,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p95_us: percentile_from_buckets(&lat_buckets, 0.95),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            lat_buckets,
            gates_crossed: self.gates_crossed.load(Ordering::Relaxed),
            gates_missed: self.gates_missed.load(Ordering::Relaxed),
            penalty_points: self.penalty_decipoints.load(Ordering::Relaxed) as f64 / 10.0,
            updates_published: self.updates_published.load(Ordering::Relaxed),
            active_tracks,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics for reporting
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub reports_total: u64,
    pub reports_per_sec: f64,
    pub reports_dropped: u64,
    pub avg_process_latency_us: u64,
    pub max_process_latency_us: u64,
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p95_us: u64,
    pub lat_p99_us: u64,
    pub gates_crossed: u64,
    pub gates_missed: u64,
    pub penalty_points: f64,
    pub updates_published: u64,
    pub active_tracks: usize,
}

impl MetricsSummary {
    /// Log the summary as a structured event
    pub fn log(&self) {
        info!(
            reports_total = %self.reports_total,
            reports_per_sec = %format!("{:.1}", self.reports_per_sec),
            reports_dropped = %self.reports_dropped,
            avg_latency_us = %self.avg_process_latency_us,
            max_latency_us = %self.max_process_latency_us,
            p50_us = %self.lat_p50_us,
            p95_us = %self.lat_p95_us,
            p99_us = %self.lat_p99_us,
            gates_crossed = %self.gates_crossed,
            gates_missed = %self.gates_missed,
            penalty_points = %self.penalty_points,
            updates_published = %self.updates_published,
            active_tracks = %self.active_tracks,
            "metrics_summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(50), 0);
        assert_eq!(bucket_index(100), 0);
        assert_eq!(bucket_index(101), 1);
        assert_eq!(bucket_index(51200), 9);
        assert_eq!(bucket_index(51201), 10);
    }

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_report_received();
        metrics.record_report_received();
        metrics.record_report_dropped();
        metrics.record_report_processed(150);
        metrics.record_gates_crossed(2);
        metrics.record_gates_missed(1);
        metrics.record_penalty_points(104.0);
        metrics.record_update_published();

        let summary = metrics.report(3);
        assert_eq!(summary.reports_total, 2);
        assert_eq!(summary.reports_dropped, 1);
        assert_eq!(summary.gates_crossed, 2);
        assert_eq!(summary.gates_missed, 1);
        assert_eq!(summary.penalty_points, 104.0);
        assert_eq!(summary.updates_published, 1);
        assert_eq!(summary.active_tracks, 3);
        assert_eq!(summary.avg_process_latency_us, 150);
    }

    #[test]
    fn test_interval_counters_reset_on_report() {
        let metrics = Metrics::new();
        metrics.record_report_processed(500);
        let first = metrics.report(0);
        assert_eq!(first.max_process_latency_us, 500);

        let second = metrics.report(0);
        assert_eq!(second.max_process_latency_us, 0);
        assert_eq!(second.avg_process_latency_us, 0);
    }

    #[test]
    fn test_percentiles_from_buckets() {
        let metrics = Metrics::new();
        for _ in 0..99 {
            metrics.record_report_processed(50);
        }
        metrics.record_report_processed(50_000);

        let summary = metrics.report(0);
        assert_eq!(summary.lat_p50_us, 100);
        assert_eq!(summary.lat_p99_us, 100);
    }
}
