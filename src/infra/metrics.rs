//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics so fetch tasks, the cycle runner and the Prometheus endpoint
//! can share one collector without a mutex.
//!
//! NOTE: All atomics use Relaxed ordering; these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries for fetch latency (milliseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
pub const METRICS_BUCKET_BOUNDS: [u64; 10] =
    [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
pub const METRICS_NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    METRICS_BUCKET_BOUNDS.partition_point(|&bound| bound < latency_ms)
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

/// Load all bucket values without resetting
#[inline]
fn load_buckets(buckets: &[AtomicU64; METRICS_NUM_BUCKETS]) -> [u64; METRICS_NUM_BUCKETS] {
    let mut result = [0u64; METRICS_NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.load(Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; METRICS_NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; METRICS_NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[METRICS_NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Completed cycles (monotonic)
    cycles_total: AtomicU64,
    /// Per-date fetch attempts (monotonic)
    fetch_requests_total: AtomicU64,
    /// Per-date fetch failures, including timeouts (monotonic)
    fetch_failures_total: AtomicU64,
    /// Dates whose failure streak reached the alert threshold (monotonic)
    fetch_streak_alerts_total: AtomicU64,
    /// Fetch latency histogram buckets (milliseconds)
    fetch_latency_buckets: [AtomicU64; METRICS_NUM_BUCKETS],
    fetch_latency_sum_ms: AtomicU64,
    fetch_latency_max_ms: AtomicU64,
    quotes_accepted_total: AtomicU64,
    quotes_rejected_total: AtomicU64,
    first_seen_total: AtomicU64,
    drops_total: AtomicU64,
    notifications_sent_total: AtomicU64,
    notifications_failed_total: AtomicU64,
    ledger_errors_total: AtomicU64,
    /// Dates currently recorded in the ledger (gauge)
    tracked_dates: AtomicU64,
    /// Duration of the most recent cycle in ms (gauge)
    last_cycle_duration_ms: AtomicU64,
    /// Epoch ms at which the most recent cycle finished (gauge)
    last_cycle_finished_ms: AtomicU64,
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            cycles_total: AtomicU64::new(0),
            fetch_requests_total: AtomicU64::new(0),
            fetch_failures_total: AtomicU64::new(0),
            fetch_streak_alerts_total: AtomicU64::new(0),
            fetch_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            fetch_latency_sum_ms: AtomicU64::new(0),
            fetch_latency_max_ms: AtomicU64::new(0),
            quotes_accepted_total: AtomicU64::new(0),
            quotes_rejected_total: AtomicU64::new(0),
            first_seen_total: AtomicU64::new(0),
            drops_total: AtomicU64::new(0),
            notifications_sent_total: AtomicU64::new(0),
            notifications_failed_total: AtomicU64::new(0),
            ledger_errors_total: AtomicU64::new(0),
            tracked_dates: AtomicU64::new(0),
            last_cycle_duration_ms: AtomicU64::new(0),
            last_cycle_finished_ms: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record one per-date fetch and its latency (lock-free)
    #[inline]
    pub fn record_fetch(&self, latency_ms: u64, ok: bool) {
        self.fetch_requests_total.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.fetch_failures_total.fetch_add(1, Ordering::Relaxed);
        }
        self.fetch_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.fetch_latency_buckets[bucket_index(latency_ms)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.fetch_latency_max_ms, latency_ms);
    }

    #[inline]
    pub fn record_fetch_streak_alert(&self) {
        self.fetch_streak_alerts_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_quotes(&self, accepted: u64, rejected: u64) {
        self.quotes_accepted_total.fetch_add(accepted, Ordering::Relaxed);
        self.quotes_rejected_total.fetch_add(rejected, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_detection(&self, first_seen: u64, drops: u64) {
        self.first_seen_total.fetch_add(first_seen, Ordering::Relaxed);
        self.drops_total.fetch_add(drops, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_notification(&self, ok: bool) {
        if ok {
            self.notifications_sent_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.notifications_failed_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_ledger_error(&self) {
        self.ledger_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_tracked_dates(&self, count: u64) {
        self.tracked_dates.store(count, Ordering::Relaxed);
    }

    /// Record a completed cycle
    #[inline]
    pub fn record_cycle(&self, duration_ms: u64, finished_at_ms: u64) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_duration_ms.store(duration_ms, Ordering::Relaxed);
        self.last_cycle_finished_ms.store(finished_at_ms, Ordering::Relaxed);
    }

    #[inline]
    pub fn cycles_total(&self) -> u64 {
        self.cycles_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn drops_total(&self) -> u64 {
        self.drops_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn notifications_sent_total(&self) -> u64 {
        self.notifications_sent_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn notifications_failed_total(&self) -> u64 {
        self.notifications_failed_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn fetch_failures_total(&self) -> u64 {
        self.fetch_failures_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn ledger_errors_total(&self) -> u64 {
        self.ledger_errors_total.load(Ordering::Relaxed)
    }

    /// Snapshot all counters (nothing is reset)
    pub fn report(&self) -> MetricsSummary {
        let fetch_buckets = load_buckets(&self.fetch_latency_buckets);
        let fetch_requests = self.fetch_requests_total.load(Ordering::Relaxed);
        let fetch_latency_sum = self.fetch_latency_sum_ms.load(Ordering::Relaxed);
        let fetch_avg = if fetch_requests > 0 { fetch_latency_sum / fetch_requests } else { 0 };

        MetricsSummary {
            uptime_secs: self.started_at.elapsed().as_secs(),
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            fetch_requests_total: fetch_requests,
            fetch_failures_total: self.fetch_failures_total.load(Ordering::Relaxed),
            fetch_streak_alerts_total: self.fetch_streak_alerts_total.load(Ordering::Relaxed),
            fetch_lat_buckets: fetch_buckets,
            fetch_lat_avg_ms: fetch_avg,
            fetch_lat_max_ms: self.fetch_latency_max_ms.load(Ordering::Relaxed),
            fetch_lat_p50_ms: percentile_from_buckets(&fetch_buckets, 0.50),
            fetch_lat_p99_ms: percentile_from_buckets(&fetch_buckets, 0.99),
            quotes_accepted_total: self.quotes_accepted_total.load(Ordering::Relaxed),
            quotes_rejected_total: self.quotes_rejected_total.load(Ordering::Relaxed),
            first_seen_total: self.first_seen_total.load(Ordering::Relaxed),
            drops_total: self.drops_total.load(Ordering::Relaxed),
            notifications_sent_total: self.notifications_sent_total.load(Ordering::Relaxed),
            notifications_failed_total: self.notifications_failed_total.load(Ordering::Relaxed),
            ledger_errors_total: self.ledger_errors_total.load(Ordering::Relaxed),
            tracked_dates: self.tracked_dates.load(Ordering::Relaxed),
            last_cycle_duration_ms: self.last_cycle_duration_ms.load(Ordering::Relaxed),
            last_cycle_finished_ms: self.last_cycle_finished_ms.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of all metrics
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub uptime_secs: u64,
    pub cycles_total: u64,
    pub fetch_requests_total: u64,
    pub fetch_failures_total: u64,
    pub fetch_streak_alerts_total: u64,
    pub fetch_lat_buckets: [u64; METRICS_NUM_BUCKETS],
    pub fetch_lat_avg_ms: u64,
    pub fetch_lat_max_ms: u64,
    pub fetch_lat_p50_ms: u64,
    pub fetch_lat_p99_ms: u64,
    pub quotes_accepted_total: u64,
    pub quotes_rejected_total: u64,
    pub first_seen_total: u64,
    pub drops_total: u64,
    pub notifications_sent_total: u64,
    pub notifications_failed_total: u64,
    pub ledger_errors_total: u64,
    pub tracked_dates: u64,
    pub last_cycle_duration_ms: u64,
    pub last_cycle_finished_ms: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            uptime_secs = %self.uptime_secs,
            cycles = %self.cycles_total,
            tracked_dates = %self.tracked_dates,
            fetches = %self.fetch_requests_total,
            fetch_failures = %self.fetch_failures_total,
            fetch_p99_ms = %self.fetch_lat_p99_ms,
            quotes_rejected = %self.quotes_rejected_total,
            drops = %self.drops_total,
            notifications = %self.notifications_sent_total,
            notification_failures = %self.notifications_failed_total,
            ledger_errors = %self.ledger_errors_total,
            "metrics_summary"
        );
    }
}
