//! Metrics collection and statistics.

use std::collections::BTreeMap;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

use crate::host::RequestOutcome;

const HISTOGRAM_SIGFIG: u8 = 3;

fn latency_histogram() -> Histogram<u64> {
    // Only sigfig > 5 is rejected
    Histogram::new(HISTOGRAM_SIGFIG).expect("valid histogram precision")
}

/// Per-endpoint counters, aggregated across servers.
struct EndpointStats {
    histogram: Histogram<u64>,
    requests: u64,
    failed: u64,
}

impl EndpointStats {
    fn new() -> Self {
        Self {
            histogram: latency_histogram(),
            requests: 0,
            failed: 0,
        }
    }
}

/// Collects metrics during load test execution.
pub struct MetricsCollector {
    histogram: Histogram<u64>,
    requests_total: u64,
    requests_success: u64,
    requests_failed: u64,
    transport_errors: u64,
    bytes_total: u64,
    iterations: u64,
    status_counts: BTreeMap<u16, u64>,
    endpoints: BTreeMap<String, EndpointStats>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            histogram: latency_histogram(),
            requests_total: 0,
            requests_success: 0,
            requests_failed: 0,
            transport_errors: 0,
            bytes_total: 0,
            iterations: 0,
            status_counts: BTreeMap::new(),
            endpoints: BTreeMap::new(),
        }
    }

    /// Record the outcome of one request.
    ///
    /// Latency is recorded for every response that arrived, including error
    /// statuses; transport failures only count toward the failure totals.
    pub fn record(&mut self, outcome: &RequestOutcome) {
        self.requests_total += 1;

        let endpoint = self
            .endpoints
            .entry(outcome.endpoint())
            .or_insert_with(EndpointStats::new);
        endpoint.requests += 1;

        if outcome.error.is_some() {
            self.transport_errors += 1;
            self.requests_failed += 1;
            endpoint.failed += 1;
            return;
        }

        *self.status_counts.entry(outcome.status).or_insert(0) += 1;
        self.bytes_total += outcome.bytes as u64;
        // record() resizes; saturating_record clamps to the initial range
        self.histogram.record(outcome.latency_us).ok();
        endpoint.histogram.record(outcome.latency_us).ok();

        if outcome.is_success() {
            self.requests_success += 1;
        } else {
            self.requests_failed += 1;
            endpoint.failed += 1;
        }
    }

    /// Record one completed iteration of a user script.
    pub fn record_iteration(&mut self) {
        self.iterations += 1;
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total
    }

    pub fn requests_success(&self) -> u64 {
        self.requests_success
    }

    pub fn requests_failed(&self) -> u64 {
        self.requests_failed
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Generate final test results over the given wall-clock window.
    pub fn results(&self, scenario_name: String, virtual_users: u32, elapsed: Duration) -> TestResults {
        let duration_secs = elapsed.as_secs_f64();
        let per_second = |count: f64| {
            if duration_secs > 0.0 {
                count / duration_secs
            } else {
                0.0
            }
        };

        let endpoints = self
            .endpoints
            .iter()
            .map(|(path, stats)| EndpointResults {
                endpoint: path.clone(),
                requests: stats.requests,
                failed: stats.failed,
                latency_p50: ms_at(&stats.histogram, 50.0),
                latency_p95: ms_at(&stats.histogram, 95.0),
                latency_p99: ms_at(&stats.histogram, 99.0),
            })
            .collect();

        TestResults {
            timestamp: chrono::Utc::now().to_rfc3339(),
            scenario_name,
            duration_secs,
            virtual_users,
            iterations: self.iterations,
            total_requests: self.requests_total,
            successful_requests: self.requests_success,
            failed_requests: self.requests_failed,
            transport_errors: self.transport_errors,
            requests_per_second: per_second(self.requests_total as f64),
            latency_p50: ms_at(&self.histogram, 50.0),
            latency_p75: ms_at(&self.histogram, 75.0),
            latency_p90: ms_at(&self.histogram, 90.0),
            latency_p95: ms_at(&self.histogram, 95.0),
            latency_p99: ms_at(&self.histogram, 99.0),
            latency_min: self.histogram.min() as f64 / 1000.0,
            latency_max: self.histogram.max() as f64 / 1000.0,
            latency_avg: self.histogram.mean() / 1000.0,
            bytes_per_second: per_second(self.bytes_total as f64),
            status_codes: self.status_counts.clone(),
            endpoints,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn ms_at(histogram: &Histogram<u64>, percentile: f64) -> f64 {
    histogram.value_at_percentile(percentile) as f64 / 1000.0
}

/// Final test results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResults {
    pub timestamp: String,
    pub scenario_name: String,
    pub duration_secs: f64,
    pub virtual_users: u32,
    pub iterations: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub transport_errors: u64,
    pub requests_per_second: f64,

    // Latency percentiles (ms)
    pub latency_p50: f64,
    pub latency_p75: f64,
    pub latency_p90: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    pub latency_min: f64,
    pub latency_max: f64,
    pub latency_avg: f64,

    pub bytes_per_second: f64,

    /// Response counts keyed by HTTP status.
    pub status_codes: BTreeMap<u16, u64>,

    pub endpoints: Vec<EndpointResults>,
}

impl TestResults {
    /// Share of requests that got a non-error response, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }
}

/// Breakdown for one endpoint path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointResults {
    pub endpoint: String,
    pub requests: u64,
    pub failed: u64,
    pub latency_p50: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
}
