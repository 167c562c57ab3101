//! Per-agent performance accounting.
//!
//! Response time and success rate are smoothed with an exponentially
//! weighted moving average so one slow or failed call does not dominate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smoothing factor for both EWMA series.
pub const EWMA_ALPHA: f64 = 0.1;

/// Performance metrics owned by a single agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// EWMA of response time in milliseconds
    pub average_response_time_ms: f64,
    /// EWMA of success (1.0 = success, 0.0 = failure)
    pub success_rate: f64,
    /// Cumulative number of failed executions
    pub error_count: u64,
    /// Number of completed executions (success or failure)
    pub total_requests: u64,
    /// Number of successful executions
    pub successful_requests: u64,
    /// Sessions in flight when the metrics were last read
    pub active_sessions: usize,
    /// Largest number of concurrent sessions observed
    pub peak_concurrent_sessions: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            average_response_time_ms: 0.0,
            success_rate: 1.0,
            error_count: 0,
            total_requests: 0,
            successful_requests: 0,
            active_sessions: 0,
            peak_concurrent_sessions: 0,
            last_updated: None,
        }
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed execution.
    ///
    /// The first observation seeds the response time average; later ones
    /// are blended with [`EWMA_ALPHA`]. A failure contributes weight 0 to
    /// the success rate.
    pub fn record(&mut self, elapsed: Duration, success: bool, now: DateTime<Utc>) {
        let sample_ms = elapsed.as_secs_f64() * 1000.0;
        self.average_response_time_ms = if self.total_requests == 0 {
            sample_ms
        } else {
            ewma(self.average_response_time_ms, sample_ms)
        };

        let outcome = if success { 1.0 } else { 0.0 };
        self.success_rate = ewma(self.success_rate, outcome);

        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.error_count += 1;
        }
        self.last_updated = Some(now);
    }

    /// Update the in-flight gauge.
    pub fn observe_active_sessions(&mut self, active: usize) {
        self.active_sessions = active;
        self.peak_concurrent_sessions = self.peak_concurrent_sessions.max(active);
    }
}

fn ewma(previous: f64, sample: f64) -> f64 {
    EWMA_ALPHA * sample + (1.0 - EWMA_ALPHA) * previous
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_first_sample_seeds_response_time() {
        let mut metrics = PerformanceMetrics::new();
        metrics.record(Duration::from_millis(200), true, Utc::now());
        assert!(approx(metrics.average_response_time_ms, 200.0));
        assert!(approx(metrics.success_rate, 1.0));
        assert_eq!(metrics.total_requests, 1);
    }

    #[test]
    fn test_ewma_blending() {
        let mut metrics = PerformanceMetrics::new();
        metrics.record(Duration::from_millis(100), true, Utc::now());
        metrics.record(Duration::from_millis(200), true, Utc::now());
        // 0.1 * 200 + 0.9 * 100
        assert!(approx(metrics.average_response_time_ms, 110.0));
    }

    #[test]
    fn test_failure_weighs_zero() {
        let mut metrics = PerformanceMetrics::new();
        metrics.record(Duration::from_millis(50), false, Utc::now());
        assert!(approx(metrics.success_rate, 0.9));
        assert_eq!(metrics.error_count, 1);
        assert_eq!(metrics.successful_requests, 0);

        metrics.record(Duration::from_millis(50), false, Utc::now());
        assert!(approx(metrics.success_rate, 0.81));
        assert_eq!(metrics.error_count, 2);
    }

    #[test]
    fn test_peak_sessions_tracked() {
        let mut metrics = PerformanceMetrics::new();
        metrics.observe_active_sessions(3);
        metrics.observe_active_sessions(1);
        assert_eq!(metrics.active_sessions, 1);
        assert_eq!(metrics.peak_concurrent_sessions, 3);
    }
}
