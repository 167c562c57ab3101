//! Agent envelope parameters.
//!
//! [`RuntimeConfig`] controls how every [`AgentRuntime`](crate::runtime::AgentRuntime)
//! admits, times out, health-checks and drains work. [`RetryPolicy`] controls
//! the analysis step inside the agent logic; it is the only place calls are
//! retried.

use council_domain::CircuitBreakerConfig;
use std::time::Duration;

/// Per-agent envelope parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Sessions one agent may serve at once.
    pub max_concurrent_sessions: usize,
    /// Upper bound on one call through the envelope.
    pub call_timeout: Duration,
    /// Period of the background health monitor.
    pub health_check_interval: Duration,
    /// How long shutdown waits for active sessions to drain.
    pub shutdown_grace: Duration,
    /// Drain poll period during shutdown.
    pub shutdown_poll_interval: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 10,
            call_timeout: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
            shutdown_poll_interval: Duration::from_millis(100),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    // ==================== Builder Methods ====================

    pub fn with_max_concurrent_sessions(mut self, max: usize) -> Self {
        self.max_concurrent_sessions = max;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_shutdown_poll_interval(mut self, interval: Duration) -> Self {
        self.shutdown_poll_interval = interval;
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Whether every analysis attempt, with its backoff, can finish before
    /// the envelope gives up on the call.
    pub fn retry_fits_call_timeout(&self) -> bool {
        self.retry.worst_case() <= self.call_timeout
    }
}

/// Retry policy for the analysis step.
///
/// Attempt `n` (0-based) waits `base_delay * 2^n`, capped at `max_delay`,
/// before attempt `n + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Timeout applied to every single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            attempt_timeout: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Longest the analysis step can take: every attempt timing out plus
    /// every backoff in between.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        let backoff: Duration = (0..attempts - 1).map(|a| self.delay_for(a)).sum();
        self.attempt_timeout.saturating_mul(attempts) + backoff
    }

    /// Delay before the attempt following `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_concurrent_sessions, 10);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_delay_doubles_until_cap() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn test_default_retry_fits_call_timeout() {
        let config = RuntimeConfig::default();
        // 3 x 8s attempts + 0.5s + 1s backoff
        assert_eq!(config.retry.worst_case(), Duration::from_millis(25_500));
        assert!(config.retry_fits_call_timeout());
    }

    #[test]
    fn test_retry_budget_over_call_timeout() {
        let config = RuntimeConfig::default()
            .with_retry(RetryPolicy::default().with_attempt_timeout(Duration::from_secs(20)));
        assert!(!config.retry_fits_call_timeout());
        assert_eq!(RetryPolicy::none().worst_case(), Duration::from_secs(8));
    }

    #[test]
    fn test_attempts_never_zero() {
        assert_eq!(RetryPolicy::default().with_max_attempts(0).max_attempts, 1);
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }
}
