//! Per-agent circuit breaker
//!
//! Stops dispatching to an agent that keeps failing until it has had time to
//! recover, then lets a single trial call through at a time.
//!
//! The breaker is a plain state machine with no interior mutability: its
//! owner serializes access (the agent envelope keeps it behind the same lock
//! as the active-session set), which makes every check-and-record sequence
//! linearizable for that agent. Every operation takes the current instant so
//! transitions are deterministic under test.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls allowed
    Closed,
    /// Failure threshold exceeded - calls blocked until the retry time
    Open,
    /// Recovery probing - one trial call at a time
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for a circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker
    pub failure_threshold: u32,
    /// Consecutive trial successes that close it again
    pub success_threshold: u32,
    /// How long the breaker stays open before allowing a trial
    pub timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }
}

/// Read-only snapshot of a breaker, for operators and tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_time: Option<DateTime<Utc>>,
    pub total_trips: u64,
}

/// Circuit breaker owned by a single agent.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    next_retry_time: Option<DateTime<Utc>>,
    trial_in_flight: bool,
    total_trips: u64,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            next_retry_time: None,
            trial_in_flight: false,
            total_trips: 0,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a call may proceed at `now`.
    ///
    /// While open, returns false until the retry time; at or after it the
    /// breaker moves to half-open and admits one trial. In half-open, the
    /// trial slot is reserved by this call and freed by the next
    /// [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure). A caller that is granted a
    /// trial but then declines to run it must call
    /// [`release_trial`](Self::release_trial).
    pub fn can_execute(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let due = self.next_retry_time.is_none_or(|retry| now >= retry);
                if due {
                    self.state = CircuitState::HalfOpen;
                    self.success_count = 0;
                    self.trial_in_flight = true;
                }
                due
            }
            CircuitState::HalfOpen => {
                if self.trial_in_flight {
                    false
                } else {
                    self.trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Whether [`can_execute`](Self::can_execute) would admit a call at
    /// `now`, without reserving a trial.
    pub fn would_admit(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => self.next_retry_time.is_none_or(|retry| now >= retry),
            CircuitState::HalfOpen => !self.trial_in_flight,
        }
    }

    /// Give back a trial slot that was granted but not used.
    pub fn release_trial(&mut self) {
        self.trial_in_flight = false;
    }

    /// Record a successful call.
    pub fn record_success(&mut self, _now: DateTime<Utc>) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                self.trial_in_flight = false;
                self.success_count += 1;
                if self.success_count >= self.config.success_threshold {
                    self.close();
                }
            }
            // A call admitted before the breaker tripped finished late;
            // the open window stands.
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.config.failure_threshold {
                    self.trip(now);
                }
            }
            CircuitState::HalfOpen => {
                self.failure_count += 1;
                self.trip(now);
            }
            CircuitState::Open => {
                self.failure_count += 1;
            }
        }
    }

    /// Current logical state.
    pub fn current_state(&self) -> CircuitState {
        self.state
    }

    /// Snapshot for introspection.
    pub fn state(&self) -> CircuitBreakerState {
        CircuitBreakerState {
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            failure_threshold: self.config.failure_threshold,
            success_threshold: self.config.success_threshold,
            timeout_ms: self.config.timeout_ms,
            next_retry_time: self.next_retry_time,
            total_trips: self.total_trips,
        }
    }

    /// Time left until a trial is allowed, if the breaker is open.
    pub fn retry_after(&self, now: DateTime<Utc>) -> Option<Duration> {
        match (self.state, self.next_retry_time) {
            (CircuitState::Open, Some(retry)) => {
                Some((retry - now).to_std().unwrap_or(Duration::ZERO))
            }
            _ => None,
        }
    }

    /// Force the breaker closed and clear all counters.
    pub fn reset(&mut self) {
        self.close();
    }

    fn trip(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::Open;
        self.success_count = 0;
        self.trial_in_flight = false;
        self.next_retry_time = Some(retry_at(now, self.config.timeout()));
        self.total_trips += 1;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.trial_in_flight = false;
        self.next_retry_time = None;
    }
}

fn retry_at(now: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(timeout)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failures: u32, successes: u32, timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: failures,
            success_threshold: successes,
            timeout_ms,
        })
    }

    fn ms(n: i64) -> chrono::Duration {
        chrono::Duration::milliseconds(n)
    }

    #[test]
    fn test_trips_exactly_at_threshold() {
        let t0 = Utc::now();
        let mut cb = breaker(3, 1, 1_000);

        cb.record_failure(t0);
        cb.record_failure(t0);
        assert!(cb.can_execute(t0));
        assert_eq!(cb.current_state(), CircuitState::Closed);

        cb.record_failure(t0);
        assert_eq!(cb.current_state(), CircuitState::Open);
        assert!(!cb.can_execute(t0));
        assert_eq!(cb.state().next_retry_time, Some(t0 + ms(1_000)));
    }

    #[test]
    fn test_stays_open_until_retry_time() {
        let t0 = Utc::now();
        let mut cb = breaker(2, 1, 1_000);
        cb.record_failure(t0);
        cb.record_failure(t0);

        for offset in [0, 1, 500, 999] {
            assert!(!cb.can_execute(t0 + ms(offset)), "offset {}", offset);
        }
        assert!(cb.can_execute(t0 + ms(1_000)));
        assert_eq!(cb.current_state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_single_trial_while_half_open() {
        let t0 = Utc::now();
        let mut cb = breaker(1, 2, 100);
        cb.record_failure(t0);

        let later = t0 + ms(100);
        assert!(cb.can_execute(later));
        assert!(!cb.can_execute(later));
        assert!(!cb.can_execute(later + ms(50)));

        cb.record_success(later);
        assert_eq!(cb.current_state(), CircuitState::HalfOpen);
        assert!(cb.can_execute(later));
        cb.record_success(later);
        assert_eq!(cb.current_state(), CircuitState::Closed);
        assert_eq!(cb.state().failure_count, 0);
        assert!(cb.state().next_retry_time.is_none());
    }

    #[test]
    fn test_trial_failure_reopens_with_fresh_timeout() {
        let t0 = Utc::now();
        let mut cb = breaker(1, 3, 1_000);
        cb.record_failure(t0);

        let trial_time = t0 + ms(1_500);
        assert!(cb.can_execute(trial_time));
        cb.record_success(trial_time);
        assert!(cb.can_execute(trial_time));
        cb.record_failure(trial_time);

        assert_eq!(cb.current_state(), CircuitState::Open);
        assert_eq!(cb.state().next_retry_time, Some(trial_time + ms(1_000)));
        assert_eq!(cb.state().success_count, 0);
        assert!(!cb.can_execute(trial_time + ms(999)));
        assert_eq!(cb.state().total_trips, 2);
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let t0 = Utc::now();
        let mut cb = breaker(3, 1, 1_000);
        cb.record_failure(t0);
        cb.record_failure(t0);
        cb.record_success(t0);
        cb.record_failure(t0);
        cb.record_failure(t0);
        assert_eq!(cb.current_state(), CircuitState::Closed);
    }

    #[test]
    fn test_release_trial_frees_slot() {
        let t0 = Utc::now();
        let mut cb = breaker(1, 1, 10);
        cb.record_failure(t0);
        assert!(cb.can_execute(t0 + ms(10)));
        cb.release_trial();
        assert!(cb.can_execute(t0 + ms(10)));
    }

    #[test]
    fn test_retry_after_hint() {
        let t0 = Utc::now();
        let mut cb = breaker(1, 1, 2_000);
        assert!(cb.retry_after(t0).is_none());
        cb.record_failure(t0);
        assert_eq!(cb.retry_after(t0 + ms(500)), Some(Duration::from_millis(1_500)));
        assert_eq!(cb.retry_after(t0 + ms(5_000)), Some(Duration::ZERO));
    }

    #[test]
    fn test_would_admit_does_not_reserve() {
        let t0 = Utc::now();
        let mut cb = breaker(1, 1, 100);
        cb.record_failure(t0);
        assert!(!cb.would_admit(t0));
        assert!(cb.would_admit(t0 + ms(100)));
        assert_eq!(cb.current_state(), CircuitState::Open);
        assert!(cb.can_execute(t0 + ms(100)));
        assert!(!cb.would_admit(t0 + ms(100)));
    }

    #[test]
    fn test_reset() {
        let t0 = Utc::now();
        let mut cb = breaker(1, 1, 60_000);
        cb.record_failure(t0);
        cb.reset();
        assert!(cb.can_execute(t0));
        assert_eq!(cb.state().state, CircuitState::Closed);
    }
}
