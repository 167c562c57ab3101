//! Agent envelope configuration from TOML (`[runtime]`, `[circuit_breaker]`
//! and `[retry]` sections)

use council_application::{RetryPolicy, RuntimeConfig};
use council_domain::{CircuitBreakerConfig, ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw runtime configuration from TOML
///
/// # Example
///
/// ```toml
/// [runtime]
/// max_concurrent_sessions = 10
/// call_timeout_secs = 30
/// health_check_interval_secs = 30
/// shutdown_grace_secs = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRuntimeConfig {
    pub max_concurrent_sessions: usize,
    pub call_timeout_secs: u64,
    pub health_check_interval_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for FileRuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 10,
            call_timeout_secs: 30,
            health_check_interval_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

impl FileRuntimeConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.max_concurrent_sessions == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroCapacity,
                "runtime.max_concurrent_sessions must be at least 1",
            ));
        }
        for (field, value) in [
            ("runtime.call_timeout_secs", self.call_timeout_secs),
            ("runtime.health_check_interval_secs", self.health_check_interval_secs),
        ] {
            if value == 0 {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::ZeroDuration,
                    format!("{} must be greater than 0", field),
                ));
            }
        }
        issues
    }
}

/// Raw circuit breaker configuration from TOML
///
/// ```toml
/// [circuit_breaker]
/// failure_threshold = 5
/// success_threshold = 2
/// timeout_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_secs: u64,
}

impl Default for FileCircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_secs: 60,
        }
    }
}

impl FileCircuitBreakerConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        for (field, value) in [
            ("circuit_breaker.failure_threshold", self.failure_threshold),
            ("circuit_breaker.success_threshold", self.success_threshold),
        ] {
            if value == 0 {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::ZeroThreshold,
                    format!("{} must be at least 1", field),
                ));
            }
        }
        if self.timeout_secs == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ZeroDuration,
                "circuit_breaker.timeout_secs is 0: an open breaker admits a trial immediately",
            ));
        }
        issues
    }

    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::default()
            .with_failure_threshold(self.failure_threshold)
            .with_success_threshold(self.success_threshold)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// Raw retry configuration from TOML
///
/// ```toml
/// [retry]
/// max_attempts = 3
/// base_delay_ms = 500
/// max_delay_ms = 8000
/// attempt_timeout_secs = 8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub attempt_timeout_secs: u64,
}

impl Default for FileRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            attempt_timeout_secs: 8,
        }
    }
}

impl FileRetryConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.max_attempts == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ZeroCapacity,
                "retry.max_attempts is 0, using a single attempt",
            ));
        }
        if self.base_delay_ms > self.max_delay_ms {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::DelayInverted,
                format!(
                    "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({}), every retry waits {}ms",
                    self.base_delay_ms, self.max_delay_ms, self.max_delay_ms
                ),
            ));
        }
        if self.attempt_timeout_secs == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroDuration,
                "retry.attempt_timeout_secs must be greater than 0",
            ));
        }
        issues
    }

    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_attempt_timeout(Duration::from_secs(self.attempt_timeout_secs))
    }
}

/// Assemble the envelope configuration from its three sections.
pub fn to_runtime_config(
    runtime: &FileRuntimeConfig,
    breaker: &FileCircuitBreakerConfig,
    retry: &FileRetryConfig,
) -> RuntimeConfig {
    RuntimeConfig::default()
        .with_max_concurrent_sessions(runtime.max_concurrent_sessions.max(1))
        .with_call_timeout(Duration::from_secs(runtime.call_timeout_secs))
        .with_health_check_interval(Duration::from_secs(runtime.health_check_interval_secs))
        .with_shutdown_grace(Duration::from_secs(runtime.shutdown_grace_secs))
        .with_circuit_breaker(breaker.to_breaker_config())
        .with_retry(retry.to_retry_policy())
}
