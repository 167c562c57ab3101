//! Coordination and collaboration parameters.

use council_domain::collaboration::DEFAULT_MAX_DURATION_MS;
use council_domain::coordination::plan::DEFAULT_SAFETY_THRESHOLD;
use std::time::Duration;

/// Parameters of the coordination engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinationConfig {
    /// Strategy name that replaces automatic selection.
    pub strategy_override: Option<String>,
    /// Bound on one agent dispatch, on top of the envelope's own timeout.
    pub dispatch_timeout: Duration,
    /// Overall quality below this forces escalation.
    pub safety_threshold: f64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            strategy_override: None,
            dispatch_timeout: Duration::from_secs(45),
            safety_threshold: DEFAULT_SAFETY_THRESHOLD,
        }
    }
}

impl CoordinationConfig {
    pub fn with_strategy_override(mut self, strategy: impl Into<String>) -> Self {
        self.strategy_override = Some(strategy.into());
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub fn with_safety_threshold(mut self, threshold: f64) -> Self {
        self.safety_threshold = threshold;
        self
    }
}

/// Parameters of the collaboration workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct CollaborationConfig {
    /// Period of the session monitor.
    pub monitor_interval: Duration,
    /// Finished sessions kept in history.
    pub history_retention: usize,
    /// Max duration of contexts built through the workflow.
    pub default_max_duration: Duration,
}

impl Default for CollaborationConfig {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_secs(30),
            history_retention: 100,
            default_max_duration: Duration::from_millis(DEFAULT_MAX_DURATION_MS),
        }
    }
}

impl CollaborationConfig {
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn with_history_retention(mut self, retention: usize) -> Self {
        self.history_retention = retention;
        self
    }

    pub fn with_default_max_duration(mut self, max_duration: Duration) -> Self {
        self.default_max_duration = max_duration;
        self
    }
}
