//! Coordination and collaboration configuration from TOML
//! (`[coordination]` and `[collaboration]` sections)

use council_application::{CollaborationConfig, CoordinationConfig};
use council_domain::coordination::plan::DEFAULT_SAFETY_THRESHOLD;
use council_domain::{ConfigIssue, ConfigIssueCode, CoordinationStrategy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw coordination configuration from TOML
///
/// # Example
///
/// ```toml
/// [coordination]
/// strategy = "parallel"          # optional: sequential, parallel, hierarchical, consensus
/// dispatch_timeout_secs = 45
/// safety_threshold = 0.6
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCoordinationConfig {
    /// Forces one strategy instead of automatic selection
    pub strategy: Option<String>,
    pub dispatch_timeout_secs: u64,
    pub safety_threshold: f64,
}

impl Default for FileCoordinationConfig {
    fn default() -> Self {
        Self {
            strategy: None,
            dispatch_timeout_secs: 45,
            safety_threshold: DEFAULT_SAFETY_THRESHOLD,
        }
    }
}

impl FileCoordinationConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if let Some(name) = &self.strategy
            && name.parse::<CoordinationStrategy>().is_err()
        {
            let valid: Vec<&str> = CoordinationStrategy::ALL.iter().map(|s| s.as_str()).collect();
            issues.push(ConfigIssue::error(
                ConfigIssueCode::UnknownStrategy,
                format!(
                    "coordination.strategy: unknown strategy '{}' (expected one of: {})",
                    name,
                    valid.join(", ")
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.safety_threshold) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ScoreOutOfRange,
                format!(
                    "coordination.safety_threshold must be within 0.0..=1.0, got {}",
                    self.safety_threshold
                ),
            ));
        }
        if self.dispatch_timeout_secs == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroDuration,
                "coordination.dispatch_timeout_secs must be greater than 0",
            ));
        }
        issues
    }

    pub fn to_coordination_config(&self) -> CoordinationConfig {
        let mut config = CoordinationConfig::default()
            .with_dispatch_timeout(Duration::from_secs(self.dispatch_timeout_secs))
            .with_safety_threshold(self.safety_threshold);
        if let Some(strategy) = &self.strategy {
            config = config.with_strategy_override(strategy.clone());
        }
        config
    }
}

/// Raw collaboration configuration from TOML
///
/// ```toml
/// [collaboration]
/// monitor_interval_secs = 30
/// history_retention = 100
/// default_max_duration_secs = 1800
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCollaborationConfig {
    pub monitor_interval_secs: u64,
    pub history_retention: usize,
    pub default_max_duration_secs: u64,
}

impl Default for FileCollaborationConfig {
    fn default() -> Self {
        Self {
            monitor_interval_secs: 30,
            history_retention: 100,
            default_max_duration_secs: 30 * 60,
        }
    }
}

impl FileCollaborationConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.monitor_interval_secs == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroDuration,
                "collaboration.monitor_interval_secs must be greater than 0",
            ));
        }
        if self.history_retention == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ZeroCapacity,
                "collaboration.history_retention is 0: finished sessions are not kept",
            ));
        }
        if self.default_max_duration_secs == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroDuration,
                "collaboration.default_max_duration_secs must be greater than 0",
            ));
        }
        issues
    }

    pub fn to_collaboration_config(&self) -> CollaborationConfig {
        CollaborationConfig::default()
            .with_monitor_interval(Duration::from_secs(self.monitor_interval_secs))
            .with_history_retention(self.history_retention)
            .with_default_max_duration(Duration::from_secs(self.default_max_duration_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_strategy_is_an_error() {
        let config = FileCoordinationConfig {
            strategy: Some("round_robin".to_string()),
            ..Default::default()
        };
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::UnknownStrategy);
        assert!(issues[0].message.contains("hierarchical"));
    }

    #[test]
    fn test_strategy_override_carries_over() {
        let config = FileCoordinationConfig {
            strategy: Some("consensus".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_empty());
        assert_eq!(
            config.to_coordination_config().strategy_override.as_deref(),
            Some("consensus")
        );
    }

    #[test]
    fn test_threshold_out_of_range() {
        let config = FileCoordinationConfig {
            safety_threshold: 1.5,
            ..Default::default()
        };
        assert_eq!(config.validate()[0].code, ConfigIssueCode::ScoreOutOfRange);
    }

    #[test]
    fn test_collaboration_defaults_match() {
        assert_eq!(
            FileCollaborationConfig::default().to_collaboration_config(),
            CollaborationConfig::default()
        );
    }
}
