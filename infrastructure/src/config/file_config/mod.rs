//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application
//! configuration with [`FileConfig::to_council_config`].

mod coordination;
mod gateway;
mod logging;
mod output;
mod runtime;

pub use coordination::{FileCollaborationConfig, FileCoordinationConfig};
pub use gateway::FileGatewayConfig;
pub use logging::FileLoggingConfig;
pub use output::FileOutputConfig;
pub use runtime::{FileCircuitBreakerConfig, FileRetryConfig, FileRuntimeConfig};

use council_application::CouncilConfig;
use council_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Agent envelope: capacity, call timeout, health checks
    pub runtime: FileRuntimeConfig,
    pub circuit_breaker: FileCircuitBreakerConfig,
    /// Retries of analysis generation calls
    pub retry: FileRetryConfig,
    /// Strategy override, dispatch timeout, safety threshold
    pub coordination: FileCoordinationConfig,
    /// Session monitoring and history
    pub collaboration: FileCollaborationConfig,
    /// OpenAI-compatible generation endpoint
    pub gateway: FileGatewayConfig,
    pub logging: FileLoggingConfig,
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Errors mean the council cannot start; warnings are printed and ignored.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        issues.extend(self.runtime.validate());
        issues.extend(self.circuit_breaker.validate());
        issues.extend(self.retry.validate());
        issues.extend(self.coordination.validate());
        issues.extend(self.collaboration.validate());
        issues.extend(self.gateway.validate());
        issues.extend(self.validate_time_budgets());
        issues
    }

    /// Timeouts that nest: retries inside the call timeout, the call timeout
    /// inside the dispatch timeout.
    fn validate_time_budgets(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let call_timeout = Duration::from_secs(self.runtime.call_timeout_secs);
        let retries = self.retry.to_retry_policy().worst_case();
        if self.runtime.call_timeout_secs > 0 && retries > call_timeout {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::TimeoutBudget,
                format!(
                    "retry budget ({:.1}s over {} attempts) exceeds runtime.call_timeout_secs ({}s): later attempts are cut off",
                    retries.as_secs_f64(),
                    self.retry.max_attempts.max(1),
                    self.runtime.call_timeout_secs
                ),
            ));
        }
        if self.coordination.dispatch_timeout_secs > 0
            && self.coordination.dispatch_timeout_secs < self.runtime.call_timeout_secs
        {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::TimeoutBudget,
                format!(
                    "coordination.dispatch_timeout_secs ({}s) is shorter than runtime.call_timeout_secs ({}s): agents are abandoned before their own deadline",
                    self.coordination.dispatch_timeout_secs, self.runtime.call_timeout_secs
                ),
            ));
        }
        issues
    }

    pub fn has_errors(&self) -> bool {
        self.validate().iter().any(ConfigIssue::is_error)
    }

    pub fn to_council_config(&self) -> CouncilConfig {
        CouncilConfig::new(
            runtime::to_runtime_config(&self.runtime, &self.circuit_breaker, &self.retry),
            self.coordination.to_coordination_config(),
            self.collaboration.to_collaboration_config(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::OutputFormat;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[runtime]
max_concurrent_sessions = 4
call_timeout_secs = 15

[circuit_breaker]
failure_threshold = 3

[retry]
max_attempts = 2
attempt_timeout_secs = 6

[coordination]
strategy = "hierarchical"
safety_threshold = 0.7

[collaboration]
history_retention = 20

[gateway]
model = "llama3"
base_url = "http://localhost:11434"

[output]
format = "json"
color = false
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_empty());
        assert_eq!(config.gateway.model, "llama3");
        assert_eq!(config.output.format, Some(OutputFormat::Json));
        assert!(!config.output.color);

        let council = config.to_council_config();
        assert_eq!(council.runtime.max_concurrent_sessions, 4);
        assert_eq!(council.runtime.call_timeout, Duration::from_secs(15));
        assert_eq!(council.runtime.circuit_breaker.failure_threshold, 3);
        assert_eq!(council.runtime.retry.max_attempts, 2);
        assert_eq!(
            council.coordination.strategy_override.as_deref(),
            Some("hierarchical")
        );
        assert_eq!(council.coordination.safety_threshold, 0.7);
        assert_eq!(council.collaboration.history_retention, 20);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let toml_str = r#"
[coordination]
dispatch_timeout_secs = 10
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.coordination.dispatch_timeout_secs, 10);
        // Defaults should apply
        assert!(config.coordination.strategy.is_none());
        assert_eq!(config.runtime, FileRuntimeConfig::default());
        assert!(config.output.color);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.to_council_config(), CouncilConfig::default());
    }

    #[test]
    fn test_retry_budget_over_call_timeout_warns() {
        let mut config = FileConfig::default();
        config.retry.attempt_timeout_secs = 20;

        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::TimeoutBudget);
        assert!(!issues[0].is_error());
        assert!(issues[0].message.contains("61.5s"));
    }

    #[test]
    fn test_dispatch_shorter_than_call_timeout_warns() {
        let mut config = FileConfig::default();
        config.coordination.dispatch_timeout_secs = 10;

        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::TimeoutBudget);
        assert!(issues[0].message.contains("dispatch_timeout_secs"));
    }

    #[test]
    fn test_validate_collects_across_sections() {
        let mut config = FileConfig::default();
        config.coordination.strategy = Some("random".to_string());
        config.collaboration.history_retention = 0;
        config.circuit_breaker.success_threshold = 0;

        let issues = config.validate();
        assert_eq!(issues.len(), 3);
        assert!(config.has_errors());
        assert!(
            issues
                .iter()
                .any(|i| i.code == ConfigIssueCode::ZeroCapacity && !i.is_error())
        );
    }
}
