//! The analysis step: one generation request with per-attempt timeout and
//! exponential backoff.
//!
//! This is the only place in the engine where a call is retried.

use crate::config::RetryPolicy;
use crate::ports::llm_gateway::LlmGateway;
use crate::runtime::error::AgentError;
use council_domain::AgentType;
use tracing::{debug, warn};

/// Request a completion, retrying per `policy`.
///
/// Returns the last error once every attempt has failed.
pub async fn run_analysis(
    gateway: &dyn LlmGateway,
    agent_type: AgentType,
    prompt: &str,
    system_context: &str,
    policy: &RetryPolicy,
) -> Result<String, AgentError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = AgentError::Internal("analysis never attempted".to_string());

    for attempt in 0..attempts {
        let outcome = tokio::time::timeout(
            policy.attempt_timeout,
            gateway.generate(prompt, system_context),
        )
        .await;

        match outcome {
            Ok(Ok(text)) => {
                debug!(agent = %agent_type, attempt = attempt + 1, "Analysis completed");
                return Ok(text);
            }
            Ok(Err(e)) => last_error = AgentError::Gateway(e),
            Err(_) => last_error = AgentError::Timeout(policy.attempt_timeout),
        }

        if attempt + 1 < attempts {
            let delay = policy.delay_for(attempt);
            warn!(
                agent = %agent_type,
                attempt = attempt + 1,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "Retrying analysis"
            );
            tokio::time::sleep(delay).await;
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::llm_gateway::GatewayError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fails the first `failures` calls, then answers.
    struct FlakyGateway {
        failures: usize,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl LlmGateway for FlakyGateway {
        async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, GatewayError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls <= self.failures {
                Err(GatewayError::RequestFailed("503".to_string()))
            } else {
                Ok("{\"confidence\": 0.9}".to_string())
            }
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    struct SlowGateway;

    #[async_trait]
    impl LlmGateway for SlowGateway {
        async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, GatewayError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(attempts)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(4))
            .with_attempt_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_recovers_within_attempts() {
        let gateway = FlakyGateway {
            failures: 2,
            calls: Mutex::new(0),
        };
        let text = run_analysis(&gateway, AgentType::Intake, "p", "s", &fast_policy(3))
            .await
            .unwrap();
        assert!(text.contains("0.9"));
        assert_eq!(*gateway.calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let gateway = FlakyGateway {
            failures: 10,
            calls: Mutex::new(0),
        };
        let err = run_analysis(&gateway, AgentType::Intake, "p", "s", &fast_policy(2))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Gateway(GatewayError::RequestFailed(_))));
        assert_eq!(*gateway.calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_attempt_timeout() {
        let policy = fast_policy(1).with_attempt_timeout(Duration::from_millis(10));
        let err = run_analysis(&SlowGateway, AgentType::Coordination, "p", "s", &policy)
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::Timeout(Duration::from_millis(10)));
    }
}
