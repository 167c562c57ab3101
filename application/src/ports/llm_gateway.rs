//! LLM Gateway port
//!
//! Defines the interface to the external language-generation capability.
//! Output is untrusted text; callers validate it with the analysis parser.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during LLM gateway operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Timeout")]
    Timeout,

    #[error("Other error: {0}")]
    Other(String),
}

/// Gateway for text generation
///
/// This port defines how the application layer talks to the generation
/// capability. Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Generate a completion for `prompt` under `system_context`.
    async fn generate(&self, prompt: &str, system_context: &str) -> Result<String, GatewayError>;

    /// Whether the capability is reachable.
    async fn health_check(&self) -> bool;
}
