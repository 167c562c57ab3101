//! Generation gateway configuration from TOML (`[gateway]` section)

use council_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat completion endpoint.
///
/// ```toml
/// [gateway]
/// base_url = "https://api.openai.com"
/// model = "gpt-4o-mini"
/// api_key_env = "OPENAI_API_KEY"
/// max_tokens = 1024
/// request_timeout_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGatewayConfig {
    /// Base URL without the `/v1/...` suffix.
    pub base_url: String,
    pub model: String,
    /// Environment variable name for the API key (default: "OPENAI_API_KEY").
    pub api_key_env: String,
    /// Direct API key (not recommended, prefer the env var).
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for FileGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            max_tokens: 1024,
            temperature: 0.3,
            request_timeout_secs: 60,
        }
    }
}

impl FileGatewayConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::UnknownValue,
                format!(
                    "gateway.base_url: '{}' is not an http(s) URL",
                    self.base_url
                ),
            ));
        }
        if self.model.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::UnknownValue,
                "gateway.model must not be empty",
            ));
        }
        if self.request_timeout_secs == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroDuration,
                "gateway.request_timeout_secs must be greater than 0",
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ScoreOutOfRange,
                format!(
                    "gateway.temperature {} is outside 0.0..=2.0 and may be rejected",
                    self.temperature
                ),
            ));
        }
        issues
    }

    /// Key from `api_key`, else from the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.is_empty())
    }
}
