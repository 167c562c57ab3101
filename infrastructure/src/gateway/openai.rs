//! OpenAI-compatible chat completion gateway.

use crate::config::FileGatewayConfig;
use async_trait::async_trait;
use council_application::{GatewayError, LlmGateway};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Gateway backed by `POST {base_url}/v1/chat/completions`.
pub struct OpenAiGateway {
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    http: reqwest::Client,
}

impl OpenAiGateway {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Other(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            max_tokens: 1024,
            temperature: 0.3,
            http,
        })
    }

    /// Build from the `[gateway]` section, resolving the API key.
    pub fn from_config(config: &FileGatewayConfig) -> Result<Self, GatewayError> {
        let api_key = config.resolve_api_key();
        if api_key.is_none() {
            warn!(
                "No API key in gateway.api_key or ${}; sending unauthenticated requests",
                config.api_key_env
            );
        }
        Ok(Self::new(
            &config.base_url,
            &config.model,
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_max_tokens(config.max_tokens)
        .with_temperature(config.temperature))
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    fn request_body<'a>(&'a self, prompt: &'a str, system_context: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if !system_context.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system_context,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_connect() {
        GatewayError::ConnectionError(e.to_string())
    } else {
        GatewayError::RequestFailed(e.to_string())
    }
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn generate(&self, prompt: &str, system_context: &str) -> Result<String, GatewayError> {
        let url = self.endpoint("chat/completions");
        debug!(model = %self.model, prompt_bytes = prompt.len(), "chat completion request");

        let response = self
            .authorize(self.http.post(&url))
            .json(&self.request_body(prompt, system_context))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("{} from {}: {}", status, url, body.trim());
            return Err(
                if status.as_u16() == 429 || status.is_server_error() {
                    GatewayError::Unavailable(message)
                } else {
                    GatewayError::RequestFailed(message)
                },
            );
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GatewayError::InvalidResponse("no content in first choice".to_string()))
    }

    async fn health_check(&self) -> bool {
        match self.authorize(self.http.get(self.endpoint("models"))).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("gateway health check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> OpenAiGateway {
        OpenAiGateway::new(
            "http://localhost:11434/",
            "llama3",
            Some("sk-test".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        assert_eq!(
            gateway().endpoint("chat/completions"),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_matches_chat_format() {
        let gateway = gateway().with_max_tokens(256);
        let body = serde_json::to_value(gateway.request_body("hello", "Role: intake")).unwrap();

        assert_eq!(body["model"], "llama3");
        assert_eq!(body["max_tokens"], 256);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "hello");
    }

    #[test]
    fn test_request_body_omits_empty_system() {
        let gateway = gateway();
        let body = serde_json::to_value(gateway.request_body("hello", "")).unwrap();
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_from_config_keeps_model() {
        let config = FileGatewayConfig {
            api_key: Some("sk".to_string()),
            model: "gpt-test".to_string(),
            ..Default::default()
        };
        let gateway = OpenAiGateway::from_config(&config).unwrap();
        assert_eq!(gateway.model(), "gpt-test");
        assert_eq!(gateway.endpoint("models"), "https://api.openai.com/v1/models");
    }
}
