use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

/// Environment variable holding the bearer token; wins over `llm.api_key`.
pub const API_KEY_ENV: &str = "ROBONEWS_LLM_API_KEY";

/// Longest slice of an error body carried into [`ModelError::Other`].
const MAX_ERROR_BODY: usize = 200;

/// Typed model failures. The enrichment state machine branches on these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Model server is rate limiting requests")]
    RateLimited,
    #[error("Model not found: {0}")]
    ModelNotFound(String),
    #[error("Model request failed: {0}")]
    Other(String),
}

/// A text-generation backend.
pub trait LanguageModel {
    /// Send `prompt` to `model` and return the complete response text.
    fn generate(
        &self,
        model: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<String, ModelError>> + Send;
}

impl<T: LanguageModel> LanguageModel for &T {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<String, ModelError>> + Send {
        (**self).generate(model, prompt)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

/// Client for an Ollama-compatible `/api/chat` endpoint.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    /// Build from the `[llm]` section. `ROBONEWS_LLM_API_KEY` takes precedence
    /// over the key in the config file.
    pub fn from_config(config: &LlmConfig) -> Result<Self, reqwest::Error> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| config.api_key.clone())
            .map(SecretString::from);

        Self::new(
            &config.base_url,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn chat(&self, model: &str, prompt: &str) -> Result<String, ModelError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        tracing::debug!(model = %model, "Model chat request");

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| ModelError::Other("request timed out".to_string()))?
            .map_err(|e| ModelError::Other(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ModelError::ModelNotFound(model.to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(ModelError::Other(format!("HTTP {}: {}", status.as_u16(), detail)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Other(format!("undecodable response: {e}")))?;
        Ok(parsed.message.content)
    }
}

impl LanguageModel for OllamaClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<String, ModelError>> + Send {
        self.chat(model, prompt)
    }
}

/// Mask the token in Debug output.
impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}
