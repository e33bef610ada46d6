//! OpenAI-compatible completion client
//!
//! Issues a single `POST {base_url}/chat/completions` per call with bearer
//! authentication and returns the first choice. Works with DeepSeek, OpenAI
//! and any other endpoint speaking the same wire format.
//!
//! # Example
//!
//! ```rust,no_run
//! use confab::providers::OpenAiCompatibleClient;
//!
//! let client = OpenAiCompatibleClient::new(
//!     "your-api-key",
//!     "https://api.deepseek.com/v1",
//!     "deepseek-chat",
//! );
//! ```

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::providers::{ChatTurn, Completion, CompletionClient, ProviderError, TokenUsage};

/// Request body for `/chat/completions`
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}

/// HTTP client for OpenAI-compatible chat-completion endpoints
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

impl OpenAiCompatibleClient {
    /// Creates a new client
    ///
    /// `base_url` may be either an API root (`https://api.deepseek.com/v1`) or
    /// a full endpoint ending in `/chat/completions`.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            client: Client::new(),
        }
    }

    /// Creates a client from the provider section of the configuration
    ///
    /// Fails if the API key is missing or the HTTP client cannot be built.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::config("API key is not set"))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    /// Returns the URL requests are posted to
    pub fn chat_completions_url(&self) -> String {
        if self.base_url.ends_with("/chat/completions") {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    fn build_request(&self, turns: Vec<ChatTurn>) -> OpenAiRequest {
        OpenAiRequest {
            model: self.model.clone(),
            messages: turns
                .into_iter()
                .map(|turn| OpenAiMessage {
                    role: turn.role.as_str().to_string(),
                    content: Some(turn.content),
                })
                .collect(),
        }
    }

    fn parse_response(&self, response: OpenAiResponse) -> Result<Completion, ProviderError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::decode("No response choices returned"))?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u
                    .total_tokens
                    .unwrap_or_else(|| u.prompt_tokens.saturating_add(u.completion_tokens)),
            })
            .unwrap_or_default();

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            usage,
        })
    }
}

#[async_trait::async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(
        &self,
        turns: Vec<ChatTurn>,
        timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        let url = self.chat_completions_url();
        let request = self.build_request(turns);
        debug!(
            model = %self.model,
            message_count = request.messages.len(),
            timeout_secs = timeout.as_secs(),
            "Sending completion request (headers omitted)"
        );

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::timeout(timeout.as_secs())
                } else {
                    ProviderError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Completion endpoint returned an error status");
            return Err(ProviderError::upstream(status.as_u16(), body));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::timeout(timeout.as_secs())
            } else {
                ProviderError::from(e)
            }
        })?;
        let parsed: OpenAiResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::decode(format!("Failed to parse response: {}", e)))?;
        let completion = self.parse_response(parsed)?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            content_length = completion.content.len(),
            total_tokens = completion.usage.total_tokens,
            "Received completion"
        );

        Ok(completion)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn client_name(&self) -> &'static str {
        "openai-compatible"
    }
}
