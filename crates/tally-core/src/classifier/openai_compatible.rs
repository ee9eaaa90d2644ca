//! OpenAI-compatible backend
//!
//! Works with any server implementing `/v1/chat/completions`: vLLM,
//! LocalAI, llama-server, Docker Model Runner or a hosted API.
//!
//! # Configuration
//!
//! - `OPENAI_COMPATIBLE_HOST`: server URL (required)
//! - `OPENAI_COMPATIBLE_MODEL`: model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: bearer key (optional)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::parsing::truncate;
use super::{ClassifierRequest, IntentClassifier};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAICompatibleClassifier {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAICompatibleClassifier {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            timeout: Duration::from_secs(super::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<&str>) -> Self {
        self.api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Required: `OPENAI_COMPATIBLE_HOST`
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok()?;
        let model = std::env::var("OPENAI_COMPATIBLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY").ok();
        Some(Self::new(&host, &model).with_api_key(api_key.as_deref()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &ClassifierRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: request.user_turn(),
                },
            ],
            temperature: 0.1,
            stream: false,
        }
    }
}

#[async_trait]
impl IntentClassifier for OpenAICompatibleClassifier {
    async fn classify(&self, request: &ClassifierRequest) -> Result<String> {
        let mut builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .timeout(self.timeout)
            .json(&self.build_request(request));
        if let Some(ref api_key) = self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Classifier(format!(
                "OpenAI API error {}: {}",
                status,
                truncate(&body, 200)
            )));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::Classifier("No response from OpenAI API".into()))?;

        debug!(model = %self.model, chars = content.len(), "Classifier replied");
        Ok(content)
    }

    async fn health_check(&self) -> bool {
        let mut builder = self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .timeout(Duration::from_secs(5));
        if let Some(ref api_key) = self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        matches!(builder.send().await, Ok(resp) if resp.status().is_success())
    }

    fn name(&self) -> &str {
        "openai_compatible"
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
