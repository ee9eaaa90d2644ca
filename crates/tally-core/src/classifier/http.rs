//! Simple chat endpoint backend
//!
//! POSTs `{"message": prompt}` and reads `{"response": text}`. The whole
//! prompt (instructions, context, history and the user's message) travels
//! as one string.
//!
//! # Configuration
//!
//! - `AI_API_URL`: endpoint URL (required)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::parsing::truncate;
use super::{ClassifierRequest, IntentClassifier};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Classifier behind a `{message} -> {response}` HTTP endpoint
#[derive(Clone)]
pub struct HttpClassifier {
    http_client: Client,
    url: String,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(url: &str) -> Self {
        Self {
            http_client: Client::new(),
            url: url.trim().to_string(),
            timeout: Duration::from_secs(super::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Required: `AI_API_URL`
    pub fn from_env() -> Option<Self> {
        std::env::var("AI_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| Self::new(&url))
    }
}

#[async_trait]
impl IntentClassifier for HttpClassifier {
    async fn classify(&self, request: &ClassifierRequest) -> Result<String> {
        let prompt = request.flatten();
        let response = self
            .http_client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&ChatRequest { message: &prompt })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Classifier(format!(
                "status {}: {}",
                status,
                truncate(&body, 200)
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Classifier(format!("unreadable reply: {} - {}", e, truncate(&body, 200)))
        })?;
        if let Some(error) = parsed.error.filter(|e| !e.is_empty()) {
            return Err(Error::Classifier(error));
        }
        if parsed.response.trim().is_empty() {
            return Err(Error::Classifier("empty reply".into()));
        }

        debug!(model = ?parsed.model, chars = parsed.response.len(), "Classifier replied");
        Ok(parsed.response)
    }

    async fn health_check(&self) -> bool {
        // The endpoint only takes POST; any HTTP answer means it is reachable
        self.http_client
            .get(&self.url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }

    fn name(&self) -> &str {
        "http"
    }

    fn host(&self) -> &str {
        &self.url
    }
}
