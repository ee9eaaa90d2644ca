//! Intent classifier backends
//!
//! The classifier turns a free-text message into intent JSON. This module
//! only moves text: building the prompt, calling a backend and returning
//! the raw reply. Parsing the reply is `crate::intent`'s job.
//!
//! # Architecture
//!
//! - `IntentClassifier` trait: the interface every backend implements
//! - `ClassifierClient` enum: concrete wrapper providing Clone + static dispatch
//! - Backends: `HttpClassifier`, `OpenAICompatibleClassifier`, `MockClassifier`
//!
//! # Configuration
//!
//! - `AI_BACKEND`: `http` (default), `openai_compatible` or `mock`
//! - `AI_API_URL`: endpoint for the `http` backend
//! - `OPENAI_COMPATIBLE_HOST` / `OPENAI_COMPATIBLE_MODEL` / `OPENAI_COMPATIBLE_API_KEY`

mod http;
mod mock;
mod openai_compatible;
pub mod parsing;
pub mod prompt;

pub use http::HttpClassifier;
pub use mock::MockClassifier;
pub use openai_compatible::{OpenAICompatibleClassifier, DEFAULT_MODEL as DEFAULT_OPENAI_MODEL};
pub use prompt::{default_prompts_dir, Prompt};

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ClassifierBackend, ClassifierConfig};
use crate::context::ClassifierContext;
use crate::error::Result;

/// Request timeout unless configured otherwise
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// One classification call
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierRequest {
    /// Standing instructions
    pub system: String,
    /// Rendered ledger context and history
    pub context: String,
    /// The user's message, verbatim
    pub message: String,
}

impl ClassifierRequest {
    pub fn new(system: &str, context: &str, message: &str) -> Self {
        Self {
            system: system.to_string(),
            context: context.to_string(),
            message: message.to_string(),
        }
    }

    /// Render `prompt` against `context` for `message`
    pub fn build(prompt: &Prompt, context: &ClassifierContext, message: &str) -> Self {
        let vars = context.to_template_vars();
        let vars: HashMap<&str, String> = vars.into_iter().collect();
        Self::new(prompt.system_section(), &prompt.render_context(&vars), message)
    }

    /// Context followed by the user's message
    pub fn user_turn(&self) -> String {
        if self.context.trim().is_empty() {
            format!("User: {}", self.message)
        } else {
            format!("{}\n\nUser: {}", self.context, self.message)
        }
    }

    /// Everything as one string, for backends without roles
    pub fn flatten(&self) -> String {
        format!("{}\n\n---\n\n{}", self.system, self.user_turn())
    }
}

/// Interface for all classifier backends
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Raw reply text for `request`
    async fn classify(&self, request: &ClassifierRequest) -> Result<String>;

    /// Whether the backend is reachable
    async fn health_check(&self) -> bool;

    /// Backend name, for logs
    fn name(&self) -> &str;

    /// Endpoint, for logs
    fn host(&self) -> &str;
}

#[derive(Clone)]
pub enum ClassifierClient {
    Http(HttpClassifier),
    OpenAICompatible(OpenAICompatibleClassifier),
    Mock(MockClassifier),
}

impl ClassifierClient {
    /// Build the configured backend; `None` when it lacks an endpoint
    pub fn from_config(config: &ClassifierConfig) -> Option<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        match config.backend {
            ClassifierBackend::Http => config
                .api_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .map(|url| Self::Http(HttpClassifier::new(url).with_timeout(timeout))),
            ClassifierBackend::OpenAICompatible => config
                .host
                .as_deref()
                .filter(|h| !h.trim().is_empty())
                .map(|host| {
                    Self::OpenAICompatible(
                        OpenAICompatibleClassifier::new(host, &config.model)
                            .with_api_key(config.api_key.as_deref())
                            .with_timeout(timeout),
                    )
                }),
            ClassifierBackend::Mock => Some(Self::Mock(MockClassifier::new())),
            ClassifierBackend::Disabled => None,
        }
    }

    /// Build from environment variables alone
    pub fn from_env() -> Option<Self> {
        let mut config = ClassifierConfig::default();
        config.apply_env();
        Self::from_config(&config)
    }

    pub fn mock(mock: MockClassifier) -> Self {
        Self::Mock(mock)
    }
}

#[async_trait]
impl IntentClassifier for ClassifierClient {
    async fn classify(&self, request: &ClassifierRequest) -> Result<String> {
        match self {
            Self::Http(c) => c.classify(request).await,
            Self::OpenAICompatible(c) => c.classify(request).await,
            Self::Mock(c) => c.classify(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            Self::Http(c) => c.health_check().await,
            Self::OpenAICompatible(c) => c.health_check().await,
            Self::Mock(c) => c.health_check().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Http(c) => c.name(),
            Self::OpenAICompatible(c) => c.name(),
            Self::Mock(c) => c.name(),
        }
    }

    fn host(&self) -> &str {
        match self {
            Self::Http(c) => c.host(),
            Self::OpenAICompatible(c) => c.host(),
            Self::Mock(c) => c.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_from_config() {
        let mut config = ClassifierConfig::default();
        config.backend = ClassifierBackend::Http;
        config.api_url = None;
        assert!(ClassifierClient::from_config(&config).is_none());

        config.api_url = Some("http://localhost:8080/api/chat".into());
        let client = ClassifierClient::from_config(&config).unwrap();
        assert_eq!(client.name(), "http");

        config.backend = ClassifierBackend::OpenAICompatible;
        config.host = Some("http://localhost:8000/".into());
        let client = ClassifierClient::from_config(&config).unwrap();
        assert_eq!(client.name(), "openai_compatible");
        assert_eq!(client.host(), "http://localhost:8000");

        config.backend = ClassifierBackend::Mock;
        assert_eq!(ClassifierClient::from_config(&config).unwrap().name(), "mock");

        config.backend = ClassifierBackend::Disabled;
        assert!(ClassifierClient::from_config(&config).is_none());
    }

    #[test]
    fn test_build_request() {
        let prompt = Prompt::embedded().unwrap();
        let context = ClassifierContext::new(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        let request = ClassifierRequest::build(&prompt, &context, "coffee 60");

        assert!(request.system.contains("usetype"));
        assert_eq!(request.context, "Today: 2024-03-15");
        assert_eq!(request.user_turn(), "Today: 2024-03-15\n\nUser: coffee 60");

        let flat = request.flatten();
        assert!(flat.starts_with(&request.system));
        assert!(flat.ends_with("User: coffee 60"));
    }

    #[test]
    fn test_user_turn_without_context() {
        let request = ClassifierRequest::new("sys", "  ", "hi");
        assert_eq!(request.user_turn(), "User: hi");
    }
}
