//! Mock classifier for tests and offline development
//!
//! Replies are scripted up front and handed out in order. Once the script
//! runs out every call gets the fallback reply.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::{ClassifierRequest, IntentClassifier};

const FALLBACK_REPLY: &str = r#"{"action":"chat","message":"I'm not connected to a model right now."}"#;

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail(String),
}

/// Scripted classifier
///
/// Clones share the script and the request log.
#[derive(Debug, Clone)]
pub struct MockClassifier {
    pub healthy: bool,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<ClassifierRequest>>>,
    fallback: String,
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            healthy: true,
            script: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            fallback: FALLBACK_REPLY.to_string(),
        }
    }

    /// Mock that answers `replies` in order
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for reply in replies {
            mock.push_reply(reply);
        }
        mock
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    pub fn with_fallback(mut self, reply: &str) -> Self {
        self.fallback = reply.to_string();
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Scripted::Reply(reply.into()));
        }
    }

    /// Queue a backend failure, surfaced as a transient error
    pub fn push_failure(&self, reason: &str) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Scripted::Fail(reason.to_string()));
        }
    }

    /// Every request seen so far
    pub fn requests(&self) -> Vec<ClassifierRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl IntentClassifier for MockClassifier {
    async fn classify(&self, request: &ClassifierRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Fail(reason)) => Err(Error::Classifier(reason)),
            None => Ok(self.fallback.clone()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
