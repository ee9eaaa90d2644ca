//! Configuration
//!
//! Resolution order, later wins:
//! 1. Built-in defaults
//! 2. TOML file (`~/.config/tally/config.toml`, or an explicit path)
//! 3. Environment variables
//!
//! ```toml
//! [database]
//! path = "tally.db"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! api_keys = ["secret"]
//!
//! [classifier]
//! backend = "openai_compatible"
//! host = "http://localhost:8000"
//! model = "llama3.2"
//!
//! [ledger]
//! chat_history_limit = 20
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::DEFAULT_CHAT_HISTORY_LIMIT;
use crate::error::{Error, Result};

/// Which classifier backend to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    #[default]
    Http,
    #[serde(rename = "openai_compatible", alias = "openai")]
    OpenAICompatible,
    Mock,
    /// No classifier; message handling is unavailable
    #[serde(alias = "none", alias = "off")]
    Disabled,
}

impl std::str::FromStr for ClassifierBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" | "api" => Ok(Self::Http),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                Ok(Self::OpenAICompatible)
            }
            "mock" => Ok(Self::Mock),
            "none" | "off" | "disabled" => Ok(Self::Disabled),
            _ => Err(format!("Unknown classifier backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tally.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Bearer keys accepted by the API; empty disables auth
    pub api_keys: Vec<String>,
    /// CORS origins; empty means same-origin only
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            api_keys: Vec::new(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub backend: ClassifierBackend,
    /// Endpoint for the `http` backend
    pub api_url: Option<String>,
    /// Base URL for the `openai_compatible` backend
    pub host: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Directory holding a `classify_intent.md` prompt override
    pub prompts_dir: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackend::default(),
            api_url: None,
            host: None,
            model: crate::classifier::DEFAULT_OPENAI_MODEL.to_string(),
            api_key: None,
            timeout_secs: crate::classifier::DEFAULT_TIMEOUT_SECS,
            prompts_dir: None,
        }
    }
}

impl ClassifierConfig {
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(backend) = get("AI_BACKEND") {
            match backend.parse() {
                Ok(parsed) => self.backend = parsed,
                Err(e) => tracing::warn!(backend = %backend, "{}, keeping {:?}", e, self.backend),
            }
        }
        if let Some(url) = get("AI_API_URL") {
            self.api_url = Some(url);
        }
        if let Some(host) = get("OPENAI_COMPATIBLE_HOST") {
            self.host = Some(host);
        }
        if let Some(model) = get("OPENAI_COMPATIBLE_MODEL") {
            self.model = model;
        }
        if let Some(key) = get("OPENAI_COMPATIBLE_API_KEY") {
            self.api_key = Some(key);
        }
    }

    /// Override directory, falling back to the platform data dir
    pub fn prompts_dir(&self) -> Option<PathBuf> {
        self.prompts_dir
            .clone()
            .or_else(crate::classifier::default_prompts_dir)
    }
}

/// Limits and windows applied by the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub chat_history_limit: usize,
    pub search_limit: i64,
    pub range_limit: i64,
    pub recent_days: i64,
    pub export_days: i64,
    pub query_days: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            chat_history_limit: DEFAULT_CHAT_HISTORY_LIMIT,
            search_limit: crate::db::DEFAULT_SEARCH_LIMIT,
            range_limit: crate::db::DEFAULT_RANGE_LIMIT,
            recent_days: 7,
            export_days: crate::export::DEFAULT_EXPORT_DAYS,
            query_days: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub database: DatabaseConfig,
    pub server: ServerSettings,
    pub classifier: ClassifierConfig,
    pub ledger: LedgerConfig,
}

/// `~/.config/tally/config.toml` or the platform equivalent
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tally").join("config.toml"))
}

impl TallyConfig {
    /// Load from `path` (or the default location) and apply the environment
    ///
    /// A missing file is not an error; an explicit path that cannot be
    /// parsed is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => Self::read_file(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// File contents only, no environment; defaults when the file is absent
    pub fn read_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
    }

    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String> + Copy) {
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(path) = get("TALLY_DB") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(host) = get("TALLY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(port = %port, "Ignoring invalid PORT"),
            }
        }
        if let Some(keys) = get("TALLY_API_KEYS") {
            self.server.api_keys = split_list(&keys);
        }
        if let Some(origins) = get("TALLY_ALLOWED_ORIGINS") {
            self.server.allowed_origins = split_list(&origins);
        }
        if let Some(limit) = get("TALLY_CHAT_HISTORY_LIMIT") {
            match limit.parse() {
                Ok(limit) => self.ledger.chat_history_limit = limit,
                Err(_) => tracing::warn!(limit = %limit, "Ignoring invalid TALLY_CHAT_HISTORY_LIMIT"),
            }
        }
        self.classifier.apply_vars(var);
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
