//! Classifier prompt
//!
//! The system prompt ships embedded in the binary. A file at
//! `<data_local_dir>/tally/prompts/classify_intent.md` replaces it without a
//! rebuild. Both forms start with YAML frontmatter.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

const EMBEDDED: &str = include_str!("../../prompts/classify_intent.md");

/// File name looked up in the override directory
pub const PROMPT_FILE: &str = "classify_intent.md";

/// Prompt frontmatter
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    pub version: u32,
    #[serde(default)]
    pub task_type: String,
}

/// A parsed prompt template
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    pub content: String,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    /// The built-in prompt
    pub fn embedded() -> Result<Self> {
        let (metadata, content) = parse_prompt(EMBEDDED)?;
        Ok(Self {
            metadata,
            content,
            override_path: None,
        })
    }

    /// The override in `dir` if one exists, else the built-in prompt
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        if let Some(path) = dir.map(|d| d.join(PROMPT_FILE)).filter(|p| p.exists()) {
            let raw = fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Failed to read prompt override: {}", e)))?;
            let (metadata, content) = parse_prompt(&raw)?;
            debug!(path = %path.display(), version = metadata.version, "Loaded prompt override");
            return Ok(Self {
                metadata,
                content,
                override_path: Some(path),
            });
        }
        Self::embedded()
    }

    pub fn system_section(&self) -> &str {
        extract_section(&self.content, "# System").unwrap_or(&self.content)
    }

    pub fn context_section(&self) -> Option<&str> {
        extract_section(&self.content, "# Context")
    }

    /// Render the context section with `{{var}}` and `{{#if var}}` substitution
    pub fn render_context(&self, vars: &HashMap<&str, String>) -> String {
        self.context_section()
            .map(|section| render(section, vars))
            .unwrap_or_default()
    }
}

/// Default override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("prompts"))
}

fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();
    let rest = content
        .strip_prefix("---")
        .ok_or_else(|| Error::Config("Prompt must start with YAML frontmatter (---)".into()))?;
    let end = rest
        .find("---")
        .ok_or_else(|| Error::Config("Prompt frontmatter not closed".into()))?;

    let metadata: PromptMetadata = serde_yaml::from_str(rest[..end].trim())
        .map_err(|e| Error::Config(format!("Invalid prompt frontmatter: {}", e)))?;
    Ok((metadata, rest[end + 3..].trim().to_string()))
}

fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after = &content[start + header.len()..];
    let end = after.find("\n# ").unwrap_or(after.len());
    Some(after[..end].trim())
}

fn render(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = strip_conditionals(template, vars);
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result.trim().to_string()
}

/// Keep `{{#if var}}...{{/if}}` bodies whose variable is non-empty, drop the rest
fn strip_conditionals(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{#if ") {
        let name_start = open + 6;
        let Some(name_len) = rest[name_start..].find("}}") else {
            break;
        };
        let body_start = name_start + name_len + 2;
        let Some(body_len) = rest[body_start..].find("{{/if}}") else {
            break;
        };

        out.push_str(&rest[..open]);
        let name = rest[name_start..name_start + name_len].trim();
        if vars.get(name).is_some_and(|v| !v.is_empty()) {
            out.push_str(&rest[body_start..body_start + body_len]);
        }
        rest = &rest[body_start + body_len + 7..];
    }
    out.push_str(rest);
    out
}
