//! Configuration loading, validation, and management for scoutloop.
//!
//! Loads configuration from `~/.scoutloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.scoutloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Loop driver settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Action dispatcher settings
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Lead research wrapper settings
    #[serde(default)]
    pub research: ResearchConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4000
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("dispatcher", &self.dispatcher)
            .field("research", &self.research)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on loop iterations for a plain `ask` run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Marker an observation uses to tell the model the task is done
    #[serde(default = "default_completion_sentinel")]
    pub completion_sentinel: String,

    /// Sequences that stop generation before the model invents an observation
    #[serde(default = "default_stop_sequences")]
    pub stop_sequences: Vec<String>,
}

fn default_max_iterations() -> usize {
    50
}
fn default_completion_sentinel() -> String {
    "[END_TASK]".into()
}
fn default_stop_sequences() -> Vec<String> {
    vec!["Observation:".into(), "\nObservation".into()]
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            completion_sentinel: default_completion_sentinel(),
            stop_sequences: default_stop_sequences(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Actions whose results are communication records needing redaction
    #[serde(default = "default_redacted_actions")]
    pub redacted_actions: Vec<String>,

    /// Field removed (at any depth) from those results
    #[serde(default = "default_redacted_field")]
    pub redacted_field: String,
}

fn default_redacted_actions() -> Vec<String> {
    [
        "search_and_fetch_emails",
        "batch_fetch_emails",
        "fetch_email",
        "list_unread",
        "dynamic_mail_fetch_tool",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_redacted_field() -> String {
    "body_html".into()
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            redacted_actions: default_redacted_actions(),
            redacted_field: default_redacted_field(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Quality leads to save before stopping
    #[serde(default = "default_target_count")]
    pub target_count: usize,

    /// Logical search iterations
    #[serde(default = "default_max_search_iterations")]
    pub max_search_iterations: usize,

    /// Raw loop iterations granted per logical iteration
    #[serde(default = "default_steps_per_iteration")]
    pub steps_per_iteration: usize,

    /// Minimum score for a lead to count as qualified
    #[serde(default = "default_min_score")]
    pub min_score: u32,
}

fn default_target_count() -> usize {
    30
}
fn default_max_search_iterations() -> usize {
    5
}
fn default_steps_per_iteration() -> usize {
    15
}
fn default_min_score() -> u32 {
    65
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            target_count: default_target_count(),
            max_search_iterations: default_max_search_iterations(),
            steps_per_iteration: default_steps_per_iteration(),
            min_score: default_min_score(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location.
    ///
    /// Environment variables take priority over the file:
    /// - `SCOUTLOOP_API_KEY`, then `OPENAI_API_KEY` (only if the file has none)
    /// - `OPENAI_BASE_URL`, `OPENAI_MODEL`
    /// - `MAX_SEARCH_ITERATIONS`, `TARGET_LEAD_COUNT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            self.api_key = lookup("SCOUTLOOP_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.model = model;
        }
        if let Some(raw) = lookup("MAX_SEARCH_ITERATIONS") {
            self.research.max_search_iterations = parse_env("MAX_SEARCH_ITERATIONS", &raw)?;
        }
        if let Some(raw) = lookup("TARGET_LEAD_COUNT") {
            self.research.target_count = parse_env("TARGET_LEAD_COUNT", &raw)?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".scoutloop")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0".into(),
            ));
        }

        if self.agent.stop_sequences.is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.stop_sequences must not be empty".into(),
            ));
        }

        if self.research.target_count == 0 {
            return Err(ConfigError::ValidationError(
                "research.target_count must be > 0".into(),
            ));
        }

        if self.research.steps_per_iteration == 0 || self.research.max_search_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "research.steps_per_iteration and research.max_search_iterations must be > 0"
                    .into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Render the configuration as TOML (secrets omitted).
    pub fn to_toml(&self) -> String {
        let printable = Self {
            api_key: None,
            ..self.clone()
        };
        toml::to_string_pretty(&printable).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            dispatcher: DispatcherConfig::default(),
            research: ResearchConfig::default(),
        }
    }
}

fn parse_env(key: &str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} must be a positive integer, got '{raw}'")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
