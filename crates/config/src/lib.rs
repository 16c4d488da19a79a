//! Configuration loading, validation, and management for Doppel sessions.
//!
//! Loads configuration from `~/.doppel/config.toml` with environment
//! variable overrides. The result is validated before any session is built.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.doppel/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model used for conversation turns
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Sampling temperature for every completion
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Single-turn chat or autonomous loop
    #[serde(default)]
    pub mode: RunMode,

    /// Pause between loop turns, in milliseconds
    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,

    /// Memory budget in characters; exceeding it triggers eviction
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,

    /// What to drop when the budget is exceeded
    #[serde(default)]
    pub eviction: EvictionPolicy,

    /// Tell the model how often it has already seen an entry
    #[serde(default)]
    pub annotate_recalls: bool,

    /// Coherence review of every response
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Long-term memory lookups; disabled when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<RetrievalConfig>,
}

fn default_chat_model() -> String {
    "qwen3:0.6b".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_loop_interval_ms() -> u64 {
    1000
}
fn default_context_limit() -> usize {
    1_000_000
}

/// How a session keeps talking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One turn per user message
    #[default]
    Chat,
    /// Keep taking turns until the model emits the loop-end marker
    Loop,
}

impl std::str::FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "loop" => Ok(Self::Loop),
            other => Err(ConfigError::ValidationError(format!(
                "unknown agent mode '{other}' (expected 'chat' or 'loop')"
            ))),
        }
    }
}

/// What happens when memory outgrows `context_limit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Forget everything, including persona and catalogue entries
    #[default]
    Reset,
    /// Drop the oldest conversation entries, keeping the system prefix
    SlidingWindow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Reviewer model; falls back to `chat_model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub embedding_model: String,
    pub collection: String,
}

impl AgentConfig {
    /// Load configuration from the default path (~/.doppel/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `DOPPEL_CHAT_MODEL`, `DOPPEL_MODEL_TEMPERATURE`
    /// - `DOPPEL_AGENT_MODE`, `DOPPEL_LOOP_INTERVAL_MS`, `DOPPEL_CONTEXT_LIMIT`
    /// - `DOPPEL_SUPERVISOR_SWITCH`, `DOPPEL_SUPERVISOR_MODEL`
    /// - `DOPPEL_EMBEDDING_MODEL` + `DOPPEL_VECTOR_COLLECTION`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
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

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("DOPPEL_CHAT_MODEL") {
            self.chat_model = model;
        }
        if let Some(value) = lookup("DOPPEL_MODEL_TEMPERATURE") {
            self.temperature = parse_var("DOPPEL_MODEL_TEMPERATURE", &value)?;
        }
        if let Some(value) = lookup("DOPPEL_AGENT_MODE") {
            self.mode = value.parse()?;
        }
        if let Some(value) = lookup("DOPPEL_LOOP_INTERVAL_MS") {
            self.loop_interval_ms = parse_var("DOPPEL_LOOP_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("DOPPEL_CONTEXT_LIMIT") {
            self.context_limit = parse_var("DOPPEL_CONTEXT_LIMIT", &value)?;
        }
        if let Some(value) = lookup("DOPPEL_SUPERVISOR_SWITCH") {
            self.supervisor.enabled = parse_var("DOPPEL_SUPERVISOR_SWITCH", &value)?;
        }
        if let Some(model) = lookup("DOPPEL_SUPERVISOR_MODEL") {
            self.supervisor.model = Some(model);
        }

        match (lookup("DOPPEL_EMBEDDING_MODEL"), lookup("DOPPEL_VECTOR_COLLECTION")) {
            (Some(embedding_model), Some(collection)) => {
                self.retrieval = Some(RetrievalConfig {
                    embedding_model,
                    collection,
                });
            }
            (Some(embedding_model), None) => match self.retrieval.as_mut() {
                Some(retrieval) => retrieval.embedding_model = embedding_model,
                None => {
                    return Err(ConfigError::ValidationError(
                        "DOPPEL_EMBEDDING_MODEL requires DOPPEL_VECTOR_COLLECTION".into(),
                    ));
                }
            },
            (None, Some(collection)) => match self.retrieval.as_mut() {
                Some(retrieval) => retrieval.collection = collection,
                None => {
                    return Err(ConfigError::ValidationError(
                        "DOPPEL_VECTOR_COLLECTION requires DOPPEL_EMBEDDING_MODEL".into(),
                    ));
                }
            },
            (None, None) => {}
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".doppel")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::ValidationError("chat_model must not be empty".into()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.context_limit == 0 {
            return Err(ConfigError::ValidationError("context_limit must be > 0".into()));
        }

        if self.mode == RunMode::Loop && self.loop_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "loop_interval_ms must be > 0 in loop mode".into(),
            ));
        }

        if self.supervisor.enabled
            && self.supervisor.model.as_deref().is_some_and(|m| m.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "supervisor.model must not be empty".into(),
            ));
        }

        if let Some(retrieval) = &self.retrieval
            && (retrieval.embedding_model.trim().is_empty() || retrieval.collection.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "retrieval.embedding_model and retrieval.collection must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Model the supervisor gate talks to.
    pub fn supervisor_model(&self) -> &str {
        self.supervisor.model.as_deref().unwrap_or(&self.chat_model)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            mode: RunMode::default(),
            loop_interval_ms: default_loop_interval_ms(),
            context_limit: default_context_limit(),
            eviction: EvictionPolicy::default(),
            annotate_recalls: false,
            supervisor: SupervisorConfig::default(),
            retrieval: None,
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} has an invalid value: '{value}'")))
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

impl From<ConfigError> for doppel_core::Error {
    fn from(err: ConfigError) -> Self {
        doppel_core::Error::Config {
            message: err.to_string(),
        }
    }
}
