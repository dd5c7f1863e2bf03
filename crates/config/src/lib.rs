//! Configuration loading, validation, and management for Librarian.
//!
//! Loads configuration from `~/.librarian/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use librarian_core::model::ModelConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.librarian/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default model, as `provider:model`
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response (unset = provider default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Upper bound on model invocations per turn
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Checkpoint store configuration
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Provider-specific configurations, keyed by the prefix used in model ids
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_model() -> String {
    librarian_core::model::DEFAULT_MODEL.into()
}
fn default_temperature() -> f32 {
    librarian_core::model::DEFAULT_TEMPERATURE
}
fn default_max_steps() -> usize {
    20
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("max_steps", &self.max_steps)
            .field("gateway", &self.gateway)
            .field("checkpoint", &self.checkpoint)
            .field("tools", &self.tools)
            .field("providers", &self.providers)
            .finish()
    }
}

/// Connection settings for one provider.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override (e.g. a self-hosted OpenAI-compatible endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// CORS origins; `"*"` allows any origin
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["*".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_checkpoint_backend")]
    pub backend: CheckpointBackend,

    /// Directory for the file backend (default `~/.librarian/threads`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_checkpoint_backend() -> CheckpointBackend {
    CheckpointBackend::Memory
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: default_checkpoint_backend(),
            path: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openweathermap_api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_books_api_key: Option<String>,

    /// Suggestions per book search, 1..=20
    #[serde(default = "default_google_books_max_results")]
    pub google_books_max_results: usize,
}

fn default_google_books_max_results() -> usize {
    5
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            openweathermap_api_key: None,
            google_books_api_key: None,
            google_books_max_results: default_google_books_max_results(),
        }
    }
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("openweathermap_api_key", &redact(&self.openweathermap_api_key))
            .field("google_books_api_key", &redact(&self.google_books_api_key))
            .field("google_books_max_results", &self.google_books_max_results)
            .finish()
    }
}

/// Environment variables that carry provider API keys.
const PROVIDER_KEY_VARS: &[(&str, &str)] = &[
    ("OPENAI_API_KEY", "openai"),
    ("ANTHROPIC_API_KEY", "anthropic"),
    ("GOOGLE_API_KEY", "google_genai"),
    ("GROQ_API_KEY", "groq"),
];

impl AppConfig {
    /// Load configuration from the default path (~/.librarian/config.toml).
    ///
    /// Environment overrides:
    /// - `LIBRARIAN_MODEL`, `LIBRARIAN_MAX_STEPS`
    /// - `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GOOGLE_API_KEY`, `GROQ_API_KEY`
    /// - `OPENWEATHERMAP_API_KEY`, `GOOGLE_BOOKS_API_KEY`
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

    /// Apply overrides from an environment lookup. Keys already set in the
    /// file are replaced by the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(model) = lookup("LIBRARIAN_MODEL") {
            self.default_model = model;
        }

        if let Some(steps) = lookup("LIBRARIAN_MAX_STEPS") {
            self.max_steps = steps.parse().map_err(|_| {
                ConfigError::ValidationError(format!("LIBRARIAN_MAX_STEPS is not a number: {steps}"))
            })?;
        }

        for (var, provider) in PROVIDER_KEY_VARS {
            if let Some(key) = lookup(var).filter(|k| !k.is_empty()) {
                self.providers.entry((*provider).to_string()).or_default().api_key = Some(key);
            }
        }

        if let Some(key) = lookup("OPENWEATHERMAP_API_KEY") {
            self.tools.openweathermap_api_key = Some(key);
        }

        if let Some(key) = lookup("GOOGLE_BOOKS_API_KEY").filter(|k| !k.is_empty()) {
            self.tools.google_books_api_key = Some(key);
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".librarian")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model_config()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.max_steps == 0 {
            return Err(ConfigError::ValidationError("max_steps must be at least 1".into()));
        }

        if !(1..=20).contains(&self.tools.google_books_max_results) {
            return Err(ConfigError::ValidationError(format!(
                "tools.google_books_max_results must be between 1 and 20, got {}",
                self.tools.google_books_max_results
            )));
        }

        Ok(())
    }

    /// The model configuration used when a request does not carry one.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            model: self.default_model.clone(),
            temperature: self.default_temperature,
            max_tokens: self.default_max_tokens,
        }
    }

    /// Check if at least one provider has an API key.
    pub fn has_api_key(&self) -> bool {
        self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Directory for the file checkpoint backend.
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.checkpoint
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("threads"))
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: None,
            max_steps: default_max_steps(),
            gateway: GatewayConfig::default(),
            checkpoint: CheckpointConfig::default(),
            tools: ToolsConfig::default(),
            providers: HashMap::new(),
        }
    }
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

impl From<ConfigError> for librarian_core::Error {
    fn from(err: ConfigError) -> Self {
        librarian_core::Error::Config {
            message: err.to_string(),
        }
    }
}
