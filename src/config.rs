use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{DEFAULT_CLIENT_SECRETS_FILE, DEFAULT_TOKEN_FILE};
use crate::delete::DeleteConfig;
use crate::error::{Result, TriageError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gmail: GmailConfig,
    #[serde(default)]
    pub delete: DeleteSettings,
    #[serde(default)]
    pub agent: AgentConfig,
    /// Verbosity taken from the environment; never written to the config file
    #[serde(skip)]
    pub verbosity: Verbosity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    #[serde(default = "default_client_secrets_file")]
    pub client_secrets_file: PathBuf,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            client_secrets_file: default_client_secrets_file(),
            token_file: default_token_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSettings {
    /// Simulate every deletion
    #[serde(default)]
    pub dry_run: bool,
    /// Pause between provider delete calls, in milliseconds
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Query limit used when the caller does not give one
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
}

impl Default for DeleteSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            throttle_ms: default_throttle_ms(),
            default_max_results: default_max_results(),
        }
    }
}

impl DeleteSettings {
    pub fn to_delete_config(&self) -> DeleteConfig {
        DeleteConfig {
            dry_run: self.dry_run,
            throttle: Duration::from_millis(self.throttle_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// OpenAI-compatible endpoint of the LLM provider
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// API key; normally supplied through GOOGLE_API_KEY
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Maximum model calls within a single turn
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: u32,
    #[serde(default = "default_thread_id")]
    pub thread_id: String,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub summarization: SummarizationConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            api_base: default_api_base(),
            api_key: None,
            recursion_limit: default_recursion_limit(),
            thread_id: default_thread_id(),
            retry: RetryConfig::default(),
            summarization: SummarizationConfig::default(),
        }
    }
}

/// Retry policy for failed tool calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: f64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            initial_delay_secs: default_initial_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            jitter: default_jitter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummarizationConfig {
    #[serde(default = "default_summarization_enabled")]
    pub enabled: bool,
    /// Estimated history size (in tokens) above which older messages are summarized
    #[serde(default = "default_max_tokens_before_summary")]
    pub max_tokens_before_summary: usize,
    /// Most recent messages always kept verbatim
    #[serde(default = "default_messages_to_keep")]
    pub messages_to_keep: usize,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            enabled: default_summarization_enabled(),
            max_tokens_before_summary: default_max_tokens_before_summary(),
            messages_to_keep: default_messages_to_keep(),
        }
    }
}

/// Log verbosity requested by the environment or CLI flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    #[default]
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    /// Default tracing filter directives for this level
    pub fn filter_directives(&self) -> &'static str {
        match self {
            Verbosity::Normal => "gmail_triage=info,warn",
            Verbosity::Verbose => "gmail_triage=debug,info",
            Verbosity::Debug => "gmail_triage=trace,debug",
        }
    }
}

fn default_client_secrets_file() -> PathBuf {
    PathBuf::from(DEFAULT_CLIENT_SECRETS_FILE)
}

fn default_token_file() -> PathBuf {
    PathBuf::from(DEFAULT_TOKEN_FILE)
}

fn default_throttle_ms() -> u64 {
    200
}

fn default_max_results() -> usize {
    20
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_temperature() -> f32 {
    1.0
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_recursion_limit() -> u32 {
    1000
}

fn default_thread_id() -> String {
    "default".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_initial_delay_secs() -> f64 {
    1.0
}

fn default_max_delay_secs() -> f64 {
    60.0
}

fn default_jitter() -> bool {
    true
}

fn default_summarization_enabled() -> bool {
    true
}

fn default_max_tokens_before_summary() -> usize {
    400_000
}

fn default_messages_to_keep() -> usize {
    200
}

/// Environment variables consulted by [`Config::apply_env`]
pub const ENV_DRY_RUN: &str = "DRY_RUN";
pub const ENV_VERBOSE: &str = "VERBOSE";
pub const ENV_DEBUG: &str = "DEBUG";
pub const ENV_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_CLIENT_SECRETS: &str = "GMAIL_CLIENT_SECRETS_FILE";
pub const ENV_TOKEN_FILE: &str = "GMAIL_TOKEN_FILE";

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TriageError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TriageError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TriageError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Apply overrides from environment variables.
    ///
    /// Called once at startup; nothing else in the crate reads the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |name: &str| lookup(name).map(|v| v.trim() == "1").unwrap_or(false);

        if flag(ENV_DRY_RUN) {
            self.delete.dry_run = true;
        }

        if flag(ENV_DEBUG) {
            self.verbosity = Verbosity::Debug;
        } else if flag(ENV_VERBOSE) {
            self.verbosity = Verbosity::Verbose;
        }

        if let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.trim().is_empty()) {
            self.agent.api_key = Some(key);
        }
        if let Some(path) = lookup(ENV_CLIENT_SECRETS).filter(|p| !p.is_empty()) {
            self.gmail.client_secrets_file = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_TOKEN_FILE).filter(|p| !p.is_empty()) {
            self.gmail.token_file = PathBuf::from(path);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.delete.default_max_results == 0 {
            return Err(TriageError::ConfigError(
                "delete.default_max_results must be at least 1".to_string(),
            ));
        }
        if self.delete.default_max_results > 500 {
            return Err(TriageError::ConfigError(
                "delete.default_max_results cannot exceed 500".to_string(),
            ));
        }

        if self.agent.model.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "agent.model cannot be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(TriageError::ConfigError(
                "agent.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.agent.recursion_limit == 0 {
            return Err(TriageError::ConfigError(
                "agent.recursion_limit must be greater than 0".to_string(),
            ));
        }

        let retry = &self.agent.retry;
        if retry.backoff_factor < 1.0 {
            return Err(TriageError::ConfigError(
                "agent.retry.backoff_factor must be at least 1.0".to_string(),
            ));
        }
        if retry.initial_delay_secs < 0.0 || retry.max_delay_secs < retry.initial_delay_secs {
            return Err(TriageError::ConfigError(
                "agent.retry.max_delay_secs must be >= initial_delay_secs >= 0".to_string(),
            ));
        }

        if self.agent.summarization.messages_to_keep == 0 {
            return Err(TriageError::ConfigError(
                "agent.summarization.messages_to_keep must be greater than 0".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        Self::default().save(path).await
    }
}
