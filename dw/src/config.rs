//! Configuration loading
//!
//! YAML with kebab-case keys. Every section defaults, so a file only needs
//! the values it changes.

use std::path::{Path, PathBuf};

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collab::{Locale, ProbeJudge, ProbeLimit, ShortAnswerPolicy};

/// Project-local config file name
pub const LOCAL_CONFIG: &str = ".draftwise.yml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,

    pub collab: CollabConfig,

    pub prompts: PromptsConfig,

    pub server: ServerConfig,

    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate that the model endpoint can be reached with credentials
    pub fn validate(&self) -> Result<()> {
        debug!("validate: called");
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if std::env::var(&self.llm.api_key_env).is_err() {
            bail!(
                "API key not found. Set the {} environment variable or change llm.api-key-env",
                self.llm.api_key_env
            );
        }
        Ok(())
    }

    /// Load configuration with the fallback chain
    ///
    /// Explicit path (errors are fatal), then `./.draftwise.yml`, then
    /// `<config_dir>/draftwise/draftwise.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidates() {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => {
                    info!(path = %candidate.display(), "load: using config file");
                    return Ok(config);
                }
                Err(e) => {
                    warn!("Failed to load config from {}: {}", candidate.display(), e);
                }
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Log level from the config file, read before logging is set up
    ///
    /// Any failure here is silent; the full load reports it later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = Self::locate(config_path)?;
        Self::load_from_file(path).ok()?.log_level
    }

    /// First existing config file in the implicit search order
    pub fn locate(config_path: Option<&PathBuf>) -> Option<PathBuf> {
        match config_path {
            Some(path) => Some(path.clone()),
            None => Self::candidates().into_iter().find(|p| p.exists()),
        }
    }

    fn candidates() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("draftwise").join("draftwise.yml"));
        }
        candidates
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        debug!(path = %path.as_ref().display(), "load_from_file: parsed");
        Ok(config)
    }
}

/// Completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "openai" (any compatible endpoint) or "anthropic"
    pub provider: String,

    pub model: String,

    /// Environment variable holding the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    pub temperature: f32,

    /// Streamed delivery; streams are always drained before use
    pub stream: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "deepseek-ai/DeepSeek-R1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.siliconflow.cn".to_string(),
            max_tokens: 4096,
            timeout_ms: 30_000,
            max_retries: 3,
            temperature: 0.7,
            stream: true,
        }
    }
}

impl LlmConfig {
    /// Freeze the settings a client is built from
    pub fn resolve(&self) -> ResolvedLlmConfig {
        ResolvedLlmConfig {
            provider: self.provider.trim().to_lowercase(),
            model: self.model.clone(),
            api_key_env: self.api_key_env.clone(),
            base_url: self.base_url.clone(),
            max_tokens: self.max_tokens,
            timeout_ms: self.timeout_ms,
            max_retries: self.max_retries,
            temperature: self.temperature,
            stream: self.stream,
        }
    }
}

/// Settings a provider client is constructed from
#[derive(Debug, Clone)]
pub struct ResolvedLlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub temperature: f32,
    pub stream: bool,
}

impl ResolvedLlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        let key = std::env::var(&self.api_key_env)
            .with_context(|| format!("{} environment variable is not set", self.api_key_env))?;
        if key.trim().is_empty() {
            bail!("{} environment variable is empty", self.api_key_env);
        }
        Ok(key)
    }
}

/// Conversation policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollabConfig {
    pub locale: Locale,

    /// Follow-up questions allowed per section (the fixed bound, or the fallback when decided by the model)
    #[serde(rename = "max-probes")]
    pub max_probes: usize,

    #[serde(rename = "probe-limit")]
    pub probe_limit: ProbeLimit,

    #[serde(rename = "probe-judge")]
    pub probe_judge: ProbeJudge,

    /// Answers must exceed this many words before a probe is considered
    #[serde(rename = "probe-min-words")]
    pub probe_min_words: usize,

    /// Answers with fewer words count as short
    #[serde(rename = "short-answer-words")]
    pub short_answer_words: usize,

    #[serde(rename = "short-answer")]
    pub short_answer: ShortAnswerPolicy,

    /// Let the model answer its own interview questions
    pub autopilot: bool,

    /// Categorize draft feedback before revising
    #[serde(rename = "analyze-feedback")]
    pub analyze_feedback: bool,

    /// Prior revision messages sent as history with each revision
    #[serde(rename = "revision-history")]
    pub revision_history: usize,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            locale: Locale::En,
            max_probes: 3,
            probe_limit: ProbeLimit::Fixed,
            probe_judge: ProbeJudge::Combined,
            probe_min_words: 20,
            short_answer_words: 5,
            short_answer: ShortAnswerPolicy::Skip,
            autopilot: false,
            analyze_feedback: false,
            revision_history: 4,
        }
    }
}

/// Prompt template configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory whose `.pmt` files override the embedded templates
    #[serde(rename = "override-dir")]
    pub override_dir: PathBuf,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            override_dir: PathBuf::from(".draftwise/prompts"),
        }
    }
}

/// Command server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Unix socket path; runtime directory default when unset
    #[serde(rename = "socket-path")]
    pub socket_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(crate::server::default_socket_path)
    }
}
