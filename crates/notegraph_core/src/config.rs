//! Application configuration loading.
//!
//! # Responsibility
//! - Deserialize `AppConfig` from an optional TOML file with full defaults.
//! - Apply environment overrides for the enrichment provider.
//! - Reject configurations the sync engine cannot run with.
//!
//! # Invariants
//! - Credentials never come from the file; only the name of the environment
//!   variable holding them does.
//! - A validated config always has `workers >= 1` and `timeout_secs >= 1`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable overriding `enrichment.provider`.
pub const ENV_PROVIDER: &str = "NOTEGRAPH_LLM_PROVIDER";
/// Legacy provider override, honoured when `ENV_PROVIDER` is unset.
pub const ENV_PROVIDER_LEGACY: &str = "LLM_PROVIDER";
/// Environment variable overriding `enrichment.model`.
pub const ENV_MODEL: &str = "NOTEGRAPH_LLM_MODEL";
/// Environment variable overriding `enrichment.base_url`.
pub const ENV_BASE_URL: &str = "NOTEGRAPH_LLM_BASE_URL";

const DEFAULT_DB_FILE_NAME: &str = "notegraph.sqlite3";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Configuration loading/validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Toml(err) => write!(f, "invalid config file: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Toml(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Toml(value)
    }
}

/// Enrichment backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(alias = "google")]
    Gemini,
    /// Enrichment disabled; notes are stored with empty metadata.
    None,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::None => "none",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::Ollama => "qwen3:0.6b",
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-1.5-flash",
            Self::None => "",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::None => "",
        }
    }

    fn default_api_key_env(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Ollama | Self::None => None,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            "none" | "disabled" | "off" => Ok(Self::None),
            other => Err(ConfigError::Invalid(format!(
                "unsupported enrichment provider `{other}`; expected ollama|openai|gemini|none"
            ))),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite file backing the note graph.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_FILE_NAME),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `trace|debug|info|warn|error`.
    pub level: String,
    /// Absolute directory for rolling log files. Logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnrichmentConfig {
    pub provider: ProviderKind,
    /// Provider default when unset.
    pub model: Option<String>,
    /// Provider default when unset.
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Upper bound on concurrent enrichment requests.
    pub workers: usize,
    pub temperature: f32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: None,
            base_url: None,
            api_key_env: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workers: DEFAULT_WORKERS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl EnrichmentConfig {
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Base URL without a trailing slash.
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    pub fn effective_api_key_env(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.provider.default_api_key_env())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Loads config from `path` (defaults when `None`), applies process
    /// environment overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses config text without environment overrides or validation.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies provider overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(provider) = non_blank(ENV_PROVIDER).or_else(|| non_blank(ENV_PROVIDER_LEGACY))
        {
            self.enrichment.provider = provider.parse()?;
        }
        if let Some(model) = non_blank(ENV_MODEL) {
            self.enrichment.model = Some(model.trim().to_string());
        }
        if let Some(base_url) = non_blank(ENV_BASE_URL) {
            self.enrichment.base_url = Some(base_url.trim().to_string());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "database.path must not be empty".to_string(),
            ));
        }
        if self.enrichment.workers == 0 {
            return Err(ConfigError::Invalid(
                "enrichment.workers must be at least 1".to_string(),
            ));
        }
        if self.enrichment.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "enrichment.timeout_secs must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.enrichment.temperature) {
            return Err(ConfigError::Invalid(format!(
                "enrichment.temperature must be within 0.0..=2.0, got {}",
                self.enrichment.temperature
            )));
        }
        if self.enrichment.provider != ProviderKind::None
            && self.enrichment.effective_model().trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "enrichment.model must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}
