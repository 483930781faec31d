//! Configuration Store
//!
//! Handles loading/saving the TOML config file and resolving the provider
//! credential from the file or the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GardenError, Result};
use crate::llm::Credential;

pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_MODEL: &str = "mistral-small";
pub const DEFAULT_API_KEY_ENV: &str = "MISTRAL_API_KEY";
/// Always consulted after the configured variable
pub const FALLBACK_API_KEY_ENV: &str = "GARDEN_API_KEY";

/// Unified Garden configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Transport-level retries for 408/429/5xx and connection failures
    #[serde(default)]
    pub max_retries: usize,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Inline API key; takes precedence over the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            api_key_env: default_api_key_env(),
            api_key: None,
        }
    }
}

/// Refinement loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_training_count")]
    pub default_training_count: usize,
    /// Characters of each prompt kept when summarizing for synthesis
    #[serde(default = "default_prompt_summary_chars")]
    pub prompt_summary_chars: usize,
    /// Words of each output kept when summarizing for synthesis
    #[serde(default = "default_output_summary_words")]
    pub output_summary_words: usize,
    /// Embed only the newest N iterations in provider requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_window: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            default_training_count: default_training_count(),
            prompt_summary_chars: default_prompt_summary_chars(),
            output_summary_words: default_output_summary_words(),
            history_window: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Concurrent provider calls during validation; 1 runs cases in sequence
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Debug log file; defaults to the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_ring_size")]
    pub ring_size: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            ring_size: default_ring_size(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}
fn default_training_count() -> usize {
    8
}
fn default_prompt_summary_chars() -> usize {
    100
}
fn default_output_summary_words() -> usize {
    20
}
fn default_max_concurrency() -> usize {
    1
}
fn default_ring_size() -> usize {
    1000
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GardenError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => GardenError::Io(e),
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from the first config file found, or fall back to defaults
    ///
    /// `GARDEN_*` environment overrides are applied either way.
    pub fn load_or_default() -> Self {
        let mut config = match super::find_config_file() {
            Some(path) => match Self::load(&path) {
                Ok(config) => config,
                Err(e) => {
                    crate::warn_log!("Ignoring config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            None => Self::default(),
        };
        config.apply_env_overrides_from(|key| std::env::var(key).ok());
        config
    }

    /// Default location for saving: `<config dir>/garden/garden.toml`
    pub fn default_path() -> Option<PathBuf> {
        super::get_config_dir().map(|dir| dir.join(super::CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.base_url.trim().is_empty() {
            return Err(GardenError::Config {
                message: "provider.base_url cannot be empty".to_string(),
            });
        }
        if self.provider.model.trim().is_empty() {
            return Err(GardenError::Config {
                message: "provider.model cannot be empty".to_string(),
            });
        }
        if self.validation.max_concurrency == 0 {
            return Err(GardenError::Config {
                message: "validation.max_concurrency must be at least 1".to_string(),
            });
        }
        if self.training.default_training_count == 0 {
            return Err(GardenError::Config {
                message: "training.default_training_count must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Apply `GARDEN_BASE_URL` / `GARDEN_MODEL` style overrides
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("GARDEN_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.provider.base_url = base_url;
        }
        if let Some(model) = lookup("GARDEN_MODEL").filter(|v| !v.trim().is_empty()) {
            self.provider.model = model;
        }
    }

    /// Inline key, then the configured env var, then `GARDEN_API_KEY`
    pub fn resolve_credential_from<F>(&self, lookup: F) -> Option<Credential>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.provider
            .api_key
            .clone()
            .and_then(Credential::new)
            .or_else(|| lookup(&self.provider.api_key_env).and_then(Credential::new))
            .or_else(|| lookup(FALLBACK_API_KEY_ENV).and_then(Credential::new))
    }

    pub fn resolve_credential(&self) -> Option<Credential> {
        self.resolve_credential_from(|key| std::env::var(key).ok())
    }
}
