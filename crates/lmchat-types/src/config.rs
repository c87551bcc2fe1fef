//! Application configuration types for lmchat.
//!
//! `AppConfig` represents the `config.toml` in the data directory that
//! controls the model service, token budget, and persistence backend.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::llm::Budget;

/// Top-level configuration.
///
/// Loaded from `~/.lmchat/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub budget: Budget,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.budget.validate()?;
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} outside 0.0..=2.0",
                self.model.temperature
            )));
        }
        if self.storage.backend == StorageBackend::Remote && self.storage.remote_url.is_none() {
            return Err(ConfigError::Invalid(
                "storage.backend = \"remote\" requires storage.remote_url".to_string(),
            ));
        }
        Ok(())
    }
}

/// Model-service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the OpenAI-compatible API, including the `/v1` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API key, if the service needs one.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Model id used until one is picked interactively.
    #[serde(default)]
    pub default_model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_base_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: None,
            default_model: None,
            temperature: default_temperature(),
        }
    }
}

/// Where chats and messages are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Remote,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Sqlite => write!(f, "sqlite"),
            StorageBackend::Remote => write!(f, "remote"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "remote" => Ok(StorageBackend::Remote),
            other => Err(format!("invalid storage backend: '{other}'")),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Base URL of a remote chat server (the `/api` prefix included).
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Environment variable holding the bearer token for the remote server.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_token_env() -> String {
    "LMCHAT_TOKEN".to_string()
}
