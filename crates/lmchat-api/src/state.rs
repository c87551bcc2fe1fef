//! Application state wiring config, storage, and the model client together.
//!
//! `AppState` serves the CLI commands; `ServerState` serves `lmchat serve`,
//! which always fronts the local SQLite database.

use std::path::PathBuf;
use std::sync::Arc;

use lmchat_core::chat::{ChatSessionController, ChatSettings};
use lmchat_core::llm::BoxCompletionClient;
use lmchat_infra::config::{load_config, resolve_data_dir};
use lmchat_infra::llm::create_client;
use lmchat_infra::sqlite::{DatabasePool, SqliteChatStore};
use lmchat_infra::store::AnyChatStore;
use lmchat_types::config::AppConfig;

/// Fallback model id when neither config nor flags name one. Local servers
/// such as LM Studio answer with whatever model is loaded.
pub const DEFAULT_MODEL: &str = "local-model";

/// Command-line overrides applied on top of `config.toml`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

pub type ConcreteController = ChatSessionController<AnyChatStore>;

/// Shared state for CLI commands.
pub struct AppState {
    pub config: AppConfig,
    pub data_dir: PathBuf,
    pub client: Arc<BoxCompletionClient>,
    store: Option<AnyChatStore>,
}

impl AppState {
    /// Load config, apply overrides, and build the model client and chat store.
    pub async fn init(overrides: &Overrides) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let mut config = load_config(&data_dir).await;
        apply_overrides(&mut config, overrides);

        let client = create_client(&config.model)?;
        let store = AnyChatStore::open(&config.storage, &data_dir).await?;
        tracing::debug!(
            data_dir = %data_dir.display(),
            backend = %config.storage.backend,
            "application state ready"
        );

        Ok(Self {
            config,
            data_dir,
            client: Arc::new(client),
            store: Some(store),
        })
    }

    /// Model id from overrides or config, else [`DEFAULT_MODEL`].
    pub fn model(&self) -> String {
        self.config
            .model
            .default_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn store(&self) -> anyhow::Result<&AnyChatStore> {
        self.store
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("chat store already handed to a controller"))
    }

    /// Move the store into a controller for an interactive session.
    pub fn into_controller(mut self) -> anyhow::Result<(ConcreteController, String)> {
        let store = self
            .store
            .take()
            .ok_or_else(|| anyhow::anyhow!("chat store already handed to a controller"))?;
        let model = self.model();
        let settings = ChatSettings {
            model: model.clone(),
            temperature: self.config.model.temperature,
            budget: self.config.budget,
        };
        Ok((ChatSessionController::new(store, self.client, settings), model))
    }
}

fn apply_overrides(config: &mut AppConfig, overrides: &Overrides) {
    if let Some(model) = &overrides.model {
        config.model.default_model = Some(model.clone());
    }
    if let Some(base_url) = &overrides.base_url {
        config.model.base_url = base_url.clone();
    }
}

/// Shared state for the REST server.
#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<SqliteChatStore>,
    pub db_pool: DatabasePool,
}

impl ServerState {
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let db_pool = DatabasePool::open_in(&data_dir).await?;
        Ok(Self::from_pool(db_pool))
    }

    pub fn from_pool(db_pool: DatabasePool) -> Self {
        Self {
            store: Arc::new(SqliteChatStore::new(db_pool.clone())),
            db_pool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let mut config = AppConfig::default();
        apply_overrides(
            &mut config,
            &Overrides {
                model: Some("qwen2.5-7b".to_string()),
                base_url: Some("http://gpu-box:8000/v1".to_string()),
            },
        );
        assert_eq!(config.model.default_model.as_deref(), Some("qwen2.5-7b"));
        assert_eq!(config.model.base_url, "http://gpu-box:8000/v1");
    }

    #[test]
    fn empty_overrides_keep_config() {
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &Overrides::default());
        assert_eq!(config.model.base_url, "http://localhost:1234/v1");
        assert!(config.model.default_model.is_none());
    }
}
