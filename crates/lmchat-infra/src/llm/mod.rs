//! Model-service client implementations.
//!
//! Contains the concrete [`CompletionClient`](lmchat_core::llm::CompletionClient)
//! for OpenAI-compatible servers, and a factory ([`create_client`]) that
//! builds one from [`ModelConfig`].

pub mod openai_compat;

use secrecy::SecretString;

use lmchat_core::llm::BoxCompletionClient;
use lmchat_types::config::ModelConfig;
use lmchat_types::llm::{LlmError, ModelInfo};

use self::openai_compat::OpenAiCompatibleClient;

/// Resolve the API key named by `api_key_env`, if any.
///
/// A configured but unset or empty variable is an error rather than a silent
/// unauthenticated request.
pub fn resolve_api_key(config: &ModelConfig) -> Result<Option<SecretString>, LlmError> {
    let Some(var) = config.api_key_env.as_deref() else {
        return Ok(None);
    };
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(SecretString::from(value))),
        _ => Err(LlmError::InvalidRequest(format!(
            "environment variable {var} is not set"
        ))),
    }
}

/// Create a [`BoxCompletionClient`] from model settings.
pub fn create_client(config: &ModelConfig) -> Result<BoxCompletionClient, LlmError> {
    let api_key = resolve_api_key(config)?;
    let client = OpenAiCompatibleClient::new(openai_compat::config::custom(&config.base_url, api_key))?;
    tracing::debug!(backend = %client_name(&client), base_url = %config.base_url, "completion client ready");
    Ok(BoxCompletionClient::new(client))
}

fn client_name(client: &OpenAiCompatibleClient) -> &str {
    lmchat_core::llm::CompletionClient::name(client)
}

/// List models and return them sorted by id.
pub async fn sorted_models(client: &BoxCompletionClient) -> Result<Vec<ModelInfo>, LlmError> {
    let mut models = client.list_models().await?;
    models.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_default_config() {
        let client = create_client(&ModelConfig::default()).unwrap();
        assert_eq!(client.name(), "lm-studio");
    }

    #[test]
    fn test_missing_api_key_env_is_error() {
        let config = ModelConfig {
            api_key_env: Some("LMCHAT_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..ModelConfig::default()
        };
        assert!(matches!(create_client(&config), Err(LlmError::InvalidRequest(_))));
    }

    #[test]
    fn test_no_api_key_env_means_no_key() {
        assert!(resolve_api_key(&ModelConfig::default()).unwrap().is_none());
    }
}
