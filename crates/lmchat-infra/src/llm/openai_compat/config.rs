//! Configuration and per-service defaults for OpenAI-compatible backends.
//!
//! Each service that speaks the OpenAI chat completions protocol gets a
//! factory function returning an [`OpenAiCompatConfig`] with the correct
//! base URL and authentication.

use secrecy::SecretString;

/// Configuration for an OpenAI-compatible completion client.
///
/// Used to construct an [`super::OpenAiCompatibleClient`].
pub struct OpenAiCompatConfig {
    /// Human-readable backend name (e.g., "lm-studio", "openai").
    pub name: String,
    /// Base URL including the version segment (e.g., "http://localhost:1234/v1").
    pub base_url: String,
    /// Bearer API key. Local servers usually need none.
    pub api_key: Option<SecretString>,
}

/// LM Studio local server defaults.
///
/// Base URL: `http://localhost:1234/v1`, no API key.
pub fn lm_studio_defaults() -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        name: "lm-studio".into(),
        base_url: "http://localhost:1234/v1".into(),
        api_key: None,
    }
}

/// OpenAI defaults.
///
/// Base URL: `https://api.openai.com/v1`
pub fn openai_defaults(api_key: SecretString) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        name: "openai".into(),
        base_url: "https://api.openai.com/v1".into(),
        api_key: Some(api_key),
    }
}

/// Any other OpenAI-compatible endpoint.
pub fn custom(base_url: &str, api_key: Option<SecretString>) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        name: backend_name(base_url).into(),
        base_url: base_url.trim_end_matches('/').into(),
        api_key,
    }
}

/// Best-effort backend label from a base URL.
fn backend_name(base_url: &str) -> &'static str {
    if base_url.contains("api.openai.com") {
        "openai"
    } else if base_url.contains(":1234") {
        "lm-studio"
    } else if base_url.contains(":11434") {
        "ollama"
    } else {
        "openai-compatible"
    }
}
