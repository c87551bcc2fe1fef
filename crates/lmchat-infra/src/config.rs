//! Configuration loader for lmchat.
//!
//! Reads `config.toml` from the data directory (`~/.lmchat/` in production)
//! and deserializes it into [`AppConfig`]. Falls back to defaults when the
//! file is missing, malformed, or fails validation.

use std::path::{Path, PathBuf};

use lmchat_types::config::AppConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "LMCHAT_DATA_DIR";

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory.
///
/// `LMCHAT_DATA_DIR` wins when set and non-empty; otherwise `~/.lmchat`.
/// Falls back to `./.lmchat` when no home directory can be determined.
pub fn resolve_data_dir() -> PathBuf {
    data_dir_from(std::env::var(DATA_DIR_ENV).ok())
}

fn data_dir_from(env_value: Option<String>) -> PathBuf {
    match env_value {
        Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lmchat"),
    }
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`AppConfig::default()`].
/// - Unreadable, unparsable, or invalid file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    let config = match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            return AppConfig::default();
        }
    };

    if let Err(err) = config.validate() {
        tracing::warn!("Invalid {}: {err}, using defaults", config_path.display());
        return AppConfig::default();
    }
    config
}
