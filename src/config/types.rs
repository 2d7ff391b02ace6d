//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::defaults::{
    default_chat_listen, default_language_path, default_max_line_len, default_settings_path,
    default_true, default_users_path,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot identity and document paths.
    pub bot: BotConfig,
    /// Game server process.
    pub game: GameConfig,
    /// Chat gateway.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Optional world data document.
    #[serde(default)]
    pub world: WorldConfig,
    /// Prometheus endpoint.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// The bot itself.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Chat nickname; messages starting with it are commands.
    pub nickname: String,
    /// Runtime settings document.
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
    /// Identity document.
    #[serde(default = "default_users_path")]
    pub users_path: PathBuf,
    /// User-facing texts.
    #[serde(default = "default_language_path")]
    pub language_path: PathBuf,
}

/// How to run the game server.
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    /// Program and arguments.
    pub command: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Copy console output to stdout.
    #[serde(default = "default_true")]
    pub echo_output: bool,
    /// Copy operator stdin into the game console.
    #[serde(default = "default_true")]
    pub forward_stdin: bool,
}

/// Chat gateway listener.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_listen")]
    pub listen: SocketAddr,
    /// Longest accepted client line, in bytes.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            listen: default_chat_listen(),
            max_line_len: default_max_line_len(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorldConfig {
    /// JSON world data document. World commands are disabled without it.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Port of the `/metrics` endpoint; disabled when absent.
    pub port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config: Config = toml::from_str(
            r#"
[bot]
nickname = "relay"

[game]
command = ["java", "-jar", "server.jar", "nogui"]
"#,
        )
        .unwrap();
        assert_eq!(config.bot.settings_path, PathBuf::from("settings.json"));
        assert_eq!(config.bot.users_path, PathBuf::from("users.json"));
        assert!(config.game.echo_output);
        assert!(config.game.forward_stdin);
        assert_eq!(config.chat.listen.port(), 5522);
        assert_eq!(config.chat.max_line_len, 4096);
        assert!(config.world.path.is_none());
        assert!(config.metrics.port.is_none());
    }

    #[test]
    fn test_missing_bot_section_fails() {
        let result: Result<Config, _> = toml::from_str("[game]\ncommand = [\"x\"]\n");
        assert!(result.is_err());
    }
}
