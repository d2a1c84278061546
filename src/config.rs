//! Configuration management for the bot.
//!
//! Loads a JSON config file (`~/.config/guardbot/config.json` by default)
//! and falls back to environment variables, so the bot can run from a plain
//! `.env` in containers.

use crate::core::{CoreSettings, UserId};
use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use teloxide::types::ChatId;

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Get the bot's config directory.
fn config_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("guardbot"))
        .unwrap_or_else(|| PathBuf::from(".guardbot"))
}

fn default_post_cooldown() -> i64 {
    3600
}

fn default_attempt_interval() -> i64 {
    3600
}

fn default_game_channels() -> Vec<String> {
    vec!["main".to_owned()]
}

/// JSON configuration file structure.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    bot_token: String,
    moderation_chat_id: ChatIdValue,
    #[serde(default)]
    admin_ids: Vec<UserId>,
    #[serde(default)]
    moderator_ids: Vec<UserId>,
    #[serde(default = "default_post_cooldown")]
    post_cooldown_secs: i64,
    #[serde(default = "default_attempt_interval")]
    attempt_interval_secs: i64,
    #[serde(default = "default_game_channels")]
    game_channels: Vec<String>,
    /// Optional sqlite URL for the best-effort state mirror.
    #[serde(default)]
    database_url: Option<String>,
}

/// Chat ID that can be either string or integer in JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ChatIdValue {
    String(String),
    Integer(i64),
}

impl ChatIdValue {
    fn to_chat_id(&self) -> Result<ChatId, ConfigError> {
        match self {
            ChatIdValue::String(s) => s.parse::<i64>().map(ChatId).map_err(|_| {
                ConfigError::MissingField("moderation_chat_id must be a valid integer".to_owned())
            }),
            ChatIdValue::Integer(i) => Ok(ChatId(*i)),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    /// Group where moderation notifications (attempts, bans, reports) land.
    pub moderation_chat_id: ChatId,
    pub admin_ids: HashSet<UserId>,
    pub moderator_ids: HashSet<UserId>,
    pub post_cooldown_secs: i64,
    pub attempt_interval_secs: i64,
    pub game_channels: Vec<String>,
    pub database_url: Option<String>,
}

impl Config {
    /// Load configuration from a JSON file, falling back to env variables.
    ///
    /// Search order:
    /// 1. Provided config path (if any)
    /// 2. `~/.config/guardbot/config.json`
    /// 3. Environment variables (plus `.env` via dotenvy)
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            if path.exists() {
                return Self::from_json(&path);
            }
            return Err(ConfigError::FileNotFound(path));
        }

        let default_path = default_config_path();
        if default_path.exists() {
            return Self::from_json(&default_path);
        }

        Self::from_env()
    }

    /// Load configuration from a JSON file.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&content)?;

        if file.bot_token.is_empty() {
            return Err(ConfigError::MissingField("bot_token".to_owned()));
        }
        if file.game_channels.is_empty() {
            return Err(ConfigError::MissingField(
                "game_channels must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            bot_token: file.bot_token,
            moderation_chat_id: file.moderation_chat_id.to_chat_id()?,
            admin_ids: file.admin_ids.into_iter().collect(),
            moderator_ids: file.moderator_ids.into_iter().collect(),
            post_cooldown_secs: file.post_cooldown_secs,
            attempt_interval_secs: file.attempt_interval_secs,
            game_channels: file.game_channels,
            database_url: file.database_url,
        })
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env if present (silently ignore if not found).
        let _ = dotenvy::dotenv();

        let bot_token = env::var("BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("BOT_TOKEN".to_owned()))?;

        let moderation_chat_id = env::var("MODERATION_CHAT_ID")
            .map_err(|_| ConfigError::MissingEnvVar("MODERATION_CHAT_ID".to_owned()))?
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| {
                ConfigError::MissingField("MODERATION_CHAT_ID must be a valid integer".to_owned())
            })?;

        Ok(Self {
            bot_token,
            moderation_chat_id,
            admin_ids: parse_id_list(&env::var("ADMIN_IDS").unwrap_or_default()),
            moderator_ids: parse_id_list(&env::var("MODERATOR_IDS").unwrap_or_default()),
            post_cooldown_secs: parse_env_i64("COOLDOWN_SECONDS", default_post_cooldown()),
            attempt_interval_secs: parse_env_i64(
                "ATTEMPT_INTERVAL_SECONDS",
                default_attempt_interval(),
            ),
            game_channels: parse_channel_list(&env::var("GAME_CHANNELS").unwrap_or_default()),
            database_url: env::var("DATABASE_URL").ok(),
        })
    }

    /// Extract the knobs the core state tracker needs. Role resolution lives
    /// on `CommunityState`, which owns these sets after construction.
    pub fn core_settings(&self) -> CoreSettings {
        CoreSettings {
            admins: self.admin_ids.clone(),
            moderators: self.moderator_ids.clone(),
            post_cooldown_secs: self.post_cooldown_secs,
            default_attempt_interval_secs: self.attempt_interval_secs,
            game_channels: self.game_channels.clone(),
        }
    }
}

/// Parse a comma-separated id list, skipping empty segments.
fn parse_id_list(raw: &str) -> HashSet<UserId> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<UserId>().ok())
        .collect()
}

fn parse_channel_list(raw: &str) -> Vec<String> {
    let channels: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect();
    if channels.is_empty() {
        default_game_channels()
    } else {
        channels
    }
}

fn parse_env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_from_json_minimal() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(
            &config_path,
            r#"{"bot_token":"test_token","moderation_chat_id":"-100123"}"#,
        )
        .unwrap();

        let config = Config::from_json(&config_path).unwrap();
        assert_eq!(config.bot_token, "test_token");
        assert_eq!(config.moderation_chat_id, ChatId(-100123));
        assert_eq!(config.post_cooldown_secs, 3600);
        assert_eq!(config.game_channels, vec!["main".to_owned()]);
        assert!(config.admin_ids.is_empty());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_config_from_json_full() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(
            &config_path,
            r#"{
                "bot_token": "tok",
                "moderation_chat_id": -100456,
                "admin_ids": [1, 2],
                "moderator_ids": [3],
                "post_cooldown_secs": 120,
                "attempt_interval_secs": 600,
                "game_channels": ["try", "more"],
                "database_url": "sqlite://bot.db"
            }"#,
        )
        .unwrap();

        let config = Config::from_json(&config_path).unwrap();
        assert_eq!(config.moderation_chat_id, ChatId(-100456));
        assert_eq!(config.admin_ids, HashSet::from([1, 2]));
        assert_eq!(config.moderator_ids, HashSet::from([3]));
        assert_eq!(config.post_cooldown_secs, 120);
        assert_eq!(config.game_channels.len(), 2);
        assert_eq!(config.database_url.as_deref(), Some("sqlite://bot.db"));
    }

    #[test]
    fn test_config_missing_token_rejected() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(&config_path, r#"{"bot_token":"","moderation_chat_id":1}"#).unwrap();

        assert!(Config::from_json(&config_path).is_err());
    }

    #[test]
    fn test_config_empty_channels_rejected() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(
            &config_path,
            r#"{"bot_token":"tok","moderation_chat_id":1,"game_channels":[]}"#,
        )
        .unwrap();

        assert!(Config::from_json(&config_path).is_err());
    }

    #[test]
    fn test_config_file_not_found() {
        let result = Config::from_json(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_core_settings_carry_roles() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(
            &config_path,
            r#"{"bot_token":"tok","moderation_chat_id":1,"admin_ids":[10],"moderator_ids":[20]}"#,
        )
        .unwrap();

        let config = Config::from_json(&config_path).unwrap();
        let settings = config.core_settings();
        assert!(settings.admins.contains(&10));
        assert!(settings.moderators.contains(&20));
        assert_eq!(settings.post_cooldown_secs, 3600);
        assert_eq!(settings.game_channels, vec!["main".to_owned()]);
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list(""), HashSet::new());
        assert_eq!(parse_id_list("1, 2,,3"), HashSet::from([1, 2, 3]));
    }

    #[test]
    fn test_parse_channel_list_defaults() {
        assert_eq!(parse_channel_list(""), vec!["main".to_owned()]);
        assert_eq!(
            parse_channel_list("try, more"),
            vec!["try".to_owned(), "more".to_owned()]
        );
    }
}
