use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::storage::GuildSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Paths
    pub data_dir: PathBuf,

    // Valores por defecto para servidores sin configuración
    pub default_max_queue_size: usize,
    pub default_auto_leave_timeout: u64, // En segundos
    pub default_max_track_duration: u64, // En segundos, 0 = sin límite
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Paths
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),

            // Límites
            default_max_queue_size: std::env::var("DEFAULT_MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            default_auto_leave_timeout: std::env::var("DEFAULT_AUTO_LEAVE_TIMEOUT")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            default_max_track_duration: std::env::var("DEFAULT_MAX_TRACK_DURATION")
                .unwrap_or_else(|_| "7200".to_string()) // 2 horas
                .parse()?,
        };

        std::fs::create_dir_all(&config.data_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Discord token must be present
    /// - Queue size must be greater than 0
    /// - Auto-leave timeout must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if self.default_max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.default_auto_leave_timeout == 0 {
            anyhow::bail!("Auto-leave timeout must be greater than 0");
        }

        Ok(())
    }

    /// Settings applied to guilds that have no stored configuration.
    pub fn guild_defaults(&self) -> GuildSettings {
        GuildSettings {
            max_queue_size: self.default_max_queue_size,
            auto_leave_timeout_seconds: self.default_auto_leave_timeout,
            max_track_duration_seconds: self.default_max_track_duration,
            ..GuildSettings::default()
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes sensitive information like tokens.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Data: {}\n  \
            Limits: {} queue, {}s auto-leave, {} max duration",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.data_dir.display(),
            self.default_max_queue_size,
            self.default_auto_leave_timeout,
            match self.default_max_track_duration {
                0 => "unlimited".to_string(),
                secs => format!("{}s", secs),
            },
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            data_dir: "./data".into(),

            default_max_queue_size: 100,
            default_auto_leave_timeout: 60,
            default_max_track_duration: 7200, // 2 hours
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = Config {
            discord_token: "token".into(),
            default_max_queue_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            discord_token: "token".into(),
            default_auto_leave_timeout: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_token() {
        assert!(Config::default().validate().is_err());
        let config = Config { discord_token: "token".into(), ..Config::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_guild_defaults_follow_process_config() {
        let config = Config {
            default_max_queue_size: 25,
            default_auto_leave_timeout: 300,
            default_max_track_duration: 0,
            ..Config::default()
        };
        let defaults = config.guild_defaults();
        assert_eq!(defaults.max_queue_size, 25);
        assert_eq!(defaults.auto_leave_timeout_seconds, 300);
        assert_eq!(defaults.max_track_duration(), None);
        assert!(defaults.vote_skip_enabled);
    }

    #[test]
    fn test_summary_hides_token() {
        let config = Config { discord_token: "secret-token".into(), ..Config::default() };
        let summary = config.summary();
        assert!(!summary.contains("secret-token"));
        assert!(summary.contains("7200s"));
    }
}
