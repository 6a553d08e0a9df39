use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::audio::{
    idle::MIN_IDLE_TIMEOUT,
    queue::{QueueSnapshot, DEFAULT_VOLUME},
    transport::{GuildSettingsStore, SnapshotStore},
};

/// Configuración de servidor almacenada en JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildSettings {
    pub guild_id: u64,
    pub auto_leave: bool,
    pub auto_leave_timeout_seconds: u64,
    pub vote_skip_enabled: bool,
    pub vote_skip_threshold: f64,
    pub max_queue_size: usize,
    /// 0 = sin límite
    pub max_track_duration_seconds: u64,
    pub dj_role_id: Option<u64>,
    /// Modo 24/7: nunca abandonar el canal por inactividad
    pub always_on: bool,
    pub default_volume: u8,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            guild_id: 0,
            auto_leave: true,
            auto_leave_timeout_seconds: 60,
            vote_skip_enabled: true,
            vote_skip_threshold: 0.5,
            max_queue_size: 100,
            max_track_duration_seconds: 7200,
            dj_role_id: None,
            always_on: false,
            default_volume: DEFAULT_VOLUME,
        }
    }
}

impl GuildSettings {
    /// Tiempo de espera antes de abandonar un canal vacío
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.auto_leave_timeout_seconds).max(MIN_IDLE_TIMEOUT)
    }

    /// Duración máxima de un track, `None` si no hay límite
    pub fn max_track_duration(&self) -> Option<Duration> {
        match self.max_track_duration_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Marca del archivo de un servidor: (modificación, tamaño), `None` si no existe
type FileStamp = Option<(SystemTime, u64)>;

struct CachedSettings {
    settings: GuildSettings,
    stamp: FileStamp,
}

/// Manager de almacenamiento basado en archivos JSON.
///
/// La caché sólo se usa mientras el archivo en disco no cambie; una edición
/// externa se ve en la siguiente lectura.
pub struct JsonStorage {
    data_dir: PathBuf,
    defaults: GuildSettings,
    servers_cache: RwLock<HashMap<u64, CachedSettings>>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf, defaults: GuildSettings) -> Result<Self> {
        fs::create_dir_all(data_dir.join("servers")).await?;
        fs::create_dir_all(data_dir.join("queues")).await?;

        info!("📁 Storage inicializado en: {}", data_dir.display());

        let storage = Self {
            data_dir,
            defaults,
            servers_cache: RwLock::new(HashMap::new()),
        };

        storage.load_all_servers().await?;

        Ok(storage)
    }

    /// Obtiene la configuración de un servidor
    pub async fn get_server_config(&self, guild_id: u64) -> Result<GuildSettings> {
        let stamp = self.file_stamp(guild_id).await;
        if let Some(cached) = self.servers_cache.read().get(&guild_id) {
            if cached.stamp == stamp {
                return Ok(cached.settings.clone());
            }
        }

        let config = match stamp {
            Some(_) => match self.load_server_config(guild_id).await {
                Ok(config) => config,
                Err(e) => {
                    warn!("Configuración inválida para guild {} ({}), usando valores por defecto", guild_id, e);
                    GuildSettings { guild_id, ..self.defaults.clone() }
                }
            },
            None => {
                debug!("Sin configuración para guild {}, usando valores por defecto", guild_id);
                GuildSettings { guild_id, ..self.defaults.clone() }
            }
        };

        self.cache(guild_id, config.clone(), stamp);
        Ok(config)
    }

    /// Actualiza la configuración de un servidor
    pub async fn update_server_config(&self, config: GuildSettings) -> Result<()> {
        let guild_id = config.guild_id;

        self.save_server_config(&config).await?;
        let stamp = self.file_stamp(guild_id).await;
        self.cache(guild_id, config, stamp);

        info!("💾 Configuración actualizada para guild {}", guild_id);
        Ok(())
    }

    /// Actualiza el volumen por defecto de un servidor
    pub async fn set_default_volume(&self, guild_id: u64, volume: u8) -> Result<()> {
        let mut config = self.get_server_config(guild_id).await?;
        config.default_volume = volume.min(100);
        self.update_server_config(config).await
    }

    /// Actualiza el tamaño máximo de cola de un servidor
    pub async fn set_max_queue_size(&self, guild_id: u64, size: usize) -> Result<()> {
        let mut config = self.get_server_config(guild_id).await?;
        config.max_queue_size = size.clamp(1, 1000);
        self.update_server_config(config).await
    }

    /// Actualiza el rol de DJ de un servidor
    pub async fn set_dj_role(&self, guild_id: u64, role_id: Option<u64>) -> Result<()> {
        let mut config = self.get_server_config(guild_id).await?;
        config.dj_role_id = role_id;
        self.update_server_config(config).await
    }

    /// Activa o desactiva el modo 24/7
    pub async fn set_always_on(&self, guild_id: u64, always_on: bool) -> Result<()> {
        let mut config = self.get_server_config(guild_id).await?;
        config.always_on = always_on;
        self.update_server_config(config).await
    }

    // Métodos privados

    fn cache(&self, guild_id: u64, settings: GuildSettings, stamp: FileStamp) {
        self.servers_cache
            .write()
            .insert(guild_id, CachedSettings { settings, stamp });
    }

    async fn file_stamp(&self, guild_id: u64) -> FileStamp {
        let metadata = fs::metadata(self.get_server_file_path(guild_id)).await.ok()?;
        Some((metadata.modified().ok()?, metadata.len()))
    }

    async fn load_server_config(&self, guild_id: u64) -> Result<GuildSettings> {
        let file_path = self.get_server_file_path(guild_id);
        let content = fs::read_to_string(&file_path).await?;
        let config: GuildSettings = serde_json::from_str(&content)?;
        Ok(config)
    }

    async fn save_server_config(&self, config: &GuildSettings) -> Result<()> {
        let file_path = self.get_server_file_path(config.guild_id);
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&file_path, content).await?;
        Ok(())
    }

    async fn load_all_servers(&self) -> Result<()> {
        let mut files = fs::read_dir(self.data_dir.join("servers")).await?;
        let mut loaded_count = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let Some(guild_id) = path
                .file_stem()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("guild_"))
                .and_then(|id| id.parse::<u64>().ok())
            else {
                continue;
            };

            match self.load_server_config(guild_id).await {
                Ok(config) => {
                    let stamp = self.file_stamp(guild_id).await;
                    self.cache(guild_id, config, stamp);
                    loaded_count += 1;
                }
                Err(e) => {
                    warn!("Error cargando configuración para guild {}: {}", guild_id, e);
                }
            }
        }

        if loaded_count > 0 {
            info!("📂 Cargadas {} configuraciones de servidor", loaded_count);
        }

        Ok(())
    }

    fn get_server_file_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir.join("servers").join(format!("guild_{}.json", guild_id))
    }

    fn get_queue_file_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir.join("queues").join(format!("guild_{}.json", guild_id))
    }
}

#[async_trait]
impl GuildSettingsStore for JsonStorage {
    async fn guild_settings(&self, guild_id: GuildId) -> Result<GuildSettings> {
        self.get_server_config(guild_id.get()).await
    }
}

#[async_trait]
impl SnapshotStore for JsonStorage {
    async fn save_snapshot(&self, snapshot: &QueueSnapshot) -> Result<()> {
        let path = self.get_queue_file_path(snapshot.guild_id.get());
        let content = serde_json::to_string(snapshot)?;
        fs::write(&path, content).await?;
        Ok(())
    }

    async fn remove_snapshot(&self, guild_id: GuildId) -> Result<()> {
        let path = self.get_queue_file_path(guild_id.get());
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        queue::{GuildQueue, LoopMode},
        track::{Requester, Track},
    };
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn storage(dir: &TempDir) -> JsonStorage {
        JsonStorage::new(dir.path().to_path_buf(), GuildSettings::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;

        let settings = storage.guild_settings(GuildId::new(7)).await.unwrap();

        assert_eq!(settings, GuildSettings { guild_id: 7, ..GuildSettings::default() });
        assert!(!dir.path().join("servers/guild_7.json").exists());
    }

    #[tokio::test]
    async fn test_settings_survive_reload() {
        let dir = TempDir::new().unwrap();
        {
            let storage = storage(&dir).await;
            storage.set_dj_role(7, Some(99)).await.unwrap();
            storage.set_always_on(7, true).await.unwrap();
            storage.set_default_volume(7, 250).await.unwrap();
        }

        let storage = storage(&dir).await;
        let settings = storage.get_server_config(7).await.unwrap();

        assert_eq!(settings.dj_role_id, Some(99));
        assert!(settings.always_on);
        assert_eq!(settings.default_volume, 100);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("servers")).unwrap();
        std::fs::write(
            dir.path().join("servers/guild_5.json"),
            r#"{"guild_id": 5, "vote_skip_enabled": false}"#,
        )
        .unwrap();

        let storage = storage(&dir).await;
        let settings = storage.get_server_config(5).await.unwrap();

        assert!(!settings.vote_skip_enabled);
        assert_eq!(settings.max_queue_size, 100);
        assert_eq!(settings.auto_leave_timeout_seconds, 60);
    }

    #[tokio::test]
    async fn test_external_edits_are_picked_up() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let path = dir.path().join("servers/guild_9.json");

        let before = storage.guild_settings(GuildId::new(9)).await.unwrap();
        assert_eq!(before.max_queue_size, 100);

        std::fs::write(&path, r#"{"guild_id": 9, "max_queue_size": 5, "vote_skip_enabled": false}"#).unwrap();
        let edited = storage.guild_settings(GuildId::new(9)).await.unwrap();
        assert_eq!(edited.max_queue_size, 5);
        assert!(!edited.vote_skip_enabled);

        std::fs::write(&path, r#"{"guild_id": 9, "max_queue_size": 50}"#).unwrap();
        let rewritten = storage.guild_settings(GuildId::new(9)).await.unwrap();
        assert_eq!(rewritten.max_queue_size, 50);
        assert!(rewritten.vote_skip_enabled);

        std::fs::remove_file(&path).unwrap();
        let removed = storage.guild_settings(GuildId::new(9)).await.unwrap();
        assert_eq!(removed, GuildSettings { guild_id: 9, ..GuildSettings::default() });
    }

    #[test]
    fn test_duration_helpers() {
        let settings = GuildSettings {
            auto_leave_timeout_seconds: 0,
            max_track_duration_seconds: 0,
            ..GuildSettings::default()
        };
        assert_eq!(settings.idle_timeout(), MIN_IDLE_TIMEOUT);
        assert_eq!(settings.max_track_duration(), None);

        let defaults = GuildSettings::default();
        assert_eq!(defaults.idle_timeout(), Duration::from_secs(60));
        assert_eq!(defaults.max_track_duration(), Some(Duration::from_secs(7200)));
    }

    #[tokio::test]
    async fn test_snapshot_save_load_remove() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let guild_id = GuildId::new(3);

        let mut queue = GuildQueue::new(guild_id);
        queue
            .enqueue(Track::new("A", "https://a.example/a.mp3", Requester::System("test".into())), 10)
            .unwrap();
        queue.set_loop_mode(LoopMode::Queue);
        let snapshot = queue.snapshot();

        let path = dir.path().join("queues/guild_3.json");
        storage.save_snapshot(&snapshot).await.unwrap();
        let saved: QueueSnapshot =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, snapshot);

        storage.remove_snapshot(guild_id).await.unwrap();
        assert!(!path.exists());

        // Borrar dos veces no es un error
        storage.remove_snapshot(guild_id).await.unwrap();
    }
}
