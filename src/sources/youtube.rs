use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::MusicSource;
use crate::audio::track::{Requester, Track};

/// Cliente para obtener metadata a través de yt-dlp
pub struct YtDlpClient {
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    duration: Option<f64>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    is_live: Option<bool>,
}

impl YtDlpInfo {
    fn into_track(self, fallback_url: &str, requester: Requester) -> Track {
        let url = self
            .webpage_url
            .or(self.url)
            .unwrap_or_else(|| fallback_url.to_string());
        let live = self.is_live.unwrap_or(false);

        let mut track = Track::new(self.title, url, requester).with_live(live);
        if !live {
            if let Some(secs) = self.duration {
                track = track.with_duration_secs(secs.max(0.0).round() as u64);
            }
        }
        if let Some(artist) = self.uploader {
            track = track.with_artist(artist);
        }
        if let Some(thumbnail) = self.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }
        track
    }
}

impl YtDlpClient {
    pub fn new() -> Self {
        Self {
            // Limitar procesos concurrentes de yt-dlp
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Ejecuta yt-dlp y devuelve la primera entrada JSON
    async fn dump_json(&self, target: &str) -> Result<YtDlpInfo> {
        let _permit = self.rate_limiter.acquire().await?;

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                target,
            ])
            .output()
            .await
            .context("Error al ejecutar yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_first_entry(&stdout)
    }
}

impl Default for YtDlpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_first_entry(stdout: &str) -> Result<YtDlpInfo> {
    let line = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .context("yt-dlp no devolvió resultados")?;
    serde_json::from_str(line).context("Error al parsear respuesta de yt-dlp")
}

#[async_trait]
impl MusicSource for YtDlpClient {
    async fn get_track(&self, url: &str, requester: Requester) -> Result<Track> {
        debug!("📊 Obteniendo info de: {}", url);
        let info = self.dump_json(url).await?;
        Ok(info.into_track(url, requester))
    }

    async fn search(&self, query: &str, requester: Requester) -> Result<Track> {
        info!("🔍 Buscando en YouTube: {}", query);
        let target = format!("ytsearch1:{}", query);
        let info = self.dump_json(&target).await?;
        Ok(info.into_track(&target, requester))
    }

    fn is_valid_url(&self, url: &str) -> bool {
        url.starts_with("http://") || url.starts_with("https://")
    }

    fn source_name(&self) -> &'static str {
        "yt-dlp"
    }
}
