use anyhow::{Context, Result};
use async_trait::async_trait;
use url::Url;

use super::MusicSource;
use crate::audio::track::{Requester, SourceKind, Track};

const AUDIO_EXTENSIONS: [&str; 6] = [".mp3", ".wav", ".ogg", ".flac", ".m4a", ".opus"];

/// Archivos de audio servidos por HTTP
pub struct DirectUrlClient;

impl DirectUrlClient {
    /// Título a partir del último segmento de la ruta
    fn title_for(url: &Url) -> String {
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .map(|name| name.rsplit_once('.').map_or(name, |(stem, _)| stem))
            .map(|stem| stem.replace(['_', '-'], " "))
            .unwrap_or_else(|| url.host_str().unwrap_or("audio").to_string())
    }
}

#[async_trait]
impl MusicSource for DirectUrlClient {
    async fn get_track(&self, url: &str, requester: Requester) -> Result<Track> {
        let parsed = Url::parse(url).context("URL inválida")?;
        Ok(Track::new(Self::title_for(&parsed), url, requester).with_source(SourceKind::DirectUrl))
    }

    async fn search(&self, _query: &str, _requester: Requester) -> Result<Track> {
        anyhow::bail!("Las URLs directas no admiten búsqueda")
    }

    fn is_valid_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let path = parsed.path().to_lowercase();
        matches!(parsed.scheme(), "http" | "https")
            && AUDIO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }

    fn source_name(&self) -> &'static str {
        "direct"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_file_detection() {
        let client = DirectUrlClient;
        assert!(client.is_valid_url("https://cdn.example.com/music/song.mp3"));
        assert!(client.is_valid_url("https://cdn.example.com/a.FLAC?token=1"));
        assert!(!client.is_valid_url("https://www.youtube.com/watch?v=abc"));
        assert!(!client.is_valid_url("ftp://example.com/song.mp3"));
        assert!(!client.is_valid_url("song.mp3"));
    }

    #[tokio::test]
    async fn test_title_from_path() {
        let track = DirectUrlClient
            .get_track("https://cdn.example.com/music/my_best-song.mp3", Requester::System("test".into()))
            .await
            .unwrap();
        assert_eq!(track.title(), "my best song");
        assert_eq!(track.source(), SourceKind::DirectUrl);
        assert!(track.is_live());
    }
}
