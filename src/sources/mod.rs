//! Resolución de URLs y búsquedas a [`Track`]s.

pub mod direct_url;
pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::audio::track::{Requester, SourceKind, Track};

pub use direct_url::DirectUrlClient;
pub use youtube::YtDlpClient;

/// Trait común para todas las fuentes de música
#[async_trait]
pub trait MusicSource: Send + Sync {
    /// Obtiene información de un track por URL
    async fn get_track(&self, url: &str, requester: Requester) -> Result<Track>;

    /// Devuelve el mejor resultado para una búsqueda
    async fn search(&self, query: &str, requester: Requester) -> Result<Track>;

    /// Verifica si la URL es válida para esta fuente
    fn is_valid_url(&self, url: &str) -> bool;

    /// Nombre de la fuente
    fn source_name(&self) -> &'static str;
}

/// Elige la fuente adecuada para lo que escribió el usuario
pub struct TrackResolver {
    direct: Box<dyn MusicSource>,
    ytdlp: Box<dyn MusicSource>,
}

impl TrackResolver {
    pub fn new() -> Self {
        Self::with_sources(Box::new(DirectUrlClient), Box::new(YtDlpClient::new()))
    }

    pub fn with_sources(direct: Box<dyn MusicSource>, ytdlp: Box<dyn MusicSource>) -> Self {
        Self { direct, ytdlp }
    }

    /// Resuelve una URL o un término de búsqueda
    pub async fn resolve(&self, input: &str, requester: Requester) -> Result<Track> {
        let input = input.trim();
        if input.is_empty() {
            anyhow::bail!("Búsqueda vacía");
        }

        if self.direct.is_valid_url(input) {
            debug!("Resolviendo con {}: {}", self.direct.source_name(), input);
            return self.direct.get_track(input, requester).await;
        }

        if self.ytdlp.is_valid_url(input) {
            if SourceKind::detect(input) == SourceKind::Spotify {
                anyhow::bail!("Spotify no se puede reproducir directamente, busca la canción por nombre");
            }
            debug!("Resolviendo con {}: {}", self.ytdlp.source_name(), input);
            return self.ytdlp.get_track(input, requester).await;
        }

        self.ytdlp.search(input, requester).await
    }
}

impl Default for TrackResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fuente que sólo registra cómo fue llamada
    struct RecordingSource {
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl MusicSource for RecordingSource {
        async fn get_track(&self, url: &str, requester: Requester) -> Result<Track> {
            self.calls.lock().push(format!("get:{}", url));
            Ok(Track::new("url", url, requester))
        }

        async fn search(&self, query: &str, requester: Requester) -> Result<Track> {
            self.calls.lock().push(format!("search:{}", query));
            Ok(Track::new(query, "https://www.youtube.com/watch?v=x", requester))
        }

        fn is_valid_url(&self, url: &str) -> bool {
            url.starts_with("https://")
        }

        fn source_name(&self) -> &'static str {
            "recording"
        }
    }

    fn resolver() -> (TrackResolver, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let resolver = TrackResolver::with_sources(
            Box::new(DirectUrlClient),
            Box::new(RecordingSource { calls: calls.clone() }),
        );
        (resolver, calls)
    }

    fn requester() -> Requester {
        Requester::System("test".into())
    }

    #[tokio::test]
    async fn test_routes_by_input_kind() {
        let (resolver, calls) = resolver();

        let direct = resolver
            .resolve("https://cdn.example.com/song.mp3", requester())
            .await
            .unwrap();
        assert_eq!(direct.source(), SourceKind::DirectUrl);

        resolver
            .resolve("https://www.youtube.com/watch?v=abc", requester())
            .await
            .unwrap();
        resolver.resolve("  never gonna give you up ", requester()).await.unwrap();

        assert_eq!(
            *calls.lock(),
            vec![
                "get:https://www.youtube.com/watch?v=abc".to_string(),
                "search:never gonna give you up".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_rejects_empty_and_spotify() {
        let (resolver, calls) = resolver();

        assert!(resolver.resolve("   ", requester()).await.is_err());
        assert!(resolver
            .resolve("https://open.spotify.com/track/123", requester())
            .await
            .is_err());
        assert!(calls.lock().is_empty());
    }
}
