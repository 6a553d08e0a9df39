use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::{fmt, time::Duration};
use url::Url;

/// Plataforma de origen de un track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    YouTube,
    SoundCloud,
    Spotify,
    DirectUrl,
}

impl SourceKind {
    /// Detecta la plataforma a partir de la URL
    pub fn detect(url: &str) -> Self {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
        else {
            return SourceKind::DirectUrl;
        };

        match host.as_str() {
            "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be" => {
                SourceKind::YouTube
            }
            "soundcloud.com" | "m.soundcloud.com" | "on.soundcloud.com" => SourceKind::SoundCloud,
            "open.spotify.com" | "spotify.com" => SourceKind::Spotify,
            _ => SourceKind::DirectUrl,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::YouTube => "YouTube",
            SourceKind::SoundCloud => "SoundCloud",
            SourceKind::Spotify => "Spotify",
            SourceKind::DirectUrl => "URL directa",
        }
    }
}

/// Quién pidió el track: un usuario resuelto o el propio sistema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requester {
    User { id: UserId, tag: String },
    System(String),
}

impl Requester {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Requester::User { id, .. } => Some(*id),
            Requester::System(_) => None,
        }
    }
}

impl fmt::Display for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requester::User { id, .. } => write!(f, "<@{}>", id),
            Requester::System(label) => f.write_str(label),
        }
    }
}

/// Descripción inmutable de algo reproducible.
///
/// Se construye con [`Track::new`] y los métodos `with_*`; una vez encolado
/// nunca se modifica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    title: String,
    url: String,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    requester: Requester,
    source: SourceKind,
    artist: Option<String>,
    live: bool,
    added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>, requester: Requester) -> Self {
        let url = url.into();
        Self {
            title: title.into(),
            source: SourceKind::detect(&url),
            url,
            duration: None,
            thumbnail: None,
            requester,
            artist: None,
            live: false,
            added_at: Utc::now(),
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    /// `None` para streams en vivo o de duración desconocida
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn requester(&self) -> &Requester {
        &self.requester
    }
    pub fn source(&self) -> SourceKind {
        self.source
    }
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    pub fn is_live(&self) -> bool {
        self.live || self.duration.is_none()
    }

    // Builders

    /// Duración en segundos; 0 marca un stream sin duración conocida
    pub fn with_duration_secs(mut self, secs: u64) -> Self {
        self.duration = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = source;
        self
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_detection() {
        assert_eq!(
            SourceKind::detect("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            SourceKind::YouTube
        );
        assert_eq!(SourceKind::detect("https://youtu.be/dQw4w9WgXcQ"), SourceKind::YouTube);
        assert_eq!(
            SourceKind::detect("https://soundcloud.com/artist/song"),
            SourceKind::SoundCloud
        );
        assert_eq!(
            SourceKind::detect("https://open.spotify.com/track/abc"),
            SourceKind::Spotify
        );
        assert_eq!(SourceKind::detect("https://example.com/song.mp3"), SourceKind::DirectUrl);
        assert_eq!(SourceKind::detect("not a url"), SourceKind::DirectUrl);
    }

    #[test]
    fn test_zero_duration_is_live() {
        let requester = Requester::System("autoplay".into());
        let track = Track::new("radio", "https://example.com/stream", requester).with_duration_secs(0);
        assert!(track.is_live());
        assert_eq!(track.duration(), None);
    }

    #[test]
    fn test_requester_display() {
        let user = Requester::User { id: UserId::new(42), tag: "alice#0001".into() };
        assert_eq!(user.to_string(), "<@42>");
        assert_eq!(Requester::System("playlist".into()).to_string(), "playlist");
    }
}
