//! Error types for the playback engine.
//!
//! Every variant is recoverable: the command layer catches it at the boundary
//! and answers the user with [`MusicError::user_message`].

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MusicError {
    #[error("queue is full (max {max} tracks)")]
    QueueFull { max: usize },

    #[error("index {index} out of range (queue length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("nothing to play")]
    NothingToPlay,

    #[error("nothing is playing")]
    NotPlaying,

    #[error("playback is not paused")]
    NotPaused,

    #[error("track could not be played: {0}")]
    TrackUnplayable(String),

    #[error("not in the bot's voice channel")]
    NotInVoice,

    #[error("track too long ({duration:?}, max {max:?})")]
    TrackTooLong { duration: Duration, max: Duration },

    #[error("vote skip is disabled in this guild")]
    VoteSkipDisabled,

    #[error("DJ role or Manage Guild permission required")]
    NotDj,

    #[error("Manage Guild permission required")]
    NotManager,

    #[error("voice connection failed: {0}")]
    Connection(String),

    #[error("guild settings unavailable: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, MusicError>;

impl MusicError {
    /// Mensaje para el usuario final
    pub fn user_message(&self) -> String {
        match self {
            MusicError::QueueFull { max } => {
                format!("❌ La cola está llena (máximo {} canciones)", max)
            }
            MusicError::IndexOutOfRange { index, len } => format!(
                "❌ Posición {} fuera de rango (la cola tiene {} canciones)",
                index.saturating_add(1),
                len
            ),
            MusicError::NothingToPlay => "❌ No hay nada en la cola para reproducir".to_string(),
            MusicError::NotPlaying => "❌ No hay nada reproduciéndose actualmente".to_string(),
            MusicError::NotPaused => "❌ La reproducción no está pausada".to_string(),
            MusicError::TrackUnplayable(_) => {
                "⚠️ No se pudo reproducir la canción, saltando".to_string()
            }
            MusicError::NotInVoice => "❌ Debes estar en el canal de voz del bot".to_string(),
            MusicError::TrackTooLong { max, .. } => format!(
                "❌ La canción excede la duración máxima ({})",
                humantime::format_duration(*max)
            ),
            MusicError::VoteSkipDisabled => {
                "❌ La votación para saltar está desactivada en este servidor".to_string()
            }
            MusicError::NotDj => {
                "❌ Necesitas el rol de DJ o el permiso de gestionar el servidor. Prueba con `/voteskip`"
                    .to_string()
            }
            MusicError::NotManager => {
                "❌ Necesitas el permiso de gestionar el servidor".to_string()
            }
            MusicError::Connection(_) => "❌ Error al conectar al canal de voz".to_string(),
            MusicError::Settings(_) => {
                "❌ No se pudo leer la configuración del servidor".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_message_is_one_based() {
        let err = MusicError::IndexOutOfRange { index: 4, len: 3 };
        assert!(err.user_message().contains("Posición 5"));
        assert_eq!(err.to_string(), "index 4 out of range (queue length 3)");
    }

    #[test]
    fn test_index_message_at_usize_max() {
        let err = MusicError::IndexOutOfRange { index: usize::MAX, len: 2 };
        assert!(err.user_message().contains(&usize::MAX.to_string()));
    }
}
