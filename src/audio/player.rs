use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input, YoutubeDl},
    tracks::{ControlError, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        track::{SourceKind, Track},
        transport::{PlaybackHandle, SignalSink, VoiceConnection, VoiceTransport},
    },
    error::{MusicError, Result},
};

/// Transporte de voz sobre Songbird
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { manager, http })
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceConnection>> {
        let call = self.manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("Error al conectar al canal de voz en {}: {:?}", guild_id, e);
            MusicError::Connection(e.to_string())
        })?;

        Ok(Box::new(SongbirdConnection {
            guild_id,
            channel_id,
            call,
            manager: self.manager.clone(),
            http: self.http.clone(),
        }))
    }
}

struct SongbirdConnection {
    guild_id: GuildId,
    channel_id: ChannelId,
    call: Arc<Mutex<Call>>,
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdConnection {
    /// Construye el input de audio para el track
    async fn input_for(&self, track: &Track) -> Result<Input> {
        match track.source() {
            SourceKind::DirectUrl => {
                Ok(HttpRequest::new(self.http.clone(), track.url().to_string()).into())
            }
            _ => {
                let mut input: Input = YoutubeDl::new(self.http.clone(), track.url().to_string()).into();
                // yt-dlp falla aquí si el video no existe o está bloqueado
                input
                    .aux_metadata()
                    .await
                    .map_err(|e| MusicError::TrackUnplayable(e.to_string()))?;
                Ok(input)
            }
        }
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    fn relocate(&mut self, channel_id: ChannelId) {
        self.channel_id = channel_id;
    }

    async fn stream(
        &self,
        track: &Track,
        volume: u8,
        sink: SignalSink,
    ) -> Result<Box<dyn PlaybackHandle>> {
        let input = self.input_for(track).await?;

        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };

        let unplayable = |e: ControlError| MusicError::TrackUnplayable(e.to_string());
        handle.set_volume(volume_to_gain(volume)).map_err(unplayable)?;
        handle
            .add_event(Event::Track(TrackEvent::End), TrackEndNotifier { sink: sink.clone() })
            .map_err(unplayable)?;
        handle
            .add_event(Event::Track(TrackEvent::Error), TrackErrorNotifier { sink })
            .map_err(unplayable)?;

        info!("🎵 Emitiendo en {}: {}", self.guild_id, track.title());
        Ok(Box::new(SongbirdPlayback { handle }))
    }

    async fn disconnect(&self) {
        if let Err(e) = self.manager.remove(self.guild_id).await {
            // Ya desconectado externamente
            debug!("Songbird remove en {}: {:?}", self.guild_id, e);
        }
        info!("👋 Desconectado del canal de voz en {}", self.guild_id);
    }
}

/// Volumen 0-100 a ganancia de Songbird
fn volume_to_gain(volume: u8) -> f32 {
    f32::from(volume.min(100)) / 100.0
}

struct SongbirdPlayback {
    handle: TrackHandle,
}

impl PlaybackHandle for SongbirdPlayback {
    fn pause(&self) {
        if let Err(e) = self.handle.pause() {
            warn!("No se pudo pausar el track: {:?}", e);
        }
    }

    fn resume(&self) {
        if let Err(e) = self.handle.play() {
            warn!("No se pudo reanudar el track: {:?}", e);
        }
    }

    fn set_volume(&self, volume: u8) {
        if let Err(e) = self.handle.set_volume(volume_to_gain(volume)) {
            warn!("No se pudo ajustar el volumen: {:?}", e);
        }
    }

    fn stop(&self) {
        let _ = self.handle.stop();
    }
}

/// Handler para cuando termina una canción
struct TrackEndNotifier {
    sink: SignalSink,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("Track {} terminado", self.sink.instance());
        self.sink.finished();
        None
    }
}

/// Handler para errores de tracks
struct TrackErrorNotifier {
    sink: SignalSink,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let reason = match ctx {
            EventContext::Track(tracks) => tracks
                .first()
                .map(|(state, _)| format!("{:?}", state.playing))
                .unwrap_or_else(|| "error desconocido".to_string()),
            _ => "error desconocido".to_string(),
        };
        self.sink.errored(reason);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_to_gain() {
        assert_eq!(volume_to_gain(100), 1.0);
        assert_eq!(volume_to_gain(0), 0.0);
        assert_eq!(volume_to_gain(50), 0.5);
        assert_eq!(volume_to_gain(250), 1.0);
    }
}
