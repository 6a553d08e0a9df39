//! Contracts for the collaborators the engine drives but does not own:
//! the voice transport, channel membership lookups, guild settings and the
//! optional snapshot store.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    audio::{queue::QueueSnapshot, track::Track},
    error::Result,
    storage::GuildSettings,
};

/// Cómo terminó el audio de un track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Finished,
    Errored(String),
}

/// Señal emitida por el transporte cuando un track deja de sonar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSignal {
    pub guild_id: GuildId,
    pub instance: u64,
    pub outcome: TrackOutcome,
}

/// Emisor de señales atado a una instancia de track concreta
#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: mpsc::UnboundedSender<PlaybackSignal>,
    guild_id: GuildId,
    instance: u64,
}

impl SignalSink {
    pub fn new(tx: mpsc::UnboundedSender<PlaybackSignal>, guild_id: GuildId, instance: u64) -> Self {
        Self { tx, guild_id, instance }
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn finished(&self) {
        self.send(TrackOutcome::Finished);
    }

    pub fn errored(&self, reason: impl Into<String>) {
        self.send(TrackOutcome::Errored(reason.into()));
    }

    fn send(&self, outcome: TrackOutcome) {
        let signal = PlaybackSignal { guild_id: self.guild_id, instance: self.instance, outcome };
        if self.tx.send(signal).is_err() {
            debug!("Señal de reproducción descartada: el manager ya no existe");
        }
    }
}

/// Establece conexiones de voz por servidor
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceConnection>>;
}

/// Conexión de voz activa en un canal
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    /// Registra que la llamada ya está en `channel_id` (movida desde fuera)
    fn relocate(&mut self, channel_id: ChannelId);

    /// Empieza a emitir `track`. Un fallo al resolver el audio se reporta
    /// como [`crate::error::MusicError::TrackUnplayable`]; el fin del audio
    /// llega después por `sink`.
    async fn stream(
        &self,
        track: &Track,
        volume: u8,
        sink: SignalSink,
    ) -> Result<Box<dyn PlaybackHandle>>;

    async fn disconnect(&self);
}

/// Control sobre el audio de un track en curso
pub trait PlaybackHandle: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn set_volume(&self, volume: u8);
    fn stop(&self);
}

/// Cuenta miembros humanos en un canal de voz
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemberCounter: Send + Sync {
    async fn non_bot_members(&self, guild_id: GuildId, channel_id: ChannelId)
        -> anyhow::Result<usize>;
}

/// Fuente de la configuración por servidor; se consulta en cada operación
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GuildSettingsStore: Send + Sync {
    async fn guild_settings(&self, guild_id: GuildId) -> anyhow::Result<GuildSettings>;
}

/// Persistencia best-effort del estado de las colas
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save_snapshot(&self, snapshot: &QueueSnapshot) -> anyhow::Result<()>;

    async fn remove_snapshot(&self, guild_id: GuildId) -> anyhow::Result<()>;
}
