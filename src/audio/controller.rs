//! Playback state machine for a single guild.
//!
//! ```text
//! Idle ──play──▶ Playing ◀──resume── Paused
//!                  │  └──────pause──────▲
//!        skip/end  ▼
//!              Advancing ──▶ Playing | Idle
//! ```
//!
//! The pure transitions live on [`GuildQueue`]; [`GuildSession`] pairs the
//! queue with the voice connection and the running playback handle and
//! performs the side effects through [`PlaybackContext`].

use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        queue::{CurrentTrack, GuildQueue, LoopMode},
        track::Track,
        transport::{
            PlaybackHandle, PlaybackSignal, SignalSink, TrackOutcome, VoiceConnection,
            VoiceTransport,
        },
    },
    error::{MusicError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
    Advancing,
}

impl PlaybackState {
    /// `Paused` también cuenta como reproduciendo
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

/// Motivo por el que se abandona el track actual
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceReason {
    Completed,
    Skipped,
    /// El track no se pudo reproducir; se descarta sin importar el loop
    Unplayable,
}

/// Notificación de cambio de "reproduciendo ahora"
#[derive(Debug, Clone)]
pub struct NowPlayingEvent {
    pub guild_id: GuildId,
    pub text_channel: Option<ChannelId>,
    pub track: Option<Arc<Track>>,
    pub state: PlaybackState,
}

impl GuildQueue {
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Convierte un track en el actual con una instancia nueva
    pub(crate) fn promote(&mut self, track: Arc<Track>) -> CurrentTrack {
        self.ballot.clear();
        let current = CurrentTrack { track, instance: self.next_instance() };
        self.current = Some(current.clone());
        current
    }

    /// Decide el siguiente track según el modo de repetición
    pub(crate) fn advance(&mut self, reason: AdvanceReason) -> Option<CurrentTrack> {
        self.state = PlaybackState::Advancing;
        self.ballot.clear();

        if let Some(finished) = self.current.take() {
            match (reason, self.loop_mode()) {
                (AdvanceReason::Unplayable, _) => {
                    warn!("⏭️ Descartando track no reproducible: {}", finished.track.title());
                }
                (_, LoopMode::Track) => {
                    info!("🔂 Repitiendo track: {}", finished.track.title());
                    return Some(self.promote(finished.track));
                }
                (_, LoopMode::Queue) => {
                    debug!("🔁 Track devuelto al final por loop de cola: {}", finished.track.title());
                    self.pending.push_back(finished.track);
                }
                (_, LoopMode::Off) => {}
            }
        }

        match self.pending.pop_front() {
            Some(next) => {
                info!("➡️ Siguiente en cola: {}", next.title());
                Some(self.promote(next))
            }
            None => {
                info!("📭 Cola vacía en {}, sin siguiente track", self.guild_id());
                self.state = PlaybackState::Idle;
                None
            }
        }
    }

    /// Devuelve el actual al frente de los pendientes (fallo de conexión)
    pub(crate) fn requeue_current(&mut self) {
        if let Some(current) = self.current.take() {
            self.pending.push_front(current.track);
        }
        self.ballot.clear();
        self.state = PlaybackState::Idle;
    }

    /// Limpia todo el estado de reproducción
    pub(crate) fn reset(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.cancel();
        }
        self.ballot.clear();
        self.pending.clear();
        self.current = None;
        self.state = PlaybackState::Idle;
    }
}

/// Dependencias que el controlador necesita para producir efectos
pub struct PlaybackContext<'a> {
    pub transport: &'a dyn VoiceTransport,
    pub signals: &'a mpsc::UnboundedSender<PlaybackSignal>,
    pub notifier: &'a broadcast::Sender<NowPlayingEvent>,
}

/// Cola más conexión de voz de un servidor
pub struct GuildSession {
    pub(crate) queue: GuildQueue,
    connection: Option<Box<dyn VoiceConnection>>,
    playback: Option<Box<dyn PlaybackHandle>>,
    closed: bool,
}

impl GuildSession {
    pub fn new(guild_id: GuildId) -> Self {
        Self { queue: GuildQueue::new(guild_id), connection: None, playback: None, closed: false }
    }

    pub fn state(&self) -> PlaybackState {
        self.queue.state
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    /// Inicia la reproducción desde `Idle`.
    ///
    /// Con `track` se reproduce ese track; sin él, el primero de la cola.
    pub async fn play(
        &mut self,
        ctx: &PlaybackContext<'_>,
        track: Option<Track>,
    ) -> Result<Option<Arc<Track>>> {
        if self.queue.state != PlaybackState::Idle {
            return Ok(self.queue.current().map(|c| c.track.clone()));
        }

        let next = match track {
            Some(track) => Arc::new(track),
            None => self.queue.pending.pop_front().ok_or(MusicError::NothingToPlay)?,
        };
        self.queue.promote(next);
        self.start_current(ctx).await?;

        Ok(self.queue.current().map(|c| c.track.clone()))
    }

    pub fn pause(&mut self, ctx: &PlaybackContext<'_>) -> Result<()> {
        if self.queue.state != PlaybackState::Playing {
            return Err(MusicError::NotPlaying);
        }
        if let Some(playback) = &self.playback {
            playback.pause();
        }
        self.queue.state = PlaybackState::Paused;
        info!("⏸️ Reproducción pausada en {}", self.queue.guild_id());
        self.announce(ctx);
        Ok(())
    }

    pub fn resume(&mut self, ctx: &PlaybackContext<'_>) -> Result<()> {
        if self.queue.state != PlaybackState::Paused {
            return Err(MusicError::NotPaused);
        }
        if let Some(playback) = &self.playback {
            playback.resume();
        }
        self.queue.state = PlaybackState::Playing;
        info!("▶️ Reproducción reanudada en {}", self.queue.guild_id());
        self.announce(ctx);
        Ok(())
    }

    /// Salta el track actual; devuelve el nuevo actual si lo hay
    pub async fn skip(&mut self, ctx: &PlaybackContext<'_>) -> Result<Option<Arc<Track>>> {
        if !self.queue.state.is_playing() {
            return Err(MusicError::NotPlaying);
        }

        self.stop_playback();
        self.queue.advance(AdvanceReason::Skipped);
        self.start_current(ctx).await?;

        Ok(self.queue.current().map(|c| c.track.clone()))
    }

    /// Procesa el fin de audio de la instancia `instance`
    pub async fn track_ended(
        &mut self,
        ctx: &PlaybackContext<'_>,
        instance: u64,
        outcome: TrackOutcome,
    ) -> Result<()> {
        if self.queue.current().map(|c| c.instance) != Some(instance) {
            debug!("Señal obsoleta para instancia {} ignorada", instance);
            return Ok(());
        }

        self.playback = None;
        let reason = match outcome {
            TrackOutcome::Finished => AdvanceReason::Completed,
            TrackOutcome::Errored(reason) => {
                warn!("❌ Error en track de {}: {}", self.queue.guild_id(), reason);
                AdvanceReason::Unplayable
            }
        };

        self.queue.advance(reason);
        self.start_current(ctx).await
    }

    /// Detiene todo y desconecta. Idempotente.
    pub async fn stop(&mut self, ctx: &PlaybackContext<'_>) {
        let was_active = self.queue.state != PlaybackState::Idle || self.connection.is_some();

        self.stop_playback();
        self.queue.reset();
        if let Some(connection) = self.connection.take() {
            connection.disconnect().await;
        }

        if was_active {
            info!("⏹️ Reproducción detenida en {}", self.queue.guild_id());
            self.announce(ctx);
        }
    }

    /// El bot fue movido a otro canal desde fuera
    pub(crate) fn moved_to(&mut self, channel_id: ChannelId) -> bool {
        if self.queue.voice_channel() == Some(channel_id) {
            return false;
        }
        self.queue.bind(channel_id, None);
        if let Some(connection) = self.connection.as_mut() {
            connection.relocate(channel_id);
        }
        info!("🔀 Bot movido al canal {} en {}", channel_id, self.queue.guild_id());
        true
    }

    pub fn set_volume(&mut self, volume: i64) -> u8 {
        let volume = self.queue.set_volume(volume);
        if let Some(playback) = &self.playback {
            playback.set_volume(volume);
        }
        info!("🔊 Volumen ajustado a {}% en {}", volume, self.queue.guild_id());
        volume
    }

    fn stop_playback(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.stop();
        }
    }

    /// Arranca el track actual, saltando los que no se pueden reproducir
    async fn start_current(&mut self, ctx: &PlaybackContext<'_>) -> Result<()> {
        loop {
            let Some(current) = self.queue.current().cloned() else {
                self.queue.state = PlaybackState::Idle;
                self.announce(ctx);
                return Ok(());
            };

            if let Err(e) = self.ensure_connected(ctx).await {
                self.queue.requeue_current();
                return Err(e);
            }

            let sink = SignalSink::new(ctx.signals.clone(), self.queue.guild_id(), current.instance);
            let result = match self.connection.as_deref() {
                Some(connection) => connection.stream(&current.track, self.queue.volume(), sink).await,
                None => Err(MusicError::NotInVoice),
            };

            match result {
                Ok(playback) => {
                    self.playback = Some(playback);
                    self.queue.state = PlaybackState::Playing;
                    info!("🎵 Reproduciendo en {}: {}", self.queue.guild_id(), current.track.title());
                    self.announce(ctx);
                    return Ok(());
                }
                Err(MusicError::TrackUnplayable(reason)) => {
                    warn!("⚠️ No se pudo reproducir {}: {}", current.track.title(), reason);
                    self.queue.advance(AdvanceReason::Unplayable);
                }
                Err(e) => {
                    self.queue.requeue_current();
                    return Err(e);
                }
            }
        }
    }

    async fn ensure_connected(&mut self, ctx: &PlaybackContext<'_>) -> Result<()> {
        let channel = self.queue.voice_channel().ok_or(MusicError::NotInVoice)?;

        if let Some(connection) = &self.connection {
            if connection.channel_id() == channel {
                return Ok(());
            }
            // `connect` mueve la llamada existente sin desconectarla
            debug!("Moviendo la conexión de {} a {}", connection.channel_id(), channel);
        }

        let connection = ctx.transport.connect(self.queue.guild_id(), channel).await?;
        info!("🔊 Conectado al canal de voz {} en {}", channel, self.queue.guild_id());
        self.connection = Some(connection);
        Ok(())
    }

    fn announce(&self, ctx: &PlaybackContext<'_>) {
        let event = NowPlayingEvent {
            guild_id: self.queue.guild_id(),
            text_channel: self.queue.text_channel(),
            track: self.queue.current().map(|c| c.track.clone()),
            state: self.queue.state,
        };
        // Sin suscriptores no hay nada que anunciar
        let _ = ctx.notifier.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{testing::FakeTransport, track::Requester};
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn track(title: &str) -> Track {
        Track::new(
            title,
            format!("https://example.com/{}.mp3", title),
            Requester::User { id: UserId::new(5), tag: "user".into() },
        )
        .with_duration_secs(200)
    }

    struct Harness {
        transport: FakeTransport,
        signals: mpsc::UnboundedSender<PlaybackSignal>,
        _rx: mpsc::UnboundedReceiver<PlaybackSignal>,
        notifier: broadcast::Sender<NowPlayingEvent>,
    }

    impl Harness {
        fn new() -> Self {
            let (signals, rx) = mpsc::unbounded_channel();
            let (notifier, _) = broadcast::channel(16);
            Self { transport: FakeTransport::default(), signals, _rx: rx, notifier }
        }

        fn ctx(&self) -> PlaybackContext<'_> {
            PlaybackContext { transport: &self.transport, signals: &self.signals, notifier: &self.notifier }
        }
    }

    fn session_with(names: &[&str]) -> GuildSession {
        let mut session = GuildSession::new(GuildId::new(1));
        session.queue.bind(ChannelId::new(100), Some(ChannelId::new(200)));
        for name in names {
            session.queue.enqueue(track(name), 100).unwrap();
        }
        session
    }

    fn current_title(session: &GuildSession) -> Option<String> {
        session.queue.current().map(|c| c.track.title().to_string())
    }

    #[tokio::test]
    async fn test_play_with_empty_queue_fails() {
        let harness = Harness::new();
        let mut session = session_with(&[]);

        let err = session.play(&harness.ctx(), None).await.unwrap_err();
        assert_eq!(err, MusicError::NothingToPlay);
        assert_eq!(session.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_play_promotes_front() {
        let harness = Harness::new();
        let mut session = session_with(&["a", "b"]);

        session.play(&harness.ctx(), None).await.unwrap();

        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(current_title(&session).as_deref(), Some("a"));
        assert_eq!(session.queue.len(), 1);
        assert_eq!(harness.transport.log().connects, 1);
        assert_eq!(harness.transport.log().streamed, vec!["a"]);
    }

    #[tokio::test]
    async fn test_pause_resume_transitions() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let mut session = session_with(&["a"]);

        assert_eq!(session.pause(&ctx).unwrap_err(), MusicError::NotPlaying);
        session.play(&ctx, None).await.unwrap();

        assert_eq!(session.resume(&ctx).unwrap_err(), MusicError::NotPaused);
        session.pause(&ctx).unwrap();
        assert_eq!(session.state(), PlaybackState::Paused);
        assert_eq!(session.pause(&ctx).unwrap_err(), MusicError::NotPlaying);

        session.resume(&ctx).unwrap();
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(harness.transport.log().controls, vec!["pause", "resume"]);
    }

    #[tokio::test]
    async fn test_loop_track_repeats_on_skip() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let mut session = session_with(&["a", "b"]);
        session.queue.set_loop_mode(LoopMode::Track);
        session.play(&ctx, None).await.unwrap();

        for _ in 0..5 {
            session.skip(&ctx).await.unwrap();
            assert_eq!(current_title(&session).as_deref(), Some("a"));
        }
        assert_eq!(session.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_loop_queue_with_single_track_never_idles() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let mut session = session_with(&["only"]);
        session.queue.set_loop_mode(LoopMode::Queue);
        session.play(&ctx, None).await.unwrap();

        for _ in 0..4 {
            let instance = session.queue.current().unwrap().instance;
            session.track_ended(&ctx, instance, TrackOutcome::Finished).await.unwrap();
            assert_eq!(session.state(), PlaybackState::Playing);
            assert_eq!(current_title(&session).as_deref(), Some("only"));
            assert_eq!(session.queue.len(), 0);
        }
    }

    #[tokio::test]
    async fn test_loop_queue_appends_finished_track_once() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let mut session = session_with(&["a", "b", "c"]);
        session.queue.set_loop_mode(LoopMode::Queue);
        session.play(&ctx, None).await.unwrap();

        let instance = session.queue.current().unwrap().instance;
        session.track_ended(&ctx, instance, TrackOutcome::Finished).await.unwrap();

        let pending: Vec<&str> = session.queue.pending.iter().map(|t| t.title()).collect();
        assert_eq!(pending, vec!["c", "a"]);
        assert_eq!(current_title(&session).as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_completion_with_loop_off_reaches_idle() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let mut session = session_with(&["a"]);
        session.play(&ctx, None).await.unwrap();

        let instance = session.queue.current().unwrap().instance;
        session.track_ended(&ctx, instance, TrackOutcome::Finished).await.unwrap();

        assert_eq!(session.state(), PlaybackState::Idle);
        assert!(session.queue.current().is_none());
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_stale_end_signal_is_ignored() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let mut session = session_with(&["a", "b", "c"]);
        session.play(&ctx, None).await.unwrap();

        let stale = session.queue.current().unwrap().instance;
        session.skip(&ctx).await.unwrap();
        session.track_ended(&ctx, stale, TrackOutcome::Finished).await.unwrap();

        assert_eq!(current_title(&session).as_deref(), Some("b"));
        assert_eq!(session.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_unplayable_tracks_are_skipped() {
        let harness = Harness::new();
        harness.transport.mark_unplayable("https://example.com/bad.mp3");
        let ctx = harness.ctx();
        let mut session = session_with(&["bad", "good"]);
        session.queue.set_loop_mode(LoopMode::Track);

        session.play(&ctx, None).await.unwrap();

        assert_eq!(current_title(&session).as_deref(), Some("good"));
        assert_eq!(session.queue.len(), 0);
    }

    #[tokio::test]
    async fn test_stream_error_mid_track_advances() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let mut session = session_with(&["a", "b"]);
        session.queue.set_loop_mode(LoopMode::Queue);
        session.play(&ctx, None).await.unwrap();

        let instance = session.queue.current().unwrap().instance;
        session
            .track_ended(&ctx, instance, TrackOutcome::Errored("decoder".into()))
            .await
            .unwrap();

        assert_eq!(current_title(&session).as_deref(), Some("b"));
        assert_eq!(session.queue.len(), 0);
    }

    #[tokio::test]
    async fn test_connection_failure_requeues_track() {
        let harness = Harness::new();
        harness.transport.fail_connections();
        let ctx = harness.ctx();
        let mut session = session_with(&["a"]);

        let err = session.play(&ctx, None).await.unwrap_err();
        assert!(matches!(err, MusicError::Connection(_)));
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let harness = Harness::new();
        let ctx = harness.ctx();
        let mut session = session_with(&["a", "b"]);
        session.play(&ctx, None).await.unwrap();

        session.stop(&ctx).await;
        assert_eq!(session.state(), PlaybackState::Idle);
        assert!(session.queue.is_empty());
        assert!(!session.is_connected());

        session.stop(&ctx).await;
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(harness.transport.log().disconnects, 1);
    }

    #[tokio::test]
    async fn test_announces_state_changes() {
        let harness = Harness::new();
        let mut events = harness.notifier.subscribe();
        let ctx = harness.ctx();
        let mut session = session_with(&["a"]);

        session.play(&ctx, None).await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.state, PlaybackState::Playing);
        assert_eq!(event.track.map(|t| t.title().to_string()).as_deref(), Some("a"));
        assert_eq!(event.text_channel, Some(ChannelId::new(200)));
    }
}
