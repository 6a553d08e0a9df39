//! Process-wide registry of guild sessions.
//!
//! Each guild owns an `Arc<tokio::sync::Mutex<GuildSession>>`; every mutating
//! operation locks only that guild, so unrelated guilds never wait on each
//! other. A guild without an entry has nothing queued and nothing playing.

use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        controller::{GuildSession, NowPlayingEvent, PlaybackContext, PlaybackState},
        idle::IdleTimer,
        queue::{LoopMode, QueueSnapshot},
        track::Track,
        transport::{
            GuildSettingsStore, MemberCounter, PlaybackSignal, SnapshotStore, TrackOutcome,
            VoiceTransport,
        },
        vote::{required_votes, VoteOutcome},
    },
    error::{MusicError, Result},
    storage::GuildSettings,
};

type SessionGuard = (Arc<Mutex<GuildSession>>, OwnedMutexGuard<GuildSession>);

/// Resultado de `play`
#[derive(Debug, Clone)]
pub enum PlayOutcome {
    /// Se empezó a reproducir este track
    Started(Arc<Track>),
    /// Ya había algo sonando; el track quedó en la posición dada (base 1)
    Queued { position: usize },
    /// Ya había algo sonando y no se pidió track nuevo
    AlreadyPlaying,
    /// Todos los tracks disponibles fallaron y la cola quedó vacía
    Exhausted,
}

pub struct MusicManager {
    sessions: DashMap<GuildId, Arc<Mutex<GuildSession>>>,
    transport: Arc<dyn VoiceTransport>,
    settings: Arc<dyn GuildSettingsStore>,
    members: Arc<dyn MemberCounter>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    signals: mpsc::UnboundedSender<PlaybackSignal>,
    notifier: broadcast::Sender<NowPlayingEvent>,
    this: Weak<MusicManager>,
}

impl MusicManager {
    /// Crea el registro y lanza la tarea que procesa las señales de fin de
    /// track. Debe llamarse dentro de un runtime de Tokio.
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        settings: Arc<dyn GuildSettingsStore>,
        members: Arc<dyn MemberCounter>,
        snapshots: Option<Arc<dyn SnapshotStore>>,
    ) -> Arc<Self> {
        let (signals, mut rx) = mpsc::unbounded_channel::<PlaybackSignal>();
        let (notifier, _) = broadcast::channel(64);

        let manager = Arc::new_cyclic(|this| Self {
            sessions: DashMap::new(),
            transport,
            settings,
            members,
            snapshots,
            signals,
            notifier,
            this: this.clone(),
        });

        let weak = Arc::downgrade(&manager);
        tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                let Some(manager) = weak.upgrade() else { break };
                // Cada señal en su propia tarea: un servidor lento no frena a otro
                tokio::spawn(async move {
                    manager
                        .track_ended(signal.guild_id, signal.instance, signal.outcome)
                        .await;
                });
            }
            debug!("Bucle de señales de reproducción terminado");
        });

        manager
    }

    /// Suscripción a los cambios de "reproduciendo ahora"
    pub fn subscribe(&self) -> broadcast::Receiver<NowPlayingEvent> {
        self.notifier.subscribe()
    }

    /// Agrega un track a la cola sin iniciar la reproducción
    pub async fn enqueue(&self, guild_id: GuildId, track: Track) -> Result<usize> {
        let settings = self.settings(guild_id).await?;
        check_duration(&track, &settings)?;

        let (_, mut session) = self.lock_or_create(guild_id, settings.default_volume).await;
        let position = session.queue.enqueue(track, settings.max_queue_size)?;
        self.persist(&session).await;
        Ok(position)
    }

    /// Reproduce en `voice_channel`: arranca si está inactivo, si no encola
    pub async fn play(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: Option<ChannelId>,
        track: Option<Track>,
    ) -> Result<PlayOutcome> {
        let settings = self.settings(guild_id).await?;
        if let Some(track) = &track {
            check_duration(track, &settings)?;
        }

        let (arc, mut session) = self.lock_or_create(guild_id, settings.default_volume).await;

        if session.state() != PlaybackState::Idle {
            if session.queue.voice_channel() != Some(voice_channel) {
                return Err(MusicError::NotInVoice);
            }
            let outcome = match track {
                Some(track) => {
                    let position = session.queue.enqueue(track, settings.max_queue_size)?;
                    PlayOutcome::Queued { position }
                }
                None => PlayOutcome::AlreadyPlaying,
            };
            self.persist(&session).await;
            return Ok(outcome);
        }

        if session.queue.pending.is_empty() && track.is_none() {
            self.discard_if_empty(guild_id, &arc, &mut session);
            return Err(MusicError::NothingToPlay);
        }
        session.queue.bind(voice_channel, text_channel);

        let ctx = self.context();
        let result = session.play(&ctx, track).await;
        self.persist(&session).await;

        match result? {
            Some(track) => Ok(PlayOutcome::Started(track)),
            None => Ok(PlayOutcome::Exhausted),
        }
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<()> {
        let (_, mut session) = self.lock_existing(guild_id).await.ok_or(MusicError::NotPlaying)?;
        session.pause(&self.context())?;
        self.persist(&session).await;
        Ok(())
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<()> {
        let (_, mut session) = self.lock_existing(guild_id).await.ok_or(MusicError::NotPaused)?;
        session.resume(&self.context())?;
        self.persist(&session).await;
        Ok(())
    }

    /// Salta el track actual; devuelve el nuevo actual si lo hay
    pub async fn skip(&self, guild_id: GuildId) -> Result<Option<Arc<Track>>> {
        let (_, mut session) = self.lock_existing(guild_id).await.ok_or(MusicError::NotPlaying)?;
        let result = session.skip(&self.context()).await;
        self.persist(&session).await;
        result
    }

    /// Detiene todo, desconecta y elimina la sesión. Idempotente.
    pub async fn stop(&self, guild_id: GuildId) -> Result<()> {
        if let Some((arc, mut session)) = self.lock_existing(guild_id).await {
            self.stop_locked(guild_id, &arc, &mut session).await;
        }
        Ok(())
    }

    pub async fn remove_at(&self, guild_id: GuildId, index: usize) -> Result<Arc<Track>> {
        let (_, mut session) = self
            .lock_existing(guild_id)
            .await
            .ok_or(MusicError::IndexOutOfRange { index, len: 0 })?;
        let track = session.queue.remove_at(index)?;
        self.persist(&session).await;
        Ok(track)
    }

    pub async fn move_track(&self, guild_id: GuildId, from: usize, to: usize) -> Result<()> {
        let (_, mut session) = self
            .lock_existing(guild_id)
            .await
            .ok_or(MusicError::IndexOutOfRange { index: from, len: 0 })?;
        session.queue.move_track(from, to)?;
        self.persist(&session).await;
        Ok(())
    }

    pub async fn shuffle(&self, guild_id: GuildId) -> Result<()> {
        if let Some((_, mut session)) = self.lock_existing(guild_id).await {
            session.queue.shuffle();
            self.persist(&session).await;
        }
        Ok(())
    }

    /// Limpia los pendientes; devuelve cuántos se eliminaron
    pub async fn clear(&self, guild_id: GuildId) -> Result<usize> {
        let Some((_, mut session)) = self.lock_existing(guild_id).await else {
            return Ok(0);
        };
        let removed = session.queue.clear();
        self.persist(&session).await;
        Ok(removed)
    }

    /// Elimina los pendientes pedidos por `user_id`
    pub async fn remove_by_requester(&self, guild_id: GuildId, user_id: UserId) -> Result<usize> {
        let Some((_, mut session)) = self.lock_existing(guild_id).await else {
            return Ok(0);
        };
        let removed = session.queue.remove_by_requester(user_id);
        self.persist(&session).await;
        Ok(removed)
    }

    /// Ajusta el volumen de la sesión activa; el volumen inicial de una
    /// sesión nueva sale de `default_volume`
    pub async fn set_volume(&self, guild_id: GuildId, volume: i64) -> Result<u8> {
        let (_, mut session) = self.lock_existing(guild_id).await.ok_or(MusicError::NotPlaying)?;
        let volume = session.set_volume(volume);
        self.persist(&session).await;
        Ok(volume)
    }

    pub async fn set_loop_mode(&self, guild_id: GuildId, mode: LoopMode) -> Result<()> {
        let (_, mut session) = self.lock_existing(guild_id).await.ok_or(MusicError::NotPlaying)?;
        session.queue.set_loop_mode(mode);
        self.persist(&session).await;
        Ok(())
    }

    /// Registra un voto para saltar; salta si se alcanza el mínimo
    pub async fn add_vote(
        &self,
        guild_id: GuildId,
        voter: UserId,
        non_bot_members: usize,
    ) -> Result<VoteOutcome> {
        let settings = self.settings(guild_id).await?;
        if !settings.vote_skip_enabled {
            return Err(MusicError::VoteSkipDisabled);
        }

        let (_, mut session) = self.lock_existing(guild_id).await.ok_or(MusicError::NotPlaying)?;
        let instance = session.queue.current().ok_or(MusicError::NotPlaying)?.instance;

        let required = required_votes(non_bot_members, settings.vote_skip_threshold);
        let outcome = session.queue.ballot.cast(instance, voter, required);
        info!(
            "🗳️ Voto de {} en {}: {}/{}",
            voter,
            guild_id,
            outcome.votes(),
            outcome.required()
        );

        if outcome.voted() {
            info!("⏭️ Votación alcanzada en {}, saltando", guild_id);
            let result = session.skip(&self.context()).await;
            self.persist(&session).await;
            result?;
        }

        Ok(outcome)
    }

    /// Vista de sólo lectura de la cola
    pub async fn snapshot(&self, guild_id: GuildId) -> QueueSnapshot {
        match self.lock_existing(guild_id).await {
            Some((_, session)) => session.queue.snapshot(),
            None => QueueSnapshot::empty(guild_id),
        }
    }

    pub async fn bound_voice_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let (_, session) = self.lock_existing(guild_id).await?;
        session.queue.voice_channel()
    }

    /// Fin de audio reportado por el transporte
    pub async fn track_ended(&self, guild_id: GuildId, instance: u64, outcome: TrackOutcome) {
        let Some((_, mut session)) = self.lock_existing(guild_id).await else {
            return;
        };

        if let Err(e) = session.track_ended(&self.context(), instance, outcome).await {
            error!("Error al reproducir siguiente track en {}: {:?}", guild_id, e);
        }
        self.persist(&session).await;
    }

    /// Cambio de miembros en un canal de voz
    pub async fn on_voice_membership_changed(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        non_bot_members: usize,
    ) {
        let Some((_, mut session)) = self.lock_existing(guild_id).await else {
            return;
        };
        if session.queue.voice_channel() != Some(channel_id) {
            return;
        }
        self.evaluate_idle(guild_id, &mut session, non_bot_members).await;
    }

    /// El bot fue desconectado del canal de voz `left`.
    ///
    /// Un evento de un canal distinto al vinculado llega tarde (la llamada ya
    /// se movió) y se ignora. Sin canal de origen conocido se detiene igual.
    pub async fn on_bot_disconnected(&self, guild_id: GuildId, left: Option<ChannelId>) {
        let Some((arc, mut session)) = self.lock_existing(guild_id).await else {
            return;
        };
        if let (Some(left), Some(bound)) = (left, session.queue.voice_channel()) {
            if left != bound {
                debug!("Salida obsoleta del canal {} en {} ignorada", left, guild_id);
                return;
            }
        }
        info!("🔌 Bot desconectado en {}", guild_id);
        self.stop_locked(guild_id, &arc, &mut session).await;
    }

    /// El bot fue movido a `channel_id`; se revincula y se reevalúa la
    /// inactividad con los miembros del canal nuevo, si se conocen
    pub async fn on_bot_moved(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        non_bot_members: Option<usize>,
    ) {
        let Some((_, mut session)) = self.lock_existing(guild_id).await else {
            return;
        };
        if !session.moved_to(channel_id) {
            return;
        }
        if let Some(timer) = session.queue.idle_timer.take() {
            timer.cancel();
        }
        if let Some(count) = non_bot_members {
            self.evaluate_idle(guild_id, &mut session, count).await;
        }
        self.persist(&session).await;
    }

    /// Arma o cancela el temporizador de inactividad según los miembros
    async fn evaluate_idle(&self, guild_id: GuildId, session: &mut GuildSession, non_bot_members: usize) {
        if non_bot_members > 0 {
            if let Some(timer) = session.queue.idle_timer.take() {
                info!("👥 Usuarios de vuelta en {}, cancelando auto-desconexión", guild_id);
                timer.cancel();
            }
            return;
        }

        if session.queue.idle_timer.is_some() {
            return;
        }

        let settings = match self.settings(guild_id).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("No se pudo leer la configuración de {}: {}", guild_id, e);
                return;
            }
        };
        if !settings.auto_leave || settings.always_on {
            debug!("Auto-desconexión desactivada en {}", guild_id);
            return;
        }

        let token = session.queue.next_timer_token();
        let this = self.this.clone();
        let timer = IdleTimer::arm(token, settings.idle_timeout(), async move {
            if let Some(manager) = this.upgrade() {
                manager.idle_timer_fired(guild_id, token).await;
            }
        });
        info!(
            "🚪 Programando auto-desconexión en {} dentro de {:?}",
            guild_id,
            timer.delay()
        );
        session.queue.idle_timer = Some(timer);
    }

    async fn idle_timer_fired(&self, guild_id: GuildId, token: u64) {
        let Some((arc, mut session)) = self.lock_existing(guild_id).await else {
            return;
        };

        match session.queue.idle_timer.take() {
            Some(timer) if timer.token() == token => timer.release(),
            other => {
                session.queue.idle_timer = other;
                return;
            }
        }

        let Some(channel_id) = session.queue.voice_channel() else {
            return;
        };
        match self.members.non_bot_members(guild_id, channel_id).await {
            Ok(0) => {
                info!("🚪 Canal vacío en {}, desconectando por inactividad", guild_id);
                self.stop_locked(guild_id, &arc, &mut session).await;
            }
            Ok(count) => debug!("{} usuarios en el canal de {}, se mantiene", count, guild_id),
            Err(e) => error!("Error al contar miembros en {}: {:?}", guild_id, e),
        }
    }

    async fn stop_locked(
        &self,
        guild_id: GuildId,
        arc: &Arc<Mutex<GuildSession>>,
        session: &mut GuildSession,
    ) {
        session.stop(&self.context()).await;
        session.close();
        self.sessions.remove_if(&guild_id, |_, existing| Arc::ptr_eq(existing, arc));

        if let Some(store) = &self.snapshots {
            if let Err(e) = store.remove_snapshot(guild_id).await {
                warn!("No se pudo eliminar el snapshot de {}: {}", guild_id, e);
            }
        }
    }

    /// Quita del registro una sesión recién creada que quedó sin nada
    fn discard_if_empty(&self, guild_id: GuildId, arc: &Arc<Mutex<GuildSession>>, session: &mut GuildSession) {
        if session.is_connected() || session.queue.current().is_some() || !session.queue.is_empty() {
            return;
        }
        session.close();
        self.sessions.remove_if(&guild_id, |_, existing| Arc::ptr_eq(existing, arc));
    }

    fn context(&self) -> PlaybackContext<'_> {
        PlaybackContext {
            transport: self.transport.as_ref(),
            signals: &self.signals,
            notifier: &self.notifier,
        }
    }

    async fn settings(&self, guild_id: GuildId) -> Result<GuildSettings> {
        self.settings
            .guild_settings(guild_id)
            .await
            .map_err(|e| MusicError::Settings(e.to_string()))
    }

    async fn persist(&self, session: &GuildSession) {
        let Some(store) = &self.snapshots else {
            return;
        };
        if let Err(e) = store.save_snapshot(&session.queue.snapshot()).await {
            warn!("No se pudo guardar el snapshot de {}: {}", session.queue.guild_id(), e);
        }
    }

    /// Bloquea la sesión del servidor, creándola con `volume` si no existe
    async fn lock_or_create(&self, guild_id: GuildId, volume: u8) -> SessionGuard {
        loop {
            let arc = self
                .sessions
                .entry(guild_id)
                .or_insert_with(|| {
                    let mut session = GuildSession::new(guild_id);
                    session.queue.set_volume(i64::from(volume));
                    Arc::new(Mutex::new(session))
                })
                .clone();
            let guard = arc.clone().lock_owned().await;
            if !guard.is_closed() {
                return (arc, guard);
            }
            self.sessions.remove_if(&guild_id, |_, existing| Arc::ptr_eq(existing, &arc));
        }
    }

    async fn lock_existing(&self, guild_id: GuildId) -> Option<SessionGuard> {
        let arc = self.sessions.get(&guild_id)?.clone();
        let guard = arc.clone().lock_owned().await;
        if guard.is_closed() {
            return None;
        }
        Some((arc, guard))
    }
}

fn check_duration(track: &Track, settings: &GuildSettings) -> Result<()> {
    let (Some(duration), Some(max)) = (track.duration(), settings.max_track_duration()) else {
        return Ok(());
    };
    if duration > max {
        return Err(MusicError::TrackTooLong { duration, max });
    }
    Ok(())
}
