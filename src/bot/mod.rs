//! # Bot Module
//!
//! Discord front end for the playback engine.
//!
//! This module contains:
//! - Command registration and dispatch
//! - Voice state tracking (membership changes, bot disconnects)
//! - The now-playing announcer
//!
//! ## Architecture
//!
//! [`OpenMusicBot`] implements Serenity's [`EventHandler`] trait and
//! forwards everything to the shared [`MusicManager`]. It never touches
//! Songbird directly; voice connections belong to the manager's transport.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Http, Interaction, Ready, VoiceState},
    async_trait,
    builder::CreateMessage,
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;
pub mod voice;

use crate::{
    audio::{
        controller::{NowPlayingEvent, PlaybackState},
        manager::MusicManager,
        track::Track,
    },
    config::Config,
    sources::TrackResolver,
    storage::JsonStorage,
    ui::embeds,
};

/// Main Discord bot handler.
///
/// ## Fields
///
/// - `config`: Bot configuration (tokens, defaults)
/// - `storage`: Per-guild settings, read for DJ checks
/// - `manager`: Registry of per-guild playback sessions
/// - `resolver`: Turns `/play` queries into tracks
pub struct OpenMusicBot {
    config: Arc<Config>,
    pub storage: Arc<JsonStorage>,
    pub manager: Arc<MusicManager>,
    pub resolver: TrackResolver,
    announcer_started: AtomicBool,
}

impl OpenMusicBot {
    pub fn new(config: Config, storage: Arc<JsonStorage>, manager: Arc<MusicManager>) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            manager,
            resolver: TrackResolver::new(),
            announcer_started: AtomicBool::new(false),
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Guild commands propagate in about a second and are meant for
    /// development; global commands can take up to an hour.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for OpenMusicBot {
    /// Registers commands and starts the now-playing announcer once.
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        // `ready` se repite en cada reconexión
        if !self.announcer_started.swap(true, Ordering::SeqCst) {
            let rx = self.manager.subscribe();
            tokio::spawn(announce_now_playing(ctx.http.clone(), rx));
        }
    }

    /// Dispatches slash commands and button clicks. Errors are logged, never
    /// propagated into the gateway loop.
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component) => {
                if let Err(e) = handlers::handle_component(&ctx, component, self).await {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Feeds voice membership changes into the idle reclaimer.
    ///
    /// - **Bot disconnected**: the guild's session is torn down, unless the
    ///   event is for a channel the call already left
    /// - **Bot moved**: the session is rebound to the new channel
    /// - **Anyone joins/leaves the bound channel**: the manager re-evaluates
    ///   whether the channel is empty
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        let current_user_id = ctx.cache.current_user().id;
        let old_channel = old.as_ref().and_then(|state| state.channel_id);
        if new.user_id == current_user_id {
            match new.channel_id {
                None => self.manager.on_bot_disconnected(guild_id, old_channel).await,
                Some(channel) if old_channel != Some(channel) => {
                    let count = voice::count_non_bot_members(&ctx.cache, guild_id, channel);
                    self.manager.on_bot_moved(guild_id, channel, count).await;
                }
                Some(_) => {}
            }
            return;
        }

        let Some(bound) = self.manager.bound_voice_channel(guild_id).await else {
            return;
        };
        if old_channel != Some(bound) && new.channel_id != Some(bound) {
            return;
        }

        let Some(count) = voice::count_non_bot_members(&ctx.cache, guild_id, bound) else {
            debug!("Guild {} no está en caché, ignorando cambio de voz", guild_id);
            return;
        };
        debug!("👥 {} usuarios en el canal {} de {}", count, bound, guild_id);
        self.manager.on_voice_membership_changed(guild_id, bound, count).await;
    }
}

/// Anuncia cada canción nueva en el canal de texto vinculado
async fn announce_now_playing(http: Arc<Http>, mut rx: broadcast::Receiver<NowPlayingEvent>) {
    let mut announced: HashMap<GuildId, Arc<Track>> = HashMap::new();

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Anunciador atrasado, {} eventos descartados", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if !should_announce(&mut announced, &event) {
            continue;
        }

        let (Some(channel), Some(track)) = (event.text_channel, event.track.as_deref()) else {
            continue;
        };

        let message = CreateMessage::new().embed(embeds::create_now_playing_embed(track, None));
        if let Err(e) = channel.send_message(&*http, message).await {
            warn!("No se pudo anunciar en {}: {:?}", channel, e);
        }
    }

    debug!("Anunciador de canciones terminado");
}

/// Sólo se anuncian tracks nuevos; pausa y reanudación no
fn should_announce(announced: &mut HashMap<GuildId, Arc<Track>>, event: &NowPlayingEvent) -> bool {
    match (&event.track, event.state) {
        (Some(track), PlaybackState::Playing) => {
            let is_new = announced
                .get(&event.guild_id)
                .map_or(true, |last| !Arc::ptr_eq(last, track));
            if is_new {
                announced.insert(event.guild_id, track.clone());
            }
            is_new
        }
        (None, _) => {
            announced.remove(&event.guild_id);
            false
        }
        _ => false,
    }
}
