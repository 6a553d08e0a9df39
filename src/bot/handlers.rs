use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::{CommandInteraction, ComponentInteraction},
        guild::Member,
        id::{ChannelId, GuildId, RoleId, UserId},
        permissions::Permissions,
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::{manager::PlayOutcome, queue::LoopMode, track::Requester},
    bot::{voice, OpenMusicBot},
    error::MusicError,
    storage::GuildSettings,
    ui::{
        buttons::{self, button_ids},
        embeds,
    },
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenMusicBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await?,
        "voteskip" => handle_voteskip(ctx, &command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await?,
        "shuffle" => handle_shuffle(ctx, &command, bot, guild_id).await?,
        "loop" => handle_loop(ctx, &command, bot, guild_id).await?,
        "volume" => handle_volume(ctx, &command, bot, guild_id).await?,
        "remove" => handle_remove(ctx, &command, bot, guild_id).await?,
        "move" => handle_move(ctx, &command, bot, guild_id).await?,
        "clear" => handle_clear(ctx, &command, bot, guild_id).await?,
        "settings" => handle_settings(ctx, &command, bot, guild_id).await?,
        _ => reply(ctx, &command, "❌ Comando no reconocido", true).await?,
    }

    Ok(())
}

/// Maneja interacciones con botones
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &OpenMusicBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Componente usado fuera de un servidor"))?;
    let custom_id = component.data.custom_id.as_str();

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        custom_id, component.user.name, guild_id
    );

    if let Some(page) = buttons::parse_queue_page(custom_id) {
        let snapshot = bot.manager.snapshot(guild_id).await;
        let response = CreateInteractionResponseMessage::new()
            .embed(embeds::create_queue_embed(&snapshot, page))
            .components(buttons::create_queue_buttons(&snapshot, page, embeds::QUEUE_PAGE_SIZE));
        component
            .create_response(&ctx.http, CreateInteractionResponse::UpdateMessage(response))
            .await?;
        return Ok(());
    }

    let user_id = component.user.id;
    let message = match run_component(ctx, bot, guild_id, user_id, component.member.as_ref(), custom_id).await {
        Ok(message) => message,
        Err(e) => e.user_message(),
    };

    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(message)
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

async fn run_component(
    ctx: &Context,
    bot: &OpenMusicBot,
    guild_id: GuildId,
    user_id: UserId,
    member: Option<&Member>,
    custom_id: &str,
) -> Result<String, MusicError> {
    ensure_same_channel(ctx, bot, guild_id, user_id).await?;

    match custom_id {
        button_ids::PLAY_PAUSE => {
            if bot.manager.snapshot(guild_id).await.paused {
                bot.manager.resume(guild_id).await?;
                Ok("▶️ Reproducción reanudada".to_string())
            } else {
                bot.manager.pause(guild_id).await?;
                Ok("⏸️ Reproducción pausada".to_string())
            }
        }
        button_ids::SKIP => {
            ensure_dj(bot, guild_id, member).await?;
            bot.manager.skip(guild_id).await?;
            Ok("⏭️ Canción saltada".to_string())
        }
        button_ids::VOTE_SKIP => {
            let outcome = vote(ctx, bot, guild_id, user_id).await?;
            Ok(format!("🗳️ Votos: {}/{}", outcome.votes().min(outcome.required()), outcome.required()))
        }
        button_ids::STOP => {
            ensure_dj(bot, guild_id, member).await?;
            bot.manager.stop(guild_id).await?;
            Ok("⏹️ Reproducción detenida y cola limpiada".to_string())
        }
        button_ids::LOOP => {
            let mode = buttons::next_loop_mode(bot.manager.snapshot(guild_id).await.loop_mode);
            bot.manager.set_loop_mode(guild_id, mode).await?;
            Ok(format!(
                "{} Repetición: {}",
                embeds::loop_mode_emoji(mode),
                embeds::loop_mode_label(mode)
            ))
        }
        button_ids::SHUFFLE => {
            bot.manager.shuffle(guild_id).await?;
            Ok("🔀 Cola mezclada".to_string())
        }
        _ => Ok("❌ Acción no reconocida".to_string()),
    }
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = string_option(command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    let Some(voice_channel_id) = voice::user_voice_channel(&ctx.cache, guild_id, command.user.id)
    else {
        return reply(ctx, command, "❌ Debes estar en un canal de voz", true).await;
    };

    // Defer la respuesta ya que yt-dlp puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let requester = Requester::User {
        id: command.user.id,
        tag: command.user.tag(),
    };
    let track = match bot.resolver.resolve(query, requester).await {
        Ok(track) => track,
        Err(e) => {
            warn!("No se pudo resolver '{}': {:?}", query, e);
            command
                .edit_response(
                    &ctx.http,
                    EditInteractionResponse::new().content(format!("❌ No se encontraron resultados: {}", e)),
                )
                .await?;
            return Ok(());
        }
    };

    let response = match bot
        .manager
        .play(guild_id, voice_channel_id, Some(command.channel_id), Some(track))
        .await
    {
        Ok(PlayOutcome::Started(track)) => {
            let snapshot = bot.manager.snapshot(guild_id).await;
            EditInteractionResponse::new().embed(embeds::create_now_playing_embed(&track, Some(&snapshot)))
        }
        Ok(PlayOutcome::Queued { position }) => {
            let snapshot = bot.manager.snapshot(guild_id).await;
            match snapshot.pending.get(position.saturating_sub(1)) {
                Some(track) => EditInteractionResponse::new()
                    .embed(embeds::create_track_added_embed(track, position)),
                None => EditInteractionResponse::new().content(format!("✅ Agregada en la posición #{}", position)),
            }
        }
        Ok(PlayOutcome::AlreadyPlaying) => EditInteractionResponse::new().content("▶️ Ya hay música sonando"),
        Ok(PlayOutcome::Exhausted) => EditInteractionResponse::new()
            .content(MusicError::TrackUnplayable(query.to_string()).user_message()),
        Err(e) => EditInteractionResponse::new().content(e.user_message()),
    };

    command.edit_response(&ctx.http, response).await?;
    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let result: Result<_, MusicError> = async {
        ensure_same_channel(ctx, bot, guild_id, command.user.id).await?;
        bot.manager.pause(guild_id).await
    }
    .await;

    respond_result(ctx, command, result.map(|_| "⏸️ Reproducción pausada".to_string())).await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let result: Result<_, MusicError> = async {
        ensure_same_channel(ctx, bot, guild_id, command.user.id).await?;
        bot.manager.resume(guild_id).await
    }
    .await;

    respond_result(ctx, command, result.map(|_| "▶️ Reproducción reanudada".to_string())).await
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let result: Result<_, MusicError> = async {
        ensure_same_channel(ctx, bot, guild_id, command.user.id).await?;
        ensure_dj(bot, guild_id, command.member.as_deref()).await?;
        bot.manager.skip(guild_id).await
    }
    .await;

    let result = result.map(|next| match next {
        Some(track) => format!("⏭️ Saltada. Ahora suena: **{}**", track.title()),
        None => "⏭️ Saltada. No quedan canciones en la cola".to_string(),
    });
    respond_result(ctx, command, result).await
}

async fn handle_voteskip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    match vote(ctx, bot, guild_id, command.user.id).await {
        Ok(outcome) => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new().embed(embeds::create_vote_embed(&outcome)),
                    ),
                )
                .await?;
            Ok(())
        }
        Err(e) => reply(ctx, command, &e.user_message(), true).await,
    }
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let result: Result<_, MusicError> = async {
        ensure_same_channel(ctx, bot, guild_id, command.user.id).await?;
        ensure_dj(bot, guild_id, command.member.as_deref()).await?;
        bot.manager.stop(guild_id).await
    }
    .await;

    respond_result(
        ctx,
        command,
        result.map(|_| "⏹️ Reproducción detenida y cola limpiada".to_string()),
    )
    .await
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let page = int_option(command, "page").unwrap_or(1).max(1) as usize;
    let snapshot = bot.manager.snapshot(guild_id).await;

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_queue_embed(&snapshot, page))
                    .components(buttons::create_queue_buttons(&snapshot, page, embeds::QUEUE_PAGE_SIZE)),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let snapshot = bot.manager.snapshot(guild_id).await;

    let Some(current) = &snapshot.current else {
        return reply(ctx, command, &MusicError::NotPlaying.user_message(), true).await;
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_now_playing_embed(current, Some(&snapshot)))
                    .components(buttons::create_player_buttons(snapshot.paused, snapshot.loop_mode)),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_shuffle(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let result: Result<_, MusicError> = async {
        ensure_same_channel(ctx, bot, guild_id, command.user.id).await?;
        bot.manager.shuffle(guild_id).await
    }
    .await;

    respond_result(ctx, command, result.map(|_| "🔀 Cola mezclada".to_string())).await
}

async fn handle_loop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let mode: LoopMode = string_option(command, "mode")
        .unwrap_or("off")
        .parse()
        .map_err(anyhow::Error::msg)?;

    let result: Result<_, MusicError> = async {
        ensure_same_channel(ctx, bot, guild_id, command.user.id).await?;
        bot.manager.set_loop_mode(guild_id, mode).await
    }
    .await;

    let message = match mode {
        LoopMode::Track => "🔂 Repetir canción activado",
        LoopMode::Queue => "🔁 Repetir cola activado",
        LoopMode::Off => "➡️ Repetición desactivada",
    };
    respond_result(ctx, command, result.map(|_| message.to_string())).await
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(level) = int_option(command, "level") else {
        let current = bot.manager.snapshot(guild_id).await.volume;
        return reply(ctx, command, &format!("🔊 Volumen actual: {}%", current), false).await;
    };

    let result: Result<_, MusicError> = async {
        ensure_same_channel(ctx, bot, guild_id, command.user.id).await?;
        ensure_dj(bot, guild_id, command.member.as_deref()).await?;
        bot.manager.set_volume(guild_id, level).await
    }
    .await;

    respond_result(ctx, command, result.map(|volume| format!("🔊 Volumen ajustado a {}%", volume))).await
}

async fn handle_remove(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let position = int_option(command, "position").unwrap_or(0);

    let result: Result<_, MusicError> = async {
        ensure_same_channel(ctx, bot, guild_id, command.user.id).await?;
        ensure_dj(bot, guild_id, command.member.as_deref()).await?;
        bot.manager.remove_at(guild_id, to_index(position)).await
    }
    .await;

    respond_result(ctx, command, result.map(|track| format!("🗑️ Eliminada: **{}**", track.title()))).await
}

async fn handle_move(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let from = int_option(command, "from").unwrap_or(0);
    let to = int_option(command, "to").unwrap_or(0);

    let result: Result<_, MusicError> = async {
        ensure_same_channel(ctx, bot, guild_id, command.user.id).await?;
        ensure_dj(bot, guild_id, command.member.as_deref()).await?;
        bot.manager.move_track(guild_id, to_index(from), to_index(to)).await
    }
    .await;

    respond_result(ctx, command, result.map(|_| format!("↕️ Canción movida de #{} a #{}", from, to))).await
}

async fn handle_clear(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let only_mine = string_option(command, "filter") == Some("mine");

    let result: Result<_, MusicError> = async {
        ensure_same_channel(ctx, bot, guild_id, command.user.id).await?;
        if only_mine {
            bot.manager.remove_by_requester(guild_id, command.user.id).await
        } else {
            ensure_dj(bot, guild_id, command.member.as_deref()).await?;
            bot.manager.clear(guild_id).await
        }
    }
    .await;

    respond_result(ctx, command, result.map(|removed| format!("🗑️ {} canciones eliminadas de la cola", removed))).await
}

async fn handle_settings(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let result: Result<_, MusicError> = async {
        ensure_manager(command.member.as_deref())?;
        let changes = apply_settings(command, bot, guild_id).await?;
        let settings = bot
            .storage
            .get_server_config(guild_id.get())
            .await
            .map_err(|e| MusicError::Settings(e.to_string()))?;
        Ok((changes, settings))
    }
    .await;

    let embed = match result {
        Ok((changes, settings)) if changes.is_empty() => {
            embeds::create_success_embed("Configuración del servidor", &describe_settings(&settings))
        }
        Ok((changes, settings)) => embeds::create_success_embed(
            "Configuración actualizada",
            &format!("{}\n\n{}", changes.join("\n"), describe_settings(&settings)),
        ),
        Err(e) => {
            info!("Comando /settings rechazado: {}", e);
            embeds::create_error_embed("Configuración", &e.user_message())
        }
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed).ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

/// Aplica las opciones de `/settings`; devuelve los cambios hechos
async fn apply_settings(
    command: &CommandInteraction,
    bot: &OpenMusicBot,
    guild_id: GuildId,
) -> Result<Vec<String>, MusicError> {
    let storage = &bot.storage;
    let id = guild_id.get();
    let settings_error = |e: anyhow::Error| MusicError::Settings(e.to_string());
    let mut changes = Vec::new();

    if let Some(role) = role_option(command, "dj_role") {
        storage.set_dj_role(id, Some(role.get())).await.map_err(settings_error)?;
        changes.push(format!("🎧 Rol de DJ: <@&{}>", role));
    } else if bool_option(command, "clear_dj_role") == Some(true) {
        storage.set_dj_role(id, None).await.map_err(settings_error)?;
        changes.push("🎧 Rol de DJ eliminado".to_string());
    }

    if let Some(always_on) = bool_option(command, "always_on") {
        storage.set_always_on(id, always_on).await.map_err(settings_error)?;
        changes.push(format!("🌙 Modo 24/7: {}", on_off(always_on)));
    }

    if let Some(volume) = int_option(command, "default_volume") {
        let volume = volume.clamp(0, 100) as u8;
        storage.set_default_volume(id, volume).await.map_err(settings_error)?;
        changes.push(format!("🔊 Volumen inicial: {}%", volume));
    }

    if let Some(size) = int_option(command, "max_queue_size") {
        let size = usize::try_from(size).unwrap_or(1);
        storage.set_max_queue_size(id, size).await.map_err(settings_error)?;
        changes.push(format!("📋 Máximo en cola: {}", size.clamp(1, 1000)));
    }

    if !changes.is_empty() {
        info!("⚙️ Configuración de {} actualizada: {}", guild_id, changes.join(", "));
    }
    Ok(changes)
}

fn describe_settings(settings: &GuildSettings) -> String {
    let dj_role = settings
        .dj_role_id
        .map_or_else(|| "ninguno (controles abiertos)".to_string(), |role| format!("<@&{}>", role));
    let auto_leave = if settings.auto_leave {
        format!("tras {}s sin oyentes", settings.idle_timeout().as_secs())
    } else {
        "desactivada".to_string()
    };

    format!(
        "**Rol de DJ:** {}\n**Modo 24/7:** {}\n**Auto-desconexión:** {}\n**Volumen inicial:** {}%\n**Máximo en cola:** {}\n**Votación para saltar:** {}",
        dj_role,
        on_off(settings.always_on),
        auto_leave,
        settings.default_volume,
        settings.max_queue_size,
        on_off(settings.vote_skip_enabled),
    )
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "activado"
    } else {
        "desactivado"
    }
}

// Funciones auxiliares

async fn vote(
    ctx: &Context,
    bot: &OpenMusicBot,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<crate::audio::vote::VoteOutcome, MusicError> {
    let bound = ensure_same_channel(ctx, bot, guild_id, user_id)
        .await?
        .ok_or(MusicError::NotPlaying)?;
    let members = voice::count_non_bot_members(&ctx.cache, guild_id, bound).unwrap_or(1);
    bot.manager.add_vote(guild_id, user_id, members).await
}

/// El usuario debe estar en el canal del bot si éste está conectado.
/// Devuelve el canal vinculado, si hay uno.
async fn ensure_same_channel(
    ctx: &Context,
    bot: &OpenMusicBot,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<Option<ChannelId>, MusicError> {
    let Some(bound) = bot.manager.bound_voice_channel(guild_id).await else {
        return Ok(None);
    };
    if voice::user_voice_channel(&ctx.cache, guild_id, user_id) != Some(bound) {
        return Err(MusicError::NotInVoice);
    }
    Ok(Some(bound))
}

fn ensure_manager(member: Option<&Member>) -> Result<(), MusicError> {
    if can_manage(member.and_then(|member| member.permissions)) {
        Ok(())
    } else {
        Err(MusicError::NotManager)
    }
}

fn can_manage(permissions: Option<Permissions>) -> bool {
    permissions.is_some_and(|permissions| permissions.manage_guild() || permissions.administrator())
}

/// Verifica rol de DJ o permiso de gestionar el servidor.
/// Sin rol de DJ configurado cualquiera puede usar los controles.
async fn ensure_dj(bot: &OpenMusicBot, guild_id: GuildId, member: Option<&Member>) -> Result<(), MusicError> {
    let settings = bot
        .storage
        .get_server_config(guild_id.get())
        .await
        .map_err(|e| MusicError::Settings(e.to_string()))?;

    let allowed = match member {
        Some(member) => is_dj(&settings, &member.roles, member.permissions),
        None => is_dj(&settings, &[], None),
    };
    if allowed {
        Ok(())
    } else {
        Err(MusicError::NotDj)
    }
}

fn is_dj(settings: &GuildSettings, roles: &[RoleId], permissions: Option<Permissions>) -> bool {
    let Some(dj_role) = settings.dj_role_id else {
        return true;
    };
    let manages_guild = can_manage(permissions);
    let has_role = roles.contains(&RoleId::new(dj_role));

    manages_guild || has_role
}

/// Posición visible (base 1) a índice
fn to_index(position: i64) -> usize {
    usize::try_from(position.saturating_sub(1)).unwrap_or(usize::MAX)
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn bool_option(command: &CommandInteraction, name: &str) -> Option<bool> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_bool())
}

fn role_option(command: &CommandInteraction, name: &str) -> Option<RoleId> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_role_id())
}

fn int_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

async fn reply(ctx: &Context, command: &CommandInteraction, content: &str, ephemeral: bool) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

/// Responde con el mensaje de éxito o el error para el usuario
async fn respond_result(
    ctx: &Context,
    command: &CommandInteraction,
    result: Result<String, MusicError>,
) -> Result<()> {
    match result {
        Ok(message) => reply(ctx, command, &message, false).await,
        Err(e) => {
            info!("Comando /{} rechazado: {}", command.data.name, e);
            reply(ctx, command, &e.user_message(), true).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(ids: &[u64]) -> Vec<RoleId> {
        ids.iter().copied().map(RoleId::new).collect()
    }

    #[test]
    fn test_dj_by_role_or_permission() {
        let settings = GuildSettings { dj_role_id: Some(42), ..GuildSettings::default() };

        assert!(is_dj(&settings, &roles(&[42]), None));
        assert!(is_dj(&settings, &[], Some(Permissions::MANAGE_GUILD)));
        assert!(is_dj(&settings, &[], Some(Permissions::ADMINISTRATOR)));
        assert!(!is_dj(&settings, &roles(&[7]), Some(Permissions::SEND_MESSAGES)));
        assert!(!is_dj(&settings, &[], None));
    }

    #[test]
    fn test_no_dj_role_configured_is_open() {
        let settings = GuildSettings::default();
        assert!(is_dj(&settings, &[], None));
        assert!(is_dj(&settings, &roles(&[7]), Some(Permissions::SEND_MESSAGES)));
    }

    #[test]
    fn test_settings_need_manage_guild() {
        assert!(can_manage(Some(Permissions::MANAGE_GUILD)));
        assert!(can_manage(Some(Permissions::ADMINISTRATOR)));
        assert!(!can_manage(Some(Permissions::SEND_MESSAGES | Permissions::CONNECT)));
        assert!(!can_manage(None));
        assert_eq!(ensure_manager(None), Err(MusicError::NotManager));
    }

    #[test]
    fn test_describe_settings() {
        let settings = GuildSettings {
            dj_role_id: Some(42),
            always_on: true,
            default_volume: 70,
            ..GuildSettings::default()
        };
        let text = describe_settings(&settings);

        assert!(text.contains("<@&42>"));
        assert!(text.contains("**Modo 24/7:** activado"));
        assert!(text.contains("**Volumen inicial:** 70%"));
        assert!(text.contains("tras 60s"));

        let open = describe_settings(&GuildSettings::default());
        assert!(open.contains("controles abiertos"));
    }

    #[test]
    fn test_to_index() {
        assert_eq!(to_index(1), 0);
        assert_eq!(to_index(5), 4);
        assert_eq!(to_index(0), usize::MAX);
    }
}
