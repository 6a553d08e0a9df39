use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId, permissions::Permissions},
    prelude::Context,
};

/// Todos los comandos slash del bot
pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        voteskip_command(),
        stop_command(),
        queue_command(),
        nowplaying_command(),
        shuffle_command(),
        loop_command(),
        volume_command(),
        remove_command(),
        move_command(),
        clear_command(),
        settings_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o la agrega a la cola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

// Comandos de control

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta a la siguiente canción (DJ)")
}

fn voteskip_command() -> CreateCommand {
    CreateCommand::new("voteskip").description("Vota para saltar la canción actual")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción, limpia la cola y sale del canal (DJ)")
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Muestra la cola de reproducción")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Número de página")
                .min_int_value(1),
        )
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Muestra información de la canción actual")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Mezcla las canciones en espera")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Configura el modo de repetición")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "mode", "Modo de repetición")
                .add_string_choice("Desactivar", "off")
                .add_string_choice("Canción", "track")
                .add_string_choice("Cola", "queue")
                .required(true),
        )
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Quita una canción de la cola (DJ)")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "position", "Posición en la cola")
                .min_int_value(1)
                .required(true),
        )
}

fn move_command() -> CreateCommand {
    CreateCommand::new("move")
        .description("Mueve una canción a otra posición (DJ)")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "from", "Posición actual")
                .min_int_value(1)
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "to", "Nueva posición")
                .min_int_value(1)
                .required(true),
        )
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear")
        .description("Limpia la cola de reproducción")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "filter", "Filtro para limpiar")
                .add_string_choice("Todo (DJ)", "all")
                .add_string_choice("Mis canciones", "mine"),
        )
}

// Comandos de audio

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen de reproducción (DJ)")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "level",
                "Nivel de volumen (0-100)",
            )
            .min_int_value(0)
            .max_int_value(100),
        )
}

// Comandos de administración

fn settings_command() -> CreateCommand {
    CreateCommand::new("settings")
        .description("Muestra o cambia la configuración de música del servidor")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .add_option(CreateCommandOption::new(CommandOptionType::Role, "dj_role", "Rol de DJ"))
        .add_option(CreateCommandOption::new(
            CommandOptionType::Boolean,
            "clear_dj_role",
            "Quitar el rol de DJ (controles abiertos a todos)",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::Boolean,
            "always_on",
            "Modo 24/7: no salir del canal por inactividad",
        ))
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "default_volume", "Volumen inicial (0-100)")
                .min_int_value(0)
                .max_int_value(100),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "max_queue_size", "Máximo de canciones en cola")
                .min_int_value(1)
                .max_int_value(1000),
        )
}
