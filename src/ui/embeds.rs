use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{
    queue::{LoopMode, QueueSnapshot},
    track::Track,
    vote::VoteOutcome,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Open Music Bot";

/// Canciones por página en `/queue`
pub const QUEUE_PAGE_SIZE: usize = 10;

/// Campos comunes de un track: artista, duración, solicitante y fuente
fn with_track_fields(mut embed: CreateEmbed, track: &Track) -> CreateEmbed {
    embed = embed
        .field("🎤 Artista", track.artist().unwrap_or("Desconocido"), true)
        .field("⏱️ Duración", duration_label(track), true)
        .field("👤 Solicitado por", track.requester().to_string(), true)
        .field("🔗 Fuente", track.source().name(), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed.url(track.url())
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &Track, snapshot: Option<&QueueSnapshot>) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN);

    embed = with_track_fields(embed, track);

    if let Some(snapshot) = snapshot {
        let status = if snapshot.paused { "⏸️ Pausado" } else { "▶️ Sonando" };
        embed = embed
            .field("📊 Estado", status, true)
            .field("🔊 Volumen", format!("{}%", snapshot.volume), true)
            .field(
                format!("{} Repetición", loop_mode_emoji(snapshot.loop_mode)),
                loop_mode_label(snapshot.loop_mode),
                true,
            );

        if !snapshot.pending.is_empty() {
            embed = embed.field(
                "⏭️ Siguiente",
                snapshot.pending[0].title().to_string(),
                false,
            );
        }
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("✅ Canción Agregada Exitosamente")
        .description(format!(
            "**{}** se ha agregado a la cola en la posición **#{}**",
            track.title(),
            position
        ))
        .color(colors::SUCCESS_GREEN);

    with_track_fields(embed, track)
        .timestamp(Timestamp::from(track.added_at()))
        .footer(CreateEmbedFooter::new("🎵 Se reproducirá automáticamente cuando llegue su turno"))
}

/// Crea un embed para mostrar la cola
pub fn create_queue_embed(snapshot: &QueueSnapshot, page: usize) -> CreateEmbed {
    let queue_page = snapshot.page(page, QUEUE_PAGE_SIZE);

    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if snapshot.current.is_none() && snapshot.pending.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    // Canción actual
    if let Some(current) = &snapshot.current {
        let status = if snapshot.paused {
            "⏸️".to_string()
        } else {
            loop_mode_emoji(snapshot.loop_mode).to_string()
        };

        embed = embed.field(
            format!("{} Reproduciendo", status),
            format!("**{}**{} `[{}]`", current.title(), artist_suffix(current), duration_label(current)),
            false,
        );
    }

    // Próximas canciones
    if !queue_page.items.is_empty() {
        let description: String = queue_page
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                format!(
                    "**{}**. {}{} `[{}]`\n",
                    queue_page.offset + i + 1,
                    item.title(),
                    artist_suffix(item),
                    duration_label(item)
                )
            })
            .collect();

        embed = embed.field("Próximas canciones", description, false);
    }

    let mut info = format!("**Total:** {} canciones en espera", queue_page.total_items);
    let total = snapshot.total_duration();
    if total > Duration::ZERO {
        info.push_str(&format!(" • **Duración:** {}", format_duration(total)));
    }
    info.push_str(&format!(" • 🔊 {}%", snapshot.volume));
    if snapshot.votes > 0 {
        info.push_str(&format!(" • 🗳️ {} votos", snapshot.votes));
    }

    embed = embed.field("Información", info, false);

    // Paginación
    if queue_page.total_pages > 1 {
        embed = embed.footer(CreateEmbedFooter::new(format!(
            "Página {} de {} • Open Music Bot",
            queue_page.current_page, queue_page.total_pages
        )));
    } else {
        embed = embed.footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    embed.timestamp(Timestamp::now())
}

/// Embed del progreso de una votación
pub fn create_vote_embed(outcome: &VoteOutcome) -> CreateEmbed {
    let (title, color) = match outcome {
        VoteOutcome::Skipped { .. } => ("⏭️ Votación aprobada, canción saltada", colors::SUCCESS_GREEN),
        VoteOutcome::Counted { .. } => ("🗳️ Voto registrado", colors::MUSIC_PURPLE),
        VoteOutcome::AlreadyVoted { .. } => ("⚠️ Ya votaste por esta canción", colors::WARNING_ORANGE),
    };

    CreateEmbed::default()
        .title(title)
        .description(format!(
            "**{}/{}** votos necesarios",
            outcome.votes().min(outcome.required()),
            outcome.required()
        ))
        .color(color)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de error genérico
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito genérico
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn loop_mode_emoji(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::Track => "🔂",
        LoopMode::Queue => "🔁",
        LoopMode::Off => "▶️",
    }
}

pub fn loop_mode_label(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::Track => "Canción",
        LoopMode::Queue => "Cola",
        LoopMode::Off => "Desactivada",
    }
}

fn artist_suffix(track: &Track) -> String {
    track
        .artist()
        .map(|artist| format!(" - {}", artist))
        .unwrap_or_default()
}

fn duration_label(track: &Track) -> String {
    match track.duration() {
        Some(duration) if !track.is_live() => format_duration(duration),
        _ => "🔴 En vivo".to_string(),
    }
}

/// Formatea duración como `m:ss` o `h:mm:ss`
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::Requester;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(65)), "1:05");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1:00:00");
        assert_eq!(format_duration(Duration::from_secs(7325)), "2:02:05");
    }

    #[test]
    fn test_duration_label_for_live_tracks() {
        let requester = Requester::System("test".into());
        let live = Track::new("Radio", "https://example.com/live", requester.clone());
        let song = Track::new("Song", "https://example.com/a.mp3", requester).with_duration_secs(95);

        assert_eq!(duration_label(&live), "🔴 En vivo");
        assert_eq!(duration_label(&song), "1:35");
    }

    #[test]
    fn test_loop_mode_labels() {
        assert_eq!(loop_mode_emoji(LoopMode::Queue), "🔁");
        assert_eq!(loop_mode_label(LoopMode::Off), "Desactivada");
    }
}
