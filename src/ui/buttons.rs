use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

use crate::audio::queue::{LoopMode, QueueSnapshot};

/// IDs personalizados para los botones
pub mod button_ids {
    pub const PLAY_PAUSE: &str = "music_play_pause";
    pub const SKIP: &str = "music_skip";
    pub const VOTE_SKIP: &str = "music_vote_skip";
    pub const STOP: &str = "music_stop";
    pub const SHUFFLE: &str = "music_shuffle";
    pub const LOOP: &str = "music_loop";
    /// Prefijo; el número de página va después de `:`
    pub const QUEUE_PAGE: &str = "queue_page";
}

/// Controles principales del reproductor, en dos filas (máximo 5 por fila)
pub fn create_player_buttons(paused: bool, loop_mode: LoopMode) -> Vec<CreateActionRow> {
    let play_pause_emoji = if paused { '▶' } else { '⏸' };
    let loop_style = if loop_mode == LoopMode::Off {
        ButtonStyle::Secondary
    } else {
        ButtonStyle::Success
    };

    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::PLAY_PAUSE)
            .emoji(play_pause_emoji)
            .style(ButtonStyle::Primary),
        CreateButton::new(button_ids::SKIP)
            .emoji('⏭')
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::VOTE_SKIP)
            .label("Votar")
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::STOP)
            .emoji('⏹')
            .style(ButtonStyle::Danger),
    ]),
    CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::SHUFFLE)
            .emoji('🔀')
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::LOOP)
            .emoji('🔁')
            .style(loop_style),
    ])]
}

/// Botones de paginación para `/queue`
pub fn create_queue_buttons(snapshot: &QueueSnapshot, page: usize, per_page: usize) -> Vec<CreateActionRow> {
    let queue_page = snapshot.page(page, per_page);
    if queue_page.total_pages <= 1 {
        return Vec::new();
    }

    let current = queue_page.current_page;
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(format!("{}:{}", button_ids::QUEUE_PAGE, current.saturating_sub(1).max(1)))
            .emoji('◀')
            .style(ButtonStyle::Secondary)
            .disabled(current <= 1),
        CreateButton::new(format!("{}:{}", button_ids::QUEUE_PAGE, current + 1))
            .emoji('▶')
            .style(ButtonStyle::Secondary)
            .disabled(current >= queue_page.total_pages),
        CreateButton::new(button_ids::SHUFFLE)
            .emoji('🔀')
            .style(ButtonStyle::Secondary),
    ])]
}

/// Extrae el número de página de un custom_id de paginación
pub fn parse_queue_page(custom_id: &str) -> Option<usize> {
    custom_id
        .strip_prefix(button_ids::QUEUE_PAGE)?
        .strip_prefix(':')?
        .parse()
        .ok()
}

/// Siguiente modo en el ciclo off → track → queue → off
pub fn next_loop_mode(mode: LoopMode) -> LoopMode {
    match mode {
        LoopMode::Off => LoopMode::Track,
        LoopMode::Track => LoopMode::Queue,
        LoopMode::Queue => LoopMode::Off,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queue_page() {
        assert_eq!(parse_queue_page("queue_page:3"), Some(3));
        assert_eq!(parse_queue_page("queue_page:"), None);
        assert_eq!(parse_queue_page("queue_page3"), None);
        assert_eq!(parse_queue_page("music_skip"), None);
    }

    fn custom_ids(rows: &[CreateActionRow]) -> Vec<Vec<String>> {
        let value = serde_json::to_value(rows).unwrap();
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|row| {
                row["components"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|button| button["custom_id"].as_str().unwrap().to_string())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_player_buttons_include_every_control() {
        let rows = custom_ids(&create_player_buttons(false, LoopMode::Off));

        assert!(rows.iter().all(|row| row.len() <= 5));
        let all: Vec<&str> = rows.iter().flatten().map(String::as_str).collect();
        for id in [
            button_ids::PLAY_PAUSE,
            button_ids::SKIP,
            button_ids::VOTE_SKIP,
            button_ids::STOP,
            button_ids::SHUFFLE,
            button_ids::LOOP,
        ] {
            assert!(all.contains(&id), "falta el botón {}", id);
        }
    }

    #[test]
    fn test_loop_mode_cycle() {
        assert_eq!(next_loop_mode(LoopMode::Off), LoopMode::Track);
        assert_eq!(next_loop_mode(LoopMode::Track), LoopMode::Queue);
        assert_eq!(next_loop_mode(LoopMode::Queue), LoopMode::Off);
    }
}
