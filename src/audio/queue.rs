use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{collections::VecDeque, str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::{
    audio::{controller::PlaybackState, idle::IdleTimer, track::Track, vote::Ballot},
    error::{MusicError, Result},
};

pub const DEFAULT_VOLUME: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(LoopMode::Off),
            "track" | "song" => Ok(LoopMode::Track),
            "queue" | "all" => Ok(LoopMode::Queue),
            other => Err(format!("modo de repetición desconocido: {}", other)),
        }
    }
}

/// Track promovido a actual.
///
/// `instance` cambia en cada transición, incluso cuando el modo `Track`
/// repite el mismo track; las señales de fin y los ballots se atan a ella.
#[derive(Debug, Clone)]
pub struct CurrentTrack {
    pub track: Arc<Track>,
    pub instance: u64,
}

/// Cola de un servidor: pendientes, track actual y estado de reproducción
#[derive(Debug)]
pub struct GuildQueue {
    guild_id: GuildId,
    pub(crate) pending: VecDeque<Arc<Track>>,
    pub(crate) current: Option<CurrentTrack>,
    volume: u8,
    loop_mode: LoopMode,
    pub(crate) state: PlaybackState,
    voice_channel: Option<ChannelId>,
    text_channel: Option<ChannelId>,
    pub(crate) ballot: Ballot,
    pub(crate) idle_timer: Option<IdleTimer>,
    next_instance: u64,
    next_timer_token: u64,
}

impl GuildQueue {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            pending: VecDeque::new(),
            current: None,
            volume: DEFAULT_VOLUME,
            loop_mode: LoopMode::Off,
            state: PlaybackState::Idle,
            voice_channel: None,
            text_channel: None,
            ballot: Ballot::default(),
            idle_timer: None,
            next_instance: 1,
            next_timer_token: 1,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&mut self, track: Track, max_size: usize) -> Result<usize> {
        if self.pending.len() >= max_size {
            return Err(MusicError::QueueFull { max: max_size });
        }

        info!("➕ Agregado a la cola de {}: {}", self.guild_id, track.title());
        self.pending.push_back(Arc::new(track));
        Ok(self.pending.len())
    }

    /// Elimina y devuelve el track en la posición dada (base 0)
    pub fn remove_at(&mut self, index: usize) -> Result<Arc<Track>> {
        let len = self.pending.len();
        let track = self
            .pending
            .remove(index)
            .ok_or(MusicError::IndexOutOfRange { index, len })?;

        debug!("❌ Track eliminado en posición {}: {}", index, track.title());
        Ok(track)
    }

    /// Mueve un track a una nueva posición
    pub fn move_track(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.pending.len();
        if from >= len {
            return Err(MusicError::IndexOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(MusicError::IndexOutOfRange { index: to, len });
        }

        if from != to {
            if let Some(track) = self.pending.remove(from) {
                self.pending.insert(to, track);
                debug!("📍 Track movido de posición {} a {}", from, to);
            }
        }

        Ok(())
    }

    /// Mezcla los pendientes; el track actual no se toca
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.pending.len() < 2 {
            return;
        }
        // SliceRandom::shuffle es Fisher-Yates
        self.pending.make_contiguous().shuffle(rng);
        info!("🔀 Cola de {} mezclada", self.guild_id);
    }

    /// Limpia los pendientes
    pub fn clear(&mut self) -> usize {
        let removed = self.pending.len();
        self.pending.clear();
        info!("🗑️ Cola de {} limpiada ({} canciones)", self.guild_id, removed);
        removed
    }

    /// Elimina los pendientes pedidos por un usuario
    pub fn remove_by_requester(&mut self, user_id: UserId) -> usize {
        let original_len = self.pending.len();
        self.pending
            .retain(|track| track.requester().user_id() != Some(user_id));

        let removed = original_len - self.pending.len();
        if removed > 0 {
            info!("🗑️ Eliminadas {} canciones del usuario {}", removed, user_id);
        }
        removed
    }

    /// Ajusta el volumen, limitado a [0, 100]
    pub fn set_volume(&mut self, volume: i64) -> u8 {
        self.volume = volume.clamp(0, 100) as u8;
        self.volume
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        match mode {
            LoopMode::Off => info!("➡️ Repetición desactivada"),
            LoopMode::Track => info!("🔂 Repetir canción activado"),
            LoopMode::Queue => info!("🔁 Repetir cola activado"),
        }
    }

    /// Asocia los canales de voz y texto
    pub fn bind(&mut self, voice_channel: ChannelId, text_channel: Option<ChannelId>) {
        self.voice_channel = Some(voice_channel);
        if text_channel.is_some() {
            self.text_channel = text_channel;
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn voice_channel(&self) -> Option<ChannelId> {
        self.voice_channel
    }

    pub fn text_channel(&self) -> Option<ChannelId> {
        self.text_channel
    }

    pub fn current(&self) -> Option<&CurrentTrack> {
        self.current.as_ref()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.current.is_none()
    }

    pub(crate) fn next_instance(&mut self) -> u64 {
        let instance = self.next_instance;
        self.next_instance += 1;
        instance
    }

    pub(crate) fn next_timer_token(&mut self) -> u64 {
        let token = self.next_timer_token;
        self.next_timer_token += 1;
        token
    }

    /// Vista de sólo lectura para mostrar
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            guild_id: self.guild_id,
            current: self.current.as_ref().map(|c| (*c.track).clone()),
            current_instance: self.current.as_ref().map(|c| c.instance),
            pending: self.pending.iter().map(|t| (**t).clone()).collect(),
            volume: self.volume,
            loop_mode: self.loop_mode,
            state: self.state,
            playing: self.state.is_playing(),
            paused: self.state == PlaybackState::Paused,
            votes: self
                .current
                .as_ref()
                .map(|c| self.ballot.votes_for(c.instance))
                .unwrap_or(0),
            voice_channel: self.voice_channel,
            text_channel: self.text_channel,
        }
    }
}

/// Copia serializable del estado de una cola
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub guild_id: GuildId,
    pub current: Option<Track>,
    pub current_instance: Option<u64>,
    pub pending: Vec<Track>,
    pub volume: u8,
    pub loop_mode: LoopMode,
    pub state: PlaybackState,
    pub playing: bool,
    pub paused: bool,
    pub votes: usize,
    pub voice_channel: Option<ChannelId>,
    pub text_channel: Option<ChannelId>,
}

impl QueueSnapshot {
    /// Snapshot vacío: sin entrada en el registro no hay nada en cola
    pub fn empty(guild_id: GuildId) -> Self {
        GuildQueue::new(guild_id).snapshot()
    }

    /// Duración total; los streams en vivo cuentan como cero
    pub fn total_duration(&self) -> Duration {
        self.current
            .iter()
            .chain(self.pending.iter())
            .filter_map(|track| track.duration())
            .sum()
    }

    /// Obtiene una página específica de la cola
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage {
        let per_page = per_page.max(1);
        let total_items = self.pending.len();
        let total_pages = if total_items == 0 {
            1
        } else {
            total_items.div_ceil(per_page)
        };
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * per_page;
        let end = (start + per_page).min(total_items);

        QueuePage {
            items: self.pending[start..end].to_vec(),
            offset: start,
            current_page,
            total_pages,
            total_items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    pub offset: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}
