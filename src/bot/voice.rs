//! Voice-channel membership as seen by the serenity cache.

use async_trait::async_trait;
use serenity::{
    cache::Cache,
    model::id::{ChannelId, GuildId, UserId},
};
use std::sync::{Arc, OnceLock};
use tracing::warn;

use crate::audio::transport::MemberCounter;

/// Cuenta miembros no-bot usando la caché de serenity.
///
/// Se enlaza con [`CacheMemberCounter::bind`] una vez construido el `Client`.
#[derive(Default)]
pub struct CacheMemberCounter {
    cache: OnceLock<Arc<Cache>>,
}

impl CacheMemberCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, cache: Arc<Cache>) {
        if self.cache.set(cache).is_err() {
            warn!("La caché de miembros ya estaba enlazada");
        }
    }
}

#[async_trait]
impl MemberCounter for CacheMemberCounter {
    async fn non_bot_members(&self, guild_id: GuildId, channel_id: ChannelId) -> anyhow::Result<usize> {
        let cache = self
            .cache
            .get()
            .ok_or_else(|| anyhow::anyhow!("Caché de serenity no enlazada"))?;
        count_non_bot_members(cache, guild_id, channel_id)
            .ok_or_else(|| anyhow::anyhow!("Guild {} no encontrada en caché", guild_id))
    }
}

/// Miembros no-bot en `channel_id`, `None` si la guild no está en caché
pub fn count_non_bot_members(cache: &Cache, guild_id: GuildId, channel_id: ChannelId) -> Option<usize> {
    let guild = cache.guild(guild_id)?;
    let states = guild.voice_states.values().map(|state| {
        let is_bot = state
            .member
            .as_ref()
            .map(|member| member.user.bot)
            .or_else(|| guild.members.get(&state.user_id).map(|member| member.user.bot))
            .unwrap_or(false);
        (state.user_id, state.channel_id, is_bot)
    });
    Some(count_in_channel(states, channel_id))
}

/// Canal de voz en el que está `user_id`
pub fn user_voice_channel(cache: &Cache, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    cache
        .guild(guild_id)?
        .voice_states
        .get(&user_id)
        .and_then(|state| state.channel_id)
}

fn count_in_channel(
    states: impl IntoIterator<Item = (UserId, Option<ChannelId>, bool)>,
    channel_id: ChannelId,
) -> usize {
    states
        .into_iter()
        .filter(|(_, channel, is_bot)| *channel == Some(channel_id) && !is_bot)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_ignores_bots_and_other_channels() {
        let here = ChannelId::new(1);
        let elsewhere = ChannelId::new(2);
        let states = vec![
            (UserId::new(10), Some(here), false),
            (UserId::new(11), Some(here), true),
            (UserId::new(12), Some(elsewhere), false),
            (UserId::new(13), None, false),
            (UserId::new(14), Some(here), false),
        ];

        assert_eq!(count_in_channel(states, here), 2);
    }

    #[tokio::test]
    async fn test_unbound_counter_errors() {
        let counter = CacheMemberCounter::new();
        assert!(counter
            .non_bot_members(GuildId::new(1), ChannelId::new(1))
            .await
            .is_err());
    }
}
