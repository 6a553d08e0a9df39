//! # Audio Module
//!
//! Per-guild playback engine for Open Music.
//!
//! This module decides *which* track plays, in *what order*, at *what
//! volume* and *when to stop*. Fetching and decoding audio belongs to the
//! voice transport.
//!
//! ## Architecture
//!
//! ### [`track`] - Track
//! - Immutable description of a playable item and who requested it
//!
//! ### [`queue`] - Queue Management
//! - Pending tracks, current track, volume, loop mode
//! - Vote-skip ballot and idle timer owned by the queue itself
//!
//! ### [`controller`] - Playback Controller
//! - `Idle` / `Playing` / `Paused` / `Advancing` state machine
//! - Loop-mode decision on every track transition
//! - Unplayable tracks are skipped automatically
//!
//! ### [`vote`] - Vote Skip
//! - Majority ballot tied to one track instance
//!
//! ### [`idle`] - Idle Reclaimer
//! - Single-shot timer that leaves an empty voice channel
//!
//! ### [`manager`] - Music Manager
//! - Registry from guild to session, one lock per guild
//!
//! ### [`player`] - Songbird transport
//! - Voice connections and track events through Songbird
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use open_music_engine::audio::{manager::MusicManager, track::{Requester, Track}};
//! use serenity::all::{ChannelId, GuildId};
//! # use std::sync::Arc;
//!
//! # async fn example(manager: Arc<MusicManager>) -> anyhow::Result<()> {
//! let guild_id = GuildId::new(123456789);
//! let track = Track::new("Song", "https://example.com/song.mp3", Requester::System("demo".into()));
//!
//! manager.play(guild_id, ChannelId::new(42), None, Some(track)).await?;
//! manager.pause(guild_id).await?;
//! manager.resume(guild_id).await?;
//! manager.skip(guild_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod idle;
pub mod manager;
pub mod player;
pub mod queue;
pub mod track;
pub mod transport;
pub mod vote;

#[cfg(test)]
pub(crate) mod testing;
