//! # Open Music Engine
//!
//! Per-guild music playback engine for Discord: queueing, loop modes,
//! vote skipping and idle auto-leave, driven through Serenity and Songbird.
//!
//! - [`audio`]: queue, playback controller, vote skip, idle reclaimer and the
//!   guild registry ([`audio::manager::MusicManager`])
//! - [`sources`]: resolving URLs and search terms into tracks
//! - [`storage`]: per-guild settings and queue snapshots on disk
//! - [`bot`]: Serenity event handler and slash commands
//! - [`ui`]: embeds and buttons

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod storage;
pub mod ui;
