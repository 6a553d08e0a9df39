//! In-memory voice transport used by the engine tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::Notify;

use crate::{
    audio::{
        track::Track,
        transport::{PlaybackHandle, SignalSink, VoiceConnection, VoiceTransport},
    },
    error::{MusicError, Result},
};

#[derive(Debug, Clone, Default)]
pub struct FakeLog {
    pub connects: usize,
    /// Conexiones detenidas en una compuerta
    pub held: usize,
    pub disconnects: usize,
    pub streamed: Vec<String>,
    pub controls: Vec<String>,
    pub sinks: Vec<SignalSink>,
}

#[derive(Default)]
struct FakeState {
    log: FakeLog,
    unplayable: HashSet<String>,
    fail_connections: bool,
    gates: HashMap<GuildId, Arc<Notify>>,
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn log(&self) -> FakeLog {
        self.state.lock().log.clone()
    }

    pub fn mark_unplayable(&self, url: &str) {
        self.state.lock().unplayable.insert(url.to_string());
    }

    pub fn fail_connections(&self) {
        self.state.lock().fail_connections = true;
    }

    /// Las conexiones de `guild_id` esperan hasta `notify_one` en la compuerta
    pub fn gate_connections(&self, guild_id: GuildId) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().gates.insert(guild_id, gate.clone());
        gate
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceConnection>> {
        let gate = self.state.lock().gates.get(&guild_id).cloned();
        if let Some(gate) = gate {
            self.state.lock().log.held += 1;
            gate.notified().await;
            self.state.lock().log.held -= 1;
        }

        let mut state = self.state.lock();
        if state.fail_connections {
            return Err(MusicError::Connection("sin permisos".into()));
        }
        state.log.connects += 1;
        Ok(Box::new(FakeConnection { channel_id, state: self.state.clone() }))
    }
}

struct FakeConnection {
    channel_id: ChannelId,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    fn relocate(&mut self, channel_id: ChannelId) {
        self.channel_id = channel_id;
    }

    async fn stream(
        &self,
        track: &Track,
        _volume: u8,
        sink: SignalSink,
    ) -> Result<Box<dyn PlaybackHandle>> {
        let mut state = self.state.lock();
        if state.unplayable.contains(track.url()) {
            return Err(MusicError::TrackUnplayable(format!("{} no disponible", track.url())));
        }
        state.log.streamed.push(track.title().to_string());
        state.log.sinks.push(sink);
        Ok(Box::new(FakePlayback { state: self.state.clone() }))
    }

    async fn disconnect(&self) {
        self.state.lock().log.disconnects += 1;
    }
}

struct FakePlayback {
    state: Arc<Mutex<FakeState>>,
}

impl FakePlayback {
    fn record(&self, control: String) {
        self.state.lock().log.controls.push(control);
    }
}

impl PlaybackHandle for FakePlayback {
    fn pause(&self) {
        self.record("pause".into());
    }

    fn resume(&self) {
        self.record("resume".into());
    }

    fn set_volume(&self, volume: u8) {
        self.record(format!("volume:{}", volume));
    }

    fn stop(&self) {
        self.record("stop".into());
    }
}
