use std::sync::OnceLock;

use serde_json::Value;
use tracing::{debug, error, info};

use super::channel::Channel;
use super::io::Io;

/// Fans events out to the sockets subscribed to a channel.
pub struct Broadcaster {
    channels: Vec<Channel>,
    io: OnceLock<Io>,
}

impl Broadcaster {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels, io: OnceLock::new() }
    }

    /// Attaches the socket registry. Only the first call has an effect.
    pub fn set(&self, io: Io) {
        if self.io.set(io).is_err() {
            debug!("BROADCASTER io already set, keeping the first one");
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn search_channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.name() == name)
    }

    /// Emits `event` with `data` to the channel named `to`. Returns whether
    /// the event was emitted.
    pub fn broadcast(&self, to: &str, event: &str, data: &Value) -> bool {
        let Some(io) = self.io.get() else {
            error!("BROADCASTER Could not broadcast data, io found undefined");
            return false;
        };
        if self.search_channel(to).is_none() {
            error!("BROADCASTER Could not broadcast data, channel {to} is not registered");
            return false;
        }

        let reached = io.to(to).emit(event, data);
        info!(channel = to, event, %data, reached, "BROADCASTER broadcasted");
        true
    }

    /// Emits to the personal part of channel `to` that belongs to
    /// `identity`.
    pub fn broadcast_personal(&self, to: &str, identity: &str, event: &str, data: &Value) -> bool {
        let Some(io) = self.io.get() else {
            error!("BROADCASTER Could not broadcast data, io found undefined");
            return false;
        };
        let Some(channel) = self.search_channel(to) else {
            error!("BROADCASTER Could not broadcast data, channel {to} is not registered");
            return false;
        };

        let room = channel.personal(identity);
        let reached = io.to(&room).emit(event, data);
        info!(channel = %room, event, %data, reached, "BROADCASTER broadcasted");
        true
    }
}
