use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One WebSocket text frame: `{"event": .., "data": ..}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }
}

#[derive(Default)]
struct Registry {
    sockets: HashMap<String, mpsc::UnboundedSender<Frame>>,
    rooms: HashMap<String, HashSet<String>>,
}

/// The in-process registry of connected sockets and the rooms they joined.
///
/// Cloning shares the registry.
#[derive(Clone, Default)]
pub struct Io {
    registry: Arc<Mutex<Registry>>,
}

impl Io {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new socket. Frames emitted to it arrive on the receiver.
    pub fn connect(&self) -> (String, mpsc::UnboundedReceiver<Frame>) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry().sockets.insert(id.clone(), tx);
        (id, rx)
    }

    pub fn join(&self, socket: &str, room: &str) {
        self.registry()
            .rooms
            .entry(room.to_owned())
            .or_default()
            .insert(socket.to_owned());
    }

    /// Removes `socket` from every room and from the registry.
    pub fn leave_all(&self, socket: &str) {
        let mut registry = self.registry();
        registry.sockets.remove(socket);
        registry.rooms.retain(|_, members| {
            members.remove(socket);
            !members.is_empty()
        });
    }

    /// The rooms `socket` is in, sorted.
    pub fn rooms_of(&self, socket: &str) -> Vec<String> {
        let mut rooms: Vec<String> = self
            .registry()
            .rooms
            .iter()
            .filter(|(_, members)| members.contains(socket))
            .map(|(room, _)| room.clone())
            .collect();
        rooms.sort();
        rooms
    }

    /// How many sockets are registered.
    pub fn connected(&self) -> usize {
        self.registry().sockets.len()
    }

    /// Every room with at least one member, sorted.
    pub fn rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.registry().rooms.keys().cloned().collect();
        rooms.sort();
        rooms
    }

    /// Addresses every socket of `room`.
    pub fn to(&self, room: impl Into<String>) -> Room<'_> {
        Room { io: self, room: room.into() }
    }

    /// Sends `frame` to `socket` alone.
    pub(crate) fn send(&self, socket: &str, frame: Frame) -> bool {
        self.registry()
            .sockets
            .get(socket)
            .is_some_and(|tx| tx.send(frame).is_ok())
    }
}

/// The sockets of one room. Obtain with [`Io::to`].
pub struct Room<'a> {
    io: &'a Io,
    room: String,
}

impl Room<'_> {
    /// Emits `event` to every member. Returns how many sockets it reached.
    pub fn emit(&self, event: &str, data: &Value) -> usize {
        let registry = self.io.registry();
        let Some(members) = registry.rooms.get(&self.room) else { return 0 };

        members
            .iter()
            .filter_map(|member| registry.sockets.get(member))
            .filter(|tx| tx.send(Frame::new(event, data.clone())).is_ok())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn emit_reaches_room_members_only() {
        let io = Io::new();
        let (a, mut rx_a) = io.connect();
        let (b, mut rx_b) = io.connect();
        io.join(&a, "news");

        assert_eq!(io.to("news").emit("headline", &json!("hi")), 1);
        assert_eq!(rx_a.try_recv().unwrap(), Frame::new("headline", json!("hi")));
        assert!(rx_b.try_recv().is_err());
        assert!(io.rooms_of(&b).is_empty());
    }

    #[test]
    fn leave_all_drops_memberships() {
        let io = Io::new();
        let (a, _rx) = io.connect();
        io.join(&a, "news");
        io.join(&a, "news42");

        assert_eq!(io.rooms_of(&a), vec!["news", "news42"]);
        io.leave_all(&a);
        assert!(io.rooms_of(&a).is_empty());
        assert!(io.rooms().is_empty());
        assert_eq!(io.connected(), 0);
        assert_eq!(io.to("news").emit("headline", &json!(null)), 0);
    }
}
