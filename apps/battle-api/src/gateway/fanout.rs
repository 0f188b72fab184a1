//! Connection hub for dispatching gateway messages.
//!
//! Each connection owns a bounded outbound queue drained by its socket task.
//! Messages can target one connection, every member of a room, or every
//! connection. Sends use `try_send` and never wait on a slow socket: a full
//! queue drops the message, and a close request against a full queue evicts
//! the connection.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::events::GatewayMessage;

/// A named group of connections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    /// The group attached to a battle (`game-<battle id>`).
    Battle(String),
    /// Legacy group keyed by the bare battle id.
    Legacy(String),
}

impl Room {
    pub fn name(&self) -> String {
        match self {
            Room::Battle(id) => format!("game-{id}"),
            Room::Legacy(id) => id.clone(),
        }
    }

    /// The battle this room belongs to, if it is a battle group.
    pub fn battle_id(&self) -> Option<&str> {
        match self {
            Room::Battle(id) => Some(id),
            Room::Legacy(_) => None,
        }
    }
}

/// An item on a connection's outbound queue.
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(Arc<GatewayMessage>),
    /// Send a close frame and end the connection.
    Close { code: u16, reason: &'static str },
}

/// Registry of live connections and their room memberships. Store in AppState.
pub struct ConnectionHub {
    connections: DashMap<String, mpsc::Sender<Outbound>>,
    rooms: DashMap<Room, HashSet<String>>,
    memberships: DashMap<String, HashSet<Room>>,
    capacity: usize,
}

impl ConnectionHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
            memberships: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Register a connection and return the receiving end of its queue.
    pub fn register(&self, connection_id: &str) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.connections.insert(connection_id.to_string(), tx);
        self.memberships
            .insert(connection_id.to_string(), HashSet::new());
        rx
    }

    /// Drop a connection and all of its room memberships.
    /// Returns the rooms it belonged to.
    pub fn unregister(&self, connection_id: &str) -> HashSet<Room> {
        self.connections.remove(connection_id);
        let rooms = self
            .memberships
            .remove(connection_id)
            .map(|(_, rooms)| rooms)
            .unwrap_or_default();

        for room in &rooms {
            if let Some(mut members) = self.rooms.get_mut(room) {
                members.remove(connection_id);
            }
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
        rooms
    }

    /// Add a connection to a room. Returns `false` if the connection is unknown.
    pub fn join(&self, connection_id: &str, room: Room) -> bool {
        match self.memberships.get_mut(connection_id) {
            Some(mut rooms) => {
                rooms.insert(room.clone());
            }
            None => return false,
        }
        self.rooms
            .entry(room)
            .or_default()
            .insert(connection_id.to_string());
        true
    }

    /// Remove a room, clearing it from each member's memberships.
    /// Returns the connections that were in it.
    pub fn dissolve(&self, room: &Room) -> Vec<String> {
        let members: Vec<String> = self
            .rooms
            .remove(room)
            .map(|(_, members)| members.into_iter().collect())
            .unwrap_or_default();

        for id in &members {
            if let Some(mut rooms) = self.memberships.get_mut(id) {
                rooms.remove(room);
            }
        }
        members
    }

    pub fn members(&self, room: &Room) -> Vec<String> {
        self.rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn rooms_of(&self, connection_id: &str) -> HashSet<Room> {
        self.memberships
            .get(connection_id)
            .map(|rooms| rooms.clone())
            .unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send a message to a single connection.
    pub fn send_to(&self, connection_id: &str, msg: GatewayMessage) -> bool {
        self.deliver(connection_id, Outbound::Message(Arc::new(msg)))
    }

    /// Send a message to every member of a room, sender included.
    /// Returns how many connections accepted it.
    pub fn broadcast_room(&self, room: &Room, msg: GatewayMessage) -> usize {
        let msg = Arc::new(msg);
        self.members(room)
            .iter()
            .filter(|id| self.deliver(id, Outbound::Message(Arc::clone(&msg))))
            .count()
    }

    /// Send a message to every live connection.
    pub fn broadcast_all(&self, msg: GatewayMessage) -> usize {
        let msg = Arc::new(msg);
        let ids: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        ids.iter()
            .filter(|id| self.deliver(id, Outbound::Message(Arc::clone(&msg))))
            .count()
    }

    /// Ask a connection to close after flushing what is already queued.
    ///
    /// A connection whose queue is full is evicted instead: the hub drops its
    /// sender, so the socket task drains what is queued and then ends.
    pub fn close(&self, connection_id: &str, code: u16, reason: &'static str) -> bool {
        let Some(sender) = self.sender(connection_id) else {
            return false;
        };

        match sender.try_send(Outbound::Close { code, reason }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.connections.remove(connection_id);
                tracing::warn!(
                    connection_id = %connection_id,
                    code,
                    "outbound queue full, evicting connection"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Ask every connection to close.
    pub fn close_all(&self, code: u16, reason: &'static str) {
        let ids: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.close(&id, code, reason);
        }
    }

    fn sender(&self, connection_id: &str) -> Option<mpsc::Sender<Outbound>> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    fn deliver(&self, connection_id: &str, item: Outbound) -> bool {
        let Some(sender) = self.sender(connection_id) else {
            return false;
        };

        match sender.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    "outbound queue full, dropping gateway message"
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
