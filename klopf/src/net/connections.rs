//! Connection registry: maps transient sockets onto persistent players.
//!
//! Connections are keyed by a monotonically increasing id, never by the
//! player id, so a dropped socket's identity can't be confused with a
//! still-connected player. A player's room membership outlives any one
//! physical connection; reconnecting re-associates a fresh connection id
//! with the existing player.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::game::PlayerId;
use super::messages::ServerMessage;

/// Monotonic connection identity. Never reused within a process.
pub type ConnectionId = u64;

/// Outbound message queue capacity per connection.
pub const OUTBOUND_CAPACITY: usize = 64;

#[derive(Debug)]
struct Connection {
    sender: mpsc::Sender<ServerMessage>,
    player_id: Option<PlayerId>,
}

#[derive(Debug, Default)]
struct Inner {
    conns: HashMap<ConnectionId, Connection>,
    /// Player's current live connection, if any.
    players: HashMap<PlayerId, ConnectionId>,
    /// Player's room membership; survives disconnects until room teardown.
    rooms: HashMap<PlayerId, String>,
}

/// Shared, lock-protected connection store. One per process, passed into
/// the dispatch layer and every room actor.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    inner: RwLock<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly opened socket and return its connection id.
    pub fn open(&self, sender: mpsc::Sender<ServerMessage>) -> ConnectionId {
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut inner = self.inner.write().expect("connection registry poisoned");
        inner.conns.insert(
            conn_id,
            Connection {
                sender,
                player_id: None,
            },
        );
        conn_id
    }

    /// Associate a connection with a player and room. Supersedes any older
    /// connection the player had (reconnect).
    pub fn bind(&self, conn_id: ConnectionId, player_id: &PlayerId, room_code: &str) {
        let mut inner = self.inner.write().expect("connection registry poisoned");
        if let Some(conn) = inner.conns.get_mut(&conn_id) {
            conn.player_id = Some(player_id.clone());
        } else {
            return;
        }
        inner.players.insert(player_id.clone(), conn_id);
        inner.rooms.insert(player_id.clone(), room_code.to_string());
    }

    /// Drop a closed socket. Returns the bound player and room only when
    /// this was still the player's current connection; a connection that
    /// was superseded by a reconnect yields `None` so the player is not
    /// marked disconnected by a stale close.
    pub fn close(&self, conn_id: ConnectionId) -> Option<(PlayerId, String)> {
        let mut inner = self.inner.write().expect("connection registry poisoned");
        let conn = inner.conns.remove(&conn_id)?;
        let player_id = conn.player_id?;
        if inner.players.get(&player_id) != Some(&conn_id) {
            return None;
        }
        inner.players.remove(&player_id);
        let room = inner.rooms.get(&player_id)?.clone();
        Some((player_id, room))
    }

    /// Undo a `bind` that did not stick (e.g. joining a full room). The
    /// connection itself stays open.
    pub fn unbind(&self, conn_id: ConnectionId) {
        let mut inner = self.inner.write().expect("connection registry poisoned");
        let Some(conn) = inner.conns.get_mut(&conn_id) else {
            return;
        };
        let Some(player_id) = conn.player_id.take() else {
            return;
        };
        if inner.players.get(&player_id) == Some(&conn_id) {
            inner.players.remove(&player_id);
            inner.rooms.remove(&player_id);
        }
    }

    /// The player bound to a connection, if any.
    pub fn player_of(&self, conn_id: ConnectionId) -> Option<PlayerId> {
        let inner = self.inner.read().expect("connection registry poisoned");
        inner.conns.get(&conn_id)?.player_id.clone()
    }

    /// The room a player belongs to, independent of connection state.
    pub fn room_of(&self, player_id: &PlayerId) -> Option<String> {
        let inner = self.inner.read().expect("connection registry poisoned");
        inner.rooms.get(player_id).cloned()
    }

    pub fn is_connected(&self, player_id: &PlayerId) -> bool {
        let inner = self.inner.read().expect("connection registry poisoned");
        inner.players.contains_key(player_id)
    }

    /// Queue a message for a player's current connection. Dropped silently
    /// when the player is disconnected; dropped with a warning when the
    /// outbound queue is full.
    pub fn send_to(&self, player_id: &PlayerId, message: ServerMessage) {
        let inner = self.inner.read().expect("connection registry poisoned");
        let Some(conn_id) = inner.players.get(player_id) else {
            return;
        };
        let Some(conn) = inner.conns.get(conn_id) else {
            return;
        };
        if let Err(mpsc::error::TrySendError::Full(_)) = conn.sender.try_send(message) {
            log::warn!("outbound queue full for player {player_id}, dropping message");
        }
    }

    /// Queue a message on a specific connection, bound or not. Used for
    /// replies to connections that have not joined a room yet.
    pub fn send_to_conn(&self, conn_id: ConnectionId, message: ServerMessage) {
        let inner = self.inner.read().expect("connection registry poisoned");
        if let Some(conn) = inner.conns.get(&conn_id) {
            if let Err(mpsc::error::TrySendError::Full(_)) = conn.sender.try_send(message) {
                log::warn!("outbound queue full for connection {conn_id}, dropping message");
            }
        }
    }

    /// Forget the room membership of a set of players (room teardown).
    pub fn clear_room(&self, player_ids: &[PlayerId]) {
        let mut inner = self.inner.write().expect("connection registry poisoned");
        for player_id in player_ids {
            inner.rooms.remove(player_id);
        }
    }

    pub fn connection_count(&self) -> usize {
        let inner = self.inner.read().expect("connection registry poisoned");
        inner.conns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_conn() -> (ConnectionRegistry, ConnectionId, mpsc::Receiver<ServerMessage>) {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let conn_id = registry.open(tx);
        (registry, conn_id, rx)
    }

    #[test]
    fn test_connection_ids_strictly_increase() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let a = registry.open(tx.clone());
        let b = registry.open(tx.clone());
        let c = registry.open(tx);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_bind_and_route() {
        let (registry, conn_id, mut rx) = registry_with_conn();
        let player = "p1".to_string();
        registry.bind(conn_id, &player, "abc123");
        assert_eq!(registry.player_of(conn_id), Some(player.clone()));
        assert_eq!(registry.room_of(&player).as_deref(), Some("abc123"));
        assert!(registry.is_connected(&player));

        registry.send_to(&player, ServerMessage::RoomClosed);
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::RoomClosed);
    }

    #[test]
    fn test_reconnect_supersedes_old_connection() {
        let (registry, old_conn, _old_rx) = registry_with_conn();
        let player = "p1".to_string();
        registry.bind(old_conn, &player, "abc123");

        let (tx, mut new_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let new_conn = registry.open(tx);
        registry.bind(new_conn, &player, "abc123");

        // closing the superseded socket must not flag the player
        assert_eq!(registry.close(old_conn), None);
        assert!(registry.is_connected(&player));
        registry.send_to(&player, ServerMessage::RoomClosed);
        assert_eq!(new_rx.try_recv().unwrap(), ServerMessage::RoomClosed);
    }

    #[test]
    fn test_close_current_connection_reports_player() {
        let (registry, conn_id, _rx) = registry_with_conn();
        let player = "p1".to_string();
        registry.bind(conn_id, &player, "abc123");
        let (closed_player, room) = registry.close(conn_id).unwrap();
        assert_eq!(closed_player, player);
        assert_eq!(room, "abc123");
        assert!(!registry.is_connected(&player));
        // membership survives the disconnect for reconnects
        assert_eq!(registry.room_of(&player).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_close_unbound_connection_is_silent() {
        let (registry, conn_id, _rx) = registry_with_conn();
        assert_eq!(registry.close(conn_id), None);
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_clear_room_forgets_membership() {
        let (registry, conn_id, _rx) = registry_with_conn();
        let player = "p1".to_string();
        registry.bind(conn_id, &player, "abc123");
        registry.clear_room(&[player.clone()]);
        assert_eq!(registry.room_of(&player), None);
    }

    #[test]
    fn test_send_to_disconnected_player_is_dropped() {
        let registry = ConnectionRegistry::new();
        registry.send_to(&"ghost".to_string(), ServerMessage::RoomClosed);
    }
}
