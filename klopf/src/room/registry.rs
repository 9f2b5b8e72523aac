//! Room registry: short codes mapped to live room actors.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{RwLock, oneshot};

use crate::game::PlayerId;
use crate::game::constants::ROOM_CODE_LEN;
use crate::net::connections::ConnectionRegistry;

use super::actor::{RoomActor, RoomConfig, RoomHandle};
use super::messages::RoomMessage;

const CODE_ALPHABET: &[u8] = b"0123456789abcdef";

/// Owns the map of live rooms. Shared across every connection task; room
/// codes are unique for the registry's lifetime and looked up
/// case-insensitively.
pub struct RoomRegistry {
    connections: Arc<ConnectionRegistry>,
    config: RoomConfig,
    rooms: RwLock<HashMap<String, RoomHandle>>,
}

impl RoomRegistry {
    pub fn new(connections: Arc<ConnectionRegistry>) -> Self {
        Self::with_config(connections, RoomConfig::default())
    }

    pub fn with_config(connections: Arc<ConnectionRegistry>, config: RoomConfig) -> Self {
        Self {
            connections,
            config,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Create a room with a fresh unique code and spawn its actor.
    pub async fn create_room(&self, owner_id: PlayerId) -> RoomHandle {
        let mut rooms = self.rooms.write().await;
        // retry on the (unlikely) collision against live rooms
        let code = loop {
            let candidate = generate_code();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let (actor, handle) = RoomActor::new(
            code.clone(),
            owner_id,
            self.config.clone(),
            self.connections.clone(),
        );
        rooms.insert(code, handle.clone());
        tokio::spawn(actor.run());
        handle
    }

    pub async fn get(&self, code: &str) -> Option<RoomHandle> {
        let rooms = self.rooms.read().await;
        rooms.get(&code.to_lowercase()).cloned()
    }

    pub async fn remove(&self, code: &str) -> Option<RoomHandle> {
        let mut rooms = self.rooms.write().await;
        rooms.remove(&code.to_lowercase())
    }

    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }

    /// Drop rooms that hold zero players (or whose actor is gone).
    /// Returns the number of rooms reaped.
    pub async fn reap_empty(&self) -> usize {
        let snapshot: Vec<(String, RoomHandle)> = {
            let rooms = self.rooms.read().await;
            rooms.iter().map(|(c, h)| (c.clone(), h.clone())).collect()
        };
        let mut reaped = 0;
        for (code, handle) in snapshot {
            let (tx, rx) = oneshot::channel();
            let count = match handle.send(RoomMessage::PlayerCount { respond_to: tx }).await {
                Ok(()) => rx.await.unwrap_or(0),
                Err(_) => 0,
            };
            if count == 0 {
                let mut rooms = self.rooms.write().await;
                if rooms.remove(&code).is_some() {
                    reaped += 1;
                    log::info!("reaped empty room {code}");
                }
            }
        }
        reaped
    }
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
