//! Dispatch: validated inbound messages become room actor calls.
//!
//! The dispatcher owns nothing mutable itself; it resolves the sending
//! connection to a player and room through the registries, forwards the
//! operation to the room's actor, and reports failures back to the single
//! offending connection as an `error` message. Room lifecycle (create,
//! join, reconnect, close) also lives here because it spans both
//! registries.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::game::{GameError, Player, PlayerId};
use crate::room::{RoomHandle, RoomMessage, RoomRegistry};

use super::connections::{ConnectionId, ConnectionRegistry};
use super::messages::{ClientMessage, ServerMessage};

/// Failures surfaced to a connection. Everything here is recoverable by
/// the caller and never fatal to a room.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SessionError {
    #[error("room not found")]
    RoomNotFound,
    #[error("player not found")]
    PlayerNotFound,
    #[error("not in a room")]
    NotInRoom,
    #[error("room is closed")]
    RoomClosed,
    #[error("unknown or malformed message")]
    UnknownMessage,
    #[error(transparent)]
    Game(#[from] GameError),
}

pub struct Dispatcher {
    rooms: Arc<RoomRegistry>,
    connections: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(rooms: Arc<RoomRegistry>, connections: Arc<ConnectionRegistry>) -> Self {
        Self { rooms, connections }
    }

    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// Parse and handle one raw text frame from a connection. Parse
    /// failures are answered with an error and cause no side effects.
    pub async fn handle_text(&self, conn_id: ConnectionId, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle_message(conn_id, message).await,
            Err(err) => {
                log::warn!("connection {conn_id}: unparseable message: {err}");
                self.reply_error(conn_id, SessionError::UnknownMessage);
            }
        }
    }

    pub async fn handle_message(&self, conn_id: ConnectionId, message: ClientMessage) {
        let result = match message {
            ClientMessage::CreateRoom { player_name } => {
                self.create_room(conn_id, player_name).await
            }
            ClientMessage::JoinRoom {
                room_code,
                player_name,
            } => self.join_room(conn_id, &room_code, player_name).await,
            ClientMessage::Reconnect {
                room_code,
                player_id,
            } => self.reconnect(conn_id, &room_code, player_id).await,
            ClientMessage::StartGame => {
                self.room_op(conn_id, |player_id, respond_to| RoomMessage::StartGame {
                    player_id,
                    respond_to,
                })
                .await
            }
            ClientMessage::CloseRoom => self.close_room(conn_id).await,
            ClientMessage::PlayCard { card_id } => {
                self.room_op(conn_id, |player_id, respond_to| RoomMessage::PlayCard {
                    player_id,
                    card_id,
                    respond_to,
                })
                .await
            }
            ClientMessage::Klopf => {
                self.room_op(conn_id, |player_id, respond_to| RoomMessage::Klopf {
                    player_id,
                    respond_to,
                })
                .await
            }
            ClientMessage::KlopfResponse { mitgehen } => {
                self.room_op(conn_id, move |player_id, respond_to| {
                    RoomMessage::KlopfResponse {
                        player_id,
                        mitgehen,
                        respond_to,
                    }
                })
                .await
            }
            ClientMessage::BlindDrei => {
                self.room_op(conn_id, |player_id, respond_to| RoomMessage::BlindDrei {
                    player_id,
                    respond_to,
                })
                .await
            }
            ClientMessage::SetStakes { stakes } => {
                self.room_op(conn_id, move |player_id, respond_to| {
                    RoomMessage::SetStakes {
                        player_id,
                        stakes,
                        respond_to,
                    }
                })
                .await
            }
            ClientMessage::RequestRedeal => {
                self.room_op(conn_id, |player_id, respond_to| {
                    RoomMessage::RequestRedeal {
                        player_id,
                        respond_to,
                    }
                })
                .await
            }
            ClientMessage::RedealResponse { agree } => {
                self.room_op(conn_id, move |player_id, respond_to| {
                    RoomMessage::RedealResponse {
                        player_id,
                        agree,
                        respond_to,
                    }
                })
                .await
            }
        };
        if let Err(err) = result {
            self.reply_error(conn_id, err);
        }
    }

    /// The connection's socket closed. Flags the player as disconnected in
    /// their room; the game itself continues.
    pub async fn handle_disconnect(&self, conn_id: ConnectionId) {
        let Some((player_id, room_code)) = self.connections.close(conn_id) else {
            return;
        };
        if let Some(handle) = self.rooms.get(&room_code).await {
            let _ = handle.send(RoomMessage::Disconnect { player_id }).await;
        }
    }

    // === Room lifecycle ===

    async fn create_room(
        &self,
        conn_id: ConnectionId,
        player_name: String,
    ) -> Result<(), SessionError> {
        let player_id: PlayerId = Uuid::new_v4().to_string();
        let player = Player::new(player_id.clone(), player_name);
        let handle = self.rooms.create_room(player_id.clone()).await;
        log::info!("room {} created by {player_id}", handle.code());

        self.connections.bind(conn_id, &player_id, handle.code());
        self.connections.send_to_conn(
            conn_id,
            ServerMessage::RoomCreated {
                room_code: handle.code().to_string(),
                player_id: player_id.clone(),
            },
        );
        self.join(&handle, conn_id, player).await
    }

    async fn join_room(
        &self,
        conn_id: ConnectionId,
        room_code: &str,
        player_name: String,
    ) -> Result<(), SessionError> {
        let handle = self
            .rooms
            .get(room_code)
            .await
            .ok_or(SessionError::RoomNotFound)?;
        let player_id: PlayerId = Uuid::new_v4().to_string();
        let player = Player::new(player_id.clone(), player_name);

        self.connections.bind(conn_id, &player_id, handle.code());
        self.connections.send_to_conn(
            conn_id,
            ServerMessage::RoomCreated {
                room_code: handle.code().to_string(),
                player_id: player_id.clone(),
            },
        );
        self.join(&handle, conn_id, player).await
    }

    async fn join(
        &self,
        handle: &RoomHandle,
        conn_id: ConnectionId,
        player: Player,
    ) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::Join {
                player,
                respond_to: tx,
            })
            .await
            .map_err(|_| SessionError::RoomClosed)?;
        let result = rx.await.map_err(|_| SessionError::RoomClosed)?;
        if result.is_err() {
            self.connections.unbind(conn_id);
        }
        result.map_err(SessionError::from)
    }

    async fn reconnect(
        &self,
        conn_id: ConnectionId,
        room_code: &str,
        player_id: PlayerId,
    ) -> Result<(), SessionError> {
        let handle = self
            .rooms
            .get(room_code)
            .await
            .ok_or(SessionError::RoomNotFound)?;
        // the actor validates membership and binds the connection itself
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::Reconnect {
                conn_id,
                player_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| SessionError::RoomClosed)?;
        rx.await
            .map_err(|_| SessionError::RoomClosed)?
            .map_err(SessionError::from)
    }

    async fn close_room(&self, conn_id: ConnectionId) -> Result<(), SessionError> {
        let (player_id, handle) = self.resolve(conn_id).await?;
        let (tx, rx) = oneshot::channel();
        handle
            .send(RoomMessage::CloseRoom {
                player_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| SessionError::RoomClosed)?;
        let player_ids = rx.await.map_err(|_| SessionError::RoomClosed)??;
        self.connections.clear_room(&player_ids);
        self.rooms.remove(handle.code()).await;
        log::info!("room {} closed by owner", handle.code());
        Ok(())
    }

    // === Plumbing ===

    async fn resolve(
        &self,
        conn_id: ConnectionId,
    ) -> Result<(PlayerId, RoomHandle), SessionError> {
        let player_id = self
            .connections
            .player_of(conn_id)
            .ok_or(SessionError::NotInRoom)?;
        let room_code = self
            .connections
            .room_of(&player_id)
            .ok_or(SessionError::NotInRoom)?;
        let handle = self
            .rooms
            .get(&room_code)
            .await
            .ok_or(SessionError::RoomNotFound)?;
        Ok((player_id, handle))
    }

    /// Forward a per-player operation to the player's room and relay the
    /// synchronous result.
    async fn room_op<F>(&self, conn_id: ConnectionId, build: F) -> Result<(), SessionError>
    where
        F: FnOnce(PlayerId, oneshot::Sender<Result<(), GameError>>) -> RoomMessage,
    {
        let (player_id, handle) = self.resolve(conn_id).await?;
        let (tx, rx) = oneshot::channel();
        handle
            .send(build(player_id, tx))
            .await
            .map_err(|_| SessionError::RoomClosed)?;
        rx.await
            .map_err(|_| SessionError::RoomClosed)?
            .map_err(SessionError::from)
    }

    fn reply_error(&self, conn_id: ConnectionId, err: SessionError) {
        self.connections.send_to_conn(
            conn_id,
            ServerMessage::Error {
                error: err.to_string(),
            },
        );
    }
}
