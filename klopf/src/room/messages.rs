//! Room actor inbox messages.
//!
//! Every player-triggered operation carries a oneshot reply channel so the
//! dispatch layer can return errors synchronously to the offending
//! connection. Timer messages are fire-and-forget and carry the generation
//! they were armed with; a stale generation is ignored by the actor.

use tokio::sync::oneshot;

use crate::game::{GameError, Player, PlayerId};
use crate::net::connections::ConnectionId;

/// Reply channel for operations that only succeed or fail.
pub type Reply = oneshot::Sender<Result<(), GameError>>;

#[derive(Debug)]
pub enum RoomMessage {
    /// Add a player to the lobby.
    Join { player: Player, respond_to: Reply },

    /// Re-associate an existing player with a fresh connection and
    /// re-deliver their state. The binding happens inside the actor, after
    /// membership is validated, so a bogus reconnect cannot displace a
    /// live player's connection.
    Reconnect {
        conn_id: ConnectionId,
        player_id: PlayerId,
        respond_to: Reply,
    },

    /// A player's connection dropped. The player stays in the game.
    Disconnect { player_id: PlayerId },

    /// Owner starts the game.
    StartGame {
        player_id: PlayerId,
        respond_to: Reply,
    },

    /// Owner closes the room. Replies with the room's player ids so the
    /// caller can clear their session registrations.
    CloseRoom {
        player_id: PlayerId,
        respond_to: oneshot::Sender<Result<Vec<PlayerId>, GameError>>,
    },

    /// Owner sets the stakes (lobby only).
    SetStakes {
        player_id: PlayerId,
        stakes: u32,
        respond_to: Reply,
    },

    PlayCard {
        player_id: PlayerId,
        card_id: String,
        respond_to: Reply,
    },

    Klopf {
        player_id: PlayerId,
        respond_to: Reply,
    },

    KlopfResponse {
        player_id: PlayerId,
        mitgehen: bool,
        respond_to: Reply,
    },

    BlindDrei {
        player_id: PlayerId,
        respond_to: Reply,
    },

    RequestRedeal {
        player_id: PlayerId,
        respond_to: Reply,
    },

    RedealResponse {
        player_id: PlayerId,
        agree: bool,
        respond_to: Reply,
    },

    /// Number of players in the room (for reaping).
    PlayerCount {
        respond_to: oneshot::Sender<usize>,
    },

    /// Internal: the armed turn timer fired.
    TurnTimeout { generation: u64 },

    /// Internal: the dealing window elapsed; play begins.
    DealWindowElapsed { generation: u64 },
}
