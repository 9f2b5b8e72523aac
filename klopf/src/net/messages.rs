//! Wire protocol: tagged message unions exchanged over the socket.
//!
//! Both directions are JSON objects with a `type` discriminator. Unknown or
//! malformed inbound payloads fail to parse and are answered with an
//! `error` message, with no side effects on any game.

use serde::{Deserialize, Serialize};

use crate::game::{Card, Game, GamePhase, KlopfState, PlayerId, PlayerInfo, RoundResult, Trick};
use crate::game::constants::MAX_REDEALS;

/// Messages a client may send.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom { player_name: String },
    JoinRoom { room_code: String, player_name: String },
    Reconnect { room_code: String, player_id: PlayerId },
    StartGame,
    CloseRoom,
    PlayCard { card_id: String },
    Klopf,
    KlopfResponse { mitgehen: bool },
    BlindDrei,
    SetStakes { stakes: u32 },
    RequestRedeal,
    RedealResponse { agree: bool },
}

/// Messages the server sends. `CardsDealt`, `KlopfResponseNeeded`, and
/// `RedealResponseNeeded` are targeted to a single player; everything else
/// is broadcast to the room's connected players.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomCreated { room_code: String, player_id: PlayerId },
    RoomClosed,
    PlayerJoined { player: PlayerInfo },
    PlayerLeft { player_id: PlayerId },
    GameStarted,
    CardsDealt { cards: Vec<Card> },
    CardPlayed { player_id: PlayerId, card: Card },
    KlopfInitiated { player_id: PlayerId, level: u8 },
    KlopfResponseNeeded { level: u8 },
    KlopfResolved { level: u8 },
    TrickWon { winner_id: PlayerId },
    RoundEnded { results: Vec<RoundResult> },
    GameOver {
        winner_id: PlayerId,
        perfect_win: bool,
        stakes: u32,
        winnings: u32,
    },
    GameState { state: GameStateInfo },
    RedealRequested { player_id: PlayerId },
    RedealResponseNeeded { redeal_count: u8, max_redeals: u8 },
    RedealPerformed { redeal_count: u8, max_redeals: u8 },
    RedealDeclined,
    Error { error: String },
}

/// Public klopf snapshot; responses stay private to the server.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct KlopfInfo {
    pub active: bool,
    pub initiator: Option<PlayerId>,
    pub level: u8,
    pub participants: Vec<PlayerId>,
}

impl From<&KlopfState> for KlopfInfo {
    fn from(klopf: &KlopfState) -> Self {
        Self {
            active: klopf.active,
            initiator: klopf.initiator.clone(),
            level: klopf.level,
            participants: klopf.participants.clone(),
        }
    }
}

/// Full public game snapshot. Hands appear only as per-player card counts.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameStateInfo {
    pub phase: GamePhase,
    pub players: Vec<PlayerInfo>,
    pub current_player_id: Option<PlayerId>,
    pub trick_number: u8,
    pub round_number: u32,
    pub stakes: u32,
    pub redeal_count: u8,
    pub max_redeals: u8,
    pub current_trick: Option<Trick>,
    pub klopf: Option<KlopfInfo>,
    pub completed_tricks: Vec<Trick>,
}

impl GameStateInfo {
    pub fn snapshot(game: &Game) -> Self {
        Self {
            phase: game.phase(),
            players: game.players.iter().map(|p| p.info()).collect(),
            current_player_id: game.current_player_id(),
            trick_number: game.trick_number(),
            round_number: game.round_number(),
            stakes: game.stakes(),
            redeal_count: game.redeal_count(),
            max_redeals: MAX_REDEALS,
            current_trick: if game.phase() == GamePhase::Lobby {
                None
            } else {
                Some(game.current_trick().clone())
            },
            klopf: if game.klopf().active {
                Some(game.klopf().into())
            } else {
                None
            },
            completed_tricks: game.completed_tricks().to_vec(),
        }
    }
}
