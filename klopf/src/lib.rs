//! # Klopf
//!
//! A multiplayer trick-taking card game engine with a session layer for
//! droppable network connections.
//!
//! Klopf is played with a 32-card deck (four suits, ranks `7`–`A` with `10`
//! highest) over rounds of four tricks. Players hold a shrinking life
//! total; taking the final trick of a round costs lives, and the in-round
//! "klopf" ritual lets players escalate what a loss costs. A two-player
//! endgame adds a capped redeal negotiation (Einigung).
//!
//! ## Architecture
//!
//! - [`game`]: the synchronous, I/O-free rules engine. One [`game::Game`]
//!   per room moves through `lobby → dealing → playing → …` phases and
//!   returns a result-or-error for every operation.
//! - [`room`]: the session layer. Every room is a tokio actor that owns its
//!   game, serializes all mutations, runs the turn/dealing timers, and
//!   broadcasts state after each change.
//! - [`net`]: the wire protocol (tagged JSON unions), the connection
//!   registry mapping transient sockets onto persistent players, and the
//!   dispatcher translating inbound messages into actor calls.
//!
//! Timers auto-play for absent players, disconnects are soft (the player
//! stays seated and can reconnect with full state re-delivery), and rooms
//! are addressed by short hex codes.
//!
//! ## Example
//!
//! ```
//! use klopf::game::{Game, Player};
//!
//! let mut game = Game::new();
//! game.add_player(Player::new("p1".into(), "Anna".into())).unwrap();
//! game.add_player(Player::new("p2".into(), "Ben".into())).unwrap();
//! game.start().unwrap();
//! assert_eq!(game.round_number(), 1);
//! ```

/// Core game rules: cards, tricks, klopf, and the round state machine.
pub mod game;
pub use game::{Game, GameError, GamePhase, Player, PlayerId};

/// Per-room actors and the room registry.
pub mod room;
pub use room::{RoomConfig, RoomHandle, RoomRegistry};

/// Wire protocol, connection registry, and message dispatch.
pub mod net;
pub use net::{ClientMessage, ConnectionRegistry, Dispatcher, ServerMessage};
