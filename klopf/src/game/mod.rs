//! Klopf game engine: cards, tricks, the klopf protocol, and the round
//! state machine.
//!
//! Everything in here is synchronous and free of I/O; the session layer in
//! [`crate::room`] owns a `Game` per room and serializes access to it.

pub mod constants;
pub mod engine;
pub mod entities;
pub mod errors;
pub mod klopf;
pub mod trick;

pub use engine::{Game, GamePhase, PlayOutcome, RedealOutcome, RoundEndSummary, Settlement};
pub use entities::{Card, Deck, Player, PlayerId, PlayerInfo, Rank, RoundResult, Suit};
pub use errors::GameError;
pub use klopf::KlopfState;
pub use trick::{Trick, TrickCard};
