//! The closed set of user-facing game errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a player action can produce. All of these are recoverable: they
/// are returned to the offending connection and never take down a room.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("action not valid in the current game state")]
    WrongState,
    #[error("game already started")]
    GameAlreadyStarted,
    #[error("need 2+ players")]
    NotEnoughPlayers,
    #[error("too many players")]
    TooManyPlayers,
    #[error("player does not exist")]
    PlayerNotFound,
    #[error("not your turn")]
    NotYourTurn,
    #[error("card not in hand")]
    CardNotInHand,
    #[error("must follow suit if possible")]
    MustFollowSuit,
    #[error("cannot klopf twice in a row")]
    CannotKlopfTwice,
    #[error("klopf level would exceed lives + 1")]
    KlopfLimitExceeded,
    #[error("must mitgehen")]
    MustMitgehen,
    #[error("already responded")]
    AlreadyResponded,
    #[error("no active klopf")]
    NotInKlopf,
    #[error("already declared blind")]
    AlreadyDeclaredBlind,
    #[error("redeal only allowed with 2 players")]
    RedealNotAllowed,
    #[error("redeal limit reached")]
    RedealLimitReached,
    #[error("already requested redeal")]
    AlreadyRequestedRedeal,
    #[error("only the room owner can do that")]
    NotOwner,
}
