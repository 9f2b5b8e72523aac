//! Game tuning constants.

use std::time::Duration;

/// Lives every player starts the game with.
pub const INITIAL_LIVES: u8 = 7;

/// Minimum number of players required to start a game.
pub const MIN_PLAYERS: usize = 2;

/// Maximum number of players a room can hold.
pub const MAX_PLAYERS: usize = 4;

/// Cards dealt to each alive player per round.
pub const CARDS_PER_PLAYER: usize = 4;

/// Tricks played per round. The taker of the final trick loses the round.
pub const TRICKS_PER_ROUND: u8 = 4;

/// Maximum number of redeals (Einigung) per game.
pub const MAX_REDEALS: u8 = 3;

/// Default stakes per opponent, set by the room owner in the lobby.
pub const DEFAULT_STAKES: u32 = 1;

/// Number of cards in a full deck (4 suits x 8 ranks).
pub const DECK_SIZE: usize = 32;

/// Length of a room code (lowercase hex).
pub const ROOM_CODE_LEN: usize = 6;

/// How long a player gets to act before the server plays for them.
pub const TURN_TIMEOUT: Duration = Duration::from_secs(60);

/// How long the game rests in `Dealing` before play begins, leaving a
/// window for blind klopfs and redeal requests.
pub const DEAL_WINDOW: Duration = Duration::from_secs(15);
