//! Card, deck, and player value types.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::{CARDS_PER_PLAYER, DECK_SIZE, INITIAL_LIVES};

/// Stable player identity. Survives reconnects; a player keeps their id for
/// the lifetime of the room.
pub type PlayerId = String;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    /// Lowercase name used in card ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spades => "spades",
            Self::Hearts => "hearts",
            Self::Diamonds => "diamonds",
            Self::Clubs => "clubs",
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Spades => "♠",
            Self::Hearts => "♥",
            Self::Diamonds => "♦",
            Self::Clubs => "♣",
        };
        write!(f, "{repr}")
    }
}

/// Card ranks in the game's trick order. The numeric value is NOT the
/// natural card order: J < Q < K < A < 7 < 8 < 9 < 10, with 10 highest.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Rank {
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "A")]
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 8] = [
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    /// Comparison value for trick-taking (higher wins within a suit).
    pub fn value(&self) -> u8 {
        match self {
            Self::Jack => 1,
            Self::Queen => 2,
            Self::King => 3,
            Self::Ace => 4,
            Self::Seven => 5,
            Self::Eight => 6,
            Self::Nine => 7,
            Self::Ten => 8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seven => "7",
            Self::Eight => "8",
            Self::Nine => "9",
            Self::Ten => "10",
            Self::Jack => "J",
            Self::Queen => "Q",
            Self::King => "K",
            Self::Ace => "A",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A playing card. The id is derived from suit and rank (e.g. `spades_10`)
/// so cards are comparable by identity on the wire.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(from = "CardWire", into = "CardWire")]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

/// Wire shape of a card: the derived id travels alongside suit and rank.
#[derive(Deserialize, Serialize)]
struct CardWire {
    id: String,
    suit: Suit,
    rank: Rank,
}

impl From<Card> for CardWire {
    fn from(card: Card) -> Self {
        Self {
            id: card.id(),
            suit: card.suit,
            rank: card.rank,
        }
    }
}

impl From<CardWire> for Card {
    fn from(wire: CardWire) -> Self {
        Self {
            suit: wire.suit,
            rank: wire.rank,
        }
    }
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }

    /// Deterministic identity, e.g. `hearts_A`.
    pub fn id(&self) -> String {
        format!("{}_{}", self.suit.as_str(), self.rank.as_str())
    }

    /// Whether this card beats `winning` given the trick's lead suit.
    /// The lead suit acts as the trick's trump: a lead-suit card beats any
    /// off-suit card, and two different off-suit cards never upset each
    /// other (the earlier card keeps winning).
    pub fn beats(&self, winning: &Card, lead: Suit) -> bool {
        if self.suit == winning.suit {
            return self.rank.value() > winning.rank.value();
        }
        if self.suit == lead && winning.suit != lead {
            return true;
        }
        false
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// An ordered 32-card deck, recreated and shuffled once per round or redeal.
#[derive(Debug)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    pub fn new() -> Self {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                cards.push(Card::new(suit, rank));
            }
        }
        Self { cards }
    }

    /// Fisher–Yates shuffle over the whole deck.
    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut rand::rng());
    }

    /// Remove and return the first `n` cards (or fewer if the deck runs
    /// out). Dealing is not restartable.
    pub fn deal(&mut self, n: usize) -> Vec<Card> {
        let count = n.min(self.cards.len());
        self.cards.drain(..count).collect()
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-participant state. Owned by the game; created on room join and kept
/// until room teardown, even at zero lives.
#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub lives: u8,
    pub hand: Vec<Card>,
    pub connected: bool,
    /// A one-life player cannot decline a klopf.
    pub must_mitgehen: bool,
    /// The player has been dealt a hand this round.
    pub cards_revealed: bool,
    /// The player declared blind drei before looking at their hand.
    pub blind_declared: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            lives: INITIAL_LIVES,
            hand: Vec::with_capacity(CARDS_PER_PLAYER),
            connected: true,
            must_mitgehen: false,
            cards_revealed: false,
            blind_declared: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.lives > 0
    }

    pub fn has_card(&self, card_id: &str) -> bool {
        self.hand.iter().any(|c| c.id() == card_id)
    }

    /// Remove and return a card from the hand by id.
    pub fn remove_card(&mut self, card_id: &str) -> Option<Card> {
        let idx = self.hand.iter().position(|c| c.id() == card_id)?;
        Some(self.hand.remove(idx))
    }

    pub fn cards_of_suit(&self, suit: Suit) -> Vec<Card> {
        self.hand.iter().copied().filter(|c| c.suit == suit).collect()
    }

    /// Deduct lives, saturating at zero.
    pub fn lose_lives(&mut self, n: u8) {
        self.lives = self.lives.saturating_sub(n);
    }

    /// Public view: hand exposed only as a count.
    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            lives: self.lives,
            card_count: self.hand.len(),
            connected: self.connected,
        }
    }
}

/// Public player info, safe to broadcast to the whole room.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub lives: u8,
    pub card_count: usize,
    pub connected: bool,
}

/// One player's line in the end-of-round report.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RoundResult {
    pub player_id: PlayerId,
    pub player_name: String,
    pub lives_lost: u8,
    pub lives_left: u8,
    pub is_loser: bool,
}
