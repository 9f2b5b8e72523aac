//! A trick: one card per alive player, resolved left to right.

use serde::{Deserialize, Serialize};

use super::entities::{Card, PlayerId, Suit};

/// A card played into a trick, tagged with who played it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TrickCard {
    pub player_id: PlayerId,
    pub card: Card,
}

/// One round of card exchange. Append-only until resolved, then kept as
/// immutable round history.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Trick {
    pub cards: Vec<TrickCard>,
    /// Fixed by the first card played, never changes.
    pub lead_suit: Option<Suit>,
    pub winner_id: Option<PlayerId>,
}

impl Trick {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a card. The first card fixes the lead suit.
    pub fn push(&mut self, player_id: PlayerId, card: Card) {
        if self.cards.is_empty() {
            self.lead_suit = Some(card.suit);
        }
        self.cards.push(TrickCard { player_id, card });
    }

    pub fn is_complete(&self, num_players: usize) -> bool {
        self.cards.len() >= num_players
    }

    /// Determine the taker of the trick: a single left-to-right pass holding
    /// the running best card. An empty trick resolves to no winner rather
    /// than panicking.
    pub fn determine_winner(&mut self) -> Option<PlayerId> {
        let lead = self.lead_suit?;
        let first = self.cards.first()?;
        let mut winning_idx = 0;
        let mut winning_card = first.card;
        for (idx, played) in self.cards.iter().enumerate().skip(1) {
            if played.card.beats(&winning_card, lead) {
                winning_idx = idx;
                winning_card = played.card;
            }
        }
        let winner = self.cards[winning_idx].player_id.clone();
        self.winner_id = Some(winner.clone());
        Some(winner)
    }
}
