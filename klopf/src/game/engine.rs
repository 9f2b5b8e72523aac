//! The authoritative game state machine.
//!
//! One `Game` per room, mutated only by that room's actor. Every operation
//! validates the current phase, applies the mutation, and returns a
//! result-or-error; the session layer decides what to broadcast from the
//! returned outcome and the post-call state.

use std::collections::HashMap;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::constants::{CARDS_PER_PLAYER, INITIAL_LIVES, MAX_PLAYERS, MAX_REDEALS, MIN_PLAYERS, TRICKS_PER_ROUND};
use super::entities::{Card, Deck, Player, PlayerId, RoundResult};
use super::errors::GameError;
use super::klopf::KlopfState;
use super::trick::Trick;

/// The finite set of game phases. `TrickComplete` and `RoundEnd` are
/// pass-through phases resolved within the call that entered them.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Lobby,
    Dealing,
    KlopfPending,
    RedealPending,
    Playing,
    TrickComplete,
    RoundEnd,
    GameOver,
}

/// What a successful card play did to the game.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayOutcome {
    pub player_id: PlayerId,
    pub card: Card,
    /// Set when this play completed a trick.
    pub trick_winner: Option<PlayerId>,
    /// Set when this play ended the round.
    pub round_results: Option<Vec<RoundResult>>,
}

/// How a redeal response resolved.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RedealOutcome {
    Performed,
    Declined,
    /// The requester answered their own request; ignored.
    NotResponder,
}

/// End-of-round report, retained until the next round ends.
#[derive(Clone, Debug)]
pub struct RoundEndSummary {
    pub loser_id: PlayerId,
    pub penalty: u8,
    pub results: Vec<RoundResult>,
}

/// Final payout once the game is over.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Settlement {
    pub winner_id: PlayerId,
    pub perfect_win: bool,
    pub stakes: u32,
    pub winnings: u32,
}

#[derive(Debug)]
pub struct Game {
    phase: GamePhase,
    pub players: Vec<Player>,
    current_player_idx: usize,
    deck: Deck,
    current_trick: Trick,
    completed_tricks: Vec<Trick>,
    trick_number: u8,
    round_number: u32,
    klopf: KlopfState,
    stakes: u32,
    redeal_count: u8,
    redeal_requester: Option<PlayerId>,
    redeal_responses: HashMap<PlayerId, bool>,
    round_start_lives: HashMap<PlayerId, u8>,
    last_round_results: Option<RoundEndSummary>,
}

impl Game {
    pub fn new() -> Self {
        Self {
            phase: GamePhase::Lobby,
            players: Vec::with_capacity(MAX_PLAYERS),
            current_player_idx: 0,
            deck: Deck::new(),
            current_trick: Trick::new(),
            completed_tricks: Vec::with_capacity(TRICKS_PER_ROUND as usize),
            trick_number: 0,
            round_number: 0,
            klopf: KlopfState::new(),
            stakes: super::constants::DEFAULT_STAKES,
            redeal_count: 0,
            redeal_requester: None,
            redeal_responses: HashMap::new(),
            round_start_lives: HashMap::new(),
            last_round_results: None,
        }
    }

    // === Accessors ===

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn klopf(&self) -> &KlopfState {
        &self.klopf
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.players.get(self.current_player_idx).map(|p| p.id.clone())
    }

    pub fn current_trick(&self) -> &Trick {
        &self.current_trick
    }

    pub fn completed_tricks(&self) -> &[Trick] {
        &self.completed_tricks
    }

    pub fn trick_number(&self) -> u8 {
        self.trick_number
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn stakes(&self) -> u32 {
        self.stakes
    }

    pub fn redeal_count(&self) -> u8 {
        self.redeal_count
    }

    pub fn redeal_requester(&self) -> Option<&PlayerId> {
        self.redeal_requester.as_ref()
    }

    pub fn redeal_responses(&self) -> &HashMap<PlayerId, bool> {
        &self.redeal_responses
    }

    pub fn last_round_results(&self) -> Option<&RoundEndSummary> {
        self.last_round_results.as_ref()
    }

    pub fn deck_remaining(&self) -> usize {
        self.deck.remaining()
    }

    pub fn alive_ids(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_alive()).count()
    }

    /// The last player standing, once the game is over.
    pub fn winner(&self) -> Option<&Player> {
        if self.phase != GamePhase::GameOver {
            return None;
        }
        self.players.iter().find(|p| p.is_alive())
    }

    /// Payout for the winner: stakes per opponent, doubled for a perfect
    /// win (winner never lost a life).
    pub fn settlement(&self) -> Option<Settlement> {
        let winner = self.winner()?;
        let perfect_win = winner.lives == INITIAL_LIVES;
        let mut winnings = (self.players.len().saturating_sub(1) as u32) * self.stakes;
        if perfect_win {
            winnings *= 2;
        }
        Some(Settlement {
            winner_id: winner.id.clone(),
            perfect_win,
            stakes: self.stakes,
            winnings,
        })
    }

    // === Lobby ===

    pub fn add_player(&mut self, player: Player) -> Result<(), GameError> {
        if self.phase != GamePhase::Lobby {
            return Err(GameError::GameAlreadyStarted);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::TooManyPlayers);
        }
        self.players.push(player);
        Ok(())
    }

    /// Stakes per opponent. Lobby only.
    pub fn set_stakes(&mut self, stakes: u32) -> Result<(), GameError> {
        if self.phase != GamePhase::Lobby {
            return Err(GameError::WrongState);
        }
        self.stakes = stakes;
        Ok(())
    }

    /// Start the game: fresh klopf memory, then the first round.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.phase != GamePhase::Lobby {
            return Err(GameError::GameAlreadyStarted);
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }
        self.klopf.reset_for_new_game();
        self.start_round();
        Ok(())
    }

    // === Round lifecycle ===

    fn start_round(&mut self) {
        self.round_number += 1;
        self.trick_number = 0;
        self.completed_tricks.clear();
        self.round_start_lives = self
            .players
            .iter()
            .map(|p| (p.id.clone(), p.lives))
            .collect();
        self.deal_hands();
    }

    /// Shuffle a fresh deck and deal every alive player a hand. The first
    /// one-life player auto-initiates a klopf; later one-life players only
    /// get the must-mitgehen flag.
    fn deal_hands(&mut self) {
        self.klopf.reset();
        self.deck = Deck::new();
        self.deck.shuffle();
        let mut auto_klopfed = false;
        for i in 0..self.players.len() {
            if self.players[i].is_alive() {
                self.players[i].cards_revealed = true;
                self.players[i].blind_declared = false;
                self.players[i].hand = self.deck.deal(CARDS_PER_PLAYER);
                if self.players[i].lives == 1 {
                    self.players[i].must_mitgehen = true;
                    if !auto_klopfed {
                        let id = self.players[i].id.clone();
                        // fails when this player klopfed last; the round
                        // then opens unraised
                        let _ = self.klopf.initiate(&id);
                        auto_klopfed = true;
                    }
                } else {
                    self.players[i].must_mitgehen = false;
                }
            } else {
                self.players[i].hand.clear();
            }
        }
        self.current_trick = Trick::new();
        self.phase = if self.klopf.active {
            GamePhase::KlopfPending
        } else {
            GamePhase::Dealing
        };
    }

    /// Leave the dealing window and begin the first trick of the round.
    pub fn start_playing(&mut self) -> Result<(), GameError> {
        if self.phase != GamePhase::Dealing {
            return Err(GameError::WrongState);
        }
        self.phase = GamePhase::Playing;
        self.trick_number = 1;
        self.ensure_current_alive();
        Ok(())
    }

    // === Klopf ===

    /// Blind klopf for three, declared before looking at the dealt hand.
    pub fn blind_drei(&mut self, player_id: &PlayerId) -> Result<u8, GameError> {
        if self.phase != GamePhase::Dealing {
            return Err(GameError::WrongState);
        }
        if self.klopf.last_klopper.as_ref() == Some(player_id) {
            return Err(GameError::CannotKlopfTwice);
        }
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == *player_id)
            .ok_or(GameError::PlayerNotFound)?;
        if player.blind_declared {
            return Err(GameError::AlreadyDeclaredBlind);
        }
        player.blind_declared = true;
        player.cards_revealed = false;
        // baseline of 2 so the initiation lands on level 3
        self.klopf.level = 2;
        self.klopf.initiate(player_id)?;
        self.phase = GamePhase::KlopfPending;
        Ok(self.klopf.level)
    }

    pub fn initiate_klopf(&mut self, player_id: &PlayerId) -> Result<u8, GameError> {
        if self.phase != GamePhase::Playing && self.phase != GamePhase::Dealing {
            return Err(GameError::WrongState);
        }
        let player = self.player(player_id).ok_or(GameError::PlayerNotFound)?;
        // escalation is bounded by the initiator's own lives
        if self.klopf.level + 1 > player.lives + 1 {
            return Err(GameError::KlopfLimitExceeded);
        }
        self.klopf.initiate(player_id)?;
        self.phase = GamePhase::KlopfPending;
        Ok(self.klopf.level)
    }

    /// Record one answer. Folding costs a life immediately. Returns true
    /// once the klopf resolved and play (re)started.
    pub fn respond_to_klopf(
        &mut self,
        player_id: &PlayerId,
        mitgehen: bool,
    ) -> Result<bool, GameError> {
        if self.phase != GamePhase::KlopfPending {
            return Err(GameError::WrongState);
        }
        let must_mitgehen = self
            .player(player_id)
            .ok_or(GameError::PlayerNotFound)?
            .must_mitgehen;
        self.klopf.respond(player_id, mitgehen, must_mitgehen)?;
        if !mitgehen {
            if let Some(player) = self.player_mut(player_id) {
                player.lose_lives(1);
            }
        }
        let alive = self.alive_ids();
        if self.klopf.all_responded(&alive) {
            self.phase = GamePhase::Playing;
            if self.trick_number == 0 {
                self.trick_number = 1;
            }
            self.ensure_current_alive();
            return Ok(true);
        }
        Ok(false)
    }

    // === Card play ===

    pub fn play_card(&mut self, player_id: &PlayerId, card_id: &str) -> Result<PlayOutcome, GameError> {
        if self.phase != GamePhase::Playing {
            return Err(GameError::WrongState);
        }
        let current = self.current_player_id().ok_or(GameError::WrongState)?;
        if current != *player_id {
            return Err(GameError::NotYourTurn);
        }
        let idx = self.current_player_idx;
        let card = {
            let player = &self.players[idx];
            let card = *player
                .hand
                .iter()
                .find(|c| c.id() == card_id)
                .ok_or(GameError::CardNotInHand)?;
            if let Some(lead) = self.current_trick.lead_suit {
                if !self.current_trick.cards.is_empty()
                    && card.suit != lead
                    && !player.cards_of_suit(lead).is_empty()
                {
                    return Err(GameError::MustFollowSuit);
                }
            }
            card
        };
        self.players[idx].remove_card(card_id);
        self.current_trick.push(player_id.clone(), card);

        let mut outcome = PlayOutcome {
            player_id: player_id.clone(),
            card,
            trick_winner: None,
            round_results: None,
        };
        if self.current_trick.is_complete(self.alive_count()) {
            self.complete_trick(&mut outcome);
        } else {
            self.advance_to_next_player();
        }
        Ok(outcome)
    }

    /// Server-side auto-play: pick uniformly among the currently legal
    /// cards and play it. Used when a turn times out.
    pub fn play_random_card(&mut self, player_id: &PlayerId) -> Result<PlayOutcome, GameError> {
        if self.phase != GamePhase::Playing {
            return Err(GameError::WrongState);
        }
        let player = self.player(player_id).ok_or(GameError::PlayerNotFound)?;
        let mut legal = player.hand.clone();
        if let Some(lead) = self.current_trick.lead_suit {
            if !self.current_trick.cards.is_empty() {
                let suited = player.cards_of_suit(lead);
                if !suited.is_empty() {
                    legal = suited;
                }
            }
        }
        let card = *legal.choose(&mut rand::rng()).ok_or(GameError::CardNotInHand)?;
        self.play_card(player_id, &card.id())
    }

    fn complete_trick(&mut self, outcome: &mut PlayOutcome) {
        let Some(taker) = self.current_trick.determine_winner() else {
            // resolving an empty trick is an internal inconsistency;
            // degrade to a no-op instead of taking the room down
            log::warn!("trick resolution with no cards, ignoring");
            return;
        };
        outcome.trick_winner = Some(taker.clone());
        self.phase = GamePhase::TrickComplete;
        self.completed_tricks.push(std::mem::take(&mut self.current_trick));
        if self.trick_number >= TRICKS_PER_ROUND {
            // taking the final trick loses the round
            self.end_round(&taker, outcome);
        } else {
            if let Some(i) = self.players.iter().position(|p| p.id == taker) {
                self.current_player_idx = i;
            }
            self.trick_number += 1;
            self.phase = GamePhase::Playing;
        }
    }

    fn end_round(&mut self, loser_id: &PlayerId, outcome: &mut PlayOutcome) {
        self.phase = GamePhase::RoundEnd;
        let penalty = if self.klopf.active && self.klopf.is_participant(loser_id) {
            self.klopf.penalty()
        } else {
            1
        };
        if let Some(loser) = self.player_mut(loser_id) {
            loser.lose_lives(penalty);
        }
        let results: Vec<RoundResult> = self
            .players
            .iter()
            .map(|p| RoundResult {
                player_id: p.id.clone(),
                player_name: p.name.clone(),
                lives_lost: self
                    .round_start_lives
                    .get(&p.id)
                    .copied()
                    .unwrap_or(p.lives)
                    .saturating_sub(p.lives),
                lives_left: p.lives,
                is_loser: p.id == *loser_id,
            })
            .collect();
        self.last_round_results = Some(RoundEndSummary {
            loser_id: loser_id.clone(),
            penalty,
            results: results.clone(),
        });
        outcome.round_results = Some(results);

        if self.alive_count() <= 1 {
            self.phase = GamePhase::GameOver;
        } else {
            self.start_round();
        }
    }

    fn advance_to_next_player(&mut self) {
        if self.players.is_empty() {
            return;
        }
        let start = self.current_player_idx;
        loop {
            self.current_player_idx = (self.current_player_idx + 1) % self.players.len();
            if self.players[self.current_player_idx].is_alive() || self.current_player_idx == start {
                break;
            }
        }
    }

    fn ensure_current_alive(&mut self) {
        if let Some(player) = self.players.get(self.current_player_idx) {
            if !player.is_alive() {
                self.advance_to_next_player();
            }
        }
    }

    // === Redeal (Einigung) ===

    /// Two-player renegotiation: discard the dealt hands and deal again.
    pub fn request_redeal(&mut self, player_id: &PlayerId) -> Result<(), GameError> {
        if self.phase != GamePhase::Dealing {
            return Err(GameError::WrongState);
        }
        if self.alive_count() != 2 {
            return Err(GameError::RedealNotAllowed);
        }
        if self.redeal_count >= MAX_REDEALS {
            return Err(GameError::RedealLimitReached);
        }
        if self.redeal_requester.as_ref() == Some(player_id) {
            return Err(GameError::AlreadyRequestedRedeal);
        }
        if self.player(player_id).is_none() {
            return Err(GameError::PlayerNotFound);
        }
        self.redeal_requester = Some(player_id.clone());
        self.redeal_responses.clear();
        self.phase = GamePhase::RedealPending;
        Ok(())
    }

    pub fn respond_to_redeal(
        &mut self,
        player_id: &PlayerId,
        agree: bool,
    ) -> Result<RedealOutcome, GameError> {
        if self.phase != GamePhase::RedealPending {
            return Err(GameError::WrongState);
        }
        if self.redeal_requester.as_ref() == Some(player_id) {
            return Ok(RedealOutcome::NotResponder);
        }
        if self.player(player_id).is_none() {
            return Err(GameError::PlayerNotFound);
        }
        self.redeal_responses.insert(player_id.clone(), agree);
        if agree {
            self.redeal_count += 1;
            self.redeal_requester = None;
            self.redeal_responses.clear();
            self.deal_hands();
            Ok(RedealOutcome::Performed)
        } else {
            self.redeal_requester = None;
            self.redeal_responses.clear();
            self.phase = GamePhase::Dealing;
            Ok(RedealOutcome::Declined)
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
