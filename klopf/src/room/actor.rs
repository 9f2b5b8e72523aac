//! Room actor: the single logical owner of one game.
//!
//! Each room runs in its own tokio task with an mpsc inbox, so all
//! mutations of one game are serialized while separate rooms run fully in
//! parallel. The actor also owns the room's single timer slot (turn timer
//! or dealing window) and fans resulting state out through the shared
//! connection registry. Sends are channel writes only; no socket I/O
//! happens on the actor task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::game::constants::{DEAL_WINDOW, MAX_REDEALS, TURN_TIMEOUT};
use crate::game::{Game, GameError, GamePhase, PlayOutcome, Player, PlayerId, RedealOutcome};
use crate::net::connections::{ConnectionId, ConnectionRegistry};
use crate::net::messages::{GameStateInfo, ServerMessage};

use super::messages::RoomMessage;

/// Inbox capacity per room.
const INBOX_CAPACITY: usize = 64;

/// Timer durations, shortened in tests.
#[derive(Clone, Debug)]
pub struct RoomConfig {
    pub turn_timeout: Duration,
    pub deal_window: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            turn_timeout: TURN_TIMEOUT,
            deal_window: DEAL_WINDOW,
        }
    }
}

/// Cloneable handle for sending messages to a room actor.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    code: String,
    owner_id: PlayerId,
}

impl RoomHandle {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn owner_id(&self) -> &PlayerId {
        &self.owner_id
    }

    /// Queue a message for the actor. Fails once the room has shut down.
    pub async fn send(&self, message: RoomMessage) -> Result<(), GameError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| GameError::WrongState)
    }
}

pub struct RoomActor {
    code: String,
    owner_id: PlayerId,
    config: RoomConfig,
    game: Game,
    inbox: mpsc::Receiver<RoomMessage>,
    /// Weak handle to the own inbox for timer tasks. Weak so the actor
    /// shuts down once every external handle is gone.
    self_sender: mpsc::WeakSender<RoomMessage>,
    connections: Arc<ConnectionRegistry>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every arm/cancel; a firing timer carrying an older
    /// generation is a guaranteed no-op.
    timer_generation: u64,
    closed: bool,
}

impl RoomActor {
    pub fn new(
        code: String,
        owner_id: PlayerId,
        config: RoomConfig,
        connections: Arc<ConnectionRegistry>,
    ) -> (Self, RoomHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let self_sender = sender.downgrade();
        let handle = RoomHandle {
            sender,
            code: code.clone(),
            owner_id: owner_id.clone(),
        };
        let actor = Self {
            code,
            owner_id,
            config,
            game: Game::new(),
            inbox,
            self_sender,
            connections,
            timer: None,
            timer_generation: 0,
            closed: false,
        };
        (actor, handle)
    }

    /// Actor event loop. Runs until the room closes or every handle drops.
    pub async fn run(mut self) {
        log::info!("room {} open", self.code);
        while let Some(message) = self.inbox.recv().await {
            self.handle_message(message);
            if self.closed {
                break;
            }
        }
        self.cancel_timer();
        log::info!("room {} closed", self.code);
    }

    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join { player, respond_to } => {
                let _ = respond_to.send(self.handle_join(player));
            }
            RoomMessage::Reconnect {
                conn_id,
                player_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_reconnect(conn_id, &player_id));
            }
            RoomMessage::Disconnect { player_id } => {
                self.handle_disconnect(&player_id);
            }
            RoomMessage::StartGame {
                player_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_start(&player_id));
            }
            RoomMessage::CloseRoom {
                player_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_close(&player_id));
            }
            RoomMessage::SetStakes {
                player_id,
                stakes,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_set_stakes(&player_id, stakes));
            }
            RoomMessage::PlayCard {
                player_id,
                card_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_play_card(&player_id, &card_id));
            }
            RoomMessage::Klopf {
                player_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_klopf(&player_id));
            }
            RoomMessage::KlopfResponse {
                player_id,
                mitgehen,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_klopf_response(&player_id, mitgehen));
            }
            RoomMessage::BlindDrei {
                player_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_blind_drei(&player_id));
            }
            RoomMessage::RequestRedeal {
                player_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_request_redeal(&player_id));
            }
            RoomMessage::RedealResponse {
                player_id,
                agree,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_redeal_response(&player_id, agree));
            }
            RoomMessage::PlayerCount { respond_to } => {
                let _ = respond_to.send(self.game.players.len());
            }
            RoomMessage::TurnTimeout { generation } => {
                self.handle_turn_timeout(generation);
            }
            RoomMessage::DealWindowElapsed { generation } => {
                self.handle_deal_window_elapsed(generation);
            }
        }
    }

    // === Broadcast helpers ===

    fn broadcast(&self, message: ServerMessage) {
        for player in &self.game.players {
            if player.connected {
                self.connections.send_to(&player.id, message.clone());
            }
        }
    }

    fn send_to(&self, player_id: &PlayerId, message: ServerMessage) {
        self.connections.send_to(player_id, message);
    }

    fn broadcast_state(&self) {
        self.broadcast(ServerMessage::GameState {
            state: GameStateInfo::snapshot(&self.game),
        });
    }

    /// Deliver private hands and klopf nudges after a deal, then either
    /// wait out the klopf or open the dealing window.
    fn after_deal(&mut self) {
        for player in &self.game.players {
            if player.is_alive() && player.connected {
                self.connections.send_to(
                    &player.id,
                    ServerMessage::CardsDealt {
                        cards: player.hand.clone(),
                    },
                );
            }
        }
        match self.game.phase() {
            GamePhase::KlopfPending => {
                self.cancel_timer();
                self.announce_klopf();
            }
            GamePhase::Dealing => {
                self.arm_deal_window();
            }
            _ => {}
        }
        self.broadcast_state();
    }

    /// Broadcast an active klopf and nudge everyone who still owes an
    /// answer.
    fn announce_klopf(&self) {
        let klopf = self.game.klopf();
        let Some(initiator) = klopf.initiator.clone() else {
            return;
        };
        let level = klopf.level;
        self.broadcast(ServerMessage::KlopfInitiated {
            player_id: initiator.clone(),
            level,
        });
        for player in &self.game.players {
            if player.is_alive()
                && player.id != initiator
                && !self.game.klopf().responses.contains_key(&player.id)
            {
                self.send_to(&player.id, ServerMessage::KlopfResponseNeeded { level });
            }
        }
    }

    /// Common tail of every successful card play, including auto-plays.
    fn after_play(&mut self, outcome: PlayOutcome) {
        self.broadcast(ServerMessage::CardPlayed {
            player_id: outcome.player_id.clone(),
            card: outcome.card,
        });
        if let Some(winner_id) = outcome.trick_winner.clone() {
            self.broadcast(ServerMessage::TrickWon { winner_id });
        }
        if let Some(results) = outcome.round_results {
            self.broadcast(ServerMessage::RoundEnded { results });
            if self.game.phase() == GamePhase::GameOver {
                self.cancel_timer();
                if let Some(settlement) = self.game.settlement() {
                    self.broadcast(ServerMessage::GameOver {
                        winner_id: settlement.winner_id,
                        perfect_win: settlement.perfect_win,
                        stakes: settlement.stakes,
                        winnings: settlement.winnings,
                    });
                }
                self.broadcast_state();
            } else {
                // next round was dealt immediately
                self.after_deal();
            }
        } else {
            if self.game.phase() == GamePhase::Playing {
                self.arm_turn_timer();
            }
            self.broadcast_state();
        }
    }

    // === Message handlers ===

    fn handle_join(&mut self, player: Player) -> Result<(), GameError> {
        let info = player.info();
        self.game.add_player(player)?;
        self.broadcast(ServerMessage::PlayerJoined { player: info });
        self.broadcast_state();
        Ok(())
    }

    fn handle_reconnect(
        &mut self,
        conn_id: ConnectionId,
        player_id: &PlayerId,
    ) -> Result<(), GameError> {
        let player = self
            .game
            .player_mut(player_id)
            .ok_or(GameError::PlayerNotFound)?;
        player.connected = true;
        self.connections.bind(conn_id, player_id, &self.code);
        log::info!("room {}: player {player_id} reconnected", self.code);

        self.send_to(
            player_id,
            ServerMessage::RoomCreated {
                room_code: self.code.clone(),
                player_id: player_id.clone(),
            },
        );
        // re-deliver the public state, the private hand, and any pending
        // obligation; the original nudge went to a connection that may no
        // longer exist
        self.send_to(
            player_id,
            ServerMessage::GameState {
                state: GameStateInfo::snapshot(&self.game),
            },
        );
        let player = self.game.player(player_id).ok_or(GameError::PlayerNotFound)?;
        let alive = player.is_alive();
        if self.game.phase() != GamePhase::Lobby && alive && !player.hand.is_empty() {
            self.send_to(
                player_id,
                ServerMessage::CardsDealt {
                    cards: player.hand.clone(),
                },
            );
        }
        match self.game.phase() {
            GamePhase::KlopfPending => {
                let klopf = self.game.klopf();
                if alive
                    && klopf.initiator.as_ref() != Some(player_id)
                    && !klopf.responses.contains_key(player_id)
                {
                    let level = klopf.level;
                    self.send_to(player_id, ServerMessage::KlopfResponseNeeded { level });
                }
            }
            GamePhase::RedealPending => {
                if alive && self.game.redeal_requester() != Some(player_id) {
                    self.send_to(
                        player_id,
                        ServerMessage::RedealResponseNeeded {
                            redeal_count: self.game.redeal_count(),
                            max_redeals: MAX_REDEALS,
                        },
                    );
                }
            }
            _ => {}
        }
        // everyone else sees the connected flag flip
        self.broadcast_state();
        Ok(())
    }

    fn handle_disconnect(&mut self, player_id: &PlayerId) {
        let Some(player) = self.game.player_mut(player_id) else {
            return;
        };
        player.connected = false;
        log::info!("room {}: player {player_id} disconnected", self.code);
        // the player stays in the game and the turn timer keeps running;
        // a timeout will play for them
        self.broadcast(ServerMessage::PlayerLeft {
            player_id: player_id.clone(),
        });
        self.broadcast_state();
    }

    fn handle_start(&mut self, player_id: &PlayerId) -> Result<(), GameError> {
        if *player_id != self.owner_id {
            return Err(GameError::NotOwner);
        }
        self.game.start()?;
        log::info!("room {}: game started", self.code);
        self.broadcast(ServerMessage::GameStarted);
        self.after_deal();
        Ok(())
    }

    fn handle_close(&mut self, player_id: &PlayerId) -> Result<Vec<PlayerId>, GameError> {
        if *player_id != self.owner_id {
            return Err(GameError::NotOwner);
        }
        self.broadcast(ServerMessage::RoomClosed);
        self.closed = true;
        self.cancel_timer();
        Ok(self.game.players.iter().map(|p| p.id.clone()).collect())
    }

    fn handle_set_stakes(&mut self, player_id: &PlayerId, stakes: u32) -> Result<(), GameError> {
        if *player_id != self.owner_id {
            return Err(GameError::NotOwner);
        }
        self.game.set_stakes(stakes)?;
        self.broadcast_state();
        Ok(())
    }

    fn handle_play_card(&mut self, player_id: &PlayerId, card_id: &str) -> Result<(), GameError> {
        let outcome = self.game.play_card(player_id, card_id)?;
        self.cancel_timer();
        self.after_play(outcome);
        Ok(())
    }

    fn handle_klopf(&mut self, player_id: &PlayerId) -> Result<(), GameError> {
        self.game.initiate_klopf(player_id)?;
        self.cancel_timer();
        self.announce_klopf();
        self.broadcast_state();
        Ok(())
    }

    fn handle_klopf_response(
        &mut self,
        player_id: &PlayerId,
        mitgehen: bool,
    ) -> Result<(), GameError> {
        let resolved = self.game.respond_to_klopf(player_id, mitgehen)?;
        if resolved {
            self.broadcast(ServerMessage::KlopfResolved {
                level: self.game.klopf().level,
            });
            self.arm_turn_timer();
        }
        self.broadcast_state();
        Ok(())
    }

    fn handle_blind_drei(&mut self, player_id: &PlayerId) -> Result<(), GameError> {
        self.game.blind_drei(player_id)?;
        self.cancel_timer();
        self.announce_klopf();
        self.broadcast_state();
        Ok(())
    }

    fn handle_request_redeal(&mut self, player_id: &PlayerId) -> Result<(), GameError> {
        self.game.request_redeal(player_id)?;
        self.cancel_timer();
        self.broadcast(ServerMessage::RedealRequested {
            player_id: player_id.clone(),
        });
        for player in &self.game.players {
            if player.is_alive() && player.id != *player_id {
                self.send_to(
                    &player.id,
                    ServerMessage::RedealResponseNeeded {
                        redeal_count: self.game.redeal_count(),
                        max_redeals: MAX_REDEALS,
                    },
                );
            }
        }
        self.broadcast_state();
        Ok(())
    }

    fn handle_redeal_response(
        &mut self,
        player_id: &PlayerId,
        agree: bool,
    ) -> Result<(), GameError> {
        match self.game.respond_to_redeal(player_id, agree)? {
            RedealOutcome::Performed => {
                self.broadcast(ServerMessage::RedealPerformed {
                    redeal_count: self.game.redeal_count(),
                    max_redeals: MAX_REDEALS,
                });
                self.after_deal();
            }
            RedealOutcome::Declined => {
                self.broadcast(ServerMessage::RedealDeclined);
                self.arm_deal_window();
                self.broadcast_state();
            }
            RedealOutcome::NotResponder => {}
        }
        Ok(())
    }

    fn handle_turn_timeout(&mut self, generation: u64) {
        if generation != self.timer_generation {
            return;
        }
        self.timer = None;
        if self.game.phase() != GamePhase::Playing {
            return;
        }
        let Some(current) = self.game.current_player_id() else {
            return;
        };
        match self.game.play_random_card(&current) {
            Ok(outcome) => {
                log::info!(
                    "room {}: turn timeout, played {} for {current}",
                    self.code,
                    outcome.card
                );
                self.after_play(outcome);
            }
            Err(err) => {
                log::warn!("room {}: timeout auto-play failed: {err}", self.code);
            }
        }
    }

    fn handle_deal_window_elapsed(&mut self, generation: u64) {
        if generation != self.timer_generation {
            return;
        }
        self.timer = None;
        if self.game.start_playing().is_ok() {
            self.arm_turn_timer();
            self.broadcast_state();
        }
    }

    // === Timer management ===

    /// Cancel-before-rearm keeps at most one live timer per room and makes
    /// arming idempotent.
    fn arm_turn_timer(&mut self) {
        self.cancel_timer();
        let generation = self.timer_generation;
        let sender = self.self_sender.clone();
        let timeout = self.config.turn_timeout;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(sender) = sender.upgrade() {
                let _ = sender.send(RoomMessage::TurnTimeout { generation }).await;
            }
        }));
    }

    fn arm_deal_window(&mut self) {
        self.cancel_timer();
        let generation = self.timer_generation;
        let sender = self.self_sender.clone();
        let window = self.config.deal_window;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(sender) = sender.upgrade() {
                let _ = sender
                    .send(RoomMessage::DealWindowElapsed { generation })
                    .await;
            }
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.timer_generation += 1;
    }
}
