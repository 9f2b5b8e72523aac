//! End-to-end scenarios across the game engine.

use klopf::game::constants::{DECK_SIZE, INITIAL_LIVES, MAX_REDEALS};
use klopf::game::{Game, GameError, GamePhase, Player, RedealOutcome};

fn new_game(count: usize) -> Game {
    let mut game = Game::new();
    for i in 0..count {
        let id = format!("p{}", i + 1);
        let name = format!("Player {}", i + 1);
        game.add_player(Player::new(id, name)).unwrap();
    }
    game
}

/// Drive the round to its end with random legal plays, returning the
/// round results.
fn play_out_round(game: &mut Game) -> Vec<klopf::game::RoundResult> {
    for _ in 0..64 {
        let current = game.current_player_id().expect("someone must be on turn");
        let outcome = game.play_random_card(&current).expect("a legal card exists");
        if let Some(results) = outcome.round_results {
            return results;
        }
    }
    panic!("round never ended");
}

#[test]
fn two_player_round_costs_the_loser_one_life() {
    let mut game = new_game(2);
    game.start().unwrap();
    // nobody is at one life, so no auto-klopf
    assert_eq!(game.phase(), GamePhase::Dealing);
    game.start_playing().unwrap();
    assert_eq!(game.phase(), GamePhase::Playing);

    let results = play_out_round(&mut game);
    let losers: Vec<_> = results.iter().filter(|r| r.is_loser).collect();
    assert_eq!(losers.len(), 1);
    assert_eq!(losers[0].lives_lost, 1);
    assert_eq!(losers[0].lives_left, INITIAL_LIVES - 1);

    let total_lives: u8 = game.players.iter().map(|p| p.lives).sum();
    assert_eq!(total_lives, 2 * INITIAL_LIVES - 1);
    // the next round was dealt immediately
    assert_eq!(game.round_number(), 2);
    assert_eq!(game.phase(), GamePhase::Dealing);
}

#[test]
fn dealt_cards_partition_the_deck() {
    let mut game = new_game(3);
    game.start().unwrap();
    let mut seen = std::collections::HashSet::new();
    let mut in_hands = 0;
    for player in &game.players {
        in_hands += player.hand.len();
        for card in &player.hand {
            assert!(seen.insert(card.id()), "{} dealt twice", card.id());
        }
    }
    assert_eq!(in_hands + game.deck_remaining(), DECK_SIZE);
}

#[test]
fn one_life_player_is_dealt_into_klopf_pending() {
    let mut game = new_game(2);
    game.players[1].lives = 1;
    game.start().unwrap();

    assert_eq!(game.phase(), GamePhase::KlopfPending);
    assert_eq!(game.klopf().initiator.as_deref(), Some("p2"));
    assert!(game.player("p2").unwrap().must_mitgehen);

    // the opponent accepts; play begins without any explicit klopf call
    let resolved = game.respond_to_klopf(&"p1".to_string(), true).unwrap();
    assert!(resolved);
    assert_eq!(game.phase(), GamePhase::Playing);
}

#[test]
fn back_to_back_klopf_is_rejected_even_across_resolution() {
    let mut game = new_game(2);
    game.start().unwrap();
    game.start_playing().unwrap();

    game.initiate_klopf(&"p1".to_string()).unwrap();
    game.respond_to_klopf(&"p2".to_string(), true).unwrap();
    assert_eq!(
        game.initiate_klopf(&"p1".to_string()),
        Err(GameError::CannotKlopfTwice)
    );
    // a counter-klopf by the other player frees p1 again
    game.initiate_klopf(&"p2".to_string()).unwrap();
    game.respond_to_klopf(&"p1".to_string(), true).unwrap();
    game.initiate_klopf(&"p1".to_string()).unwrap();
}

#[test]
fn redeal_negotiation_cycle() {
    let mut game = new_game(2);
    game.start().unwrap();
    assert_eq!(game.phase(), GamePhase::Dealing);

    // request, decline: back to dealing, count unchanged
    game.request_redeal(&"p1".to_string()).unwrap();
    assert_eq!(game.phase(), GamePhase::RedealPending);
    assert_eq!(
        game.respond_to_redeal(&"p2".to_string(), false).unwrap(),
        RedealOutcome::Declined
    );
    assert_eq!(game.phase(), GamePhase::Dealing);
    assert_eq!(game.redeal_count(), 0);

    // the same requester may go again; three accepts exhaust the limit
    for expected in 1..=MAX_REDEALS {
        game.request_redeal(&"p1".to_string()).unwrap();
        assert_eq!(
            game.respond_to_redeal(&"p2".to_string(), true).unwrap(),
            RedealOutcome::Performed
        );
        assert_eq!(game.redeal_count(), expected);
    }
    assert_eq!(
        game.request_redeal(&"p1".to_string()),
        Err(GameError::RedealLimitReached)
    );
}

#[test]
fn disconnected_player_is_auto_played_and_reconnects_intact() {
    let mut game = new_game(2);
    game.start().unwrap();
    game.start_playing().unwrap();

    let current = game.current_player_id().unwrap();
    game.player_mut(&current).unwrap().connected = false;

    // the timeout path plays a legal card regardless of the flag
    let outcome = game.play_random_card(&current).unwrap();
    assert_eq!(outcome.player_id, current);
    assert_eq!(game.player(&current).unwrap().hand.len(), 3);

    // reconnecting restores the same player: hand and lives are unchanged
    game.player_mut(&current).unwrap().connected = true;
    assert_eq!(game.player(&current).unwrap().hand.len(), 3);
    assert_eq!(game.player(&current).unwrap().lives, INITIAL_LIVES);
}

#[test]
fn game_runs_to_a_single_survivor() {
    let mut game = new_game(2);
    game.players[0].lives = 2;
    game.players[1].lives = 2;
    game.start().unwrap();

    let mut guard = 0;
    while game.phase() != GamePhase::GameOver {
        guard += 1;
        assert!(guard < 500, "game did not converge");
        match game.phase() {
            GamePhase::Dealing => game.start_playing().unwrap(),
            GamePhase::KlopfPending => {
                let initiator = game.klopf().initiator.clone().unwrap();
                let pending: Vec<_> = game
                    .alive_ids()
                    .into_iter()
                    .filter(|id| *id != initiator && !game.klopf().responses.contains_key(id))
                    .collect();
                // one response per pass; resolution may flip the phase
                if let Some(id) = pending.first() {
                    game.respond_to_klopf(id, true).unwrap();
                }
            }
            GamePhase::Playing => {
                let current = game.current_player_id().unwrap();
                game.play_random_card(&current).unwrap();
            }
            phase => panic!("unexpected phase {phase:?}"),
        }
    }

    assert_eq!(game.alive_count(), 1);
    let settlement = game.settlement().unwrap();
    assert_eq!(
        settlement.winner_id,
        game.winner().unwrap().id,
        "settlement names the survivor"
    );
    assert!(!settlement.perfect_win);
    assert_eq!(settlement.winnings, game.stakes());
}
