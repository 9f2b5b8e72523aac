//! Session-layer tests: dispatcher, room actors, timers, and reconnects.
//!
//! These drive the full path an inbound socket frame takes, minus the
//! socket itself: fake connections are mpsc queues registered with the
//! connection registry, and timers run shortened via `RoomConfig`.

use std::sync::Arc;
use std::time::Duration;

use klopf::game::GamePhase;
use klopf::net::connections::{ConnectionId, ConnectionRegistry, OUTBOUND_CAPACITY};
use klopf::net::messages::{ClientMessage, ServerMessage};
use klopf::net::Dispatcher;
use klopf::room::{RoomConfig, RoomRegistry};
use tokio::sync::mpsc;
use tokio::time::timeout;

struct Harness {
    dispatcher: Arc<Dispatcher>,
    connections: Arc<ConnectionRegistry>,
}

fn harness(turn_timeout_ms: u64, deal_window_ms: u64) -> Harness {
    let connections = Arc::new(ConnectionRegistry::new());
    let rooms = Arc::new(RoomRegistry::with_config(
        connections.clone(),
        RoomConfig {
            turn_timeout: Duration::from_millis(turn_timeout_ms),
            deal_window: Duration::from_millis(deal_window_ms),
        },
    ));
    Harness {
        dispatcher: Arc::new(Dispatcher::new(rooms, connections.clone())),
        connections,
    }
}

struct Client {
    conn_id: ConnectionId,
    rx: mpsc::Receiver<ServerMessage>,
}

impl Harness {
    fn connect(&self) -> Client {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        Client {
            conn_id: self.connections.open(tx),
            rx,
        }
    }

    async fn send(&self, client: &Client, message: ClientMessage) {
        self.dispatcher.handle_message(client.conn_id, message).await;
    }
}

impl Client {
    /// Read messages until the predicate extracts a value.
    async fn expect<T>(&mut self, pred: impl Fn(&ServerMessage) -> Option<T>) -> T {
        timeout(Duration::from_secs(2), async {
            loop {
                let msg = self.rx.recv().await.expect("connection queue closed");
                if let Some(value) = pred(&msg) {
                    return value;
                }
            }
        })
        .await
        .expect("timed out waiting for a message")
    }

    async fn expect_error(&mut self) -> String {
        self.expect(|m| match m {
            ServerMessage::Error { error } => Some(error.clone()),
            _ => None,
        })
        .await
    }
}

/// Create a room with owner `a` and have `b` join it. Returns the room
/// code and both player ids.
async fn setup_room(h: &Harness, a: &mut Client, b: &mut Client) -> (String, String, String) {
    h.send(
        a,
        ClientMessage::CreateRoom {
            player_name: "Anna".into(),
        },
    )
    .await;
    let (room_code, a_id) = a
        .expect(|m| match m {
            ServerMessage::RoomCreated {
                room_code,
                player_id,
            } => Some((room_code.clone(), player_id.clone())),
            _ => None,
        })
        .await;

    h.send(
        b,
        ClientMessage::JoinRoom {
            room_code: room_code.clone(),
            player_name: "Ben".into(),
        },
    )
    .await;
    let b_id = b
        .expect(|m| match m {
            ServerMessage::RoomCreated { player_id, .. } => Some(player_id.clone()),
            _ => None,
        })
        .await;
    (room_code, a_id, b_id)
}

#[tokio::test]
async fn create_join_start_delivers_private_hands() {
    let h = harness(60_000, 60_000);
    let mut a = h.connect();
    let mut b = h.connect();
    let (_code, _a_id, b_id) = setup_room(&h, &mut a, &mut b).await;

    // the owner sees the join
    let joined = a
        .expect(|m| match m {
            ServerMessage::PlayerJoined { player } if player.id == b_id => Some(player.clone()),
            _ => None,
        })
        .await;
    assert_eq!(joined.name, "Ben");

    h.send(&a, ClientMessage::StartGame).await;
    a.expect(|m| matches!(m, ServerMessage::GameStarted).then_some(()))
        .await;
    let a_hand = a
        .expect(|m| match m {
            ServerMessage::CardsDealt { cards } => Some(cards.clone()),
            _ => None,
        })
        .await;
    let b_hand = b
        .expect(|m| match m {
            ServerMessage::CardsDealt { cards } => Some(cards.clone()),
            _ => None,
        })
        .await;
    assert_eq!(a_hand.len(), 4);
    assert_eq!(b_hand.len(), 4);
    // hands are disjoint
    assert!(a_hand.iter().all(|c| !b_hand.contains(c)));

    // the public snapshot never carries hands, only counts
    let state = b
        .expect(|m| match m {
            ServerMessage::GameState { state } if state.phase == GamePhase::Dealing => {
                Some(state.clone())
            }
            _ => None,
        })
        .await;
    assert!(state.players.iter().all(|p| p.card_count == 4));
}

#[tokio::test]
async fn non_owner_actions_are_rejected() {
    let h = harness(60_000, 60_000);
    let mut a = h.connect();
    let mut b = h.connect();
    setup_room(&h, &mut a, &mut b).await;

    h.send(&b, ClientMessage::StartGame).await;
    let err = b.expect_error().await;
    assert!(err.contains("owner"), "got: {err}");

    h.send(&b, ClientMessage::SetStakes { stakes: 5 }).await;
    let err = b.expect_error().await;
    assert!(err.contains("owner"), "got: {err}");
}

#[tokio::test]
async fn turn_timeout_auto_plays_for_an_idle_player() {
    let h = harness(80, 40);
    let mut a = h.connect();
    let mut b = h.connect();
    setup_room(&h, &mut a, &mut b).await;
    h.send(&a, ClientMessage::StartGame).await;

    // nobody acts: the dealing window elapses, then the turn timer fires
    // and the server plays a legal card
    let player_id = a
        .expect(|m| match m {
            ServerMessage::CardPlayed { player_id, .. } => Some(player_id.clone()),
            _ => None,
        })
        .await;
    assert!(!player_id.is_empty());
}

#[tokio::test]
async fn disconnect_keeps_the_game_running_and_reconnect_restores_state() {
    let h = harness(60, 30);
    let mut a = h.connect();
    let mut b = h.connect();
    let (room_code, _a_id, b_id) = setup_room(&h, &mut a, &mut b).await;
    h.send(&a, ClientMessage::StartGame).await;

    // drop Ben's socket mid-game; he stays seated
    h.dispatcher.handle_disconnect(b.conn_id).await;
    a.expect(|m| match m {
        ServerMessage::PlayerLeft { player_id } => (player_id == &b_id).then_some(()),
        _ => None,
    })
    .await;

    // timeouts keep the game moving with Ben gone
    a.expect(|m| matches!(m, ServerMessage::CardPlayed { .. }).then_some(()))
        .await;

    // a fresh connection reclaims the same player
    let mut b2 = h.connect();
    h.send(
        &b2,
        ClientMessage::Reconnect {
            room_code,
            player_id: b_id.clone(),
        },
    )
    .await;
    let state = b2
        .expect(|m| match m {
            ServerMessage::GameState { state } => Some(state.clone()),
            _ => None,
        })
        .await;
    let me = state.players.iter().find(|p| p.id == b_id).unwrap();
    assert!(me.connected);
    assert_eq!(state.players.len(), 2);
}

#[tokio::test]
async fn reconnect_redelivers_a_pending_klopf_nudge() {
    // long timers: the game stays in the dealing window
    let h = harness(60_000, 60_000);
    let mut a = h.connect();
    let mut b = h.connect();
    let (room_code, _a_id, b_id) = setup_room(&h, &mut a, &mut b).await;
    h.send(&a, ClientMessage::StartGame).await;

    h.send(&a, ClientMessage::Klopf).await;
    let level = b
        .expect(|m| match m {
            ServerMessage::KlopfResponseNeeded { level } => Some(*level),
            _ => None,
        })
        .await;
    assert_eq!(level, 1);

    // the nudge went to a connection that no longer exists; a reconnect
    // must repeat it
    h.dispatcher.handle_disconnect(b.conn_id).await;
    let mut b2 = h.connect();
    h.send(
        &b2,
        ClientMessage::Reconnect {
            room_code,
            player_id: b_id,
        },
    )
    .await;
    let level = b2
        .expect(|m| match m {
            ServerMessage::KlopfResponseNeeded { level } => Some(*level),
            _ => None,
        })
        .await;
    assert_eq!(level, 1);
}

#[tokio::test]
async fn malformed_and_unknown_messages_get_an_error_reply() {
    let h = harness(60_000, 60_000);
    let mut a = h.connect();

    h.dispatcher.handle_text(a.conn_id, "not json").await;
    let err = a.expect_error().await;
    assert!(err.contains("unknown or malformed"));

    h.dispatcher
        .handle_text(a.conn_id, r#"{"type":"cheat_mode"}"#)
        .await;
    let err = a.expect_error().await;
    assert!(err.contains("unknown or malformed"));
}

#[tokio::test]
async fn closing_a_room_evicts_its_players() {
    let h = harness(60_000, 60_000);
    let mut a = h.connect();
    let mut b = h.connect();
    setup_room(&h, &mut a, &mut b).await;

    h.send(&a, ClientMessage::CloseRoom).await;
    b.expect(|m| matches!(m, ServerMessage::RoomClosed).then_some(()))
        .await;

    // the membership is gone; further actions no longer resolve a room
    h.send(&b, ClientMessage::Klopf).await;
    let err = b.expect_error().await;
    assert!(err.contains("not in a room"), "got: {err}");
}

#[tokio::test]
async fn acting_before_joining_a_room_fails() {
    let h = harness(60_000, 60_000);
    let mut a = h.connect();
    h.send(
        &a,
        ClientMessage::PlayCard {
            card_id: "spades_10".into(),
        },
    )
    .await;
    let err = a.expect_error().await;
    assert!(err.contains("not in a room"));
}
