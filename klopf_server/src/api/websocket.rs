//! WebSocket handler bridging sockets onto the dispatch layer.
//!
//! Each socket gets a connection id and an outbound queue. A writer task
//! drains the queue into JSON text frames; inbound text frames go through
//! the dispatcher, which resolves the player and room and applies the
//! message to the right game. On close the dispatcher flags the player as
//! disconnected; the game keeps running and the player may reconnect.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use klopf::net::connections::OUTBOUND_CAPACITY;
use log::{error, info};
use tokio::sync::mpsc;

use super::AppState;

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let conn_id = state.dispatcher.connections().open(outbound_tx);
    info!("websocket connected (conn {conn_id})");

    let send_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(err) => error!("failed to serialize server message: {err}"),
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                state.dispatcher.handle_text(conn_id, &text).await;
            }
            Ok(Message::Close(_)) => break,
            Err(err) => {
                error!("websocket error (conn {conn_id}): {err}");
                break;
            }
            _ => {}
        }
    }

    state.dispatcher.handle_disconnect(conn_id).await;
    send_task.abort();
    info!("websocket disconnected (conn {conn_id})");
}
