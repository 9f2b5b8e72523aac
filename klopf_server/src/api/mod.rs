//! HTTP surface: a single WebSocket upgrade route.

pub mod websocket;

use std::sync::Arc;

use axum::{Router, routing::get};
use klopf::net::Dispatcher;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket::websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
