//! Networking boundary: wire protocol, connection registry, and dispatch.
//!
//! The transport itself (WebSocket framing, HTTP upgrade) lives in the
//! server binary; this module only deals in typed messages and channel
//! handles, so it can be driven end-to-end from tests without sockets.

pub mod connections;
pub mod dispatch;
pub mod messages;

pub use connections::{ConnectionId, ConnectionRegistry};
pub use dispatch::{Dispatcher, SessionError};
pub use messages::{ClientMessage, GameStateInfo, KlopfInfo, ServerMessage};
