//! Session layer: one actor per room, plus the registry of live rooms.
//!
//! Each room runs in its own tokio task, giving every game a single
//! logical owner. Rooms are independent and run fully in parallel; the
//! registries support concurrent access from all of them.

pub mod actor;
pub mod messages;
pub mod registry;

pub use actor::{RoomActor, RoomConfig, RoomHandle};
pub use messages::RoomMessage;
pub use registry::RoomRegistry;
