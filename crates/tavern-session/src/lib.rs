//! Realtime session layer for Tavern lobbies.
//!
//! ```text
//! socket frames
//!     |
//!     +-- Gateway::handle
//!         |-- PresenceTracker  (token -> user, connection -> (user, lobby), ban gate)
//!         |-- Hub              (rooms, unicast, broadcast)
//!         |-- chat             (/roll interception)
//!         |-- tavern-map       (chunks, markers)
//!         +-- Store            (durable records)
//! ```
//!
//! # Modules
//!
//! - [`gateway`] -- Event dispatch and authorization
//! - [`presence`] -- Presence and membership tracking
//! - [`hub`] -- Connection registry and lobby rooms
//! - [`chat`] -- Chat line and dice command interpretation
//! - [`auth`] -- Identity token resolution
//! - [`error`] -- Session error taxonomy and wire codes

pub mod auth;
pub mod chat;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod presence;

pub use auth::{TokenClaims, TokenResolver};
pub use error::SessionError;
pub use gateway::{CHAT_HISTORY_LIMIT, Gateway};
pub use hub::{Hub, Outbox};
pub use presence::{Admission, Caller, Departure, PresenceTracker};
