//! Realtime gateway server for Tavern lobbies.
//!
//! This crate puts the [`tavern_session::Gateway`] on the network:
//!
//! - **`WebSocket` endpoint** (`/ws`) carrying the JSON lobby protocol
//! - **Health endpoint** (`/health`) for load balancers and health checks
//! - **Configuration** from `tavern-config.yaml` plus environment overrides
//! - **Startup wiring** that selects the in-memory or `PostgreSQL` store
//!
//! # Architecture
//!
//! ```text
//! socket task ──frames──► Gateway::handle ──► Store
//!      ▲                        │
//!      └──── Outbox ◄─── Hub ◄──┘ (unicast / room broadcast)
//! ```
//!
//! Each socket runs in its own task. Inbound frames are decoded and handed
//! to the gateway in order; outbound events arrive through the
//! connection's [`Outbox`](tavern_session::Outbox) and are written as text
//! frames.

pub mod config;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

pub use config::{ConfigError, ServerSettings, StorageBackend};
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use startup::{StartupError, run};
pub use state::AppState;
