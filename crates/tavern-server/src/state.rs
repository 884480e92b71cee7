//! Shared application state for the gateway server.

use std::sync::Arc;
use std::time::Instant;

use tavern_db::Store;
use tavern_session::{Gateway, TokenResolver};

/// State shared by every HTTP handler and socket task.
pub struct AppState<S> {
    /// Realtime event dispatcher.
    pub gateway: Gateway<S>,
    started_at: Instant,
}

impl<S: Store> AppState<S> {
    /// Build the state around a store and a token verifier.
    pub fn new(store: Arc<S>, tokens: TokenResolver) -> Self {
        Self {
            gateway: Gateway::new(store, tokens),
            started_at: Instant::now(),
        }
    }

    /// Whole seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
