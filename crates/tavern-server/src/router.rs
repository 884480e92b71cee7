//! Axum router construction for the gateway.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tavern_db::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router:
/// - `GET /health` -- liveness check
/// - `GET /ws` -- realtime lobby socket
///
/// CORS allows any origin so browser clients served from another host can
/// open the socket.
pub fn build_router<S: Store>(state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::<S>))
        .route("/ws", get(ws::ws_lobby::<S>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
