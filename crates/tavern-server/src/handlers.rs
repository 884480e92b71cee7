//! Plain HTTP handlers.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness check with connection count |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};
use tavern_db::Store;

use crate::state::AppState;

/// Report liveness, uptime and the number of open sockets.
pub async fn health<S: Store>(State(state): State<Arc<AppState<S>>>) -> Json<Value> {
    let connections = state.gateway.hub().connection_count().await;
    Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime_secs(),
        "connections": connections,
    }))
}
