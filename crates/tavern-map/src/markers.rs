//! Marker list kept inside each lobby's map state blob.
//!
//! The blob is the smallest unit of storage, so every mutation reads the
//! whole state, edits the list and writes the whole state back. Mutations
//! on one lobby are serialized by a per-lobby lock.

use std::sync::Arc;

use tavern_db::Store;
use tavern_types::{LobbyId, MapState, Marker};

use crate::error::MapError;
use crate::locks::KeyedLocks;

/// Marker operations for all lobbies, shared behind an `Arc`.
pub struct MarkerBoard<S> {
    store: Arc<S>,
    locks: KeyedLocks<LobbyId>,
}

impl<S: Store> MarkerBoard<S> {
    /// Create a marker board over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// The lobby's current map state, or the default if none was stored.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Storage`] if the read fails.
    pub async fn state(&self, lobby: LobbyId) -> Result<MapState, MapError> {
        Ok(self.store.get_map_state(lobby).await?.unwrap_or_default())
    }

    /// Append a marker. Its id is the list length before insertion plus one.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Storage`] if the read or write fails; the marker
    /// is then not part of the stored state.
    pub async fn add(
        &self,
        lobby: LobbyId,
        x: f64,
        y: f64,
        marker_type: &str,
        created_by: &str,
    ) -> Result<Marker, MapError> {
        let _guard = self.locks.lock(lobby).await;
        let mut state = self.state(lobby).await?;
        let marker = Marker {
            id: u64::try_from(state.markers.len())
                .unwrap_or(u64::MAX)
                .saturating_add(1),
            x,
            y,
            marker_type: marker_type.to_owned(),
            created_by: created_by.to_owned(),
        };
        state.markers.push(marker.clone());
        self.store.put_map_state(lobby, &state).await?;
        tracing::debug!(%lobby, marker_id = marker.id, "Added marker");
        Ok(marker)
    }

    /// Move every marker with `marker_id`. Unknown ids change nothing but
    /// the state is still rewritten. Returns whether any marker matched.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Storage`] if the read or write fails.
    pub async fn move_marker(
        &self,
        lobby: LobbyId,
        marker_id: u64,
        x: f64,
        y: f64,
    ) -> Result<bool, MapError> {
        let _guard = self.locks.lock(lobby).await;
        let mut state = self.state(lobby).await?;
        let mut found = false;
        for marker in state.markers.iter_mut().filter(|m| m.id == marker_id) {
            marker.x = x;
            marker.y = y;
            found = true;
        }
        self.store.put_map_state(lobby, &state).await?;
        tracing::debug!(%lobby, marker_id, found, "Moved marker");
        Ok(found)
    }

    /// Remove every marker with `marker_id`. Unknown ids change nothing but
    /// the state is still rewritten. Returns whether any marker matched.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Storage`] if the read or write fails.
    pub async fn delete(&self, lobby: LobbyId, marker_id: u64) -> Result<bool, MapError> {
        let _guard = self.locks.lock(lobby).await;
        let mut state = self.state(lobby).await?;
        let before = state.markers.len();
        state.markers.retain(|m| m.id != marker_id);
        let found = state.markers.len() != before;
        self.store.put_map_state(lobby, &state).await?;
        tracing::debug!(%lobby, marker_id, found, "Deleted marker");
        Ok(found)
    }
}
