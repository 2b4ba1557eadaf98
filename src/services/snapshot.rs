//! Snapshot synchronizer — bootstraps late joiners from the durable store.
//!
//! DESIGN
//! ======
//! `scene:request` fetches the last durably-saved snapshot for a board and
//! delivers it to the requesting connection only — never broadcast. The
//! complementary path, an owner-authored `scene:sync` broadcast, is relayed
//! verbatim by the ws dispatch layer like any operation; this module never
//! interprets snapshot contents.
//!
//! ERROR HANDLING
//! ==============
//! A board that was never persisted (or has no snapshot yet) replies with an
//! empty payload rather than an error: a brand-new board legitimately has
//! nothing to sync. Only store failures surface as error frames.

use uuid::Uuid;

use crate::frame::{Data, FRAME_PAYLOAD};
use crate::state::AppState;
use crate::store::StoreError;

/// Empty-scene payload used when no snapshot exists yet.
const EMPTY_SCENE: &str = "{}";

/// Load the latest snapshot payload for a board.
///
/// # Errors
///
/// Returns a `StoreError` if the store read fails.
pub async fn latest_snapshot(state: &AppState, board_id: Uuid) -> Result<Data, StoreError> {
    let record = state.store.get_board(board_id).await?;
    let payload = record
        .and_then(|r| r.canvas_data)
        .unwrap_or_else(|| EMPTY_SCENE.to_owned());

    let mut data = Data::new();
    data.insert(FRAME_PAYLOAD.into(), serde_json::Value::String(payload));
    Ok(data)
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
