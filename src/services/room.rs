//! Room registry — membership, join/leave, and fan-out broadcast.
//!
//! DESIGN
//! ======
//! A room is created implicitly when the first participant joins and
//! discarded when the last one leaves; nothing about a room is persisted.
//! The registry is the only server-side mutable shared state, protected by
//! the `rooms` RwLock in `AppState`.
//!
//! ERROR HANDLING
//! ==============
//! Broadcast is best-effort: a full or closed client channel is skipped,
//! never retried. An empty or unknown room makes broadcast a no-op — that
//! is the expected case for a lone editor, not an error.

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::frame::Frame;
use crate::state::{AppState, Participant, RoomState};

// =============================================================================
// TYPES
// =============================================================================

/// Roster entry returned to a joining client.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RoomPeer {
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
    pub is_owner: bool,
}

// =============================================================================
// JOIN / LEAVE
// =============================================================================

/// Join a room, creating it on first join. Returns the roster of peers
/// already present (excluding the joiner) for the join reply.
///
/// Participants are keyed by connection, so a second session for the same
/// user joins as an independent participant.
pub async fn join_room(
    state: &AppState,
    board_id: Uuid,
    participant: Participant,
    client_id: Uuid,
    tx: mpsc::Sender<Frame>,
) -> Vec<RoomPeer> {
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(board_id).or_insert_with(RoomState::new);

    let peers = roster(room);
    room.clients.insert(client_id, tx);
    room.participants.insert(client_id, participant);

    info!(%board_id, %client_id, participants = room.participants.len(), "client joined room");
    peers
}

/// Leave a room. Removes the participant slot; an emptied room entry is
/// discarded with no retained history. Also invoked on abrupt transport
/// closure, so ghost participants never outlive their connection.
pub async fn leave_room(state: &AppState, board_id: Uuid, client_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(&board_id) else {
        return;
    };

    room.clients.remove(&client_id);
    room.participants.remove(&client_id);
    info!(%board_id, %client_id, remaining = room.participants.len(), "client left room");

    if room.clients.is_empty() {
        rooms.remove(&board_id);
        info!(%board_id, "discarded empty room");
    }
}

/// Current roster for a room, keyed by connection.
pub async fn list_room_peers(state: &AppState, board_id: Uuid) -> Vec<RoomPeer> {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(&board_id) else {
        return Vec::new();
    };
    roster(room)
}

fn roster(room: &RoomState) -> Vec<RoomPeer> {
    room.participants
        .iter()
        .map(|(client_id, p)| RoomPeer {
            client_id: *client_id,
            user_id: p.user_id,
            name: p.name.clone(),
            color: p.color.clone(),
            is_owner: p.is_owner,
        })
        .collect()
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Broadcast a frame to all clients in a room, optionally excluding one.
pub async fn broadcast(state: &AppState, board_id: Uuid, frame: &Frame, exclude: Option<Uuid>) {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(&board_id) else {
        return;
    };

    for (client_id, tx) in &room.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        let _ = tx.try_send(frame.clone());
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
