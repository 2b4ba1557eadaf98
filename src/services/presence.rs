//! Presence service — ephemeral cursor position payloads.
//!
//! DESIGN
//! ======
//! Cursor positions are purely ephemeral: relayed to room peers and
//! immediately forgotten. No persistence, no server-side state, no
//! acknowledgment — a lost update is superseded by the next one. Receivers
//! handle expiry on their side (`client::cursor::PresenceView`).

use uuid::Uuid;

use crate::frame::Data;

/// Palette for presence colors. Indexed by a hash of the user id so every
/// client derives the same color for the same user with no coordination.
const CURSOR_PALETTE: [&str; 12] = [
    "#E53935", "#D81B60", "#8E24AA", "#5E35B1", "#3949AB", "#1E88E5",
    "#00897B", "#43A047", "#F4511E", "#6D4C41", "#546E7A", "#FB8C00",
];

/// Deterministic presence color for a user (FNV-1a over the raw id bytes).
#[must_use]
pub fn color_for(user_id: Uuid) -> &'static str {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in user_id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    let index = usize::try_from(hash % CURSOR_PALETTE.len() as u64).unwrap_or(0);
    CURSOR_PALETTE[index]
}

/// Build the relayed `presence:move` payload. The color is stamped
/// server-side so receivers never depend on the sender's claim.
#[must_use]
pub fn move_payload(user_id: Uuid, name: &str, x: f64, y: f64) -> Data {
    let mut data = Data::new();
    data.insert("user_id".into(), serde_json::json!(user_id));
    data.insert("name".into(), serde_json::json!(name));
    data.insert("x".into(), serde_json::json!(x));
    data.insert("y".into(), serde_json::json!(y));
    data.insert("color".into(), serde_json::json!(color_for(user_id)));
    data
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
