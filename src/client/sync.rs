//! Snapshot application gate — bootstraps and owner-batch convergence.
//!
//! DESIGN
//! ======
//! A received snapshot replaces the full drawable scene, which makes it easy
//! to build a feedback loop: applying a sync looks like a change, a change
//! can trigger a resync. The gate rate-limits applications to one per two
//! seconds to break that loop.
//!
//! Applying a snapshot must not disturb the receiving user: the viewport
//! (pan/zoom) is never touched — it lives on the mirror, outside the scene —
//! and live remote cursors are re-attached, since a naive full reload would
//! wipe every object including ephemeral presence.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::client::scene::Scene;

/// Minimum interval between applied snapshot syncs.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(2);

/// Rate-limited snapshot applier.
#[derive(Debug, Default)]
pub struct SyncGate {
    last_applied: Option<Instant>,
}

impl SyncGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a snapshot payload to the scene. Returns true if applied,
    /// false if suppressed by the rate limit. Malformed payloads are logged
    /// and dropped without touching the scene.
    pub fn apply(&mut self, scene: &mut Scene, payload: &str, now: Instant) -> bool {
        if let Some(last) = self.last_applied {
            if now.duration_since(last) < MIN_SYNC_INTERVAL {
                return false;
            }
        }

        if let Err(e) = scene.replace_drawables(payload) {
            warn!(error = %e, "dropping malformed scene snapshot");
            return false;
        }

        self.last_applied = Some(now);
        true
    }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
