//! Debounced persistence writer — the owner's snapshot flush path.
//!
//! DESIGN
//! ======
//! Every scene-mutating event arms (or re-arms) a quiet-period deadline; a
//! continuously-editing client defers its save until editing pauses. When
//! the deadline passes, the full scene is serialized and compared against
//! the last successfully written serialization — byte-identical content
//! skips the store write entirely, so events that fire without a real
//! content change (selection churn, echoed syncs) cost nothing.
//!
//! Only the board owner drives this writer. Ownership is checked once per
//! session against the store's recorded owner and FAILS OPEN: a missing
//! board or an unreachable store makes the local client the owner, so a
//! brand-new board is always savable by its creator. Editing availability
//! wins over strict persistence rights.
//!
//! ERROR HANDLING
//! ==============
//! A failed write is logged and the deadline retained, so the next poll
//! retries. The in-memory scene is never rolled back — it, plus the live
//! relay, remains the source of truth for connected peers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use crate::client::scene::Scene;
use crate::store::BoardStore;

/// Quiet period between the last mutation and the flush.
pub const QUIET_PERIOD: Duration = Duration::from_millis(500);

// =============================================================================
// OWNERSHIP
// =============================================================================

/// Decide whether the local user is the board's authoritative writer.
/// Fail-open: unknown board or store failure grants ownership.
pub async fn determine_ownership(store: &Arc<dyn BoardStore>, board_id: Uuid, user_id: Uuid) -> bool {
    match store.get_board(board_id).await {
        Ok(Some(record)) => match record.owner_id {
            Some(owner_id) => owner_id == user_id,
            None => true,
        },
        Ok(None) => {
            info!(%board_id, "board not yet persisted; treating local user as owner");
            true
        }
        Err(e) => {
            warn!(error = %e, %board_id, "ownership check failed; failing open to owner");
            true
        }
    }
}

// =============================================================================
// SAVER
// =============================================================================

/// Outcome of one flush attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Snapshot written; carries the serialized payload for the owner's
    /// follow-up `scene:sync` broadcast.
    Written(String),
    /// Serialization unchanged since the last write; store untouched.
    Unchanged,
    /// No armed deadline, or the quiet period has not elapsed yet.
    NotDue,
    /// Store write failed; deadline retained for retry.
    Failed,
}

/// Debounce state machine. The clock is passed in so tests never sleep.
pub struct DebouncedSaver {
    board_id: Uuid,
    store: Arc<dyn BoardStore>,
    quiet_period: Duration,
    deadline: Option<Instant>,
    last_written: Option<String>,
}

impl DebouncedSaver {
    #[must_use]
    pub fn new(board_id: Uuid, store: Arc<dyn BoardStore>) -> Self {
        Self { board_id, store, quiet_period: QUIET_PERIOD, deadline: None, last_written: None }
    }

    /// Override the quiet period (tests use a short one).
    #[must_use]
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    /// A scene-mutating event fired: arm or re-arm the deadline. Resets,
    /// never queues — ten rapid mutations coalesce into one save.
    pub fn note_mutation(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet_period);
    }

    /// True once the quiet period has elapsed since the last mutation.
    #[must_use]
    pub fn due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Serialize, compare, and write if the content actually changed.
    pub async fn flush(&mut self, now: Instant, scene: &Scene) -> FlushOutcome {
        if !self.due(now) {
            return FlushOutcome::NotDue;
        }

        let serialized = scene.snapshot();
        if self.last_written.as_deref() == Some(serialized.as_str()) {
            self.deadline = None;
            return FlushOutcome::Unchanged;
        }

        match self.store.update_canvas(self.board_id, &serialized).await {
            Ok(()) => {
                self.deadline = None;
                self.last_written = Some(serialized.clone());
                info!(board_id = %self.board_id, bytes = serialized.len(), "scene snapshot persisted");
                FlushOutcome::Written(serialized)
            }
            Err(e) => {
                // Keep the deadline: the next poll retries. The in-memory
                // scene stays untouched.
                warn!(error = %e, board_id = %self.board_id, "snapshot write failed; will retry");
                FlushOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
#[path = "saver_test.rs"]
mod tests;
