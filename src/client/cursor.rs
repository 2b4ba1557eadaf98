//! Presence cursors — sender-side throttling and receiver-side expiry.
//!
//! DESIGN
//! ======
//! Cursor traffic is lossy and continuously refreshed, so both ends lean on
//! that: the sender rate-limits to one update per ~40ms unless the pointer
//! jumped past a small threshold (responsive fast motion, no flooding while
//! dithering), and the receiver expires any cursor silent for more than 10s
//! regardless of leave notifications — missed disconnects cannot leave a
//! ghost cursor behind.
//!
//! A pointer leaving the drawable area sends a sentinel far-off-screen
//! coordinate instead of a "hide" message; the receiver drops the cursor to
//! opacity zero but keeps its identity and color for quick reappearance.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Minimum interval between cursor sends during idle dithering.
pub const MIN_SEND_INTERVAL: Duration = Duration::from_millis(40);

/// Pixel distance that bypasses the interval throttle.
pub const MOVE_THRESHOLD_PX: f64 = 4.0;

/// Silence window after which a remote cursor is expired.
pub const CURSOR_TTL: Duration = Duration::from_secs(10);

/// Sentinel coordinate meaning "pointer left the canvas".
pub const OFFSCREEN: f64 = -10_000.0;

// =============================================================================
// SENDER THROTTLE
// =============================================================================

/// Decides which pointer samples are worth emitting. Clock is passed in, so
/// tests drive it deterministically.
#[derive(Debug, Default)]
pub struct CursorThrottle {
    last_sent: Option<(Instant, f64, f64)>,
}

impl CursorThrottle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if this sample should be emitted; records it when so.
    pub fn should_send(&mut self, now: Instant, x: f64, y: f64) -> bool {
        let send = match self.last_sent {
            None => true,
            Some((at, lx, ly)) => {
                let moved = ((x - lx).powi(2) + (y - ly).powi(2)).sqrt();
                now.duration_since(at) >= MIN_SEND_INTERVAL || moved > MOVE_THRESHOLD_PX
            }
        };
        if send {
            self.last_sent = Some((now, x, y));
        }
        send
    }

    /// Pointer left the canvas: emit the sentinel once. Returns the
    /// coordinate pair to send, or `None` if already off-canvas.
    pub fn leave(&mut self, now: Instant) -> Option<(f64, f64)> {
        if let Some((_, x, y)) = self.last_sent {
            if x == OFFSCREEN && y == OFFSCREEN {
                return None;
            }
        }
        self.last_sent = Some((now, OFFSCREEN, OFFSCREEN));
        Some((OFFSCREEN, OFFSCREEN))
    }
}

// =============================================================================
// RECEIVER VIEW
// =============================================================================

/// One remote participant's cursor as rendered locally.
#[derive(Debug, Clone)]
pub struct RemoteCursor {
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    /// False while the pointer is off-canvas (rendered at opacity zero).
    pub visible: bool,
    pub last_active: Instant,
}

/// Remote cursors keyed by user id, with local expiry.
#[derive(Debug, Default)]
pub struct PresenceView {
    cursors: HashMap<Uuid, RemoteCursor>,
}

impl PresenceView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a received cursor update. The off-canvas sentinel hides the
    /// cursor without discarding its identity.
    pub fn observe(&mut self, user_id: Uuid, name: &str, color: &str, x: f64, y: f64, now: Instant) {
        let offscreen = x <= OFFSCREEN && y <= OFFSCREEN;
        let cursor = self.cursors.entry(user_id).or_insert_with(|| RemoteCursor {
            user_id,
            name: name.to_owned(),
            color: color.to_owned(),
            x,
            y,
            visible: !offscreen,
            last_active: now,
        });

        cursor.last_active = now;
        cursor.visible = !offscreen;
        if !offscreen {
            cursor.x = x;
            cursor.y = y;
        }
    }

    /// Remove cursors silent for longer than `CURSOR_TTL`. Independent of
    /// any explicit leave message. Returns how many were removed.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.cursors.len();
        self.cursors
            .retain(|_, c| now.duration_since(c.last_active) <= CURSOR_TTL);
        before - self.cursors.len()
    }

    #[must_use]
    pub fn get(&self, user_id: Uuid) -> Option<&RemoteCursor> {
        self.cursors.get(&user_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

#[cfg(test)]
#[path = "cursor_test.rs"]
mod tests;
