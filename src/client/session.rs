//! Client session — one editor's view of one board.
//!
//! DESIGN
//! ======
//! `ClientSession` wires the scene mirror, cursor throttle, presence view,
//! sync gate and (for the owner) the debounced saver to a single injected
//! transport handle. Inbound frames dispatch by syscall; local edits apply
//! optimistically and broadcast through the mirror. `tick` is the session's
//! heartbeat: it prunes stale cursors and drives the saver.
//!
//! Ownership is resolved once, at connect, against the board store.
//! Everything here runs on one logical event loop — mutations are applied
//! in arrival order with no scene locking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::client::cursor::{CursorThrottle, PresenceView};
use crate::client::mirror::{Origin, SceneMirror, SceneOp};
use crate::client::saver::{DebouncedSaver, determine_ownership};
use crate::client::scene::{Scene, SceneObject};
use crate::client::sync::SyncGate;
use crate::frame::{Data, FRAME_PAYLOAD, Frame, Status};
use crate::store::BoardStore;

// =============================================================================
// TYPES
// =============================================================================

/// A known co-participant, keyed by connection in `ClientSession::peers`.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
}

// =============================================================================
// SESSION
// =============================================================================

pub struct ClientSession {
    board_id: Uuid,
    user_id: Uuid,
    name: String,
    is_owner: bool,
    client_id: Option<Uuid>,
    mirror: SceneMirror,
    throttle: CursorThrottle,
    presence: PresenceView,
    gate: SyncGate,
    saver: Option<DebouncedSaver>,
    peers: HashMap<Uuid, PeerInfo>,
    outbound: mpsc::UnboundedSender<Frame>,
}

impl ClientSession {
    /// Build a session, resolving ownership against the store. Only the
    /// owner gets a saver; other participants relay live operations but
    /// never persist snapshots.
    pub async fn connect(
        board_id: Uuid,
        user_id: Uuid,
        name: impl Into<String>,
        store: Arc<dyn BoardStore>,
        outbound: mpsc::UnboundedSender<Frame>,
    ) -> Self {
        let is_owner = determine_ownership(&store, board_id, user_id).await;
        let saver = is_owner.then(|| DebouncedSaver::new(board_id, store));
        Self {
            board_id,
            user_id,
            name: name.into(),
            is_owner,
            client_id: None,
            mirror: SceneMirror::new(board_id, user_id, is_owner, outbound.clone()),
            throttle: CursorThrottle::new(),
            presence: PresenceView::new(),
            gate: SyncGate::new(),
            saver,
            peers: HashMap::new(),
            outbound,
        }
    }

    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// The gateway-assigned connection id, known once `session:connected`
    /// arrives.
    #[must_use]
    pub fn client_id(&self) -> Option<Uuid> {
        self.client_id
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        self.mirror.scene()
    }

    #[must_use]
    pub fn mirror(&self) -> &SceneMirror {
        &self.mirror
    }

    #[must_use]
    pub fn mirror_mut(&mut self) -> &mut SceneMirror {
        &mut self.mirror
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceView {
        &self.presence
    }

    #[must_use]
    pub fn peers(&self) -> &HashMap<Uuid, PeerInfo> {
        &self.peers
    }

    // =========================================================================
    // OUTBOUND REQUESTS
    // =========================================================================

    /// Request room membership for this session's board.
    pub fn join(&self) {
        let frame = Frame::request("room:join", Data::new())
            .with_board_id(self.board_id)
            .with_data("name", self.name.clone())
            .with_data("is_owner", self.is_owner);
        let _ = self.outbound.send(frame);
    }

    /// Request the latest durable snapshot (late-joiner bootstrap).
    pub fn request_scene(&self) {
        let frame = Frame::request("scene:request", Data::new()).with_board_id(self.board_id);
        let _ = self.outbound.send(frame);
    }

    /// Leave the room explicitly.
    pub fn leave(&self) {
        let frame = Frame::request("room:leave", Data::new()).with_board_id(self.board_id);
        let _ = self.outbound.send(frame);
    }

    // =========================================================================
    // LOCAL EDITS
    // =========================================================================

    /// Create an object locally (id assigned if blank) and broadcast it.
    pub fn add_object(&mut self, object: SceneObject, now: Instant) -> Option<String> {
        let id = self.mirror.apply(Origin::Local, SceneOp::Add(object));
        if id.is_some() {
            self.note_mutation(now);
        }
        id
    }

    /// Modify an object locally and broadcast the change.
    pub fn modify_object(&mut self, id: impl Into<String>, props: serde_json::Value, now: Instant) -> bool {
        let applied = self
            .mirror
            .apply(Origin::Local, SceneOp::Modify { id: id.into(), kind: None, props })
            .is_some();
        if applied {
            self.note_mutation(now);
        }
        applied
    }

    /// Delete an object locally and broadcast the removal.
    pub fn delete_object(&mut self, id: impl Into<String>, now: Instant) -> bool {
        let applied = self
            .mirror
            .apply(Origin::Local, SceneOp::Delete { id: id.into() })
            .is_some();
        if applied {
            self.note_mutation(now);
        }
        applied
    }

    // =========================================================================
    // POINTER
    // =========================================================================

    /// Throttled cursor send. Most idle dithering never leaves the client.
    pub fn pointer_moved(&mut self, x: f64, y: f64, now: Instant) -> bool {
        if !self.throttle.should_send(now, x, y) {
            return false;
        }
        self.send_presence(x, y);
        true
    }

    /// Pointer left the canvas: emit the off-screen sentinel once.
    pub fn pointer_left(&mut self, now: Instant) {
        if let Some((x, y)) = self.throttle.leave(now) {
            self.send_presence(x, y);
        }
    }

    fn send_presence(&self, x: f64, y: f64) {
        let frame = Frame::request("presence:move", Data::new())
            .with_board_id(self.board_id)
            .with_data("name", self.name.clone())
            .with_data("x", x)
            .with_data("y", y);
        let _ = self.outbound.send(frame);
    }

    // =========================================================================
    // INBOUND DISPATCH
    // =========================================================================

    /// Apply one inbound frame. All remote scene mutations flow through
    /// here with `Origin::Remote`, so nothing in this path can re-broadcast.
    pub fn handle_frame(&mut self, frame: &Frame, now: Instant) {
        match frame.syscall.as_str() {
            "session:connected" => {
                self.client_id = frame
                    .data
                    .get("client_id")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok());
            }
            "room:join" if frame.status == Status::Done => {
                self.absorb_roster(frame);
            }
            "room:peer-joined" => {
                if let (Some(client_id), Some(info)) = (frame_client_id(frame), frame_peer_info(frame)) {
                    self.peers.insert(client_id, info);
                }
            }
            "room:peer-left" => {
                // Membership updates immediately; the rendered cursor is
                // left to presence expiry, which also covers the case where
                // this notification never arrives.
                if let Some(client_id) = frame_client_id(frame) {
                    self.peers.remove(&client_id);
                }
            }
            "presence:move" => self.observe_presence(frame, now),
            "op:add" => {
                if let Some(object) = frame_object(frame) {
                    if self.mirror.apply(Origin::Remote, SceneOp::Add(object)).is_some() {
                        self.note_mutation(now);
                    }
                }
            }
            "op:modify" => {
                if let (Some(id), Some(object)) = (frame.object_id(), frame_object(frame)) {
                    let op = SceneOp::Modify { id: id.to_owned(), kind: Some(object.kind), props: object.props };
                    if self.mirror.apply(Origin::Remote, op).is_some() {
                        self.note_mutation(now);
                    }
                }
            }
            "op:delete" => {
                if let Some(id) = frame.object_id() {
                    if self
                        .mirror
                        .apply(Origin::Remote, SceneOp::Delete { id: id.to_owned() })
                        .is_some()
                    {
                        self.note_mutation(now);
                    }
                }
            }
            // Both the direct reply to scene:request and the owner's live
            // scene:sync broadcast land here. Applying a sync does not count
            // as a mutation for the saver — the owner's own snapshot equality
            // check already makes a re-save of identical content free, and
            // feeding syncs back into the save path is how feedback loops
            // start.
            "scene:request" | "scene:sync" => {
                if let Some(payload) = frame.data.get(FRAME_PAYLOAD).and_then(|v| v.as_str()) {
                    self.gate.apply(self.mirror.scene_mut(), payload, now);
                }
            }
            other => {
                if frame.status == Status::Error {
                    warn!(syscall = other, "server error frame: {:?}", frame.data.get("message"));
                }
            }
        }
    }

    fn absorb_roster(&mut self, frame: &Frame) {
        let Some(peers) = frame.data.get("peers").and_then(|v| v.as_array()) else {
            return;
        };
        for peer in peers {
            let client_id = peer.get("client_id").and_then(|v| v.as_str()).and_then(|s| s.parse().ok());
            let user_id = peer.get("user_id").and_then(|v| v.as_str()).and_then(|s| s.parse().ok());
            let (Some(client_id), Some(user_id)) = (client_id, user_id) else {
                continue;
            };
            self.peers.insert(
                client_id,
                PeerInfo {
                    user_id,
                    name: peer.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_owned(),
                    color: peer.get("color").and_then(|v| v.as_str()).unwrap_or_default().to_owned(),
                },
            );
        }
    }

    fn observe_presence(&mut self, frame: &Frame, now: Instant) {
        let Some(user_id) = frame
            .data
            .get("user_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
        else {
            return;
        };
        let name = frame.data.get("name").and_then(|v| v.as_str()).unwrap_or_default();
        let color = frame.data.get("color").and_then(|v| v.as_str()).unwrap_or_default();
        let x = frame.data.get("x").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
        let y = frame.data.get("y").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
        self.presence.observe(user_id, name, color, x, y, now);
    }

    // =========================================================================
    // HEARTBEAT
    // =========================================================================

    fn note_mutation(&mut self, now: Instant) {
        if let Some(saver) = &mut self.saver {
            saver.note_mutation(now);
        }
    }

    /// Periodic housekeeping: expire stale cursors and drive the saver.
    /// The owner broadcasts each freshly persisted snapshot so peers
    /// converge quickly on owner-authored batches.
    pub async fn tick(&mut self, now: Instant) {
        self.presence.prune(now);

        let Some(saver) = &mut self.saver else {
            return;
        };
        if !saver.due(now) {
            return;
        }
        if let crate::client::saver::FlushOutcome::Written(payload) = saver.flush(now, self.mirror.scene()).await {
            let frame = Frame::request("scene:sync", Data::new())
                .with_board_id(self.board_id)
                .with_data(FRAME_PAYLOAD, payload);
            let _ = self.outbound.send(frame);
        }
    }
}

// =============================================================================
// FRAME PARSING HELPERS
// =============================================================================

fn frame_client_id(frame: &Frame) -> Option<Uuid> {
    frame
        .data
        .get("client_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
}

fn frame_peer_info(frame: &Frame) -> Option<PeerInfo> {
    let user_id = frame
        .data
        .get("user_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())?;
    Some(PeerInfo {
        user_id,
        name: frame.data.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_owned(),
        color: frame.data.get("color").and_then(|v| v.as_str()).unwrap_or_default().to_owned(),
    })
}

/// Reconstruct a `SceneObject` from an operation frame's id + payload.
fn frame_object(frame: &Frame) -> Option<SceneObject> {
    let id = frame.object_id()?;
    let payload = frame.data.get(FRAME_PAYLOAD)?;
    let mut object: SceneObject = serde_json::from_value(payload.clone()).ok()?;
    object.id = id.to_owned();
    Some(object)
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
