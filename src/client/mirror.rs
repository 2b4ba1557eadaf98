//! Origin-tagged mutation path — optimistic local apply + echo suppression.
//!
//! DESIGN
//! ======
//! The same logical mutation can be observed twice: once as the local
//! optimistic apply and once as a relayed echo. Instead of marking inserted
//! objects with a transient "from remote" flag cleared on a timer, every
//! mutation carries an explicit `Origin` checked synchronously: only
//! `Origin::Local` mutations reach the outbound sink, so a remote apply can
//! never re-broadcast and there is no mark/clear race window. A later
//! genuine local edit to a remotely-created object broadcasts normally.
//!
//! The outbound sink is injected at construction. Components that need to
//! send hold their own handle; there is no process-wide socket singleton.

use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::client::scene::{Scene, SceneObject};
use crate::frame::{Data, FRAME_OBJECT_ID, FRAME_PAYLOAD, Frame};

// =============================================================================
// TYPES
// =============================================================================

/// Where a scene mutation originated. Checked synchronously by the
/// broadcast path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A genuine local user action: apply optimistically, then broadcast.
    Local,
    /// A relayed peer operation: apply only, never re-broadcast.
    Remote,
}

/// One object-level mutation.
#[derive(Debug, Clone)]
pub enum SceneOp {
    Add(SceneObject),
    Modify { id: String, kind: Option<String>, props: serde_json::Value },
    Delete { id: String },
}

/// Client viewport (pan/zoom). Owned by the mirror so snapshot loads can be
/// shown to leave it untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

// =============================================================================
// MIRROR
// =============================================================================

/// The local scene plus the broadcast seam.
pub struct SceneMirror {
    board_id: Uuid,
    user_id: Uuid,
    is_owner: bool,
    scene: Scene,
    viewport: Viewport,
    /// Injected outbound frame sink (connection handle).
    sink: mpsc::UnboundedSender<Frame>,
}

impl SceneMirror {
    #[must_use]
    pub fn new(board_id: Uuid, user_id: Uuid, is_owner: bool, sink: mpsc::UnboundedSender<Frame>) -> Self {
        Self { board_id, user_id, is_owner, scene: Scene::new(), viewport: Viewport::default(), sink }
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[must_use]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Apply a mutation. Returns the id of the affected object if the scene
    /// changed. Local mutations that change drawable content are broadcast;
    /// remote mutations and cursor objects never are.
    pub fn apply(&mut self, origin: Origin, op: SceneOp) -> Option<String> {
        match op {
            SceneOp::Add(mut object) => {
                // Assign a fresh id on local create; an object with no id is
                // never broadcast.
                if object.id.is_empty() {
                    if origin == Origin::Remote {
                        warn!("dropping remote add without object id");
                        return None;
                    }
                    object.id = Uuid::new_v4().to_string();
                }
                let id = object.id.clone();
                let changed = match origin {
                    Origin::Local => {
                        self.scene.upsert(object.clone());
                        true
                    }
                    Origin::Remote => self.scene.apply_add(object.clone()),
                };
                if !changed {
                    return None;
                }
                if origin == Origin::Local && !object.is_cursor() {
                    self.emit("op:add", &id, Some(&object));
                }
                Some(id)
            }
            SceneOp::Modify { id, kind, props } => {
                let changed = self.scene.apply_modify(&id, kind.as_deref(), props);
                if !changed {
                    return None;
                }
                let object = self.scene.get(&id).cloned();
                let is_cursor = object.as_ref().is_some_and(SceneObject::is_cursor);
                if origin == Origin::Local && !is_cursor {
                    self.emit("op:modify", &id, object.as_ref());
                }
                Some(id)
            }
            SceneOp::Delete { id } => {
                let was_cursor = self.scene.get(&id).is_some_and(SceneObject::is_cursor);
                let changed = self.scene.apply_delete(&id);
                if !changed {
                    return None;
                }
                if origin == Origin::Local && !was_cursor {
                    self.emit("op:delete", &id, None);
                }
                Some(id)
            }
        }
    }

    fn emit(&self, syscall: &str, object_id: &str, object: Option<&SceneObject>) {
        let mut data = Data::new();
        data.insert(FRAME_OBJECT_ID.into(), serde_json::json!(object_id));
        data.insert("user_id".into(), serde_json::json!(self.user_id));
        data.insert("is_owner".into(), serde_json::json!(self.is_owner));
        if let Some(object) = object {
            data.insert(
                FRAME_PAYLOAD.into(),
                serde_json::to_value(object).unwrap_or(serde_json::Value::Null),
            );
        }

        let frame = Frame::request(syscall, data).with_board_id(self.board_id);
        // Fire-and-forget: a closed sink means the connection is gone and the
        // edit survives locally until resync.
        let _ = self.sink.send(frame);
    }
}

#[cfg(test)]
#[path = "mirror_test.rs"]
mod tests;
