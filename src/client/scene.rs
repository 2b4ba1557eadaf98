//! Scene graph mirror — the client's authoritative copy of the canvas.
//!
//! DESIGN
//! ======
//! A scene is an unordered collection of objects keyed by a client-assigned
//! string id. Remote application is built to tolerate races: a duplicate
//! `add` is a no-op, and `modify`/`delete` on an unknown id is silently
//! ignored (the object was already deleted locally, or not yet synced).
//!
//! Presence cursors live in the same scene graph as drawable content but
//! carry a distinct kind: they are excluded from snapshots and from every
//! broadcast path, and always paint above drawables.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind tag marking ephemeral presence cursors.
pub const CURSOR_KIND: &str = "cursor";

// =============================================================================
// SCENE OBJECT
// =============================================================================

/// One object in the scene: an id, a type tag, and a type-specific property
/// bag (position, color, geometry, stroke width, …) the sync engine never
/// interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    #[serde(skip)]
    pub id: String,
    pub kind: String,
    pub props: Value,
}

impl SceneObject {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>, props: Value) -> Self {
        Self { id: id.into(), kind: kind.into(), props }
    }

    #[must_use]
    pub fn is_cursor(&self) -> bool {
        self.kind == CURSOR_KIND
    }
}

// =============================================================================
// SCENE
// =============================================================================

/// The mirrored scene. Object ids are unique by construction (map keys).
#[derive(Debug, Default)]
pub struct Scene {
    objects: HashMap<String, SceneObject>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SceneObject> {
        self.objects.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    /// Number of drawable (non-cursor) objects.
    #[must_use]
    pub fn drawable_count(&self) -> usize {
        self.objects.values().filter(|o| !o.is_cursor()).count()
    }

    /// Insert or overwrite, unconditionally. Local optimistic applies use
    /// this; remote applies go through `apply_add`/`apply_modify`.
    pub fn upsert(&mut self, object: SceneObject) {
        self.objects.insert(object.id.clone(), object);
    }

    /// Apply a remote add. Idempotent: returns false (and changes nothing)
    /// if an object with this id already exists — the local user may have
    /// created it, or a snapshot sync and a live add raced.
    pub fn apply_add(&mut self, object: SceneObject) -> bool {
        if self.objects.contains_key(&object.id) {
            return false;
        }
        self.objects.insert(object.id.clone(), object);
        true
    }

    /// Apply a remote modify. Unknown ids are silently ignored.
    pub fn apply_modify(&mut self, id: &str, kind: Option<&str>, props: Value) -> bool {
        let Some(existing) = self.objects.get_mut(id) else {
            return false;
        };
        if let Some(kind) = kind {
            existing.kind = kind.to_owned();
        }
        existing.props = props;
        true
    }

    /// Apply a remote delete. Unknown ids are silently ignored.
    pub fn apply_delete(&mut self, id: &str) -> bool {
        self.objects.remove(id).is_some()
    }

    // =========================================================================
    // PAINT ORDER
    // =========================================================================

    /// Objects in paint order: drawables first, cursors above everything.
    pub fn paint_order(&self) -> impl Iterator<Item = &SceneObject> {
        let drawables = self.objects.values().filter(|o| !o.is_cursor());
        let cursors = self.objects.values().filter(|o| o.is_cursor());
        drawables.chain(cursors)
    }

    /// Live cursor objects.
    pub fn cursors(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values().filter(|o| o.is_cursor())
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Serialize every drawable object, keyed by id. `serde_json::Map` is
    /// ordered by key, so two scenes with equal content produce identical
    /// bytes — the saver's no-op-write check depends on this.
    #[must_use]
    pub fn snapshot(&self) -> String {
        let mut map = serde_json::Map::new();
        for (id, object) in &self.objects {
            if object.is_cursor() {
                continue;
            }
            map.insert(id.clone(), serde_json::to_value(object).unwrap_or(Value::Null));
        }
        Value::Object(map).to_string()
    }

    /// Replace all drawable objects from a snapshot payload, keeping live
    /// cursor objects attached — a full reload must not wipe presence.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the payload is not a JSON object map.
    pub fn replace_drawables(&mut self, payload: &str) -> Result<(), serde_json::Error> {
        let map: serde_json::Map<String, Value> = serde_json::from_str(payload)?;

        self.objects.retain(|_, o| o.is_cursor());
        for (id, value) in map {
            let Ok(mut object) = serde_json::from_value::<SceneObject>(value) else {
                continue;
            };
            object.id = id.clone();
            // Snapshots never carry cursors; skip any that sneak in.
            if object.is_cursor() {
                continue;
            }
            self.objects.insert(id, object);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "scene_test.rs"]
mod tests;
