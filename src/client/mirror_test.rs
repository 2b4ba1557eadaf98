use super::*;
use crate::client::scene::CURSOR_KIND;
use serde_json::json;

fn mirror() -> (SceneMirror, mpsc::UnboundedReceiver<Frame>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SceneMirror::new(Uuid::new_v4(), Uuid::new_v4(), false, tx), rx)
}

fn shape(id: &str) -> SceneObject {
    SceneObject::new(id, "shape", json!({"x": 1.0}))
}

// =============================================================================
// LOCAL PATH
// =============================================================================

#[test]
fn local_add_applies_immediately_and_broadcasts() {
    let (mut mirror, mut rx) = mirror();

    let id = mirror
        .apply(Origin::Local, SceneOp::Add(shape("s1")))
        .expect("local add applies");
    assert_eq!(id, "s1");
    assert!(mirror.scene().contains("s1"), "optimistic apply, no round-trip wait");

    let frame = rx.try_recv().expect("one outbound frame");
    assert_eq!(frame.syscall, "op:add");
    assert_eq!(frame.object_id(), Some("s1"));
    assert!(frame.data.get("payload").is_some());
}

#[test]
fn local_add_without_id_gets_a_fresh_one() {
    let (mut mirror, mut rx) = mirror();

    let id = mirror
        .apply(Origin::Local, SceneOp::Add(SceneObject::new("", "shape", json!({}))))
        .expect("local add applies");
    assert!(!id.is_empty());
    assert!(mirror.scene().contains(&id));

    let frame = rx.try_recv().expect("one outbound frame");
    assert_eq!(frame.object_id(), Some(id.as_str()), "broadcast carries the assigned id");
}

#[test]
fn local_delete_broadcasts_without_payload() {
    let (mut mirror, mut rx) = mirror();
    mirror.apply(Origin::Local, SceneOp::Add(shape("s1")));
    let _ = rx.try_recv();

    mirror.apply(Origin::Local, SceneOp::Delete { id: "s1".into() });
    let frame = rx.try_recv().expect("delete frame");
    assert_eq!(frame.syscall, "op:delete");
    assert!(frame.data.get("payload").is_none());
}

#[test]
fn local_cursor_mutations_never_broadcast() {
    let (mut mirror, mut rx) = mirror();

    mirror.apply(
        Origin::Local,
        SceneOp::Add(SceneObject::new("cursor:u1", CURSOR_KIND, json!({"x": 0.0}))),
    );
    mirror.apply(
        Origin::Local,
        SceneOp::Modify { id: "cursor:u1".into(), kind: None, props: json!({"x": 5.0}) },
    );
    mirror.apply(Origin::Local, SceneOp::Delete { id: "cursor:u1".into() });

    assert!(rx.try_recv().is_err(), "cursors are never relayed as drawable content");
}

// =============================================================================
// REMOTE PATH / ECHO SUPPRESSION
// =============================================================================

#[test]
fn remote_add_applies_but_never_rebroadcasts() {
    let (mut mirror, mut rx) = mirror();

    mirror.apply(Origin::Remote, SceneOp::Add(shape("s1")));
    assert!(mirror.scene().contains("s1"));
    assert!(rx.try_recv().is_err(), "remote origin must not reach the sink");

    mirror.apply(Origin::Remote, SceneOp::Modify { id: "s1".into(), kind: None, props: json!({"x": 7.0}) });
    mirror.apply(Origin::Remote, SceneOp::Delete { id: "s1".into() });
    assert!(rx.try_recv().is_err());
}

#[test]
fn remote_add_of_existing_id_is_noop() {
    let (mut mirror, mut rx) = mirror();
    mirror.apply(Origin::Local, SceneOp::Add(shape("s1")));
    let _ = rx.try_recv();

    let mut echo = shape("s1");
    echo.props = json!({"x": 999.0});
    assert!(mirror.apply(Origin::Remote, SceneOp::Add(echo)).is_none());
    assert_eq!(mirror.scene().get("s1").expect("object exists").props, json!({"x": 1.0}));
}

#[test]
fn remote_add_without_id_is_dropped() {
    let (mut mirror, _rx) = mirror();
    assert!(
        mirror
            .apply(Origin::Remote, SceneOp::Add(SceneObject::new("", "shape", json!({}))))
            .is_none()
    );
    assert_eq!(mirror.scene().drawable_count(), 0);
}

#[test]
fn remote_op_on_unknown_id_is_silent() {
    let (mut mirror, mut rx) = mirror();

    assert!(
        mirror
            .apply(Origin::Remote, SceneOp::Modify { id: "ghost".into(), kind: None, props: json!({}) })
            .is_none()
    );
    assert!(mirror.apply(Origin::Remote, SceneOp::Delete { id: "ghost".into() }).is_none());
    assert!(rx.try_recv().is_err());
}

#[test]
fn later_local_edit_to_remote_object_broadcasts_normally() {
    let (mut mirror, mut rx) = mirror();

    mirror.apply(Origin::Remote, SceneOp::Add(shape("s1")));
    assert!(rx.try_recv().is_err());

    // No decay timer: the very next genuine local edit relays.
    mirror.apply(Origin::Local, SceneOp::Modify { id: "s1".into(), kind: None, props: json!({"x": 2.0}) });
    let frame = rx.try_recv().expect("local modify broadcasts");
    assert_eq!(frame.syscall, "op:modify");
    assert_eq!(frame.object_id(), Some("s1"));
}

// =============================================================================
// VIEWPORT
// =============================================================================

#[test]
fn viewport_defaults_and_updates() {
    let (mut mirror, _rx) = mirror();
    assert_eq!(mirror.viewport(), Viewport::default());

    let moved = Viewport { pan_x: 120.0, pan_y: -40.0, zoom: 2.5 };
    mirror.set_viewport(moved);
    assert_eq!(mirror.viewport(), moved);
}
