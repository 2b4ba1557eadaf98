use super::*;

#[test]
fn color_is_deterministic_per_user() {
    let user_id = Uuid::new_v4();
    assert_eq!(color_for(user_id), color_for(user_id));
}

#[test]
fn color_is_drawn_from_palette() {
    for _ in 0..32 {
        let color = color_for(Uuid::new_v4());
        assert!(CURSOR_PALETTE.contains(&color));
    }
}

#[test]
fn colors_vary_across_users() {
    // 32 random users hitting one palette slot is astronomically unlikely.
    let distinct: std::collections::HashSet<&str> = (0..32).map(|_| color_for(Uuid::new_v4())).collect();
    assert!(distinct.len() > 1);
}

#[test]
fn move_payload_carries_position_and_identity() {
    let user_id = Uuid::new_v4();
    let data = move_payload(user_id, "alice", 120.0, 45.5);

    assert_eq!(data.get("x").and_then(serde_json::Value::as_f64), Some(120.0));
    assert_eq!(data.get("y").and_then(serde_json::Value::as_f64), Some(45.5));
    assert_eq!(data.get("name").and_then(|v| v.as_str()), Some("alice"));
    assert_eq!(
        data.get("user_id").and_then(|v| v.as_str()),
        Some(user_id.to_string().as_str())
    );
}

#[test]
fn move_payload_color_is_server_derived() {
    let user_id = Uuid::new_v4();
    let data = move_payload(user_id, "alice", 0.0, 0.0);
    assert_eq!(data.get("color").and_then(|v| v.as_str()), Some(color_for(user_id)));
}
