use super::*;

fn t0() -> Instant {
    Instant::now()
}

// =============================================================================
// THROTTLE
// =============================================================================

#[test]
fn first_sample_always_sends() {
    let mut throttle = CursorThrottle::new();
    assert!(throttle.should_send(t0(), 10.0, 10.0));
}

#[test]
fn small_move_within_interval_is_suppressed() {
    let mut throttle = CursorThrottle::new();
    let start = t0();
    assert!(throttle.should_send(start, 10.0, 10.0));

    // 1px dither 5ms later: suppressed.
    assert!(!throttle.should_send(start + Duration::from_millis(5), 11.0, 10.0));
}

#[test]
fn large_move_bypasses_interval() {
    let mut throttle = CursorThrottle::new();
    let start = t0();
    assert!(throttle.should_send(start, 10.0, 10.0));

    // Fast motion: 30px in 5ms still sends.
    assert!(throttle.should_send(start + Duration::from_millis(5), 40.0, 10.0));
}

#[test]
fn interval_elapse_allows_small_move() {
    let mut throttle = CursorThrottle::new();
    let start = t0();
    assert!(throttle.should_send(start, 10.0, 10.0));
    assert!(throttle.should_send(start + MIN_SEND_INTERVAL, 11.0, 10.0));
}

#[test]
fn leave_emits_sentinel_exactly_once() {
    let mut throttle = CursorThrottle::new();
    let start = t0();
    throttle.should_send(start, 10.0, 10.0);

    assert_eq!(throttle.leave(start), Some((OFFSCREEN, OFFSCREEN)));
    assert_eq!(throttle.leave(start + Duration::from_millis(100)), None);

    // Re-entering the canvas resumes normal sends.
    assert!(throttle.should_send(start + Duration::from_millis(200), 5.0, 5.0));
}

// =============================================================================
// PRESENCE VIEW
// =============================================================================

#[test]
fn observe_inserts_and_refreshes() {
    let mut view = PresenceView::new();
    let user = Uuid::new_v4();
    let start = t0();

    view.observe(user, "alice", "#E53935", 10.0, 20.0, start);
    let cursor = view.get(user).expect("cursor present");
    assert_eq!(cursor.x, 10.0);
    assert!(cursor.visible);

    view.observe(user, "alice", "#E53935", 15.0, 25.0, start + Duration::from_millis(40));
    let cursor = view.get(user).expect("cursor present");
    assert_eq!(cursor.x, 15.0);
    assert_eq!(view.len(), 1);
}

#[test]
fn offscreen_sentinel_hides_but_keeps_identity() {
    let mut view = PresenceView::new();
    let user = Uuid::new_v4();
    let start = t0();

    view.observe(user, "alice", "#E53935", 10.0, 20.0, start);
    view.observe(user, "alice", "#E53935", OFFSCREEN, OFFSCREEN, start + Duration::from_millis(50));

    let cursor = view.get(user).expect("cursor retained");
    assert!(!cursor.visible, "sentinel means opacity zero, not removal");
    assert_eq!(cursor.color, "#E53935");
    // Last on-canvas position is kept for quick reappearance.
    assert_eq!((cursor.x, cursor.y), (10.0, 20.0));
}

#[test]
fn stale_cursor_expires_after_ttl() {
    let mut view = PresenceView::new();
    let user = Uuid::new_v4();
    let start = t0();

    view.observe(user, "alice", "#E53935", 10.0, 20.0, start);

    // 9s of silence: still rendered.
    assert_eq!(view.prune(start + Duration::from_secs(9)), 0);
    assert_eq!(view.len(), 1);

    // Past 10s: gone, with no leave message involved.
    assert_eq!(view.prune(start + Duration::from_secs(11)), 1);
    assert!(view.is_empty());
}

#[test]
fn refresh_resets_expiry_window() {
    let mut view = PresenceView::new();
    let user = Uuid::new_v4();
    let start = t0();

    view.observe(user, "alice", "#E53935", 10.0, 20.0, start);
    view.observe(user, "alice", "#E53935", 11.0, 21.0, start + Duration::from_secs(8));

    assert_eq!(view.prune(start + Duration::from_secs(12)), 0, "refresh at 8s keeps it alive at 12s");
    assert_eq!(view.prune(start + Duration::from_secs(19)), 1);
}

#[test]
fn prune_only_removes_stale_entries() {
    let mut view = PresenceView::new();
    let stale = Uuid::new_v4();
    let fresh = Uuid::new_v4();
    let start = t0();

    view.observe(stale, "alice", "#E53935", 0.0, 0.0, start);
    view.observe(fresh, "bob", "#1E88E5", 0.0, 0.0, start + Duration::from_secs(10));

    assert_eq!(view.prune(start + Duration::from_secs(11)), 1);
    assert!(view.get(stale).is_none());
    assert!(view.get(fresh).is_some());
}
