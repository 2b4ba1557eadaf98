//! WebSocket handler — bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, validates the session token, generates a client ID, and
//! enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Relayed frames from room peers → forward to client
//!
//! Handler functions are pure business logic — they validate, consult
//! services, and return an `Outcome`. The dispatch layer owns all outbound
//! concerns: reply to sender and relay to peers. The relay never inspects
//! operation payloads. One exception: every departure (`room:leave`, a
//! join that switches boards, abrupt closure) notifies the departed room's
//! peers from inside the handler via `leave_with_notice`, because the
//! membership entry is gone by the time the dispatch layer would send.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch applies Outcome (reply / relay / both)
//! 4. Close → broadcast `room:peer-left` → registry cleanup

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame};
use crate::services;
use crate::state::{AppState, Participant};

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what — handlers never send frames directly.
enum Outcome {
    /// Relay data to all room peers EXCLUDING the sender, under the request
    /// syscall. No reply. Used for presence, operations, and scene sync —
    /// the fire-and-forget fan-out paths.
    Relay(Data),
    /// Send done+data to sender only.
    Reply(Data),
    /// Send empty done to sender only.
    Done,
    /// Nothing at all: no reply, no relay. Lossy inputs that arrive in an
    /// invalid context (presence before join) are dropped here.
    Silent,
    /// Reply to sender, and notify peers under a different syscall.
    /// Used for join/leave membership events.
    ReplyAndNotify { reply: Data, notify_syscall: String, notify: Data },
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = params.get("token") else {
        return (StatusCode::UNAUTHORIZED, "token required").into_response();
    };

    let user = match services::session::validate_session(&state.pool, token).await {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid session token").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "session validation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "session validation error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, user))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user: services::session::SessionUser) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for receiving relayed frames from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("user_id", user.id.to_string())
        .with_data("color", services::presence::color_for(user.id));
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, user_id = %user.id, "ws: client connected");

    // Track which room this client has joined.
    let mut current_board: Option<Uuid> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let frames =
                            process_inbound_text(&state, &mut current_board, client_id, &user, &client_tx, &text).await;
                        for frame in frames {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    // Implicit leave: abrupt closure gets the same peer notification and
    // registry cleanup as an explicit room:leave, so no ghost participants.
    if let Some(board_id) = current_board {
        leave_with_notice(&state, board_id, client_id, &user).await;
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// This keeps the websocket transport concerns separate from frame handling,
/// so tests can exercise join/relay/sync behavior end-to-end without sockets.
pub(crate) async fn process_inbound_text(
    state: &AppState,
    current_board: &mut Option<Uuid>,
    client_id: Uuid,
    user: &services::session::SessionUser,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Stamp the authenticated user_id as `from`; the subject claim is
    // trusted for the rest of the connection.
    req.from = Some(user.id.to_string());

    let prefix = req.prefix();
    let is_presence = prefix == "presence";

    // Presence is high-frequency and worthless in logs; skip it.
    if !is_presence {
        info!(%client_id, id = %req.id, syscall = %req.syscall, status = ?req.status, "ws: recv frame");
    }

    // Dispatch to handler — returns Outcome or error Frame.
    let result = match prefix {
        "room" => handle_room(state, current_board, client_id, user, client_tx, &req).await,
        "presence" => Ok(handle_presence(*current_board, user, &req)),
        "op" => handle_op(*current_board, &req),
        "scene" => handle_scene(state, *current_board, &req).await,
        _ => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    // Apply outcome — the dispatch layer owns all outbound logic.
    let board_id = *current_board;
    match result {
        Ok(Outcome::Relay(data)) => {
            if let Some(bid) = board_id {
                let frame = Frame::request(&req.syscall, data)
                    .with_board_id(bid)
                    .with_from(user.id.to_string());
                services::room::broadcast(state, bid, &frame, Some(client_id)).await;
            }
            vec![]
        }
        Ok(Outcome::Reply(data)) => {
            vec![req.done_with(data)]
        }
        Ok(Outcome::Done) => {
            vec![req.done()]
        }
        Ok(Outcome::Silent) => {
            vec![]
        }
        Ok(Outcome::ReplyAndNotify { reply, notify_syscall, notify }) => {
            let sender_frame = req.done_with(reply);
            if let Some(bid) = board_id {
                let notif = Frame::request(notify_syscall, notify)
                    .with_board_id(bid)
                    .with_from(user.id.to_string());
                services::room::broadcast(state, bid, &notif, Some(client_id)).await;
            }
            vec![sender_frame]
        }
        Err(err_frame) => {
            vec![err_frame]
        }
    }
}

// =============================================================================
// ROOM HANDLERS
// =============================================================================

async fn handle_room(
    state: &AppState,
    current_board: &mut Option<Uuid>,
    client_id: Uuid,
    user: &services::session::SessionUser,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    match req.op() {
        "join" => {
            let Some(board_id) = req.board_id.or_else(|| {
                req.data
                    .get("board_id")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok())
            }) else {
                return Err(req.error("board_id required"));
            };

            // Switching boards: the old room's peers hear the departure,
            // same as an explicit leave.
            if let Some(old_board) = current_board.take() {
                leave_with_notice(state, old_board, client_id, user).await;
            }

            let name = req
                .data
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(&user.name);
            let is_owner = req
                .data
                .get("is_owner")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);

            let color = services::presence::color_for(user.id);
            let participant = Participant {
                user_id: user.id,
                name: name.to_owned(),
                color: color.to_owned(),
                is_owner,
            };

            let peers =
                services::room::join_room(state, board_id, participant, client_id, client_tx.clone()).await;
            *current_board = Some(board_id);

            let mut reply = Data::new();
            reply.insert("peers".into(), serde_json::to_value(&peers).unwrap_or_default());
            reply.insert("client_id".into(), serde_json::json!(client_id));
            reply.insert("color".into(), serde_json::json!(color));

            let mut notify = Data::new();
            notify.insert("client_id".into(), serde_json::json!(client_id));
            notify.insert("user_id".into(), serde_json::json!(user.id));
            notify.insert("name".into(), serde_json::json!(name));
            notify.insert("color".into(), serde_json::json!(color));

            Ok(Outcome::ReplyAndNotify {
                reply,
                notify_syscall: "room:peer-joined".into(),
                notify,
            })
        }
        "leave" => {
            let Some(board_id) = current_board.take() else {
                // Leaving without a join is harmless.
                return Ok(Outcome::Done);
            };

            leave_with_notice(state, board_id, client_id, user).await;
            Ok(Outcome::Done)
        }
        op => Err(req.error(format!("unknown room op: {op}"))),
    }
}

// =============================================================================
// PRESENCE HANDLER
// =============================================================================

fn handle_presence(current_board: Option<Uuid>, user: &services::session::SessionUser, req: &Frame) -> Outcome {
    if current_board.is_none() {
        // Silently ignore cursor moves before joining.
        return Outcome::Silent;
    }

    let x = req
        .data
        .get("x")
        .and_then(serde_json::Value::as_f64)
        .unwrap_or(0.0);
    let y = req
        .data
        .get("y")
        .and_then(serde_json::Value::as_f64)
        .unwrap_or(0.0);
    let name = req
        .data
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(&user.name);

    Outcome::Relay(services::presence::move_payload(user.id, name, x, y))
}

// =============================================================================
// OPERATION HANDLER
// =============================================================================

/// Pure fan-out: add/modify/delete payloads are relayed verbatim to every
/// other room member. No validation, no merging, no ordering across senders.
fn handle_op(current_board: Option<Uuid>, req: &Frame) -> Result<Outcome, Frame> {
    if current_board.is_none() {
        return Err(req.error("must join a room first"));
    }

    match req.op() {
        "add" | "modify" | "delete" => Ok(Outcome::Relay(req.data.clone())),
        op => Err(req.error(format!("unknown op: {op}"))),
    }
}

// =============================================================================
// SCENE HANDLERS
// =============================================================================

async fn handle_scene(state: &AppState, current_board: Option<Uuid>, req: &Frame) -> Result<Outcome, Frame> {
    let Some(board_id) = current_board else {
        return Err(req.error("must join a room first"));
    };

    match req.op() {
        // Snapshot bootstrap: reply to the requester only.
        "request" => match services::snapshot::latest_snapshot(state, board_id).await {
            Ok(data) => Ok(Outcome::Reply(data)),
            Err(e) => Err(req.error_from(&e)),
        },
        // Owner-authored full-scene broadcast: relay like an operation.
        "sync" => Ok(Outcome::Relay(req.data.clone())),
        op => Err(req.error(format!("unknown scene op: {op}"))),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Broadcast `room:peer-left` to a room while the client is still a member,
/// then remove it. Every departure path goes through here — explicit leave,
/// a join that switches boards, and abrupt transport closure — so remaining
/// peers always hear about the gone participant.
async fn leave_with_notice(
    state: &AppState,
    board_id: Uuid,
    client_id: Uuid,
    user: &services::session::SessionUser,
) {
    let left = Frame::request("room:peer-left", Data::new())
        .with_board_id(board_id)
        .with_from(user.id.to_string())
        .with_data("client_id", client_id.to_string())
        .with_data("user_id", user.id.to_string());
    services::room::broadcast(state, board_id, &left, Some(client_id)).await;
    services::room::leave_room(state, board_id, client_id).await;
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    let is_presence = frame.syscall.starts_with("presence:");
    if !is_presence {
        if frame.status == crate::frame::Status::Error {
            let code = frame
                .data
                .get("code")
                .and_then(|v| v.as_str())
                .unwrap_or("-");
            let message = frame
                .data
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("-");
            warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
        } else {
            info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
        }
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
