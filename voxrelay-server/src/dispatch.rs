//! Per-frame-type hub operations.
//!
//! One function per [`ClientFrame`] variant, each taking the caller's
//! session id and re-reading its current room/identity from the hub rather
//! than trusting anything carried in the frame body — the frame's own
//! `user_uuid` field (where present) is checked against the session's
//! asserted identity and mismatches are dropped silently, never trusted.

use voxrelay_proto::{cleared_room, ClientFrame, PeerInfo, ServerFrame};

use crate::chat;
use crate::hub::{HubState, SessionId};
use crate::store::DEFAULT_ROOM;

/// Applies one decoded frame from `id` against the hub. `Unknown` frames
/// are logged and ignored by the caller before this is reached; this
/// function handles every other variant.
pub fn dispatch(hub: &HubState, id: SessionId, frame: ClientFrame) {
    match frame {
        ClientFrame::Join { room } => handle_join(hub, id, &room),
        ClientFrame::Leave => handle_leave(hub, id),
        ClientFrame::Signal { target, data } => handle_signal(hub, id, &target, data, false),
        ClientFrame::ScreenSignal { target, data } => handle_signal(hub, id, &target, data, true),
        ClientFrame::ScreenShareRequest { target } => handle_screen_share_request(hub, id, &target),
        ClientFrame::ScreenShareStopRequest { target } => {
            handle_screen_share_stop_request(hub, id, &target);
        }
        ClientFrame::ScreenShareStop => handle_screen_share_stop(hub, id),
        ClientFrame::UserStatusUpdate {
            is_mic_muted,
            is_deafened,
            is_streaming,
        } => handle_user_status_update(hub, id, is_mic_muted, is_deafened, is_streaming),
        ClientFrame::ChatMessage {
            content,
            message_type,
        } => handle_chat_message(hub, id, message_type, &content),
        ClientFrame::Pong => {}
        ClientFrame::Unknown => {
            tracing::debug!("ignored frame of unrecognized type");
        }
    }
}

fn handle_join(hub: &HubState, id: SessionId, room: &str) {
    let Some((user_uuid, username)) = hub.session_identity(id) else {
        return;
    };

    let room_exists = hub.store.voice_room_exists(room).unwrap_or_else(|err| {
        tracing::warn!(%err, room, "store error checking room existence");
        false
    });

    if !room_exists {
        hub.send_to_session(
            id,
            ServerFrame::Error {
                message: format!("no such room: {room}"),
            },
        );
        return;
    }

    let existing_peers: Vec<PeerInfo> = hub.join_room(id, room);

    hub.send_to_session(
        id,
        ServerFrame::Joined {
            room: room.to_string(),
        },
    );
    hub.broadcast_to_room(
        room,
        &ServerFrame::PeerJoined {
            username: username.clone(),
            user_uuid: user_uuid.clone(),
        },
        Some(id),
    );
    hub.send_to_session(id, ServerFrame::Peers { peers: existing_peers });
    hub.broadcast_to_all(
        &ServerFrame::UserStatusUpdate {
            room: room.to_string(),
            user_uuid,
            username,
            is_mic_muted: false,
            is_deafened: false,
            is_streaming: false,
        },
        None,
    );
}

fn handle_leave(hub: &HubState, id: SessionId) {
    let Some((user_uuid, username)) = hub.session_identity(id) else {
        return;
    };
    let Some((room, _record)) = hub.leave_room(id) else {
        return;
    };

    hub.broadcast_to_room(
        &room,
        &ServerFrame::PeerLeft {
            peer_uuid: user_uuid.clone(),
            username: username.clone(),
        },
        None,
    );
    hub.broadcast_to_all(
        &ServerFrame::UserStatusUpdate {
            room: cleared_room(&room),
            user_uuid,
            username,
            is_mic_muted: false,
            is_deafened: false,
            is_streaming: false,
        },
        None,
    );
}

fn handle_signal(hub: &HubState, id: SessionId, target: &str, data: serde_json::Value, screen: bool) {
    let Some((user_uuid, _username)) = hub.session_identity(id) else {
        return;
    };
    let frame = if screen {
        ServerFrame::ScreenSignal {
            sender: user_uuid,
            data,
        }
    } else {
        ServerFrame::Signal {
            sender: user_uuid,
            data,
        }
    };
    hub.send_to_target(target, frame);
}

fn handle_screen_share_request(hub: &HubState, id: SessionId, target: &str) {
    let Some((user_uuid, _username)) = hub.session_identity(id) else {
        return;
    };
    hub.send_to_target(
        target,
        ServerFrame::ScreenShareRequest {
            user_uuid: user_uuid.clone(),
        },
    );
    hub.add_stream_viewer(target, &user_uuid);
}

fn handle_screen_share_stop_request(hub: &HubState, id: SessionId, target: &str) {
    let Some((user_uuid, _username)) = hub.session_identity(id) else {
        return;
    };
    hub.remove_stream_viewer(target, &user_uuid);
}

fn handle_screen_share_stop(hub: &HubState, id: SessionId) {
    let Some((user_uuid, username)) = hub.session_identity(id) else {
        return;
    };
    hub.broadcast_to_all(
        &ServerFrame::ScreenShareStop {
            peer_uuid: user_uuid,
            username,
        },
        Some(id),
    );
}

fn handle_user_status_update(
    hub: &HubState,
    id: SessionId,
    is_mic_muted: bool,
    is_deafened: bool,
    is_streaming: bool,
) {
    let Some((user_uuid, username)) = hub.session_identity(id) else {
        return;
    };
    // No-op if the caller holds no room or no presence entry yet, e.g. a
    // status update racing ahead of the corresponding join.
    let Some((room, record)) = hub.update_presence(id, is_mic_muted, is_deafened, is_streaming) else {
        return;
    };
    hub.broadcast_to_all(
        &ServerFrame::UserStatusUpdate {
            room,
            user_uuid,
            username,
            is_mic_muted: record.is_mic_muted,
            is_deafened: record.is_deafened,
            is_streaming: record.is_streaming,
        },
        None,
    );
}

fn handle_chat_message(
    hub: &HubState,
    id: SessionId,
    message_type: voxrelay_proto::MessageKind,
    content: &str,
) {
    let Some((user_uuid, username)) = hub.session_identity(id) else {
        return;
    };
    if let Err(err) = chat::relay_chat_message(hub, message_type, content, &user_uuid, &username) {
        tracing::error!(%err, "chat message persistence failed, broadcast aborted");
    }
}
