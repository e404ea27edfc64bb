//! WebSocket upgrade and the per-connection session actor.
//!
//! Upgrade the request, spawn a writer task fed by an unbounded channel, and
//! drive a reader loop that decodes inbound frames and hands them to the
//! dispatcher, covering the full connect/rehydrate/dispatch/teardown
//! lifecycle this hub speaks.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use voxrelay_proto::{ClientFrame, ServerFrame, cleared_room, codec};

use crate::dispatch;
use crate::hub::{HubState, SessionId};
use crate::reconnect::ReconnectRecord;
use crate::state::AppState;

/// Identity asserted on the control-channel handshake.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// The connecting client's `user_uuid`.
    pub user: String,
}

/// `GET /ws?user=<uuid>` -- resolves identity against the store, then
/// upgrades. Rejects with 404 before upgrading if the identity is absent or
/// unknown: an unauthenticated session is never created.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(app): State<AppState>,
) -> impl IntoResponse {
    match app.hub.store.get_user_by_uuid(&query.user) {
        Ok(Some(user)) => {
            ws.on_upgrade(move |socket| handle_socket(socket, app.hub, user.uuid, user.username))
                .into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "unknown user").into_response(),
        Err(err) => {
            tracing::error!(%err, "store error resolving identity at connect");
            (StatusCode::INTERNAL_SERVER_ERROR, "store error").into_response()
        }
    }
}

async fn handle_socket(socket: WebSocket, hub: Arc<HubState>, user_uuid: String, username: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let id = hub.register_session(&user_uuid, &username, tx);
    tracing::info!(user_uuid = %user_uuid, username = %username, "session connected");

    if let Some(record) = hub.take_reconnect(&user_uuid) {
        rehydrate(&hub, id, &user_uuid, &username, &record);
    }
    send_initial_sync(&hub, id);

    let mut write_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = codec::encode_server_frame(&frame) else {
                tracing::error!("failed to encode outbound frame, dropping it");
                continue;
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let reader_hub = Arc::clone(&hub);
    let mut read_task = tokio::spawn(async move {
        loop {
            match ws_receiver.next().await {
                Some(Ok(Message::Text(text))) => match codec::decode_client_frame(&text) {
                    Ok(ClientFrame::Unknown) => {
                        tracing::debug!("ignored frame of unrecognized type");
                    }
                    Ok(frame) => dispatch::dispatch(&reader_hub, id, frame),
                    Err(err) => {
                        tracing::warn!(%err, "malformed frame, terminating session");
                        break;
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::warn!(%err, "websocket read error, terminating session");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => write_task.abort(),
        _ = &mut write_task => read_task.abort(),
    }

    teardown(&hub, id);
    tracing::info!(user_uuid = %user_uuid, "session disconnected");
}

/// Restores room membership/presence from a reconnect record, notifies the
/// room of the (re)arrival, and sends the reconnecting client the current
/// roster plus any outstanding screen-share viewer requests.
fn rehydrate(hub: &HubState, id: SessionId, user_uuid: &str, username: &str, record: &ReconnectRecord) {
    hub.rehydrate_room(id, record);
    let room = record.room.clone();

    hub.broadcast_to_room(
        &room,
        &ServerFrame::PeerJoined {
            username: username.to_string(),
            user_uuid: user_uuid.to_string(),
        },
        Some(id),
    );

    let peers = hub.room_roster(&room, Some(id));
    hub.send_to_session(id, ServerFrame::Peers { peers });

    for viewer_uuid in &record.streaming_to {
        hub.send_to_session(
            id,
            ServerFrame::ScreenShareRequest {
                user_uuid: viewer_uuid.clone(),
            },
        );
    }
}

/// Sends the one-time full presence snapshot, immediately after connect or
/// rehydration.
fn send_initial_sync(hub: &HubState, id: SessionId) {
    hub.send_to_session(
        id,
        ServerFrame::UserStatusTotal {
            data: hub.presence_snapshot(),
        },
    );
}

/// Deterministic teardown: leave the room if one was held (broadcasting
/// `peer_left` and a clearing `user_status_update`), stage a reconnect
/// record, then remove the session from the registry.
///
/// Order matters: the room must be left (and the departure broadcast sent
/// with the departing session still excludable from it) before the session
/// itself is unregistered.
pub(crate) fn teardown(hub: &HubState, id: SessionId) {
    let Some((user_uuid, username)) = hub.session_identity(id) else {
        hub.unregister_session(id);
        return;
    };

    if let Some((room, record)) = hub.leave_room(id) {
        hub.broadcast_to_room(
            &room,
            &ServerFrame::PeerLeft {
                peer_uuid: user_uuid.clone(),
                username: username.clone(),
            },
            Some(id),
        );
        hub.broadcast_to_all(
            &ServerFrame::UserStatusUpdate {
                room: cleared_room(&room),
                user_uuid: user_uuid.clone(),
                username,
                is_mic_muted: false,
                is_deafened: false,
                is_streaming: false,
            },
            None,
        );
        hub.stage_reconnect(
            &user_uuid,
            ReconnectRecord {
                room,
                is_mic_muted: record.is_mic_muted,
                is_deafened: record.is_deafened,
                is_streaming: record.is_streaming,
                streaming_to: record.streaming_to,
                staged_at: Instant::now(),
            },
        );
    }

    hub.unregister_session(id);
}
