// Integration tests use unwrap/expect freely and skip the pedantic/nursery
// lints that only make sense for library code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::missing_docs_in_private_items
)]

//! End-to-end tests against the real axum router and WebSocket boundary:
//! join/leave, signaling fan-out, chat relay, and reconnect rehydration.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use voxrelay_proto::{ClientFrame, MessageKind, ServerFrame};
use voxrelay_server::config::RelayConfig;
use voxrelay_server::hub::HubState;
use voxrelay_server::state::AppState;
use voxrelay_server::store::{InMemoryStore, Store};

/// Starts the router on an OS-assigned port backed by a fresh
/// [`InMemoryStore`] seeded with the given `(uuid, username)` users.
async fn start_test_server(users: &[(&str, &str)]) -> String {
    let store = InMemoryStore::default();
    store.init_default_rooms().expect("seed default room");
    for (uuid, username) in users {
        store.add_user(uuid, username, false).expect("add_user");
    }

    let hub = Arc::new(HubState::new(Arc::new(store)));
    let app = AppState {
        hub,
        config: Arc::new(RelayConfig::default()),
    };

    let (addr, _handle) = voxrelay_server::start_server_with_state("127.0.0.1:0", app)
        .await
        .expect("failed to start test server");
    addr.to_string()
}

async fn connect(
    addr: &str,
    user_uuid: &str,
) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
    let url = format!("ws://{addr}/ws?user={user_uuid}");
    let (stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("websocket connect failed");
    stream
}

async fn send(
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    frame: ClientFrame,
) {
    let text = serde_json::to_string(&frame).unwrap();
    ws.send(Message::Text(text.into())).await.unwrap();
}

/// Reads frames until one matches `pred`, skipping others (the initial
/// `user_status_total` sync frame arrives before anything interesting).
async fn recv_matching<F>(
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    description: &str,
    pred: F,
) -> ServerFrame
where
    F: Fn(&ServerFrame) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            panic!("timeout waiting for {description}");
        }
        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                let frame: ServerFrame = serde_json::from_str(&text)
                    .unwrap_or_else(|e| panic!("undecodable frame: {e}: {text}"));
                if pred(&frame) {
                    return frame;
                }
            }
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => panic!("websocket error waiting for {description}: {e}"),
            Ok(None) => panic!("connection closed waiting for {description}"),
            Err(_) => panic!("timeout waiting for {description}"),
        }
    }
}

#[tokio::test]
async fn join_announces_to_existing_room_members() {
    let addr = start_test_server(&[("u-alice", "alice"), ("u-bob", "bob")]).await;

    let mut alice = connect(&addr, "u-alice").await;
    send(&mut alice, ClientFrame::Join { room: "General".to_string() }).await;
    recv_matching(&mut alice, "joined", |f| matches!(f, ServerFrame::Joined { .. })).await;

    let mut bob = connect(&addr, "u-bob").await;
    send(&mut bob, ClientFrame::Join { room: "General".to_string() }).await;

    let peer_joined = recv_matching(&mut alice, "peer_joined", |f| {
        matches!(f, ServerFrame::PeerJoined { .. })
    })
    .await;
    match peer_joined {
        ServerFrame::PeerJoined { username, user_uuid } => {
            assert_eq!(username, "bob");
            assert_eq!(user_uuid, "u-bob");
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    let peers = recv_matching(&mut bob, "peers", |f| matches!(f, ServerFrame::Peers { .. })).await;
    match peers {
        ServerFrame::Peers { peers } => {
            assert_eq!(peers.len(), 1);
            assert_eq!(peers[0].user_uuid, "u-alice");
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn join_unknown_room_returns_error_and_no_join() {
    let addr = start_test_server(&[("u-alice", "alice")]).await;
    let mut alice = connect(&addr, "u-alice").await;

    send(&mut alice, ClientFrame::Join { room: "Nonexistent".to_string() }).await;

    let err = recv_matching(&mut alice, "error", |f| matches!(f, ServerFrame::Error { .. })).await;
    match err {
        ServerFrame::Error { message } => assert!(message.contains("Nonexistent")),
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn signal_is_relayed_only_to_its_target() {
    let addr = start_test_server(&[
        ("u-alice", "alice"),
        ("u-bob", "bob"),
        ("u-carol", "carol"),
    ])
    .await;

    let mut alice = connect(&addr, "u-alice").await;
    send(&mut alice, ClientFrame::Join { room: "General".to_string() }).await;
    recv_matching(&mut alice, "joined", |f| matches!(f, ServerFrame::Joined { .. })).await;

    let mut bob = connect(&addr, "u-bob").await;
    send(&mut bob, ClientFrame::Join { room: "General".to_string() }).await;
    recv_matching(&mut bob, "joined", |f| matches!(f, ServerFrame::Joined { .. })).await;
    recv_matching(&mut alice, "peer_joined bob", |f| {
        matches!(f, ServerFrame::PeerJoined { username, .. } if username == "bob")
    })
    .await;

    let mut carol = connect(&addr, "u-carol").await;
    send(&mut carol, ClientFrame::Join { room: "General".to_string() }).await;
    recv_matching(&mut carol, "joined", |f| matches!(f, ServerFrame::Joined { .. })).await;
    recv_matching(&mut alice, "peer_joined carol", |f| {
        matches!(f, ServerFrame::PeerJoined { username, .. } if username == "carol")
    })
    .await;
    recv_matching(&mut bob, "peer_joined carol", |f| {
        matches!(f, ServerFrame::PeerJoined { username, .. } if username == "carol")
    })
    .await;

    send(
        &mut alice,
        ClientFrame::Signal {
            target: "u-bob".to_string(),
            data: serde_json::json!({"sdp": "offer"}),
        },
    )
    .await;

    let signal = recv_matching(&mut bob, "signal", |f| matches!(f, ServerFrame::Signal { .. })).await;
    match signal {
        ServerFrame::Signal { sender, data } => {
            assert_eq!(sender, "u-alice");
            assert_eq!(data, serde_json::json!({"sdp": "offer"}));
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    // Carol is in the same room but was not targeted; give the relay time
    // to deliver the signal to bob and confirm carol never sees it.
    let got_signal = tokio::time::timeout(Duration::from_millis(300), async {
        loop {
            match carol.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: ServerFrame = serde_json::from_str(&text).unwrap();
                    if matches!(frame, ServerFrame::Signal { .. }) {
                        return true;
                    }
                }
                Some(Ok(_)) => continue,
                _ => return false,
            }
        }
    })
    .await
    .unwrap_or(false);
    assert!(!got_signal, "signal leaked to an untargeted peer");
}

#[tokio::test]
async fn chat_message_is_broadcast_to_every_connected_session() {
    let addr = start_test_server(&[("u-alice", "alice"), ("u-bob", "bob")]).await;

    let mut alice = connect(&addr, "u-alice").await;
    let mut bob = connect(&addr, "u-bob").await;

    send(
        &mut alice,
        ClientFrame::ChatMessage {
            content: "hello room".to_string(),
            message_type: MessageKind::Text,
        },
    )
    .await;

    for ws in [&mut alice, &mut bob] {
        let frame = recv_matching(ws, "chat_message", |f| matches!(f, ServerFrame::ChatMessage { .. })).await;
        match frame {
            ServerFrame::ChatMessage { content, user_uuid, .. } => {
                assert_eq!(content, "hello room");
                assert_eq!(user_uuid, "u-alice");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn disconnect_then_reconnect_rehydrates_room_membership() {
    let addr = start_test_server(&[("u-alice", "alice"), ("u-bob", "bob")]).await;

    let mut alice = connect(&addr, "u-alice").await;
    send(&mut alice, ClientFrame::Join { room: "General".to_string() }).await;
    recv_matching(&mut alice, "joined", |f| matches!(f, ServerFrame::Joined { .. })).await;

    let mut bob = connect(&addr, "u-bob").await;
    send(&mut bob, ClientFrame::Join { room: "General".to_string() }).await;
    recv_matching(&mut bob, "joined", |f| matches!(f, ServerFrame::Joined { .. })).await;
    recv_matching(&mut alice, "peer_joined bob", |f| matches!(f, ServerFrame::PeerJoined { .. })).await;

    // Alice drops the connection without sending `leave`.
    alice.close(None).await.ok();
    drop(alice);

    recv_matching(&mut bob, "peer_left alice", |f| {
        matches!(f, ServerFrame::PeerLeft { username, .. } if username == "alice")
    })
    .await;

    // Reconnect promptly (within the reconnect TTL) and confirm room
    // membership is restored: bob sees alice rejoin and alice receives the
    // current roster.
    let mut alice2 = connect(&addr, "u-alice").await;

    recv_matching(&mut bob, "peer_joined alice again", |f| {
        matches!(f, ServerFrame::PeerJoined { username, .. } if username == "alice")
    })
    .await;

    let roster = recv_matching(&mut alice2, "peers", |f| matches!(f, ServerFrame::Peers { .. })).await;
    match roster {
        ServerFrame::Peers { peers } => {
            assert!(peers.iter().any(|p| p.user_uuid == "u-bob"));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn unknown_user_is_rejected_before_upgrade() {
    let addr = start_test_server(&[]).await;
    let url = format!("ws://{addr}/ws?user=ghost");
    let result = tokio_tungstenite::connect_async(url).await;
    assert!(result.is_err(), "expected the handshake to be rejected");
}
