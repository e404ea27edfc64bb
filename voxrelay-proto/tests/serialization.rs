//! Property tests: every `ClientFrame`/`ServerFrame` value must survive a
//! JSON round trip through the codec unchanged.

use proptest::prelude::*;
use voxrelay_proto::codec::{decode_client_frame, encode_server_frame};
use voxrelay_proto::{ClientFrame, MessageKind, PeerInfo, PresenceSnapshot, ServerFrame};

fn arb_message_kind() -> impl Strategy<Value = MessageKind> {
    prop_oneof![Just(MessageKind::Text), Just(MessageKind::Media)]
}

fn arb_json_value() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::Bool),
        "[a-zA-Z0-9 ]{0,16}".prop_map(serde_json::Value::String),
    ]
}

fn arb_client_frame() -> impl Strategy<Value = ClientFrame> {
    prop_oneof![
        "[a-zA-Z0-9_-]{1,16}".prop_map(|room| ClientFrame::Join { room }),
        Just(ClientFrame::Leave),
        ("[a-zA-Z0-9_-]{1,16}", arb_json_value())
            .prop_map(|(target, data)| ClientFrame::Signal { target, data }),
        ("[a-zA-Z0-9_-]{1,16}", arb_json_value())
            .prop_map(|(target, data)| ClientFrame::ScreenSignal { target, data }),
        "[a-zA-Z0-9_-]{1,16}".prop_map(|target| ClientFrame::ScreenShareRequest { target }),
        "[a-zA-Z0-9_-]{1,16}".prop_map(|target| ClientFrame::ScreenShareStopRequest { target }),
        Just(ClientFrame::ScreenShareStop),
        (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
            |(is_mic_muted, is_deafened, is_streaming)| ClientFrame::UserStatusUpdate {
                is_mic_muted,
                is_deafened,
                is_streaming,
            }
        ),
        ("[a-zA-Z0-9 ]{0,32}", arb_message_kind()).prop_map(|(content, message_type)| {
            ClientFrame::ChatMessage {
                content,
                message_type,
            }
        }),
        Just(ClientFrame::Pong),
    ]
}

fn arb_peer_info() -> impl Strategy<Value = PeerInfo> {
    ("[a-zA-Z0-9_-]{1,16}", "[a-zA-Z0-9_-]{1,16}")
        .prop_map(|(username, user_uuid)| PeerInfo { username, user_uuid })
}

fn arb_presence_snapshot() -> impl Strategy<Value = PresenceSnapshot> {
    (
        "[a-zA-Z0-9_-]{1,16}",
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        prop::collection::vec("[a-zA-Z0-9_-]{1,8}", 0..4),
    )
        .prop_map(
            |(user_uuid, is_mic_muted, is_deafened, is_streaming, streaming_to)| {
                PresenceSnapshot {
                    user_uuid,
                    is_mic_muted,
                    is_deafened,
                    is_streaming,
                    streaming_to,
                }
            },
        )
}

fn arb_server_frame() -> impl Strategy<Value = ServerFrame> {
    prop_oneof![
        "[a-zA-Z0-9_-]{1,16}".prop_map(|room| ServerFrame::Joined { room }),
        prop::collection::vec(arb_peer_info(), 0..4).prop_map(|peers| ServerFrame::Peers { peers }),
        ("[a-zA-Z0-9_-]{1,16}", "[a-zA-Z0-9_-]{1,16}")
            .prop_map(|(username, user_uuid)| ServerFrame::PeerJoined { username, user_uuid }),
        ("[a-zA-Z0-9_-]{1,16}", "[a-zA-Z0-9_-]{1,16}")
            .prop_map(|(peer_uuid, username)| ServerFrame::PeerLeft { peer_uuid, username }),
        ("[a-zA-Z0-9_-]{1,16}", arb_json_value())
            .prop_map(|(sender, data)| ServerFrame::Signal { sender, data }),
        Just(ServerFrame::Ping),
        "[a-zA-Z0-9 ]{0,32}".prop_map(|message| ServerFrame::Error { message }),
        (
            "[a-zA-Z0-9_-]{1,16}",
            "[a-zA-Z0-9_-]{1,16}",
            "[a-zA-Z0-9_-]{1,16}",
            arb_message_kind(),
            "[a-zA-Z0-9 ]{0,32}",
        )
            .prop_map(|(user_uuid, username, datetime, message_type, content)| {
                ServerFrame::ChatMessage {
                    content,
                    message_type,
                    user_uuid,
                    username,
                    datetime,
                }
            }),
    ]
}

proptest! {
    #[test]
    fn client_frame_round_trips(frame in arb_client_frame()) {
        let encoded = serde_json::to_string(&frame).unwrap();
        let decoded = decode_client_frame(&encoded).unwrap();
        prop_assert_eq!(decoded, frame);
    }

    #[test]
    fn server_frame_round_trips(frame in arb_server_frame()) {
        let encoded = encode_server_frame(&frame).unwrap();
        let decoded: ServerFrame = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(decoded, frame);
    }

    #[test]
    fn presence_snapshot_round_trips(snapshot in arb_presence_snapshot()) {
        let encoded = serde_json::to_string(&snapshot).unwrap();
        let decoded: PresenceSnapshot = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(decoded, snapshot);
    }
}
