//! Control-channel frame types.
//!
//! [`ClientFrame`] is what the dispatcher decodes from an inbound WebSocket
//! text message; [`ServerFrame`] is what the hub encodes for delivery. Both
//! are internally tagged on a `type` field (`#[serde(tag = "type")]`) with
//! `snake_case` variant names, matching the frame shapes in the control
//! channel contract.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::chat::MessageKind;
use crate::presence::PresenceSnapshot;

/// A frame sent by a client to the hub.
///
/// Unrecognized `type` values deserialize to [`ClientFrame::Unknown`]
/// instead of failing — the dispatcher logs and ignores these. A `type`
/// that *is* recognized but missing required fields fails to deserialize,
/// which the dispatcher treats as a malformed frame and terminates the
/// session over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Join a voice room by name.
    Join {
        /// Room to join.
        room: String,
    },
    /// Leave the currently-joined room, if any.
    Leave,
    /// Forward an opaque signaling payload to a peer by `user_uuid`.
    Signal {
        /// Recipient's `user_uuid`.
        target: String,
        /// Opaque payload (SDP offer/answer, ICE candidate, ...).
        data: serde_json::Value,
    },
    /// Forward an opaque screen-share signaling payload to a peer.
    ScreenSignal {
        /// Recipient's `user_uuid`.
        target: String,
        /// Opaque payload.
        data: serde_json::Value,
    },
    /// Ask a peer to start sharing their screen with the caller.
    ScreenShareRequest {
        /// The peer being asked to share.
        target: String,
    },
    /// Withdraw an earlier screen-share request.
    ScreenShareStopRequest {
        /// The peer that was being asked to share.
        target: String,
    },
    /// Announce that the caller stopped sharing their screen.
    ScreenShareStop,
    /// Update the caller's mic/deaf/streaming flags.
    UserStatusUpdate {
        /// Microphone muted.
        is_mic_muted: bool,
        /// Deafened (not receiving audio).
        is_deafened: bool,
        /// Currently screen-sharing.
        is_streaming: bool,
    },
    /// Send a chat message to the global text/media chat.
    ChatMessage {
        /// Text payload, or a media URL already persisted by the upload path.
        content: String,
        /// Whether `content` is inline text or a media reference. Required
        /// rather than defaulted to `text` when absent, unlike the original
        /// server: a client omitting it is treated as a malformed frame.
        message_type: MessageKind,
    },
    /// Response to a liveness [`ServerFrame::Ping`]; no-op.
    Pong,
    /// Any `type` this server version does not recognize.
    #[serde(other)]
    Unknown,
}

/// A frame sent by the hub to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Acknowledges a successful `join`.
    Joined {
        /// The room that was joined.
        room: String,
    },
    /// The roster of other members already in the room, sent once to a
    /// joining/reconnecting caller.
    Peers {
        /// Other members currently in the room.
        peers: Vec<PeerInfo>,
    },
    /// A peer joined the caller's room.
    PeerJoined {
        /// The new member's display name.
        username: String,
        /// The new member's identity.
        user_uuid: String,
    },
    /// A peer left the caller's room.
    PeerLeft {
        /// The departing member's identity.
        peer_uuid: String,
        /// The departing member's display name.
        username: String,
    },
    /// A targeted signaling payload relayed from another peer.
    Signal {
        /// The original sender's identity.
        sender: String,
        /// Opaque payload.
        data: serde_json::Value,
    },
    /// A targeted screen-share signaling payload relayed from another peer.
    ScreenSignal {
        /// The original sender's identity.
        sender: String,
        /// Opaque payload.
        data: serde_json::Value,
    },
    /// Someone is requesting the recipient's screen share.
    ScreenShareRequest {
        /// The requester's identity.
        user_uuid: String,
    },
    /// A peer stopped screen-sharing.
    ScreenShareStop {
        /// The peer's identity.
        peer_uuid: String,
        /// The peer's display name.
        username: String,
    },
    /// A member's presence flags changed (or were cleared on departure,
    /// using the `"!"`-prefixed room name convention — see
    /// [`crate::frame::cleared_room`]).
    UserStatusUpdate {
        /// Room the update applies to, or `"!"+room` for a clearing update.
        room: String,
        /// The member's identity.
        user_uuid: String,
        /// The member's display name.
        username: String,
        /// Microphone muted.
        is_mic_muted: bool,
        /// Deafened.
        is_deafened: bool,
        /// Screen-sharing.
        is_streaming: bool,
    },
    /// One-time snapshot of every room's presence table, sent right after
    /// connect (and after any rehydration).
    UserStatusTotal {
        /// room name -> username -> presence.
        data: HashMap<String, HashMap<String, PresenceSnapshot>>,
    },
    /// A chat message, broadcast to every connected session including the
    /// sender.
    ChatMessage {
        /// Text payload or media URL.
        content: String,
        /// Whether `content` is text or a media reference.
        message_type: MessageKind,
        /// Author's identity.
        user_uuid: String,
        /// Author's display name.
        username: String,
        /// ISO-8601 timestamp (store-assigned for text, server clock for media).
        datetime: String,
    },
    /// Liveness probe; a correctly-behaving client replies with
    /// [`ClientFrame::Pong`].
    Ping,
    /// An operation could not be completed (currently only emitted for
    /// `join` against an unknown room).
    Error {
        /// Human-readable description.
        message: String,
    },
}

/// A member's identity as carried in a [`ServerFrame::Peers`] roster or a
/// [`ServerFrame::PeerJoined`] announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Display name.
    pub username: String,
    /// Identity.
    pub user_uuid: String,
}

/// Prefixes a room name with `"!"`, the convention a clearing
/// [`ServerFrame::UserStatusUpdate`] uses so clients can distinguish
/// "joined room R" from "removed from room R" without a separate field.
#[must_use]
pub fn cleared_room(room: &str) -> String {
    format!("!{room}")
}
