//! Presence snapshot type carried in [`crate::frame::ServerFrame::UserStatusTotal`].
//!
//! This is the wire representation of a room member's mic/deaf/streaming
//! flags; the hub's own `PresenceRecord` (voxrelay-server) mirrors this
//! shape plus bookkeeping the wire format does not need to expose.

use serde::{Deserialize, Serialize};

/// Mic/deaf/streaming flags and outgoing-stream viewer list for one room
/// member, as published to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    /// The member's identity.
    pub user_uuid: String,
    /// Whether the member's microphone is muted.
    pub is_mic_muted: bool,
    /// Whether the member has deafened themself.
    pub is_deafened: bool,
    /// Whether the member is currently sharing their screen.
    pub is_streaming: bool,
    /// `user_uuid`s of viewers that have requested this member's screen
    /// share, in request order. Must be empty when `is_streaming` is false.
    pub streaming_to: Vec<String>,
}

impl PresenceSnapshot {
    /// A freshly-joined member: all flags false, no pending viewers.
    #[must_use]
    pub fn new(user_uuid: impl Into<String>) -> Self {
        Self {
            user_uuid: user_uuid.into(),
            is_mic_muted: false,
            is_deafened: false,
            is_streaming: false,
            streaming_to: Vec::new(),
        }
    }
}
