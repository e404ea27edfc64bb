//! Room and presence data model.
//!
//! A [`RoomState`] pairs membership with presence so the two stay
//! co-maintained: every operation that touches one touches the other inside
//! the same critical section (see [`crate::hub::HubState`]), so a session
//! that disappears abruptly never leaves an orphaned presence entry behind.

use std::collections::{HashMap, HashSet};

use voxrelay_proto::PresenceSnapshot;

use crate::session::SessionId;

/// Mic/deaf/streaming flags and pending viewer list for one room member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    /// The member's identity.
    pub user_uuid: String,
    /// Microphone muted.
    pub is_mic_muted: bool,
    /// Deafened.
    pub is_deafened: bool,
    /// Screen-sharing.
    pub is_streaming: bool,
    /// `user_uuid`s of viewers that requested this member's screen share,
    /// in request order. Empty whenever `is_streaming` is false.
    pub streaming_to: Vec<String>,
}

impl PresenceRecord {
    /// A freshly-joined member: all flags clear, no pending viewers.
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

    /// Converts to the wire representation.
    #[must_use]
    pub fn to_snapshot(&self) -> PresenceSnapshot {
        PresenceSnapshot {
            user_uuid: self.user_uuid.clone(),
            is_mic_muted: self.is_mic_muted,
            is_deafened: self.is_deafened,
            is_streaming: self.is_streaming,
            streaming_to: self.streaming_to.clone(),
        }
    }
}

/// Runtime state of one voice room: who's in it, and their presence.
#[derive(Debug, Default)]
pub struct RoomState {
    /// Sessions currently joined.
    pub members: HashSet<SessionId>,
    /// username -> presence, co-maintained with `members`.
    pub presence: HashMap<String, PresenceRecord>,
}

impl RoomState {
    /// An empty room, as created lazily on first join.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the room has no members left and its entry should be pruned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
