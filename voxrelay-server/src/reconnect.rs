//! Reconnect buffer: short-lived holding area for a departed session's room
//! state, keyed by `user_uuid`.
//!
//! Staged at teardown, consumed on the next session opened for the same
//! identity, and otherwise swept away after the TTL. At most one record is
//! ever held per `user_uuid` — a fresh disconnect overwrites whatever was
//! there, matching the source's "only the latest disconnect matters" policy.

use std::time::{Duration, Instant};

/// How long a vanished session's room state is preserved for a same-identity
/// reopen.
pub const RECONNECT_TTL: Duration = Duration::from_secs(10);

/// A room's worth of presence state, staged for a possible reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectRecord {
    /// Room the session was in at teardown.
    pub room: String,
    /// Microphone muted.
    pub is_mic_muted: bool,
    /// Deafened.
    pub is_deafened: bool,
    /// Screen-sharing.
    pub is_streaming: bool,
    /// Pending viewer requests.
    pub streaming_to: Vec<String>,
    /// When this record was staged, used by the sweep to expire it.
    pub staged_at: Instant,
}

impl ReconnectRecord {
    /// Whether `staged_at + RECONNECT_TTL` has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.staged_at.elapsed() >= RECONNECT_TTL
    }
}
