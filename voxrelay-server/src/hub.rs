//! The signaling hub: session registry, room registry, reconnect buffer, and
//! broadcast primitives, guarded by a single lock.
//!
//! The session registry, room registry, and reconnect buffer form one
//! consistency domain (a join must never leave presence and membership out
//! of sync, a teardown must never leave an orphan presence entry). Rather
//! than a dedicated serializing actor, this hub guards all three with a
//! single [`parking_lot::Mutex`] held for the duration of each operation;
//! fan-out sends are performed from a snapshot taken inside the critical
//! section and sent after releasing it, so a slow peer never blocks the
//! lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use voxrelay_proto::{PeerInfo, PresenceSnapshot, ServerFrame};

use crate::reconnect::ReconnectRecord;
use crate::room::{PresenceRecord, RoomState};
use crate::store::Store;

pub use crate::session::SessionId;

/// Channel a [`HubState`] uses to deliver frames to one session's writer
/// task.
pub type Outbox = mpsc::UnboundedSender<ServerFrame>;

/// What the hub knows about one live session.
pub struct SessionHandle {
    /// The session's asserted identity.
    pub user_uuid: String,
    /// Snapshot of the user's display name at connect time.
    pub username: String,
    /// Room currently joined, if any. Read fresh from here on every frame
    /// rather than captured once, so a concurrent `join`/`leave` is always
    /// observed.
    pub room: Option<String>,
    /// Delivery channel to this session's writer task.
    pub outbox: Outbox,
}

#[derive(Default)]
struct HubInner {
    sessions: HashMap<SessionId, SessionHandle>,
    by_user_uuid: HashMap<String, Vec<SessionId>>,
    rooms: HashMap<String, RoomState>,
    reconnects: HashMap<String, ReconnectRecord>,
    next_session_id: SessionId,
}

/// Shared state for the whole signaling hub.
pub struct HubState {
    inner: Mutex<HubInner>,
    /// Persistence store, opaque to everything but the chat relay and HTTP
    /// boundary.
    pub store: Arc<dyn Store>,
}

impl HubState {
    /// Creates an empty hub backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            inner: Mutex::new(HubInner::default()),
            store,
        }
    }

    /// Registers a new session and returns its id.
    pub fn register_session(&self, user_uuid: &str, username: &str, outbox: Outbox) -> SessionId {
        let mut inner = self.inner.lock();
        let id = inner.next_session_id;
        inner.next_session_id += 1;
        inner.sessions.insert(
            id,
            SessionHandle {
                user_uuid: user_uuid.to_string(),
                username: username.to_string(),
                room: None,
                outbox,
            },
        );
        inner
            .by_user_uuid
            .entry(user_uuid.to_string())
            .or_default()
            .push(id);
        id
    }

    /// Removes a session from the registry, returning its last known state
    /// (in particular, the room it held, for teardown).
    pub fn unregister_session(&self, id: SessionId) -> Option<SessionHandle> {
        let mut inner = self.inner.lock();
        let handle = inner.sessions.remove(&id)?;
        if let Some(ids) = inner.by_user_uuid.get_mut(&handle.user_uuid) {
            ids.retain(|&sid| sid != id);
            if ids.is_empty() {
                inner.by_user_uuid.remove(&handle.user_uuid);
            }
        }
        Some(handle)
    }

    /// The room a session currently holds, read fresh (never cached by the
    /// caller across an await point).
    pub fn session_room(&self, id: SessionId) -> Option<String> {
        self.inner.lock().sessions.get(&id).and_then(|s| s.room.clone())
    }

    /// The session's asserted identity and display-name snapshot.
    pub fn session_identity(&self, id: SessionId) -> Option<(String, String)> {
        self.inner
            .lock()
            .sessions
            .get(&id)
            .map(|s| (s.user_uuid.clone(), s.username.clone()))
    }

    /// The first session registered under `user_uuid`, if any — used for
    /// targeted relays, which pick the first match when a `user_uuid` is
    /// (unusually) held by more than one session.
    pub fn find_any_by_uuid(&self, user_uuid: &str) -> Option<SessionId> {
        self.inner
            .lock()
            .by_user_uuid
            .get(user_uuid)
            .and_then(|ids| ids.first().copied())
    }

    // -- Room membership and presence -------------------------------------

    /// Adds `id` to `room`'s membership with a freshly-cleared presence
    /// record, creating the room if it does not yet exist. Returns the
    /// roster of *other* members present before the join, for the `peers`
    /// frame.
    pub fn join_room(&self, id: SessionId, room: &str) -> Vec<PeerInfo> {
        let mut inner = self.inner.lock();

        // Collect member ids while the room's entry is mutably borrowed (this
        // also creates the room on first join), then drop that borrow before
        // reading `inner.sessions` -- the two can't overlap through the same
        // `MutexGuard`.
        let member_ids: Vec<SessionId> = {
            let room_state = inner.rooms.entry(room.to_string()).or_default();
            room_state.members.iter().copied().collect()
        };
        let peers = member_ids
            .into_iter()
            .filter_map(|member_id| inner.sessions.get(&member_id))
            .map(|s| PeerInfo {
                username: s.username.clone(),
                user_uuid: s.user_uuid.clone(),
            })
            .collect::<Vec<_>>();

        let Some(session) = inner.sessions.get_mut(&id) else {
            return peers;
        };
        session.room = Some(room.to_string());
        let username = session.username.clone();
        let user_uuid = session.user_uuid.clone();

        let room_state = inner.rooms.entry(room.to_string()).or_default();
        room_state.members.insert(id);
        room_state
            .presence
            .entry(username)
            .or_insert_with(|| PresenceRecord::new(user_uuid));

        peers
    }

    /// Roster of members currently in `room`, optionally excluding one
    /// session. Used to send a (re)joining client the current membership
    /// snapshot without mutating anything.
    pub fn room_roster(&self, room: &str, except: Option<SessionId>) -> Vec<PeerInfo> {
        let inner = self.inner.lock();
        let Some(room_state) = inner.rooms.get(room) else {
            return Vec::new();
        };
        room_state
            .members
            .iter()
            .filter(|&&id| Some(id) != except)
            .filter_map(|id| inner.sessions.get(id))
            .map(|s| PeerInfo {
                username: s.username.clone(),
                user_uuid: s.user_uuid.clone(),
            })
            .collect()
    }

    /// Restores a room membership and presence record exactly as captured
    /// in a [`ReconnectRecord`], for rehydration on reconnect.
    pub fn rehydrate_room(&self, id: SessionId, record: &ReconnectRecord) {
        let mut inner = self.inner.lock();
        let Some(session) = inner.sessions.get_mut(&id) else {
            return;
        };
        session.room = Some(record.room.clone());
        let username = session.username.clone();
        let user_uuid = session.user_uuid.clone();

        let room_state = inner.rooms.entry(record.room.clone()).or_default();
        room_state.members.insert(id);
        room_state.presence.insert(
            username,
            PresenceRecord {
                user_uuid,
                is_mic_muted: record.is_mic_muted,
                is_deafened: record.is_deafened,
                is_streaming: record.is_streaming,
                streaming_to: record.streaming_to.clone(),
            },
        );
    }

    /// Removes `id` from its current room's membership and presence,
    /// pruning the room if it becomes empty. Returns the room name and the
    /// session's final presence record, if it held one.
    pub fn leave_room(&self, id: SessionId) -> Option<(String, PresenceRecord)> {
        let mut inner = self.inner.lock();
        let room_name = inner.sessions.get(&id)?.room.clone()?;
        let username = inner.sessions.get(&id)?.username.clone();

        let removed = {
            let room_state = inner.rooms.get_mut(&room_name)?;
            room_state.members.remove(&id);
            let removed = room_state.presence.remove(&username);
            if room_state.is_empty() {
                inner.rooms.remove(&room_name);
            }
            removed
        };

        if let Some(session) = inner.sessions.get_mut(&id) {
            session.room = None;
        }

        removed.map(|record| (room_name, record))
    }

    /// Applies a presence update for `id`'s current room, returning the
    /// merged record, or `None` if the session has no room or no presence
    /// entry (a no-op per the design notes' resolution of the "status
    /// update before any join" ambiguity).
    pub fn update_presence(
        &self,
        id: SessionId,
        is_mic_muted: bool,
        is_deafened: bool,
        is_streaming: bool,
    ) -> Option<(String, PresenceRecord)> {
        let mut inner = self.inner.lock();
        let session = inner.sessions.get(&id)?;
        let room_name = session.room.clone()?;
        let username = session.username.clone();

        let room_state = inner.rooms.get_mut(&room_name)?;
        let record = room_state.presence.get_mut(&username)?;
        record.is_mic_muted = is_mic_muted;
        record.is_deafened = is_deafened;
        record.is_streaming = is_streaming;
        if !is_streaming {
            record.streaming_to.clear();
        }
        Some((room_name, record.clone()))
    }

    /// Appends `viewer_uuid` to the `streaming_to` list of whichever room
    /// member holds `target_uuid`'s presence entry. No-op if the target has
    /// no presence entry in any room.
    pub fn add_stream_viewer(&self, target_uuid: &str, viewer_uuid: &str) {
        let mut inner = self.inner.lock();
        for room_state in inner.rooms.values_mut() {
            for record in room_state.presence.values_mut() {
                if record.user_uuid == target_uuid {
                    record.streaming_to.push(viewer_uuid.to_string());
                    return;
                }
            }
        }
    }

    /// Removes `viewer_uuid` from the `streaming_to` list of whichever room
    /// member holds `target_uuid`'s presence entry.
    pub fn remove_stream_viewer(&self, target_uuid: &str, viewer_uuid: &str) {
        let mut inner = self.inner.lock();
        for room_state in inner.rooms.values_mut() {
            for record in room_state.presence.values_mut() {
                if record.user_uuid == target_uuid {
                    record.streaming_to.retain(|v| v != viewer_uuid);
                    return;
                }
            }
        }
    }

    /// A full snapshot of every room's presence table: room -> username ->
    /// presence. Sent once after connect/rehydration.
    pub fn presence_snapshot(&self) -> HashMap<String, HashMap<String, PresenceSnapshot>> {
        let inner = self.inner.lock();
        inner
            .rooms
            .iter()
            .map(|(room, state)| {
                let table = state
                    .presence
                    .iter()
                    .map(|(username, record)| (username.clone(), record.to_snapshot()))
                    .collect();
                (room.clone(), table)
            })
            .collect()
    }

    // -- Reconnect buffer ---------------------------------------------------

    /// Stages a reconnect record for `user_uuid`, overwriting any existing
    /// one (only the latest disconnect matters).
    pub fn stage_reconnect(&self, user_uuid: &str, record: ReconnectRecord) {
        self.inner
            .lock()
            .reconnects
            .insert(user_uuid.to_string(), record);
    }

    /// Consumes (removes and returns) the reconnect record for `user_uuid`,
    /// if one is present and not yet expired.
    pub fn take_reconnect(&self, user_uuid: &str) -> Option<ReconnectRecord> {
        let mut inner = self.inner.lock();
        let record = inner.reconnects.remove(user_uuid)?;
        if record.is_expired() {
            return None;
        }
        Some(record)
    }

    /// Removes every expired reconnect record. Called periodically by the
    /// sweep task.
    pub fn sweep_expired_reconnects(&self) {
        self.inner.lock().reconnects.retain(|_, r| !r.is_expired());
    }

    // -- Broadcaster primitives ---------------------------------------------

    /// Sends `frame` to a single recipient, best-effort. Returns `true` if a
    /// session was found and the send did not immediately fail.
    pub fn send_to_target(&self, user_uuid: &str, frame: ServerFrame) -> bool {
        let Some(id) = self.find_any_by_uuid(user_uuid) else {
            return false;
        };
        self.send_to_session(id, frame)
    }

    /// Sends `frame` directly to a known session id.
    pub fn send_to_session(&self, id: SessionId, frame: ServerFrame) -> bool {
        let outbox = self.inner.lock().sessions.get(&id).map(|s| s.outbox.clone());
        match outbox {
            Some(outbox) => outbox.send(frame).is_ok(),
            None => false,
        }
    }

    /// Sends `frame` to every member of `room`, optionally skipping one
    /// session (the caller, on a caller-excluded broadcast). Iterates a
    /// snapshot taken under the lock; sends happen after it is released.
    pub fn broadcast_to_room(&self, room: &str, frame: &ServerFrame, except: Option<SessionId>) {
        let recipients: Vec<Outbox> = {
            let inner = self.inner.lock();
            let Some(room_state) = inner.rooms.get(room) else {
                return;
            };
            room_state
                .members
                .iter()
                .filter(|&&id| Some(id) != except)
                .filter_map(|id| inner.sessions.get(id))
                .map(|s| s.outbox.clone())
                .collect()
        };
        for outbox in recipients {
            if outbox.send(frame.clone()).is_err() {
                tracing::warn!(room = %room, "dropped room broadcast: peer outbox closed");
            }
        }
    }

    /// Sends `frame` to every connected session, optionally skipping one.
    pub fn broadcast_to_all(&self, frame: &ServerFrame, except: Option<SessionId>) {
        let recipients: Vec<Outbox> = {
            let inner = self.inner.lock();
            inner
                .sessions
                .iter()
                .filter(|(&id, _)| Some(id) != except)
                .map(|(_, s)| s.outbox.clone())
                .collect()
        };
        for outbox in recipients {
            if outbox.send(frame.clone()).is_err() {
                tracing::warn!("dropped broadcast: peer outbox closed");
            }
        }
    }

    /// Snapshot of every live session id, for the liveness pinger.
    pub fn all_session_ids(&self) -> Vec<SessionId> {
        self.inner.lock().sessions.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn make_hub() -> HubState {
        HubState::new(Arc::new(InMemoryStore::new(1000)))
    }

    #[test]
    fn register_then_unregister_clears_uuid_index() {
        let hub = make_hub();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register_session("u1", "alice", tx);
        assert_eq!(hub.find_any_by_uuid("u1"), Some(id));
        hub.unregister_session(id);
        assert_eq!(hub.find_any_by_uuid("u1"), None);
    }

    #[test]
    fn join_creates_presence_and_lists_existing_members() {
        let hub = make_hub();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let a = hub.register_session("a", "alice", tx_a);
        let b = hub.register_session("b", "bob", tx_b);

        let peers_for_a = hub.join_room(a, "General");
        assert!(peers_for_a.is_empty());

        let peers_for_b = hub.join_room(b, "General");
        assert_eq!(peers_for_b.len(), 1);
        assert_eq!(peers_for_b[0].user_uuid, "a");

        let snapshot = hub.presence_snapshot();
        assert_eq!(snapshot["General"].len(), 2);
        assert!(!snapshot["General"]["alice"].is_streaming);
    }

    #[test]
    fn leave_prunes_empty_room() {
        let hub = make_hub();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register_session("a", "alice", tx);
        hub.join_room(id, "General");
        let (room, record) = hub.leave_room(id).unwrap();
        assert_eq!(room, "General");
        assert_eq!(record.user_uuid, "a");
        assert!(hub.presence_snapshot().get("General").is_none());
    }

    #[test]
    fn update_presence_is_noop_without_room() {
        let hub = make_hub();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register_session("a", "alice", tx);
        assert!(hub.update_presence(id, true, true, false).is_none());
    }

    #[test]
    fn update_presence_clears_streaming_to_when_streaming_stops() {
        let hub = make_hub();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register_session("a", "alice", tx);
        hub.join_room(id, "General");
        hub.update_presence(id, false, false, true);
        hub.add_stream_viewer("a", "viewer-1");
        let (_, record) = hub.update_presence(id, false, false, false).unwrap();
        assert!(record.streaming_to.is_empty());
    }

    #[test]
    fn stream_viewer_add_and_remove() {
        let hub = make_hub();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register_session("a", "alice", tx);
        hub.join_room(id, "General");
        hub.update_presence(id, false, false, true);
        hub.add_stream_viewer("a", "b");
        let snapshot = hub.presence_snapshot();
        assert_eq!(snapshot["General"]["alice"].streaming_to, vec!["b"]);
        hub.remove_stream_viewer("a", "b");
        let snapshot = hub.presence_snapshot();
        assert!(snapshot["General"]["alice"].streaming_to.is_empty());
    }

    #[test]
    fn reconnect_round_trip_restores_presence() {
        let hub = make_hub();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register_session("a", "alice", tx);
        hub.join_room(id, "General");
        hub.update_presence(id, true, false, true);
        hub.add_stream_viewer("a", "viewer");

        let (_, record) = hub.leave_room(id).unwrap();
        hub.stage_reconnect(
            "a",
            ReconnectRecord {
                room: "General".to_string(),
                is_mic_muted: record.is_mic_muted,
                is_deafened: record.is_deafened,
                is_streaming: record.is_streaming,
                streaming_to: record.streaming_to.clone(),
                staged_at: std::time::Instant::now(),
            },
        );

        let (tx2, _rx2) = mpsc::unbounded_channel();
        let id2 = hub.register_session("a", "alice", tx2);
        let reconnect = hub.take_reconnect("a").unwrap();
        hub.rehydrate_room(id2, &reconnect);

        let snapshot = hub.presence_snapshot();
        let presence = &snapshot["General"]["alice"];
        assert!(presence.is_mic_muted);
        assert!(presence.is_streaming);
        assert_eq!(presence.streaming_to, vec!["viewer"]);
    }

    #[test]
    fn reconnect_at_most_one_per_uuid() {
        let hub = make_hub();
        hub.stage_reconnect(
            "a",
            ReconnectRecord {
                room: "First".to_string(),
                is_mic_muted: false,
                is_deafened: false,
                is_streaming: false,
                streaming_to: Vec::new(),
                staged_at: std::time::Instant::now(),
            },
        );
        hub.stage_reconnect(
            "a",
            ReconnectRecord {
                room: "Second".to_string(),
                is_mic_muted: false,
                is_deafened: false,
                is_streaming: false,
                streaming_to: Vec::new(),
                staged_at: std::time::Instant::now(),
            },
        );
        let record = hub.take_reconnect("a").unwrap();
        assert_eq!(record.room, "Second");
        assert!(hub.take_reconnect("a").is_none());
    }

    #[test]
    fn broadcast_to_room_skips_excluded_session() {
        let hub = make_hub();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = hub.register_session("a", "alice", tx_a);
        let b = hub.register_session("b", "bob", tx_b);
        hub.join_room(a, "General");
        hub.join_room(b, "General");

        hub.broadcast_to_room("General", &ServerFrame::Ping, Some(a));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }
}
