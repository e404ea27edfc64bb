//! Background tasks that don't belong to any one session: the liveness
//! pinger and the reconnect-buffer sweep.

use std::sync::Arc;
use std::time::Duration;

use voxrelay_proto::ServerFrame;

use crate::hub::HubState;
use crate::reconnect::RECONNECT_TTL;
use crate::ws;

/// How often the pinger sweeps every live session with a `ping` frame.
pub const PING_INTERVAL: Duration = Duration::from_secs(25);

/// Spawns the liveness pinger: every [`PING_INTERVAL`], sends `{type:
/// ping}` to every connected session. A failed send (peer outbox closed)
/// runs the same teardown a dying session's own read loop would -- leaving
/// any held room, staging a reconnect record, and removing it from the
/// registry -- rather than a bare removal that would strand the room's
/// membership/presence entry behind. It does not try to close the
/// underlying channel itself; the channel's own reader will observe the
/// closure on its own.
pub fn spawn_pinger(hub: Arc<HubState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PING_INTERVAL);
        loop {
            interval.tick().await;
            for id in hub.all_session_ids() {
                if !hub.send_to_session(id, ServerFrame::Ping) {
                    tracing::debug!(session = id, "ping failed, tearing down dead session");
                    ws::teardown(&hub, id);
                }
            }
        }
    })
}

/// Spawns the reconnect-buffer sweep: every [`RECONNECT_TTL`] / 2, removes
/// any reconnect record whose TTL has elapsed. Runs at twice the TTL's
/// frequency so a record is never held much longer than its nominal
/// lifetime.
pub fn spawn_reconnect_sweep(hub: Arc<HubState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RECONNECT_TTL / 2);
        loop {
            interval.tick().await;
            hub.sweep_expired_reconnects();
        }
    })
}
