//! Shared state handed to every axum handler: the signaling hub plus the
//! resolved configuration the HTTP boundary needs (media/avatar
//! directories, the TURN shared secret).

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::hub::HubState;

/// Cloned into every axum handler via `State<AppState>`. Cheap to clone --
/// both fields are already behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Session/room/reconnect registry and broadcaster.
    pub hub: Arc<HubState>,
    /// Resolved server configuration.
    pub config: Arc<RelayConfig>,
}
