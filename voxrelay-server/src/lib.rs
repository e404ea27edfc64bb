//! voxrelay signaling server library.
//!
//! Exposes the signaling hub, its HTTP/WebSocket boundary, and the
//! persistence store for embedding and integration testing. `main.rs` is a
//! thin binary that resolves configuration and wires these pieces together.

pub mod chat;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod hub;
pub mod pinger;
pub mod reconnect;
pub mod room;
pub mod session;
pub mod state;
pub mod store;
pub mod turn;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

use crate::state::AppState;

/// Body size cap applied to the upload routes, comfortably above the 50 MiB
/// media cap so the multipart body itself isn't rejected before the
/// handler gets a chance to enforce the documented per-file cap.
const UPLOAD_BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Builds the axum [`Router`] for the whole HTTP + WebSocket surface,
/// ready to be served. Split out from `main` so integration tests can
/// mount it against an in-process listener.
#[must_use]
pub fn build_router(app: AppState) -> Router {
    Router::new()
        .route("/", get(http::index))
        .route("/ws", get(ws::ws_handler))
        .route("/api/messages", get(http::get_messages))
        .route("/api/user", get(http::get_user))
        .route("/api/rooms", get(http::get_rooms))
        .route(
            "/api/upload",
            post(http::upload_media).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/upload_avatar",
            post(http::upload_avatar).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/get_turn_creds", get(http::get_turn_creds))
        .route("/admin/panel", get(http::admin_panel))
        .route(
            "/admin/api/users",
            get(http::admin_list_users)
                .post(http::admin_create_user)
                .delete(http::admin_delete_user),
        )
        .with_state(app)
}

/// Starts the server on `addr` and returns the bound address and a join
/// handle -- the primary entry point used by both `main.rs` and tests.
///
/// # Errors
/// Returns an error if the TCP listener cannot bind to `addr`.
pub async fn start_server_with_state(
    addr: &str,
    app: AppState,
) -> Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>>
{
    let hub = Arc::clone(&app.hub);
    let router = build_router(app);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    pinger::spawn_pinger(Arc::clone(&hub));
    pinger::spawn_reconnect_sweep(hub);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "voxrelay server error");
        }
    });

    Ok((bound_addr, handle))
}
