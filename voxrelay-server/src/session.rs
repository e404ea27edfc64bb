//! Session identity.
//!
//! A [`SessionId`] is the hub's own handle for one live connection --
//! assigned at registration, stable for the connection's lifetime, never
//! reused. It is distinct from `user_uuid` (the client-asserted identity,
//! which may be held by more than one session at once) and from the
//! underlying axum/tokio connection itself, which the hub never touches
//! directly.

/// Opaque per-connection identifier, assigned by [`crate::hub::HubState`] at
/// registration.
pub type SessionId = u64;
