//! Wire protocol for the voxrelay signaling server.
//!
//! The control channel carries JSON frames over a WebSocket. [`ClientFrame`]
//! is what the dispatcher accepts from a session; [`ServerFrame`] is what the
//! hub emits. The two are kept separate rather than folded into one enum
//! because several `type` names (`signal`, `screen_share_request`,
//! `user_status_update`, `chat_message`) carry different fields depending on
//! direction.

pub mod chat;
pub mod codec;
pub mod frame;
pub mod presence;

pub use chat::MessageKind;
pub use frame::{ClientFrame, PeerInfo, ServerFrame, cleared_room};
pub use presence::PresenceSnapshot;
