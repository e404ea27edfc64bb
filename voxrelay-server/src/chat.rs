//! Chat relay: persist-then-broadcast for text, broadcast-only for media.

use voxrelay_proto::{MessageKind, ServerFrame};

use crate::hub::HubState;
use crate::store::StoreError;

/// Persists (for text) and fans a chat message out to every connected
/// session, including the sender.
///
/// A text message's persistence failure aborts the whole operation — no
/// broadcast happens, matching the "abort, don't partial-broadcast"
/// contract. A media message is assumed already committed by the upload
/// path and is only broadcast.
///
/// # Errors
/// Returns the underlying [`StoreError`] if persisting a text message
/// fails.
pub fn relay_chat_message(
    hub: &HubState,
    kind: MessageKind,
    content: &str,
    user_uuid: &str,
    username: &str,
) -> Result<(), StoreError> {
    let (content, datetime) = match kind {
        MessageKind::Text => {
            let stored = hub.store.add_message(kind, content, user_uuid)?;
            (stored.content, stored.datetime)
        }
        MessageKind::Media => (content.to_string(), chrono::Utc::now().to_rfc3339()),
    };

    hub.broadcast_to_all(
        &ServerFrame::ChatMessage {
            content,
            message_type: kind,
            user_uuid: user_uuid.to_string(),
            username: username.to_string(),
            datetime,
        },
        None,
    );
    Ok(())
}
