//! Serialization and deserialization for the control-channel wire protocol.
//!
//! Each WebSocket text message carries exactly one JSON-encoded frame;
//! unlike a raw byte stream, axum's WebSocket transport already preserves
//! message boundaries, so there is no length-prefix framing layer here.

use crate::frame::{ClientFrame, ServerFrame};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The JSON text could not be parsed, or parsed but didn't match a
    /// known frame shape for a recognized `type`.
    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// Decodes a [`ClientFrame`] from the JSON text of an inbound WebSocket
/// message.
///
/// An unrecognized `type` value is not an error — it deserializes to
/// [`ClientFrame::Unknown`]. This only fails for text that isn't valid JSON
/// at all, or that names a recognized `type` while omitting fields that
/// type requires.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if `text` cannot be parsed as a
/// `ClientFrame`.
pub fn decode_client_frame(text: &str) -> Result<ClientFrame, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Encodes a [`ServerFrame`] as JSON text for an outbound WebSocket message.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if `frame` cannot be serialized. This
/// should not happen for well-formed [`ServerFrame`] values; it is only
/// reachable if a `data` payload contains non-finite floats.
pub fn encode_server_frame(frame: &ServerFrame) -> Result<String, CodecError> {
    serde_json::to_string(frame).map_err(|e| CodecError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageKind;

    #[test]
    fn decode_known_frame() {
        let frame = decode_client_frame(r#"{"type":"leave"}"#).unwrap();
        assert_eq!(frame, ClientFrame::Leave);
    }

    #[test]
    fn decode_unknown_type_yields_unknown_variant() {
        let frame = decode_client_frame(r#"{"type":"teleport","x":1}"#).unwrap();
        assert_eq!(frame, ClientFrame::Unknown);
    }

    #[test]
    fn decode_invalid_json_errors() {
        let result = decode_client_frame("{not json");
        assert!(result.is_err());
    }

    #[test]
    fn decode_known_type_missing_fields_errors() {
        let result = decode_client_frame(r#"{"type":"signal"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn encode_server_frame_produces_tagged_json() {
        let frame = ServerFrame::Joined {
            room: "General".to_string(),
        };
        let text = encode_server_frame(&frame).unwrap();
        assert_eq!(text, r#"{"type":"joined","room":"General"}"#);
    }

    #[test]
    fn round_trip_chat_message_through_codec() {
        let frame = ClientFrame::ChatMessage {
            content: "hi".to_string(),
            message_type: MessageKind::Text,
        };
        let encoded = serde_json::to_string(&frame).unwrap();
        let decoded = decode_client_frame(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }
}
