//! Chat message kind shared between the wire protocol and the persistence
//! store.

use serde::{Deserialize, Serialize};

/// Whether a chat message carries inline text or a reference to media
/// already written to disk by the upload path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// UTF-8 text payload.
    Text,
    /// `content` is a URL to a file the upload handler already persisted.
    Media,
}

impl MessageKind {
    /// Returns the lowercase wire/storage representation (`"text"` or
    /// `"media"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Media => "media",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "media" => Ok(Self::Media),
            other => Err(format!("unknown message kind: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_text() {
        let kind = MessageKind::Text;
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "\"text\"");
        let back: MessageKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }

    #[test]
    fn round_trip_media() {
        let kind = MessageKind::Media;
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "\"media\"");
        let back: MessageKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }

    #[test]
    fn from_str_rejects_unknown() {
        assert!("video".parse::<MessageKind>().is_err());
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(MessageKind::Text.to_string(), "text");
        assert_eq!(MessageKind::Media.to_string(), "media");
    }
}
