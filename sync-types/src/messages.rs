//! Wire messages exchanged with the photo service.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{SessionId, TypesError};

/// Response body of the album-sync endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSyncResult {
    /// Number of photos the service resynchronized.
    pub synced_count: u64,
    /// Display name of the album.
    pub album_name: String,
}

/// Message sent over the realtime channel.
///
/// Serializes as `{ "content": ..., "session_id": ...|null, "timestamp": ... }`
/// with an RFC 3339 UTC timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Message text.
    pub content: String,
    /// Conversation the message belongs to.
    pub session_id: Option<SessionId>,
    /// When the message was created.
    pub timestamp: String,
}

impl OutboundMessage {
    /// Create a message stamped with the current time.
    pub fn new(content: &str, session_id: Option<SessionId>) -> Self {
        Self::at(content, session_id, Utc::now())
    }

    /// Create a message stamped with the given time.
    pub fn at(content: &str, session_id: Option<SessionId>, at: DateTime<Utc>) -> Self {
        Self {
            content: content.to_string(),
            session_id,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, TypesError> {
        serde_json::to_string(self).map_err(TypesError::Serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn outbound_message_wire_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let msg = OutboundMessage::at("hello", Some(SessionId::parse("conv-1").unwrap()), at);
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(value["content"], "hello");
        assert_eq!(value["session_id"], "conv-1");
        assert_eq!(value["timestamp"], "2024-05-01T12:30:00.000Z");
    }

    #[test]
    fn outbound_message_without_session_sends_null() {
        let msg = OutboundMessage::new("hi", None);
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert!(value["session_id"].is_null());
        assert!(DateTime::parse_from_rfc3339(value["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn album_sync_result_decodes() {
        let result: AlbumSyncResult =
            serde_json::from_str(r#"{"synced_count": 14, "album_name": "Florence"}"#).unwrap();
        assert_eq!(result.synced_count, 14);
        assert_eq!(result.album_name, "Florence");
    }
}
