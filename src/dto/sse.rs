use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::ws::ServerMessage;

#[derive(Clone, Debug)]
/// Dispatched payload carried across the admin SSE channel.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Wrap a server frame, naming the SSE event after its type.
    pub fn from_message(message: &ServerMessage) -> serde_json::Result<Self> {
        Self::json(Some(message.event_name().to_string()), message)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to the admin dashboard when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Token to present in the `x-admin-token` header of admin routes.
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_is_named_after_message_type() {
        let event = ServerEvent::from_message(&ServerMessage::MatchClock { seconds: 12 }).unwrap();
        assert_eq!(event.event.as_deref(), Some("match_clock"));
        assert_eq!(event.data, r#"{"type":"match_clock","seconds":12}"#);
    }
}
