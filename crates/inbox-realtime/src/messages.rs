//! Realtime protocol frames and typed events.

use serde::{Deserialize, Serialize};

/// Event names used on the wire.
pub mod event_names {
    pub const AUTHENTICATE: &str = "authenticate";
    pub const AUTHENTICATED: &str = "authenticated";
    pub const AUTH_ERROR: &str = "auth_error";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const ERROR: &str = "error";
    pub const MESSAGE_NOTIFICATION: &str = "message_notification";
    pub const NEW_MESSAGE: &str = "new_message";
}

/// A frame sent to/from the realtime server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Payload of a `message_notification` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageNotification {
    pub message_id: Option<String>,
    pub sender_id: Option<String>,
    pub conversation_id: Option<String>,
}

/// Payload of a `new_message` event. Message content is never retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub receiver_id: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Events emitted by the realtime client.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// Authenticated and ready to receive events.
    Connected,
    /// Connection closed, with an optional reason.
    Disconnected(Option<String>),
    /// The server rejected the credential.
    AuthenticationFailed(String),
    /// A message notification addressed to this session.
    MessageNotification(MessageNotification),
    /// A new message was delivered somewhere on the account's channel.
    NewMessage(NewMessage),
    /// Any other named event.
    Custom {
        event: String,
        data: Option<serde_json::Value>,
    },
    /// Server-reported error.
    Error(String),
}

/// An inbound frame after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Authenticated,
    AuthError(String),
    Pong,
    Event(RealtimeEvent),
}

impl RealtimeFrame {
    /// Create a frame with a payload.
    pub fn new(event: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Create the `authenticate` frame sent right after connecting.
    pub fn authenticate(token: &str) -> Self {
        Self::new(
            event_names::AUTHENTICATE,
            Some(serde_json::json!({ "token": token })),
        )
    }

    /// Create a keepalive `ping` frame.
    pub fn ping() -> Self {
        Self::new(event_names::PING, None)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    fn message_field(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    }

    /// Sort an inbound frame into control frames and consumer events.
    ///
    /// A `new_message` without a usable `receiverId` is passed through as
    /// [`RealtimeEvent::Custom`] rather than dropped.
    pub fn classify(self) -> InboundFrame {
        match self.event.as_str() {
            event_names::AUTHENTICATED => InboundFrame::Authenticated,
            event_names::AUTH_ERROR => InboundFrame::AuthError(
                self.message_field()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ),
            event_names::PONG => InboundFrame::Pong,
            event_names::ERROR => InboundFrame::Event(RealtimeEvent::Error(
                self.message_field()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            )),
            event_names::MESSAGE_NOTIFICATION => {
                let notification = self
                    .data
                    .clone()
                    .and_then(|d| serde_json::from_value(d).ok())
                    .unwrap_or_default();
                InboundFrame::Event(RealtimeEvent::MessageNotification(notification))
            }
            event_names::NEW_MESSAGE => {
                match self
                    .data
                    .clone()
                    .map(serde_json::from_value::<NewMessage>)
                {
                    Some(Ok(message)) => InboundFrame::Event(RealtimeEvent::NewMessage(message)),
                    _ => {
                        tracing::warn!("new_message frame without receiverId");
                        InboundFrame::Event(RealtimeEvent::Custom {
                            event: self.event.clone(),
                            data: self.data,
                        })
                    }
                }
            }
            _ => InboundFrame::Event(RealtimeEvent::Custom {
                event: self.event.clone(),
                data: self.data,
            }),
        }
    }
}
