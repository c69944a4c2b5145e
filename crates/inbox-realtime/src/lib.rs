//! WebSocket realtime client for inbox notifications.
//!
//! This crate provides:
//! - WebSocket connection authenticated with the session token
//! - Heartbeat for connection keepalive
//! - Typed [`RealtimeEvent`]s fanned out on a broadcast channel
//! - The [`RealtimeTransport`] trait consumers program against
//!
//! There is no automatic reconnection; callers decide when to connect again.

mod client;
mod error;
mod messages;
mod transport;

pub use client::{ConnectionState, RealtimeClient, RealtimeConfig};
pub use error::{RealtimeError, RealtimeResult};
pub use messages::{
    event_names, InboundFrame, MessageNotification, NewMessage, RealtimeEvent, RealtimeFrame,
};
pub use transport::RealtimeTransport;
