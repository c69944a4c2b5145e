//! Unread message count provider.
//!
//! [`UnreadCountProvider`] owns a single unread-message counter and keeps it
//! fresh:
//! - fetched when the session becomes authenticated and ready
//! - forced to zero while the session is loading or anonymous
//! - fetched again on realtime message notifications for the principal
//!
//! Consumers read it through an [`UnreadCountHandle`], either held directly
//! or looked up with [`use_unread_count`] inside a provider scope.
//!
//! # Architecture
//!
//! ```text
//! watch<Session> ──► reactor ──► refresh() ──► UnreadCountFetcher (HTTP)
//!                       │                             │
//!                       ▼                             ▼
//!              RealtimeTransport ──events──► subscription ──► watch<u32>
//! ```

mod api;
mod context;
mod error;
mod provider;
mod session;

pub use api::{ApiClient, UnreadCountFetcher, UnreadCountResponse, UNREAD_COUNT_PATH};
pub use context::{try_use_unread_count, use_unread_count};
pub use error::{UnreadError, UnreadResult};
pub use provider::{UnreadCountHandle, UnreadCountProvider};
pub use session::{session_channel, Principal, Session};
