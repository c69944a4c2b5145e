//! Transport seam between the realtime client and its consumers.

use crate::{RealtimeEvent, RealtimeResult};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// A push channel that can be opened with a credential and observed as typed events.
///
/// Implemented by [`crate::RealtimeClient`]; tests substitute an in-memory
/// transport that emits scripted events.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open the connection using the session credential.
    ///
    /// Connecting while already connected is a no-op.
    async fn connect(&self, credential: &str) -> RealtimeResult<()>;

    /// Close the connection. Safe to call when not connected.
    async fn disconnect(&self);

    /// Subscribe to events emitted from now on.
    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent>;
}
