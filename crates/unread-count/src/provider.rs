//! The unread count provider and the handle consumers hold.

use crate::api::UnreadCountFetcher;
use crate::session::Session;
use inbox_realtime::{RealtimeEvent, RealtimeTransport};
use inbox_storage::CredentialStore;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Counter state shared by the provider, its handles, and its background tasks.
struct CountState {
    session: watch::Receiver<Session>,
    fetcher: Arc<dyn UnreadCountFetcher>,
    count_tx: watch::Sender<u32>,
    /// Bumped by every fetch and every reset; a fetch result is applied only
    /// while its ticket is still the latest. Only touched while holding the
    /// `count_tx` lock, so checking a ticket and writing the count is atomic.
    ticket: AtomicU64,
    runtime: tokio::runtime::Handle,
}

fn store(current: &mut u32, value: u32) -> bool {
    if *current == value {
        false
    } else {
        *current = value;
        true
    }
}

impl CountState {
    /// Zero the counter and invalidate any fetch still in flight.
    fn reset(&self) {
        self.count_tx.send_if_modified(|current| {
            self.ticket.fetch_add(1, Ordering::SeqCst);
            store(current, 0)
        });
    }

    /// Take a ticket for the ready principal, or reset when there is none.
    ///
    /// The session is read under the count lock. A logout is visible here
    /// before the reactor resets, so any ticket claimed for the old principal
    /// predates that reset.
    fn claim(&self) -> Option<(String, u64)> {
        let mut claimed = None;
        self.count_tx.send_if_modified(|current| {
            let ticket = self.ticket.fetch_add(1, Ordering::SeqCst) + 1;
            match self.session.borrow().ready_principal() {
                Some(principal) => {
                    claimed = Some((principal.id.clone(), ticket));
                    false
                }
                None => store(current, 0),
            }
        });
        claimed
    }

    async fn reload(&self) {
        let Some((user_id, ticket)) = self.claim() else {
            debug!("No ready session; unread count is 0");
            return;
        };
        debug!(user_id = %user_id, ticket, "Loading unread message count");

        let count = match self.fetcher.fetch_unread_count().await {
            Ok(response) => response.count,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to load unread message count");
                0
            }
        };

        let mut stale = false;
        self.count_tx.send_if_modified(|current| {
            if self.ticket.load(Ordering::SeqCst) != ticket {
                stale = true;
                return false;
            }
            store(current, count)
        });
        if stale {
            debug!(ticket, "Discarding superseded unread count response");
        }
    }

    fn refresh(self: &Arc<Self>) {
        let state = Arc::clone(self);
        self.runtime.spawn(async move { state.reload().await });
    }
}

/// Read-only view of the unread count plus the refresh trigger.
///
/// Cheap to clone; every clone observes the same counter.
#[derive(Clone)]
pub struct UnreadCountHandle {
    state: Arc<CountState>,
    count_rx: watch::Receiver<u32>,
}

impl UnreadCountHandle {
    /// Current unread count.
    pub fn count(&self) -> u32 {
        *self.count_rx.borrow()
    }

    /// A receiver that wakes whenever the count changes.
    pub fn watch(&self) -> watch::Receiver<u32> {
        self.count_rx.clone()
    }

    /// Trigger a refresh without waiting for it.
    pub fn refresh(&self) {
        self.state.refresh();
    }

    /// Refresh and wait until the result has been applied (or discarded as stale).
    pub async fn reload(&self) {
        self.state.reload().await;
    }

    /// Run `future` with this handle installed as the ambient unread-count context.
    pub async fn scope<F: Future>(&self, future: F) -> F::Output {
        crate::context::UNREAD_COUNT.scope(self.clone(), future).await
    }
}

impl std::fmt::Debug for UnreadCountHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnreadCountHandle")
            .field("count", &self.count())
            .finish()
    }
}

/// Aborts the wrapped task when dropped.
struct Subscription {
    principal_id: String,
    handle: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Owns the unread count and keeps it in step with the session and realtime events.
///
/// Dropping the provider stops the reaction loop and closes the realtime
/// connection in the background; [`UnreadCountProvider::shutdown`] does the
/// same and waits for the disconnect.
pub struct UnreadCountProvider {
    state: Arc<CountState>,
    transport: Arc<dyn RealtimeTransport>,
    reactor: Option<JoinHandle<()>>,
}

impl UnreadCountProvider {
    /// Start a provider.
    ///
    /// Must be called from within a Tokio runtime. The count starts at 0 and
    /// the current session is applied immediately.
    pub fn new(
        session: watch::Receiver<Session>,
        fetcher: Arc<dyn UnreadCountFetcher>,
        transport: Arc<dyn RealtimeTransport>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        let runtime = tokio::runtime::Handle::current();
        let (count_tx, _) = watch::channel(0);

        let state = Arc::new(CountState {
            session: session.clone(),
            fetcher,
            count_tx,
            ticket: AtomicU64::new(0),
            runtime: runtime.clone(),
        });

        let reactor = runtime.spawn(run_reactor(
            Arc::clone(&state),
            session,
            Arc::clone(&transport),
            credentials,
        ));

        Self {
            state,
            transport,
            reactor: Some(reactor),
        }
    }

    /// A handle for consumers.
    pub fn handle(&self) -> UnreadCountHandle {
        UnreadCountHandle {
            state: Arc::clone(&self.state),
            count_rx: self.state.count_tx.subscribe(),
        }
    }

    /// Current unread count.
    pub fn count(&self) -> u32 {
        *self.state.count_tx.borrow()
    }

    /// Trigger a refresh without waiting for it.
    pub fn refresh(&self) {
        self.state.refresh();
    }

    /// Refresh and wait until the result has been applied.
    pub async fn reload(&self) {
        self.state.reload().await;
    }

    /// Run `future` inside this provider's scope, where [`crate::use_unread_count`] resolves.
    pub async fn scope<F: Future>(&self, future: F) -> F::Output {
        self.handle().scope(future).await
    }

    /// Spawn a task inside this provider's scope.
    pub fn spawn_scoped<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let handle = self.handle();
        self.state
            .runtime
            .spawn(crate::context::UNREAD_COUNT.scope(handle, future))
    }

    /// Stop reacting to the session and close the realtime connection.
    pub async fn shutdown(mut self) {
        if let Some(reactor) = self.reactor.take() {
            reactor.abort();
            let _ = reactor.await;
        }
        self.transport.disconnect().await;
        info!("Unread count provider stopped");
    }
}

impl Drop for UnreadCountProvider {
    fn drop(&mut self) {
        let Some(reactor) = self.reactor.take() else {
            return;
        };
        reactor.abort();

        let transport = Arc::clone(&self.transport);
        self.state.runtime.spawn(async move {
            transport.disconnect().await;
        });
    }
}

impl std::fmt::Debug for UnreadCountProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnreadCountProvider")
            .field("count", &self.count())
            .field("running", &self.reactor.is_some())
            .finish()
    }
}

/// Re-apply the session whenever its identity or loading flag changes.
async fn run_reactor(
    state: Arc<CountState>,
    mut session_rx: watch::Receiver<Session>,
    transport: Arc<dyn RealtimeTransport>,
    credentials: Arc<CredentialStore>,
) {
    let mut active: Option<Subscription> = None;
    let mut last_key = None;

    loop {
        let session = session_rx.borrow_and_update().clone();
        let key = session.key();

        if last_key.as_ref() != Some(&key) {
            last_key = Some(key);
            apply_session(&session, &state, &transport, &credentials, &mut active).await;
        }

        if session_rx.changed().await.is_err() {
            debug!("Session source closed; keeping current state until shutdown");
            // Parked so `active` stays alive until the provider aborts us.
            std::future::pending::<()>().await;
        }
    }
}

async fn apply_session(
    session: &Session,
    state: &Arc<CountState>,
    transport: &Arc<dyn RealtimeTransport>,
    credentials: &CredentialStore,
    active: &mut Option<Subscription>,
) {
    let Some(principal) = session.ready_principal() else {
        debug!(loading = session.loading, "Session not ready; clearing unread count");
        state.reset();
        if active.take().is_some() {
            info!("Closing realtime connection");
        }
        transport.disconnect().await;
        return;
    };

    if let Some(previous) = active.take() {
        info!(
            previous_user_id = %previous.principal_id,
            user_id = %principal.id,
            "Principal changed; reconnecting realtime"
        );
        drop(previous);
        state.reset();
        transport.disconnect().await;
    }

    state.refresh();

    let token = match credentials.session_token() {
        Ok(Some(token)) => token,
        Ok(None) => {
            debug!(user_id = %principal.id, "No stored session token; realtime disabled");
            return;
        }
        Err(e) => {
            warn!(error = %e, "Failed to read session token; realtime disabled");
            return;
        }
    };

    // Subscribe first so nothing emitted right after connect is missed.
    let events = transport.subscribe();
    if let Err(e) = transport.connect(&token).await {
        warn!(user_id = %principal.id, error = %e, "Realtime connection failed");
        return;
    }

    info!(user_id = %principal.id, "Listening for message notifications");
    let handle = state.runtime.spawn(run_subscription(
        Arc::clone(state),
        principal.id.clone(),
        events,
    ));
    *active = Some(Subscription {
        principal_id: principal.id.clone(),
        handle,
    });
}

/// Turn realtime events into refreshes.
async fn run_subscription(
    state: Arc<CountState>,
    principal_id: String,
    mut events: broadcast::Receiver<RealtimeEvent>,
) {
    loop {
        match events.recv().await {
            Ok(RealtimeEvent::MessageNotification(notification)) => {
                debug!(
                    message_id = ?notification.message_id,
                    "Message notification received; refreshing unread count"
                );
                state.refresh();
            }
            Ok(RealtimeEvent::NewMessage(message)) => {
                if message.receiver_id == principal_id {
                    debug!(message_id = ?message.id, "New message for current user; refreshing unread count");
                    state.refresh();
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Whatever was skipped may have changed the count.
                warn!(skipped, "Realtime subscriber lagged; refreshing unread count");
                state.refresh();
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Realtime event channel closed");
                return;
            }
        }
    }
}
