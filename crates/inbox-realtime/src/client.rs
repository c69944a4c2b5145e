//! WebSocket realtime client.

use crate::messages::{InboundFrame, RealtimeEvent, RealtimeFrame};
use crate::{RealtimeError, RealtimeResult, RealtimeTransport};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use inbox_config_and_utils::Config;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Realtime client configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Realtime server URL (e.g., wss://rt.example.com/ws).
    pub url: String,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Capacity of the broadcast channel; slow subscribers past this lag.
    pub event_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: inbox_config_and_utils::DEFAULT_REALTIME_URL.to_string(),
            heartbeat_interval_secs: inbox_config_and_utils::DEFAULT_HEARTBEAT_INTERVAL_SECS,
            event_capacity: 100,
        }
    }
}

impl From<&Config> for RealtimeConfig {
    fn from(config: &Config) -> Self {
        Self {
            url: config.realtime_url.clone(),
            heartbeat_interval_secs: config.heartbeat_interval_secs,
            ..Default::default()
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
}

/// Background tasks owned by one live connection.
#[derive(Default)]
struct ConnectionTasks {
    reader: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl ConnectionTasks {
    fn abort(&mut self) {
        for handle in [self.reader.take(), self.heartbeat.take(), self.writer.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }

    fn stop_reading(&mut self) {
        for handle in [self.reader.take(), self.heartbeat.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }

    /// Give the writer a moment to flush and send Close, then abort it.
    /// Only finishes once the shared sender slot has been cleared.
    async fn finish_writer(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if tokio::time::timeout(WRITER_CLOSE_GRACE, &mut writer)
                .await
                .is_err()
            {
                writer.abort();
            }
        }
    }
}

/// How long `disconnect` waits for the writer to send Close.
const WRITER_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// WebSocket realtime client.
///
/// One connection at a time. Events are fanned out to every subscriber
/// through a broadcast channel, so subscribing before `connect` is fine.
pub struct RealtimeClient {
    config: RealtimeConfig,
    state: Arc<RwLock<ConnectionState>>,
    sender: Arc<Mutex<Option<mpsc::Sender<Message>>>>,
    event_tx: broadcast::Sender<RealtimeEvent>,
    tasks: Mutex<ConnectionTasks>,
}

impl RealtimeClient {
    /// Create a new realtime client with the given configuration.
    pub fn new(config: RealtimeConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            sender: Arc::new(Mutex::new(None)),
            event_tx,
            tasks: Mutex::new(ConnectionTasks::default()),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RealtimeConfig::default())
    }

    /// Get the current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Check if connected and authenticated.
    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Connected
    }

    /// Connect and authenticate with the session token.
    ///
    /// Returns once the `authenticate` frame is written; the outcome arrives
    /// as [`RealtimeEvent::Connected`] or [`RealtimeEvent::AuthenticationFailed`].
    pub async fn connect(&self, token: &str) -> RealtimeResult<()> {
        {
            let mut state = self.state.write().await;
            if *state != ConnectionState::Disconnected {
                debug!(state = ?*state, "Already connecting or connected");
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }

        if let Err(e) = self.do_connect(token).await {
            *self.state.write().await = ConnectionState::Disconnected;
            *self.sender.lock().await = None;
            return Err(e);
        }

        Ok(())
    }

    async fn do_connect(&self, token: &str) -> RealtimeResult<()> {
        info!(url = %self.config.url, "Connecting to realtime server");

        let (ws_stream, _) = connect_async(self.config.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        *self.state.write().await = ConnectionState::Authenticating;

        let auth_json = RealtimeFrame::authenticate(token).to_json()?;
        write.send(Message::Text(auth_json.into())).await?;
        debug!("Sent authenticate frame");

        let (msg_tx, mut msg_rx) = mpsc::channel::<Message>(100);
        *self.sender.lock().await = Some(msg_tx);

        // The shared slot holds the only sender; clearing it lets the writer
        // send Close and exit.
        let writer = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                if write.send(msg).await.is_err() {
                    return;
                }
            }
            let _ = write.send(Message::Close(None)).await;
        });

        let heartbeat_sender = self.sender.clone();
        let heartbeat_secs = self.config.heartbeat_interval_secs.max(1);
        let heartbeat = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(heartbeat_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Ok(json) = RealtimeFrame::ping().to_json() else {
                    continue;
                };
                let Some(tx) = heartbeat_sender.lock().await.clone() else {
                    break;
                };
                if tx.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        });

        let state = self.state.clone();
        let sender = self.sender.clone();
        let event_tx = self.event_tx.clone();
        let reader = tokio::spawn(async move {
            let mut reason = None;

            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => match RealtimeFrame::from_json(&text) {
                        Ok(frame) => {
                            if !handle_frame(frame, &state, &event_tx).await {
                                reason = Some("authentication rejected".to_string());
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "Failed to parse realtime frame"),
                    },
                    Ok(Message::Ping(data)) => {
                        let tx = sender.lock().await.clone();
                        if let Some(tx) = tx {
                            let _ = tx.send(Message::Pong(data)).await;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        info!("Realtime connection closed by server");
                        reason = frame.map(|f| f.reason.as_str().to_string());
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "Realtime socket error");
                        reason = Some(e.to_string());
                        break;
                    }
                }
            }

            *sender.lock().await = None;
            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(RealtimeEvent::Disconnected(reason));
        });

        let mut tasks = self.tasks.lock().await;
        tasks.abort();
        tasks.reader = Some(reader);
        tasks.heartbeat = Some(heartbeat);
        tasks.writer = Some(writer);

        Ok(())
    }

    /// Close the connection, if any.
    pub async fn disconnect(&self) {
        let mut tasks = self.tasks.lock().await;
        tasks.stop_reading();
        self.sender.lock().await.take();
        tasks.finish_writer().await;
        drop(tasks);

        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, ConnectionState::Disconnected)
        };

        if previous != ConnectionState::Disconnected {
            info!("Disconnected from realtime server");
            let _ = self
                .event_tx
                .send(RealtimeEvent::Disconnected(Some("client disconnect".to_string())));
        }
    }

    /// Send a frame to the server.
    pub async fn send_frame(&self, frame: &RealtimeFrame) -> RealtimeResult<()> {
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or(RealtimeError::NotConnected)?;

        let json = frame.to_json()?;
        sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| RealtimeError::Send(e.to_string()))
    }
}

/// Apply one inbound frame. Returns false when the connection must close.
async fn handle_frame(
    frame: RealtimeFrame,
    state: &Arc<RwLock<ConnectionState>>,
    event_tx: &broadcast::Sender<RealtimeEvent>,
) -> bool {
    match frame.classify() {
        InboundFrame::Authenticated => {
            *state.write().await = ConnectionState::Connected;
            info!("Authenticated with realtime server");
            let _ = event_tx.send(RealtimeEvent::Connected);
            true
        }
        InboundFrame::AuthError(message) => {
            error!(error = %message, "Realtime authentication failed");
            let _ = event_tx.send(RealtimeEvent::AuthenticationFailed(message));
            false
        }
        InboundFrame::Pong => true,
        InboundFrame::Event(event) => {
            debug!(?event, "Realtime event");
            let _ = event_tx.send(event);
            true
        }
    }
}

#[async_trait]
impl RealtimeTransport for RealtimeClient {
    async fn connect(&self, credential: &str) -> RealtimeResult<()> {
        RealtimeClient::connect(self, credential).await
    }

    async fn disconnect(&self) {
        RealtimeClient::disconnect(self).await
    }

    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.event_tx.subscribe()
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("url", &self.config.url)
            .finish_non_exhaustive()
    }
}
