//! Session lifecycle: start/stop supervision of one stream session.
//!
//! The controller owns all session state explicitly (no ambient globals):
//! each `start()` creates a fresh rolling buffer, throttle and connection
//! inside a background task, and publishes updates to the consumer over a
//! bounded channel. `stop()` cancels cooperatively via a watch flag polled
//! once per bounded-wait receive, so worst-case stop latency is the
//! configured receive timeout.
//!
//! There is no automatic reconnection: every terminal outcome requires a
//! user-issued `start()`.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::buffer::{ChartFrame, RollingBuffer};
use crate::client::{RecvOutcome, StreamConnector};
use crate::config::{BadRecordPolicy, StreamConfig};
use crate::record::normalize;
use crate::throttle::RedrawThrottle;
use crate::{Result, StreamError};

/// Capacity of the update channel handed to the consumer. Frame volume is
/// already bounded by the redraw throttle.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle state of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Running,
    /// A terminal stream error ended the session; user-visible, and only
    /// an explicit `start()` resumes.
    Errored,
}

/// Connection status surfaced to the embedding UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
    Stopped,
}

/// One update published to the consumer.
#[derive(Clone, Debug, Serialize)]
pub enum SessionUpdate {
    /// Connection status changed.
    Status(ConnectionState),
    /// A throttle tick materialized the buffer into a chart-ready frame.
    Frame(ChartFrame),
    /// The session ended; no further updates follow.
    Ended(SessionState),
}

struct ActiveSession {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Supervises one stream session at a time.
pub struct SessionController {
    config: StreamConfig,
    connector: Arc<dyn StreamConnector>,
    state: Arc<watch::Sender<SessionState>>,
    connection: Arc<watch::Sender<ConnectionState>>,
    active: Option<ActiveSession>,
}

impl SessionController {
    pub fn new(config: StreamConfig) -> Self {
        Self::with_connector(config, Arc::new(crate::client::WsConnector))
    }

    /// Inject a connector; tests use this to script a transport.
    pub fn with_connector(config: StreamConfig, connector: Arc<dyn StreamConnector>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            connector,
            state: Arc::new(state),
            connection: Arc::new(connection),
            active: None,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    /// Start a session, spawning the stream loop as a background task.
    ///
    /// Returns the consumer's end of the update channel. Fails with
    /// `AlreadyRunning` while a session is active; starting again after
    /// Idle or Errored always begins from an empty buffer.
    pub fn start(&mut self) -> Result<mpsc::Receiver<SessionUpdate>> {
        if self.state() == SessionState::Running {
            return Err(StreamError::AlreadyRunning);
        }

        let (update_tx, update_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);

        self.state.send_replace(SessionState::Running);
        self.connection.send_replace(ConnectionState::Disconnected);

        let worker = SessionWorker {
            config: self.config.clone(),
            connector: Arc::clone(&self.connector),
            state: Arc::clone(&self.state),
            connection: Arc::clone(&self.connection),
            updates: update_tx,
            stop: stop_rx,
        };
        let task = tokio::spawn(worker.run());

        self.active = Some(ActiveSession { stop_tx, task });
        info!(stream_key = %self.config.stream_key, "session started");
        Ok(update_rx)
    }

    /// Stop the active session and wait for its task to finish.
    ///
    /// Cancellation is cooperative: a message already fully received when
    /// the flag flips may still be processed, but no new receive is issued
    /// after. All buffer and throttle state is discarded with the task.
    /// A no-op when no session is active.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let _ = active.stop_tx.send(true);
        if let Err(e) = active.task.await {
            warn!(error = %e, "session task did not shut down cleanly");
        }
        info!("session stopped");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

/// State owned by the background task for one session. Dropped wholesale
/// when the session ends, which is what discards buffer and throttle.
struct SessionWorker {
    config: StreamConfig,
    connector: Arc<dyn StreamConnector>,
    state: Arc<watch::Sender<SessionState>>,
    connection: Arc<watch::Sender<ConnectionState>>,
    updates: mpsc::Sender<SessionUpdate>,
    stop: watch::Receiver<bool>,
}

impl SessionWorker {
    async fn run(mut self) {
        let end_state = self.stream().await;
        self.state.send_replace(end_state);
        let _ = self.updates.send(SessionUpdate::Ended(end_state)).await;
    }

    async fn stream(&mut self) -> SessionState {
        let mut buffer = RollingBuffer::new(self.config.max_points);
        let mut throttle = RedrawThrottle::new(self.config.redraw_interval);

        self.set_connection(ConnectionState::Connecting).await;
        let mut stop = self.stop.clone();
        let mut transport = tokio::select! {
            res = self.connector.connect(&self.config) => match res {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "connection failed");
                    self.set_connection(ConnectionState::Error).await;
                    return SessionState::Errored;
                }
            },
            // Stop during the handshake: drop the pending connect so stop
            // latency stays bounded even against a stalled host
            _ = async { let _ = stop.wait_for(|stopped| *stopped).await; } => {
                self.set_connection(ConnectionState::Stopped).await;
                return SessionState::Idle;
            }
        };
        self.set_connection(ConnectionState::Connected).await;

        loop {
            if *self.stop.borrow() {
                transport.close().await;
                self.set_connection(ConnectionState::Stopped).await;
                return SessionState::Idle;
            }

            match transport.recv(self.config.recv_timeout).await {
                // No data within the wait window: re-check the stop flag
                Ok(RecvOutcome::Timeout) => continue,
                Ok(RecvOutcome::Message(raw)) => {
                    match self.ingest(&raw, &mut buffer, &mut throttle).await {
                        Ok(true) => continue,
                        // Consumer went away; end quietly
                        Ok(false) => {
                            transport.close().await;
                            self.set_connection(ConnectionState::Stopped).await;
                            return SessionState::Idle;
                        }
                        Err(e) => {
                            warn!(error = %e, "bad record ended the session");
                            transport.close().await;
                            self.set_connection(ConnectionState::Error).await;
                            return SessionState::Errored;
                        }
                    }
                }
                Ok(RecvOutcome::Closed) => {
                    // Graceful remote close is a normal end-of-stream
                    info!("stream closed by remote");
                    self.set_connection(ConnectionState::Disconnected).await;
                    return SessionState::Idle;
                }
                Err(e) => {
                    warn!(error = %e, "stream error");
                    transport.close().await;
                    self.set_connection(ConnectionState::Error).await;
                    return SessionState::Errored;
                }
            }
        }
    }

    /// Normalize one message, merge it into the buffer, and publish a
    /// frame when the throttle allows. Returns Ok(false) when the consumer
    /// dropped the update channel.
    async fn ingest(
        &self,
        raw: &str,
        buffer: &mut RollingBuffer,
        throttle: &mut RedrawThrottle,
    ) -> Result<bool> {
        let record = match normalize(raw, &self.config.columns) {
            Ok(record) => record,
            Err(e @ (StreamError::Parse(_) | StreamError::Schema(_))) => {
                match self.config.bad_record {
                    BadRecordPolicy::AbortSession => return Err(e),
                    BadRecordPolicy::SkipAndLog => {
                        warn!(error = %e, "skipping malformed record");
                        return Ok(true);
                    }
                }
            }
            Err(e) => return Err(e),
        };
        buffer.insert(record);

        let now = Instant::now();
        if throttle.should_redraw(now) {
            let frame = buffer.frame();
            if self.updates.send(SessionUpdate::Frame(frame)).await.is_err() {
                return Ok(false);
            }
            // Only an accepted frame advances the clock
            throttle.mark_redrawn(now);
        }
        Ok(true)
    }

    async fn set_connection(&self, next: ConnectionState) {
        self.connection.send_replace(next);
        let _ = self.updates.send(SessionUpdate::Status(next)).await;
    }
}
