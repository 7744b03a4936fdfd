//! Resilient Transport
//!
//! Owns one logical connection to the event source and keeps it alive.
//!
//! # Behaviour
//!
//! - `connect()` dials once and, on success, hands the connection to a
//!   supervisor task. Calling it again while connected (or while a reconnect
//!   is pending) is a no-op.
//! - An unexpected close makes the supervisor retry with the configured
//!   backoff. Every successful reconnect starts the attempt count over.
//! - When the attempt limit is reached the supervisor emits
//!   [`TransportEvent::TerminalError`] once and stops. Nothing retries again
//!   until the caller calls `connect()`.
//! - `disconnect()` is an intentional shutdown: it cancels a pending
//!   reconnect and waits for the supervisor to finish, so no attempt can start
//!   afterwards.
//!
//! All callbacks travel over one unbounded channel, which preserves the order
//! frames arrived in.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::config::ReconnectConfig;
use super::traits::{Connection, ConnectionState, Connector, TransportError, TransportEvent};

/// State shared between the transport handle and its supervisor task
#[derive(Debug, Default)]
struct Shared {
    state: Mutex<ConnectionState>,
    /// Present only while a connection is live
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.lock();
        if *current != state {
            tracing::trace!(from = %*current, to = %state, "Connection state change");
            *current = state;
        }
    }

    fn open_outbound(&self, tx: mpsc::UnboundedSender<String>) {
        *self.outbound.lock() = Some(tx);
    }

    fn close_outbound(&self) {
        self.outbound.lock().take();
    }
}

/// Handle to a running supervisor task
#[derive(Debug)]
struct Supervisor {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Everything the supervisor task needs, cloned out of the transport
struct Link<C: Connector> {
    endpoint: String,
    config: ReconnectConfig,
    connector: Arc<C>,
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound_tx: mpsc::UnboundedSender<String>,
}

impl<C: Connector> Link<C> {
    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Transport event receiver dropped");
        }
    }

    fn go_live(&self) {
        self.shared.open_outbound(self.outbound_tx.clone());
        self.shared.set_state(ConnectionState::Connected);
        self.emit(TransportEvent::Connected);
    }
}

/// Why a live connection stopped
enum SessionEnd {
    Intentional,
    Lost(String),
}

/// Outcome of the reconnect loop
enum Reconnect {
    Established(Connection),
    Cancelled,
    Exhausted(u32),
}

/// Connection to the event source with automatic, bounded reconnects
pub struct ResilientTransport<C: Connector> {
    endpoint: String,
    config: ReconnectConfig,
    connector: Arc<C>,
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<TransportEvent>,
    supervisor: Option<Supervisor>,
}

impl<C: Connector> ResilientTransport<C> {
    /// Create a transport and the receiver its callbacks are delivered on
    pub fn new(
        endpoint: impl Into<String>,
        config: ReconnectConfig,
        connector: C,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let transport = Self {
            endpoint: endpoint.into(),
            config,
            connector: Arc::new(connector),
            shared: Arc::new(Shared::default()),
            events,
            supervisor: None,
        };
        (transport, events_rx)
    }

    /// The endpoint this transport dials
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The reconnect policy in effect
    #[must_use]
    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Whether a connection is live right now
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Establish the connection
    ///
    /// Idempotent: returns `Ok(())` without dialing when already connected or
    /// when the supervisor is in the middle of reconnecting.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] when the initial dial
    /// fails. No automatic retry is scheduled for a failed `connect()`.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        if self.supervisor_running() {
            tracing::debug!(state = %self.state(), "connect() ignored, connection already managed");
            return Ok(());
        }
        self.supervisor = None;

        self.shared.set_state(ConnectionState::Connecting);
        let connection = match self.connector.dial(&self.endpoint).await {
            Ok(connection) => connection,
            Err(e) => {
                self.shared.set_state(ConnectionState::Idle);
                tracing::warn!(endpoint = %self.endpoint, error = %e, "Connect failed");
                return Err(e);
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let link = Link {
            endpoint: self.endpoint.clone(),
            config: self.config.clone(),
            connector: Arc::clone(&self.connector),
            shared: Arc::clone(&self.shared),
            events: self.events.clone(),
            outbound_tx,
        };

        // Connected must be queued before the first Message can be
        link.go_live();
        tracing::info!(endpoint = %self.endpoint, "Connected to event source");

        let handle = tokio::spawn(supervise(link, connection, outbound_rx, shutdown_rx));
        self.supervisor = Some(Supervisor { shutdown, handle });
        Ok(())
    }

    /// Transmit one text frame
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] when no connection is live,
    /// including while a reconnect is pending.
    pub fn send(&self, frame: impl Into<String>) -> Result<(), TransportError> {
        if self.state() != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        let outbound = self.shared.outbound.lock();
        let tx = outbound.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(frame.into())
            .map_err(|_| TransportError::NotConnected)
    }

    /// Intentionally shut the connection down
    ///
    /// Cancels any pending reconnect attempt and waits for the supervisor to
    /// exit, so no reconnect can be started by this shutdown.
    pub async fn disconnect(&mut self) {
        let Some(supervisor) = self.supervisor.take() else {
            self.shared.set_state(ConnectionState::Idle);
            return;
        };

        if self.state() == ConnectionState::Connected {
            self.shared.set_state(ConnectionState::Closing);
        }
        // The supervisor may already have exited after a terminal error
        let _ = supervisor.shutdown.send(true);

        if let Err(e) = supervisor.handle.await {
            tracing::error!(error = %e, "Transport supervisor task failed");
        }
        self.shared.close_outbound();
        self.shared.set_state(ConnectionState::Idle);
        tracing::info!(endpoint = %self.endpoint, "Disconnected from event source");
    }

    fn supervisor_running(&self) -> bool {
        self.supervisor
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
            && self.state() != ConnectionState::Idle
    }
}

impl<C: Connector> Drop for ResilientTransport<C> {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            let _ = supervisor.shutdown.send(true);
        }
    }
}

/// Supervisor task: pump the live connection, reconnect when it is lost
async fn supervise<C: Connector>(
    link: Link<C>,
    mut connection: Connection,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let end = pump(&link, &mut connection, &mut outbound_rx, &mut shutdown_rx).await;
        link.shared.close_outbound();

        match end {
            SessionEnd::Intentional => {
                if let Err(e) = connection.sink.close().await {
                    tracing::debug!(error = %e, "Close handshake failed");
                }
                link.shared.set_state(ConnectionState::Idle);
                link.emit(TransportEvent::Disconnected { intentional: true });
                return;
            }
            SessionEnd::Lost(reason) => {
                tracing::warn!(endpoint = %link.endpoint, %reason, "Connection lost");
                link.shared.set_state(ConnectionState::Disconnected);
                link.emit(TransportEvent::Disconnected { intentional: false });
            }
        }

        match reconnect(&link, &mut shutdown_rx).await {
            Reconnect::Established(next) => {
                connection = next;
                link.go_live();
                tracing::info!(endpoint = %link.endpoint, "Reconnected to event source");
            }
            Reconnect::Cancelled => {
                tracing::debug!("Pending reconnect cancelled by disconnect()");
                link.shared.set_state(ConnectionState::Idle);
                return;
            }
            Reconnect::Exhausted(attempts) => {
                tracing::error!(endpoint = %link.endpoint, attempts, "Giving up on reconnecting");
                link.shared.set_state(ConnectionState::Idle);
                link.emit(TransportEvent::TerminalError(
                    TransportError::ReconnectExhausted { attempts },
                ));
                return;
            }
        }
    }
}

/// Move frames in both directions until the connection ends
async fn pump<C: Connector>(
    link: &Link<C>,
    connection: &mut Connection,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    if *shutdown_rx.borrow() {
        return SessionEnd::Intentional;
    }

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => return SessionEnd::Intentional,

            frame = connection.frames.next() => match frame {
                Some(Ok(text)) => {
                    tracing::debug!(bytes = text.len(), "Frame received");
                    link.emit(TransportEvent::Message(text));
                }
                Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                None => return SessionEnd::Lost(TransportError::ConnectionClosed.to_string()),
            },

            Some(frame) = outbound_rx.recv() => {
                if let Err(e) = connection.sink.send(frame).await {
                    return SessionEnd::Lost(e.to_string());
                }
            }
        }
    }
}

/// Retry dialing with backoff until success, cancellation or exhaustion
async fn reconnect<C: Connector>(
    link: &Link<C>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Reconnect {
    for attempt in 1..=link.config.max_attempts {
        let delay = link.config.delay_for_attempt(attempt);
        link.emit(TransportEvent::Reconnecting { attempt, delay });
        tracing::warn!(
            attempt,
            max_attempts = link.config.max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling reconnect"
        );

        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => return Reconnect::Cancelled,
            () = tokio::time::sleep(delay) => {}
        }

        link.shared.set_state(ConnectionState::Connecting);
        let dialed = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => return Reconnect::Cancelled,
            dialed = link.connector.dial(&link.endpoint) => dialed,
        };

        match dialed {
            Ok(connection) => return Reconnect::Established(connection),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Reconnect attempt failed");
                link.shared.set_state(ConnectionState::Disconnected);
            }
        }
    }
    Reconnect::Exhausted(link.config.max_attempts)
}
