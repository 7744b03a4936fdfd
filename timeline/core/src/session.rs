//! Chat Session
//!
//! Wires the pieces together for a surface:
//!
//! ```text
//! ResilientTransport ──TransportEvent──▶ pump task ──▶ classify ──▶ TurnReducer
//!                                           │
//!                                           └──SessionUpdate──▶ surface
//! ```
//!
//! The pump task is the only writer of the turn store. Surfaces read it
//! through [`ChatSession::snapshot`] and react to [`SessionUpdate`]s.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::classifier::classify_text;
use crate::config::{ClientConfig, ConfigError};
use crate::timeline::{TurnChange, TurnReducer, TurnStore, UPSTREAM_ERROR};
use crate::transport::{
    ConnectionState, Connector, ResilientTransport, TransportError, TransportEvent,
};
use crate::wire::{EventKind, OutboundMessage, WireError};

/// Marker recorded on a turn cut short by a lost connection
pub const CONNECTION_LOST: &str = "connection lost";

/// Errors from session operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// Blank (or all-whitespace) input is never sent
    #[error("Message is empty")]
    EmptyMessage,

    /// The transport refused the operation
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The outbound frame could not be encoded
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The configuration failed validation
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Connection status as surfaces see it
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    /// Live connection
    Connected,
    /// Waiting to retry after an unexpected close
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
        /// Wait before this attempt
        delay: Duration,
    },
    /// Connection closed
    Disconnected {
        /// True when the close was requested
        intentional: bool,
    },
    /// Reconnecting gave up; only `reconnect()` will try again
    Failed,
}

/// Something a surface should render
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SessionUpdate {
    /// Connection status changed
    Connection(ConnectionStatus),
    /// The timeline changed
    Turn(TurnChange),
    /// A failure the user should see
    Failure(String),
}

/// Requests from the session handle to its pump task
#[derive(Debug)]
enum Control {
    UserRequest,
    Shutdown,
}

/// A live conversation with the agent event source
pub struct ChatSession<C: Connector> {
    transport: ResilientTransport<C>,
    reducer: Arc<RwLock<TurnReducer>>,
    control: mpsc::UnboundedSender<Control>,
    pump: Option<JoinHandle<()>>,
}

impl<C: Connector> ChatSession<C> {
    /// Validate the configuration, start the pump and connect
    ///
    /// Returns the session and the receiver surfaces read updates from.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for an invalid configuration and
    /// [`SessionError::Transport`] when the initial connect fails.
    pub async fn start(
        config: &ClientConfig,
        connector: C,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionUpdate>), SessionError> {
        config.validate()?;

        let (transport, events) =
            ResilientTransport::new(&config.endpoint, config.reconnect.clone(), connector);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let reducer = Arc::new(RwLock::new(TurnReducer::new()));

        let pump = tokio::spawn(pump(Arc::clone(&reducer), events, control_rx, updates_tx));

        let mut session = Self {
            transport,
            reducer,
            control: control_tx,
            pump: Some(pump),
        };
        session.transport.connect().await?;
        tracing::info!(endpoint = %config.endpoint, "Chat session started");

        Ok((session, updates_rx))
    }

    /// Send one user message
    ///
    /// The text is trimmed first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EmptyMessage`] for blank input and
    /// [`SessionError::Transport`] when no connection is live.
    pub fn send(&self, text: &str) -> Result<(), SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let frame = OutboundMessage::user_text(text).encode()?;
        self.transport.send(frame)?;
        tracing::debug!(chars = text.len(), "User message sent");

        if self.control.send(Control::UserRequest).is_err() {
            tracing::trace!("Session pump already stopped");
        }
        Ok(())
    }

    /// A copy of every turn, for rendering
    #[must_use]
    pub fn snapshot(&self) -> TurnStore {
        self.reducer.read().store().clone()
    }

    /// Whether the assistant is still producing output
    #[must_use]
    pub fn is_producing(&self) -> bool {
        self.reducer.read().is_producing()
    }

    /// Current transport state
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Connect again, typically after reconnecting gave up
    ///
    /// A no-op while connected or while a reconnect is pending.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transport`] when the dial fails.
    pub async fn reconnect(&mut self) -> Result<(), SessionError> {
        self.transport.connect().await?;
        Ok(())
    }

    /// Disconnect intentionally and wait for the pump to drain
    ///
    /// A turn still active at this point stays active; only a lost
    /// connection abandons it.
    pub async fn shutdown(mut self) {
        self.transport.disconnect().await;
        if self.control.send(Control::Shutdown).is_err() {
            tracing::trace!("Session pump already stopped");
        }
        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                tracing::error!(error = %e, "Session pump task failed");
            }
        }
        tracing::info!("Chat session shut down");
    }
}

/// Single writer: apply transport events to the reducer in arrival order
async fn pump(
    reducer: Arc<RwLock<TurnReducer>>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    mut control: mpsc::UnboundedReceiver<Control>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
) {
    let publish = |update: SessionUpdate| {
        if updates.send(update).is_err() {
            tracing::trace!("Session update receiver dropped");
        }
    };

    loop {
        tokio::select! {
            biased;

            Some(command) = control.recv() => match command {
                Control::UserRequest => {
                    // Frames queued before the user spoke belong to the previous exchange
                    while let Ok(event) = events.try_recv() {
                        handle_event(&reducer, event, &publish);
                    }
                    let change = reducer.write().note_user_request();
                    if let Some(change) = change {
                        publish(SessionUpdate::Turn(change));
                    }
                }
                Control::Shutdown => {
                    // The transport has stopped; deliver what it already queued
                    while let Ok(event) = events.try_recv() {
                        handle_event(&reducer, event, &publish);
                    }
                    break;
                }
            },

            event = events.recv() => match event {
                Some(event) => handle_event(&reducer, event, &publish),
                None => break,
            },
        }
    }
    tracing::debug!("Session pump stopped");
}

fn handle_event(
    reducer: &RwLock<TurnReducer>,
    event: TransportEvent,
    publish: &impl Fn(SessionUpdate),
) {
    match event {
        TransportEvent::Connected => publish(SessionUpdate::Connection(ConnectionStatus::Connected)),
        TransportEvent::Disconnected { intentional } => {
            publish(SessionUpdate::Connection(ConnectionStatus::Disconnected {
                intentional,
            }));
        }
        TransportEvent::Reconnecting { attempt, delay } => {
            publish(SessionUpdate::Connection(ConnectionStatus::Reconnecting {
                attempt,
                delay,
            }));
        }
        TransportEvent::Message(text) => match classify_text(&text) {
            Ok(Some(classified)) => {
                tracing::debug!(kind = ?classified.kind, participant = %classified.participant, "Event");
                let failure = (classified.kind == EventKind::UpstreamError).then(|| {
                    classified
                        .detail
                        .clone()
                        .unwrap_or_else(|| UPSTREAM_ERROR.to_string())
                });
                let changes = reducer.write().apply(classified);
                for change in changes {
                    publish(SessionUpdate::Turn(change));
                }
                if let Some(message) = failure {
                    publish(SessionUpdate::Failure(message));
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Dropping malformed frame"),
        },
        TransportEvent::TerminalError(e) => {
            tracing::error!(error = %e, "Connection lost for good");
            publish(SessionUpdate::Connection(ConnectionStatus::Failed));
            let changes = reducer.write().abandon_active(CONNECTION_LOST);
            for change in changes {
                publish(SessionUpdate::Turn(change));
            }
            publish(SessionUpdate::Failure(e.to_string()));
        }
    }
}
