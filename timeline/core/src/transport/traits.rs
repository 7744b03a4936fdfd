//! Transport Traits
//!
//! The seam between the resilient transport and a concrete wire.
//!
//! A [`Connector`] only knows how to open one connection to an endpoint.
//! Everything about *staying* connected (reconnect policy, intentional
//! shutdown, callback ordering) lives in
//! [`ResilientTransport`](super::ResilientTransport).

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, Stream};
use serde::Serialize;
use thiserror::Error;

/// Inbound text frames, in the order the peer emitted them
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Outbound text frames
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// One live, bidirectional connection to the event source
pub struct Connection {
    /// Frames received from the peer. The stream ending means the peer closed.
    pub frames: FrameStream,
    /// Frames to deliver to the peer
    pub sink: FrameSink,
}

impl Connection {
    /// Bundle a frame stream and sink into a connection
    pub fn new(frames: FrameStream, sink: FrameSink) -> Self {
        Self { frames, sink }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Errors that can occur during transport operations
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// `send()` was called without a live connection
    #[error("Not connected")]
    NotConnected,

    /// Dialing the endpoint failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The peer closed the connection
    #[error("Connection closed")]
    ConnectionClosed,

    /// Writing a frame failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Reading a frame failed
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Every reconnect attempt failed; retrying has stopped
    #[error("Reconnect attempts exhausted after {attempts} attempt(s)")]
    ReconnectExhausted {
        /// Number of reconnect attempts that were made
        attempts: u32,
    },
}

/// Opens connections to an endpoint
///
/// Implementations must be cheap to share: the resilient transport keeps one
/// connector for its whole lifetime and dials again on every reconnect.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a single connection to `endpoint`
    async fn dial(&self, endpoint: &str) -> Result<Connection, TransportError>;
}

/// Logical connection state
///
/// `Idle → Connecting → Connected → (Closing | Disconnected)`.
/// `Disconnected` only returns to `Connecting` when the close was unexpected
/// and reconnect attempts remain; otherwise the transport settles in `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// No connection and no reconnect pending
    #[default]
    Idle,
    /// Dialing (initial connect or a reconnect attempt)
    Connecting,
    /// Live connection
    Connected,
    /// Intentional shutdown in progress
    Closing,
    /// Unexpectedly closed, waiting for the next reconnect attempt
    Disconnected,
}

impl ConnectionState {
    /// Short label for status lines
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Callback notifications from the transport, delivered in strict order on a
/// single channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection (initial or reconnected) is live
    Connected,

    /// The connection ended
    Disconnected {
        /// True when caused by `disconnect()`
        intentional: bool,
    },

    /// An inbound text frame
    Message(String),

    /// A reconnect attempt has been scheduled
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
        /// Delay before the attempt dials
        delay: Duration,
    },

    /// Reconnecting gave up; no further attempts until `connect()` is called
    TerminalError(TransportError),
}
