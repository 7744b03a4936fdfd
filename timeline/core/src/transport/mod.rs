//! Transport Layer
//!
//! Owns the single persistent connection to the agent event source.
//!
//! - [`Connector`]: dials one connection (WebSocket in production, in-memory
//!   in tests)
//! - [`ResilientTransport`]: connect / send / disconnect plus bounded,
//!   backoff reconnects after unexpected closes
//! - [`ReconnectConfig`]: attempt limit and delay schedule
//!
//! # Ordering
//!
//! Frames are delivered as [`TransportEvent::Message`] in exactly the order
//! the peer emitted them. Nothing in this layer reorders, deduplicates or
//! replays frames across reconnects.

pub mod config;
pub mod resilient;
pub mod traits;
pub mod websocket;

#[cfg(test)]
pub(crate) mod memory;

// Re-exports for convenience
pub use config::{BackoffPolicy, ReconnectConfig};
pub use resilient::ResilientTransport;
pub use traits::{
    Connection, ConnectionState, Connector, FrameSink, FrameStream, TransportError,
    TransportEvent,
};
pub use websocket::WebSocketConnector;
