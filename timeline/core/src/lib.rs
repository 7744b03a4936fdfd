//! Timeline Core - Headless Thinking Timeline for Multi-Agent Chat
//!
//! Turns the raw event stream of a multi-agent backend into a timeline of
//! "turns": one per assistant exchange, each a live list of progress steps
//! that collapses behind its final answer. No rendering happens here; any
//! surface (terminal, web, native) drives a [`ChatSession`] and renders the
//! [`TurnStore`] it maintains.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Surface (CLI, ...)                        │
//! │            send(text) ▲              │ SessionUpdate          │
//! └───────────────────────┼──────────────┼────────────────────────┘
//!                         │              ▼
//! ┌───────────────────────┴──────────────────────────────────────┐
//! │                       TIMELINE CORE                           │
//! │                                                               │
//! │  ResilientTransport ──frames──▶ Classifier ──▶ TurnReducer    │
//! │  (connect, backoff,             (closed kind    (current turn, │
//! │   intentional close)             set, payload    override      │
//! │                                  normalizers)    window)       │
//! │                                                      │        │
//! │                                                 TurnStore     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use timeline_core::{load_config, ChatSession, SessionUpdate, WebSocketConnector};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let (session, mut updates) =
//!         ChatSession::start(&config, WebSocketConnector::new()).await?;
//!
//!     session.send("Glucose 148, BMI 33.6, age 50")?;
//!     while let Some(update) = updates.recv().await {
//!         if let SessionUpdate::Turn(change) = update {
//!             println!("{change:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`wire`]: JSON frames exchanged with the event source
//! - [`classifier`]: Frame to [`ClassifiedEvent`], tolerant of payload shape
//! - [`timeline`]: Turns, the turn store and the reducer that builds them
//! - [`transport`]: Persistent connection with bounded reconnects
//! - [`session`]: Transport, classifier and reducer wired together
//! - [`config`]: TOML, environment and CLI configuration layering

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classifier;
pub mod config;
pub mod session;
pub mod timeline;
pub mod transport;
pub mod wire;

// Re-exports for convenience
pub use classifier::{classify, classify_text, ClassifiedEvent, ClassifyError};
pub use session::{ChatSession, ConnectionStatus, SessionError, SessionUpdate, CONNECTION_LOST};
pub use timeline::{
    Step, Turn, TurnChange, TurnId, TurnReducer, TurnStatus, TurnStore, UPSTREAM_ERROR,
};
pub use transport::{
    BackoffPolicy, ConnectionState, Connector, ReconnectConfig, ResilientTransport,
    TransportError, TransportEvent, WebSocketConnector,
};
pub use wire::{EventKind, InboundFrame, OutboundMessage, WireError};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_file, load_config_from_path, ClientConfig,
    ClientToml, ConfigError, ConfigOverrides, ConfigSource,
};
