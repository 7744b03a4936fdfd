//! WebSocket Connector
//!
//! Dials the event source over a plain or TLS WebSocket. Text frames pass
//! through untouched; binary frames are accepted when they hold UTF-8.
//! Ping/pong is answered by tungstenite itself while the stream is polled.

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::traits::{Connection, Connector, TransportError};

/// Connector backed by `tokio-tungstenite`
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a new connector
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn dial(&self, endpoint: &str) -> Result<Connection, TransportError> {
        let (stream, response) = connect_async(endpoint)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("{endpoint}: {e}")))?;

        tracing::debug!(
            endpoint,
            status = %response.status(),
            "WebSocket handshake complete"
        );

        let (sink, source) = stream.split();

        let sink = sink
            .sink_map_err(|e| TransportError::SendFailed(e.to_string()))
            .with(|text: String| future::ok::<_, TransportError>(Message::Text(text)));

        let frames = source.filter_map(|msg| future::ready(text_frame(msg)));

        Ok(Connection::new(Box::pin(frames), Box::pin(sink)))
    }
}

/// Reduce a WebSocket message to an application text frame, if it is one
fn text_frame(msg: Result<Message, WsError>) -> Option<Result<String, TransportError>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(text)),
        Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
            Ok(text) => Some(Ok(text)),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping non-UTF-8 binary frame");
                None
            }
        },
        Ok(Message::Close(frame)) => {
            tracing::debug!(?frame, "Peer sent close frame");
            None
        }
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(e) => Some(Err(TransportError::ReceiveFailed(e.to_string()))),
    }
}
