//! In-memory connections for tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::SinkExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::traits::{Connection, Connector, TransportError};

/// Server side of an in-memory connection
pub(crate) struct Peer {
    pub to_client: fmpsc::UnboundedSender<Result<String, TransportError>>,
    pub from_client: fmpsc::UnboundedReceiver<String>,
}

impl Peer {
    /// Push one text frame to the client
    pub fn push(&self, frame: impl Into<String>) {
        self.to_client.unbounded_send(Ok(frame.into())).ok();
    }
}

/// Outcome of one dial
pub(crate) enum Dial {
    Accept,
    Refuse,
}

/// Connector that follows a script of accept/refuse outcomes and hands the
/// server half of every accepted connection to the test. Dials past the end
/// of the script are refused.
pub(crate) struct MemoryConnector {
    script: Mutex<VecDeque<Dial>>,
    dials: Arc<AtomicU32>,
    peers: mpsc::UnboundedSender<Peer>,
}

impl MemoryConnector {
    pub fn new(script: Vec<Dial>) -> (Self, mpsc::UnboundedReceiver<Peer>, Arc<AtomicU32>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let dials = Arc::new(AtomicU32::new(0));
        let connector = Self {
            script: Mutex::new(script.into()),
            dials: Arc::clone(&dials),
            peers,
        };
        (connector, peers_rx, dials)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn dial(&self, _endpoint: &str) -> Result<Connection, TransportError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front().unwrap_or(Dial::Refuse);
        match next {
            Dial::Refuse => Err(TransportError::ConnectionFailed("refused".to_string())),
            Dial::Accept => {
                let (to_client, client_rx) = fmpsc::unbounded();
                let (client_tx, from_client) = fmpsc::unbounded::<String>();
                let sink = client_tx.sink_map_err(|e| TransportError::SendFailed(e.to_string()));
                self.peers
                    .send(Peer {
                        to_client,
                        from_client,
                    })
                    .ok();
                Ok(Connection::new(Box::pin(client_rx), Box::pin(sink)))
            }
        }
    }
}
