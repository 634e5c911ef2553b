//! Outbound delivery abstraction for relay clients.

use crate::error::EnvError;
use crate::protocol::ServerMessage;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A server message shared between every recipient of a broadcast.
pub type Outbound = Arc<ServerMessage>;

/// Where the hub puts messages for one connected client.
///
/// Delivery is best-effort and must never block: a sink that cannot accept a
/// message right now reports [`EnvError::SinkFull`] and the hub drops that
/// connection instead of stalling everyone else.
///
/// # Implementations
///
/// - **Production**: the bounded queue drained by a connection's write pump
/// - **Simulation**: the same queue type, drained by the harness
pub trait ClientSink: Send + Sync + 'static {
    /// Queues a message without waiting.
    fn deliver(&self, message: Outbound) -> Result<(), EnvError>;
}

impl ClientSink for mpsc::Sender<Outbound> {
    fn deliver(&self, message: Outbound) -> Result<(), EnvError> {
        self.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnvError::SinkFull,
            mpsc::error::TrySendError::Closed(_) => EnvError::SinkClosed,
        })
    }
}

/// Creates a bounded outbound queue.
pub fn outbound_channel(capacity: usize) -> (mpsc::Sender<Outbound>, mpsc::Receiver<Outbound>) {
    mpsc::channel(capacity)
}
