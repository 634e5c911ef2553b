//! Error types for the relay.

use blobber_env::EnvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The hub's event loop has stopped
    #[error("Hub is no longer running")]
    HubClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Request line could not be read before the handshake deadline
    #[error("Malformed HTTP request")]
    BadRequest,

    #[error(transparent)]
    Env(#[from] EnvError),
}
