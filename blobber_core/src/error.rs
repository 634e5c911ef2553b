use blobber_env::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the client-side driver.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Tick {tick} arrived before any connect message")]
    NotConnected { tick: u64 },
}
