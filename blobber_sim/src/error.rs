//! Failures a scenario can end with.

use blobber_core::CoreError;
use blobber_env::PlayerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// A client engine rejected a relay message
    #[error("Client engine error: {0}")]
    Core(#[from] CoreError),

    #[error("{player} diverged from the oracle at tick {tick:?}")]
    Diverged { player: PlayerId, tick: Option<u64> },

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Snapshot failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl SimError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}
