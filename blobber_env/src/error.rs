//! Error types for the Blobberman environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Outbound queue is full; the connection is too slow to keep up
    #[error("Outbound queue full")]
    SinkFull,

    /// Outbound queue receiver is gone (connection already closed)
    #[error("Outbound queue closed")]
    SinkClosed,

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_reports_millis() {
        assert_eq!(EnvError::Timeout(10_000).to_string(), "Timeout after 10000ms");
        assert_eq!(EnvError::SinkFull.to_string(), "Outbound queue full");
    }
}
