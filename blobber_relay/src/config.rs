//! Relay configuration.

use blobber_env::protocol::ConnectMessage;
use blobber_env::PlayerId;
use std::time::Duration;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;
pub const DEFAULT_MAX_TICKS: u64 = 100_000;
pub const DEFAULT_RESET_TIMEOUT_SECS: u64 = 30;

/// Longest display name kept, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 24;

/// Session parameters of the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub tick_interval: Duration,
    /// Last tick of a session; reaching it starts the reset countdown
    pub max_ticks: u64,
    /// Records kept for late joiners
    pub history_cap: usize,
    pub reset_timeout_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            DEFAULT_MAX_TICKS,
            DEFAULT_RESET_TIMEOUT_SECS,
        )
    }
}

impl HubConfig {
    /// Creates a config whose history holds a whole session.
    pub fn new(tick_interval: Duration, max_ticks: u64, reset_timeout_secs: u64) -> Self {
        Self {
            tick_interval,
            max_ticks,
            history_cap: session_len(max_ticks),
            reset_timeout_secs,
        }
    }

    /// Overrides the history capacity.
    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap.max(1);
        self
    }

    /// The `connect` message announcing this session to `player_id`.
    pub fn connect_message(&self, player_id: PlayerId) -> ConnectMessage {
        ConnectMessage {
            player_id,
            max_ticks: self.max_ticks,
            tick_interval: self.tick_interval.as_millis() as u64,
        }
    }
}

/// Ticks 0..=max_ticks, the last one being the game-over tick.
fn session_len(max_ticks: u64) -> usize {
    usize::try_from(max_ticks.saturating_add(1)).unwrap_or(usize::MAX)
}

/// Per-connection socket parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Outbound messages buffered before the client counts as too slow
    pub outbound_capacity: usize,
    /// Deadline for a single write
    pub write_wait: Duration,
    /// Silence tolerated before the connection is considered dead
    pub pong_wait: Duration,
    /// Must be shorter than `pong_wait`
    pub ping_period: Duration,
    /// Largest inbound message, in bytes
    pub max_message_size: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            outbound_capacity: 256,
            write_wait: Duration::from_secs(10),
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            max_message_size: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_history_holds_whole_session() {
        let config = HubConfig::default();
        assert_eq!(config.history_cap as u64, DEFAULT_MAX_TICKS + 1);
        assert_eq!(config.with_history_cap(0).history_cap, 1);
    }

    #[test]
    fn test_connect_message_carries_session() {
        let config = HubConfig::new(Duration::from_millis(40), 900, 5);
        let msg = config.connect_message(PlayerId::new("p"));
        assert_eq!(msg.max_ticks, 900);
        assert_eq!(msg.tick_interval, 40);
    }

    #[test]
    fn test_ping_inside_read_deadline() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.ping_period, Duration::from_secs(54));
        assert!(settings.ping_period < settings.pong_wait);
    }
}
