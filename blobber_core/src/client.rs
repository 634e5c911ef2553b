//! Client-side lockstep driver.
//!
//! Feeds relay messages into a local [`WorldState`]. Every `connect` starts
//! a fresh world: the relay sends one on join, after an identity change
//! (followed by a full history replay) and when a new session begins.

use crate::config::EngineConfig;
use crate::engine::{TickOutcome, WorldEvent, WorldState};
use crate::error::CoreError;
use blobber_env::protocol::{ConnectMessage, HistorySyncMessage, ResetMessage};
use blobber_env::{PlayerId, ServerMessage, TickRecord};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What a relay message changed.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientUpdate {
    /// New session parameters; the world was reset
    Connected { player_id: PlayerId },
    Ticked { tick: u64, events: Vec<WorldEvent> },
    /// A history replay finished
    CaughtUp {
        from_tick: u64,
        to_tick: u64,
        applied: usize,
        events: Vec<WorldEvent>,
    },
    /// The record was already applied
    Stale { tick: u64, current: u64 },
    Countdown { remaining: u64 },
    DisplayNames,
}

/// A lockstep client: session bookkeeping plus the local world.
pub struct LockstepClient {
    base: EngineConfig,
    world: WorldState,
    session: Option<ConnectMessage>,
    display_names: BTreeMap<PlayerId, String>,
    countdown: Option<ResetMessage>,
}

impl LockstepClient {
    /// `base` carries the world parameters shared by every client; session
    /// length and tick rate are taken from the relay.
    pub fn new(base: EngineConfig) -> Self {
        Self {
            world: WorldState::new(base.clone()),
            base,
            session: None,
            display_names: BTreeMap::new(),
            countdown: None,
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// The id the relay currently knows this client by.
    pub fn player_id(&self) -> Option<&PlayerId> {
        self.session.as_ref().map(|s| &s.player_id)
    }

    pub fn display_names(&self) -> &BTreeMap<PlayerId, String> {
        &self.display_names
    }

    /// Display name of a player, if one was announced.
    pub fn display_name(&self, player: &PlayerId) -> Option<&str> {
        self.display_names.get(player).map(String::as_str)
    }

    /// Seconds until the next session, while a countdown is running.
    pub fn countdown(&self) -> Option<u64> {
        self.countdown.map(|c| c.countdown_sec)
    }

    /// Decodes and applies one text frame.
    pub fn handle_text(&mut self, text: &str) -> Result<ClientUpdate, CoreError> {
        let message = ServerMessage::decode(text)?;
        self.handle(message)
    }

    /// Applies one relay message.
    pub fn handle(&mut self, message: ServerMessage) -> Result<ClientUpdate, CoreError> {
        match message {
            ServerMessage::Connect(connect) => Ok(self.on_connect(connect)),
            ServerMessage::Tick(tick) => self.on_tick(&tick.tick),
            ServerMessage::HistorySync(sync) => self.on_history(sync),
            ServerMessage::Reset(reset) => {
                debug!("Next session in {}s", reset.countdown_sec);
                self.countdown = Some(reset);
                Ok(ClientUpdate::Countdown {
                    remaining: reset.countdown_sec,
                })
            }
            ServerMessage::DisplayName(names) => {
                self.display_names = names.display_names;
                Ok(ClientUpdate::DisplayNames)
            }
        }
    }

    /// JSON snapshot of the local world.
    pub fn snapshot(&self) -> Result<String, CoreError> {
        Ok(self.world.snapshot_json()?)
    }

    fn on_connect(&mut self, connect: ConnectMessage) -> ClientUpdate {
        info!(
            "Session as {} (max_ticks={}, interval={}ms)",
            connect.player_id, connect.max_ticks, connect.tick_interval
        );
        self.world = WorldState::new(self.base.for_session(&connect));
        self.countdown = None;
        let player_id = connect.player_id.clone();
        self.session = Some(connect);
        ClientUpdate::Connected { player_id }
    }

    fn on_tick(&mut self, record: &TickRecord) -> Result<ClientUpdate, CoreError> {
        if self.session.is_none() {
            return Err(CoreError::NotConnected { tick: record.tick });
        }
        Ok(match self.world.apply_tick(record) {
            TickOutcome::Applied(events) => ClientUpdate::Ticked {
                tick: record.tick,
                events,
            },
            TickOutcome::Stale { tick, current } => ClientUpdate::Stale { tick, current },
        })
    }

    fn on_history(&mut self, sync: HistorySyncMessage) -> Result<ClientUpdate, CoreError> {
        if self.session.is_none() {
            return Err(CoreError::NotConnected {
                tick: sync.from_tick,
            });
        }
        let mut applied = 0;
        let mut events = Vec::new();
        for record in &sync.history {
            if let TickOutcome::Applied(tick_events) = self.world.apply_tick(record) {
                applied += 1;
                events.extend(tick_events);
            }
        }
        debug!(
            "Replayed ticks {}..={} ({} applied)",
            sync.from_tick, sync.to_tick, applied
        );
        Ok(ClientUpdate::CaughtUp {
            from_tick: sync.from_tick,
            to_tick: sync.to_tick,
            applied,
            events,
        })
    }
}
