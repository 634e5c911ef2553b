//! In-memory relay network: the real hub state machine, simulated sockets.
//!
//! Every simulated connection goes through the same steps a socket does:
//! registration under a temporary id, identity correction in
//! [`route`], and a bounded outbound queue that the hub drops when it
//! overflows. Only the transport is replaced, by queues the harness
//! drains on its own schedule.

use blobber_core::{ClientUpdate, CoreError, EngineConfig, LockstepClient};
use blobber_env::protocol::{ClientIdMessage, InputMessage, SetDisplayNameMessage};
use blobber_env::{outbound_channel, ClientMessage, Movement, Outbound, PlayerId, PlayerInput};
use blobber_relay::connection::route;
use blobber_relay::hub::{CountdownOutcome, FlushOutcome};
use blobber_relay::{ConnId, HubConfig, HubCore, HubEvent};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Outbound queue size of a simulated connection.
pub const DEFAULT_SINK_CAPACITY: usize = 256;

/// How a simulated player picks its inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputProfile {
    /// Chance of sending an input on a given tick
    pub activity: f64,
    /// Chance that an input also places a bomb
    pub bomb_rate: f64,
}

impl InputProfile {
    pub const CASUAL: InputProfile = InputProfile {
        activity: 0.5,
        bomb_rate: 0.05,
    };

    pub const AGGRESSIVE: InputProfile = InputProfile {
        activity: 0.9,
        bomb_rate: 0.25,
    };
}

/// Per-client record of protocol anomalies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub ticks_applied: u64,
    pub history_syncs: u64,
    /// `(from_tick, to_tick)` of every replay received
    pub replays: Vec<(u64, u64)>,
    pub countdowns: Vec<u64>,
    pub connects: u64,
    /// Gaps, duplicates and stale records
    pub sequence_errors: Vec<String>,
}

/// One simulated player: its queue, its identity and its local engine.
pub struct SimClient {
    pub conn: ConnId,
    /// The id the connection layer currently stamps on inputs
    identity: PlayerId,
    persistent: PlayerId,
    inbox: mpsc::Receiver<Outbound>,
    client: LockstepClient,
    rng: ChaCha8Rng,
    profile: InputProfile,
    /// A stalled client stops reading its queue
    stalled: bool,
    expected_tick: Option<u64>,
    stats: StreamStats,
}

impl SimClient {
    pub fn persistent_id(&self) -> &PlayerId {
        &self.persistent
    }

    pub fn lockstep(&self) -> &LockstepClient {
        &self.client
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Draws this tick's input, if the player acts at all.
    fn next_input(&mut self) -> Option<ClientMessage> {
        if !self.rng.gen_bool(self.profile.activity) {
            return None;
        }
        let (dx, dy) = (self.rng.gen_range(-1..=1), self.rng.gen_range(-1..=1));
        let movement = Movement {
            up: dy < 0,
            down: dy > 0,
            left: dx < 0,
            right: dx > 0,
        };
        let input = PlayerInput {
            movement: Some(movement),
            place_bomb: self.rng.gen_bool(self.profile.bomb_rate),
            ..PlayerInput::idle(self.persistent.clone())
        };
        Some(ClientMessage::Input(InputMessage { input }))
    }

    /// Applies everything queued for this client. Returns the number of
    /// messages consumed.
    fn drain(&mut self) -> Result<usize, CoreError> {
        let mut consumed = 0;
        while let Ok(message) = self.inbox.try_recv() {
            let update = self.client.handle(message.as_ref().clone())?;
            self.track(update);
            consumed += 1;
        }
        Ok(consumed)
    }

    fn track(&mut self, update: ClientUpdate) {
        match update {
            ClientUpdate::Connected { .. } => {
                self.stats.connects += 1;
                self.expected_tick = None;
            }
            ClientUpdate::Ticked { tick, .. } => {
                if let Some(expected) = self.expected_tick {
                    if tick != expected {
                        self.stats
                            .sequence_errors
                            .push(format!("expected tick {}, got {}", expected, tick));
                    }
                }
                self.stats.ticks_applied += 1;
                self.expected_tick = Some(tick + 1);
            }
            ClientUpdate::CaughtUp {
                from_tick,
                to_tick,
                applied,
                ..
            } => {
                if self.expected_tick.is_some() {
                    self.stats
                        .sequence_errors
                        .push(format!("replay {}..={} after live ticks", from_tick, to_tick));
                }
                self.stats.history_syncs += 1;
                self.stats.replays.push((from_tick, to_tick));
                self.stats.ticks_applied += applied as u64;
                self.expected_tick = Some(to_tick + 1);
            }
            ClientUpdate::Stale { tick, current } => {
                self.stats
                    .sequence_errors
                    .push(format!("stale tick {} at {}", tick, current));
            }
            ClientUpdate::Countdown { remaining } => self.stats.countdowns.push(remaining),
            ClientUpdate::DisplayNames => {}
        }
    }
}

/// The hub plus every simulated connection, stepped by the harness.
pub struct SimNetwork {
    hub: HubCore<mpsc::Sender<Outbound>>,
    engine: EngineConfig,
    clients: BTreeMap<ConnId, SimClient>,
    next_conn: u64,
    delivered: u64,
}

impl SimNetwork {
    pub fn new(config: HubConfig, engine: EngineConfig) -> Self {
        Self {
            hub: HubCore::new(config),
            engine,
            clients: BTreeMap::new(),
            next_conn: 1,
            delivered: 0,
        }
    }

    pub fn hub(&self) -> &HubCore<mpsc::Sender<Outbound>> {
        &self.hub
    }

    pub fn client(&self, conn: ConnId) -> Option<&SimClient> {
        self.clients.get(&conn)
    }

    /// Connections the harness still drives, including ones the hub dropped.
    pub fn clients(&self) -> impl Iterator<Item = &SimClient> {
        self.clients.values()
    }

    /// Connections the hub still serves.
    pub fn live_clients(&self) -> impl Iterator<Item = &SimClient> {
        self.clients
            .values()
            .filter(|c| self.hub.player_id(c.conn).is_some())
    }

    /// Messages consumed by clients so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Opens a connection and announces `persistent` as its identity.
    pub fn connect(
        &mut self,
        persistent: &str,
        rng: ChaCha8Rng,
        profile: InputProfile,
        capacity: usize,
    ) -> ConnId {
        let conn = ConnId(self.next_conn);
        self.next_conn += 1;

        // Sockets get a random temporary id; a counter keeps runs reproducible
        let temporary = PlayerId::new(format!("temp-sim-{}", conn.0));
        let (sink, inbox) = outbound_channel(capacity);
        self.hub.handle_event(HubEvent::Register {
            conn,
            player_id: temporary.clone(),
            sink,
        });

        let persistent = PlayerId::new(persistent);
        self.clients.insert(
            conn,
            SimClient {
                conn,
                identity: temporary,
                persistent: persistent.clone(),
                inbox,
                client: LockstepClient::new(self.engine.clone()),
                rng,
                profile,
                stalled: false,
                expected_tick: None,
                stats: StreamStats::default(),
            },
        );
        self.submit(
            conn,
            ClientMessage::ClientId(ClientIdMessage {
                player_id: persistent,
            }),
        );
        debug!("Simulated {} joined", conn);
        conn
    }

    /// Closes a connection from the client side.
    pub fn disconnect(&mut self, conn: ConnId) {
        self.clients.remove(&conn);
        self.hub.handle_event(HubEvent::Unregister { conn });
    }

    /// Stops (or resumes) reading a client's queue.
    pub fn stall(&mut self, conn: ConnId, stalled: bool) {
        if let Some(client) = self.clients.get_mut(&conn) {
            client.stalled = stalled;
        }
    }

    /// Sends a client message through the connection layer's routing.
    pub fn submit(&mut self, conn: ConnId, message: ClientMessage) {
        let Some(client) = self.clients.get_mut(&conn) else {
            return;
        };
        if let Some(event) = route(conn, &mut client.identity, message) {
            self.hub.handle_event(event);
        }
    }

    pub fn set_display_name(&mut self, conn: ConnId, name: &str) {
        let Some(client) = self.clients.get(&conn) else {
            return;
        };
        let message = ClientMessage::DisplayName(SetDisplayNameMessage {
            player_id: client.persistent.clone(),
            display_name: name.to_string(),
        });
        self.submit(conn, message);
    }

    /// Lets every connected, reading client pick an input for the next tick.
    pub fn play_round(&mut self) {
        let mut messages = Vec::new();
        for client in self.clients.values_mut() {
            if client.stalled || self.hub.player_id(client.conn).is_none() {
                continue;
            }
            if let Some(message) = client.next_input() {
                messages.push((client.conn, message));
            }
        }
        for (conn, message) in messages {
            self.submit(conn, message);
        }
    }

    pub fn flush_tick(&mut self) -> FlushOutcome {
        self.hub.flush_tick()
    }

    pub fn countdown(&mut self, generation: u64, remaining: u64) -> CountdownOutcome {
        self.hub
            .handle_event(HubEvent::Countdown {
                generation,
                remaining,
            })
            .unwrap_or(CountdownOutcome::Ignored)
    }

    /// Lets every reading client consume its queue.
    pub fn deliver_all(&mut self) -> Result<usize, CoreError> {
        let mut total = 0;
        for client in self.clients.values_mut().filter(|c| !c.stalled) {
            match client.drain() {
                Ok(n) => total += n,
                Err(e) => {
                    warn!("Client {} rejected a message: {}", client.conn, e);
                    return Err(e);
                }
            }
        }
        self.delivered += total as u64;
        Ok(total)
    }
}
