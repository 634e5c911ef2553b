//! The lockstep hub.
//!
//! ```text
//!            first connect              tick >= max_ticks
//!   Idle ------------------> Running ---------------------> ResetCountdown
//!    ^                          ^                                 |
//!    |    countdown hits 0,     |      countdown hits 0,          |
//!    +--- nobody connected -----+----- someone connected ---------+
//! ```
//!
//! [`HubCore`] is the whole state machine, synchronous and clock-free.
//! [`Hub`] drives it from an event channel and a tick deadline, and owns
//! the countdown task.

use crate::config::{HubConfig, MAX_DISPLAY_NAME_CHARS};
use crate::error::RelayError;
use crate::history::TickHistory;
use blobber_env::protocol::{
    DisplayNamesMessage, HistorySyncMessage, ResetMessage, TickMessage,
};
use blobber_env::{
    ClientSink, Outbound, PlayerId, PlayerInput, RelayContext, ServerMessage, TickRecord,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Identity of one socket, stable across `clientId` changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubPhase {
    /// No session in progress
    Idle,
    Running,
    /// Session over; `generation` identifies the live countdown
    ResetCountdown { generation: u64 },
}

/// Result of one tick deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Not running; pending inputs were discarded
    Skipped,
    Emitted { tick: u64, recipients: usize },
    /// The game-over tick went out and the countdown must start
    SessionEnded { tick: u64, generation: u64 },
}

/// Result of one countdown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    /// Stale generation, or no countdown in progress
    Ignored,
    Announced { remaining: u64 },
    SessionReset,
}

struct ClientEntry<S> {
    player_id: PlayerId,
    sink: S,
}

/// Relay state: clients, the tick counter, buffered inputs, history and
/// display names.
pub struct HubCore<S: ClientSink> {
    config: HubConfig,
    phase: HubPhase,
    clients: BTreeMap<ConnId, ClientEntry<S>>,
    current_tick: u64,
    inputs: Vec<PlayerInput>,
    history: TickHistory,
    display_names: BTreeMap<PlayerId, String>,
    generation: u64,
}

impl<S: ClientSink> HubCore<S> {
    pub fn new(config: HubConfig) -> Self {
        Self {
            history: TickHistory::new(config.history_cap),
            config,
            phase: HubPhase::Idle,
            clients: BTreeMap::new(),
            current_tick: 0,
            inputs: Vec::new(),
            display_names: BTreeMap::new(),
            generation: 0,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn phase(&self) -> HubPhase {
        self.phase
    }

    /// Number of the next tick to be emitted.
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn history(&self) -> &TickHistory {
        &self.history
    }

    pub fn display_names(&self) -> &BTreeMap<PlayerId, String> {
        &self.display_names
    }

    /// The id a connection is currently known by.
    pub fn player_id(&self, conn: ConnId) -> Option<&PlayerId> {
        self.clients.get(&conn).map(|c| &c.player_id)
    }

    /// Adds a connection and sends it the session parameters.
    ///
    /// History is held back until the client announces its persistent id.
    pub fn register(&mut self, conn: ConnId, player_id: PlayerId, sink: S) {
        if self.phase == HubPhase::Idle {
            info!("First client connected, starting session");
            self.phase = HubPhase::Running;
        }
        let connect = self.config.connect_message(player_id.clone());
        self.clients.insert(conn, ClientEntry { player_id, sink });
        info!("Client {} connected (total: {})", conn, self.clients.len());
        self.send(conn, ServerMessage::Connect(connect));
    }

    /// Removes a connection. Returns false if it was already gone.
    pub fn unregister(&mut self, conn: ConnId) -> bool {
        match self.clients.remove(&conn) {
            Some(entry) => {
                info!(
                    "Client {} ({}) disconnected (total: {})",
                    conn,
                    entry.player_id,
                    self.clients.len()
                );
                true
            }
            None => false,
        }
    }

    /// Buffers an input for the next tick.
    pub fn add_input(&mut self, conn: ConnId, input: PlayerInput) -> bool {
        if self.phase != HubPhase::Running {
            debug!("Discarding input from {} outside a running session", conn);
            return false;
        }
        if !self.clients.contains_key(&conn) {
            return false;
        }
        self.inputs.push(input);
        true
    }

    /// Sets (or with an empty name, clears) a connection's display name and
    /// broadcasts the full map.
    pub fn set_display_name(&mut self, conn: ConnId, name: &str) {
        let Some(player_id) = self.player_id(conn).cloned() else {
            return;
        };
        let name: String = name.trim().chars().take(MAX_DISPLAY_NAME_CHARS).collect();
        let changed = if name.is_empty() {
            self.display_names.remove(&player_id).is_some()
        } else {
            self.display_names.insert(player_id.clone(), name.clone()).as_ref() != Some(&name)
        };
        debug!("Display name for {}: {:?}", player_id, name);
        if changed {
            self.broadcast(self.display_names_message());
        }
    }

    /// Switches a connection to its persistent id, then replays the session
    /// to it: `connect`, `historySync` and the display names.
    pub fn update_client_id(&mut self, conn: ConnId, new_id: PlayerId) {
        if new_id.as_str().is_empty() {
            warn!("Ignoring empty client id from {}", conn);
            return;
        }
        let Some(entry) = self.clients.get_mut(&conn) else {
            return;
        };
        let old_id = std::mem::replace(&mut entry.player_id, new_id.clone());
        if let Some(name) = self.display_names.remove(&old_id) {
            self.display_names.insert(new_id.clone(), name);
        }
        info!("Client id updated: {} -> {}", old_id, new_id);

        let connect = self.config.connect_message(new_id);
        if !self.send(conn, ServerMessage::Connect(connect)) {
            return;
        }
        if let Some(sync) = HistorySyncMessage::from_records(self.history.snapshot()) {
            debug!(
                "Sending history to {} (ticks {} to {})",
                conn, sync.from_tick, sync.to_tick
            );
            if !self.send(conn, ServerMessage::HistorySync(sync)) {
                return;
            }
        }
        if !self.display_names.is_empty() {
            self.send(conn, self.display_names_message());
        }
    }

    /// Turns the buffered inputs into the next tick and broadcasts it.
    pub fn flush_tick(&mut self) -> FlushOutcome {
        if self.phase != HubPhase::Running {
            self.inputs.clear();
            return FlushOutcome::Skipped;
        }

        let tick = self.current_tick;
        let record = TickRecord::new(tick, std::mem::take(&mut self.inputs));
        if !record.inputs.is_empty() {
            debug!("Tick {}: {} inputs", tick, record.inputs.len());
        }
        self.history.push(record.clone());
        self.current_tick += 1;
        let recipients = self.broadcast(ServerMessage::Tick(TickMessage { tick: record }));

        if tick >= self.config.max_ticks {
            self.generation += 1;
            self.phase = HubPhase::ResetCountdown {
                generation: self.generation,
            };
            info!(
                "Session ended at tick {}, resetting in {}s",
                tick, self.config.reset_timeout_secs
            );
            return FlushOutcome::SessionEnded {
                tick,
                generation: self.generation,
            };
        }
        FlushOutcome::Emitted { tick, recipients }
    }

    /// One countdown step. At zero the session is reset.
    pub fn countdown(&mut self, generation: u64, remaining: u64) -> CountdownOutcome {
        if self.phase != (HubPhase::ResetCountdown { generation }) {
            debug!("Ignoring countdown step of generation {}", generation);
            return CountdownOutcome::Ignored;
        }
        self.broadcast(ServerMessage::Reset(ResetMessage {
            reset_time_sec: self.config.reset_timeout_secs,
            countdown_sec: remaining,
        }));
        if remaining > 0 {
            return CountdownOutcome::Announced { remaining };
        }
        self.reset_session();
        CountdownOutcome::SessionReset
    }

    fn reset_session(&mut self) {
        self.current_tick = 0;
        self.inputs.clear();
        self.history.clear();
        self.phase = if self.clients.is_empty() {
            HubPhase::Idle
        } else {
            HubPhase::Running
        };
        info!("New session ({} clients, {:?})", self.clients.len(), self.phase);

        let conns: Vec<ConnId> = self.clients.keys().copied().collect();
        for conn in conns {
            if let Some(player_id) = self.player_id(conn).cloned() {
                let connect = self.config.connect_message(player_id);
                self.send(conn, ServerMessage::Connect(connect));
            }
        }
    }

    fn display_names_message(&self) -> ServerMessage {
        ServerMessage::DisplayName(DisplayNamesMessage {
            display_names: self.display_names.clone(),
        })
    }

    /// Delivers to one client, dropping it on failure.
    fn send(&mut self, conn: ConnId, message: ServerMessage) -> bool {
        let Some(entry) = self.clients.get(&conn) else {
            return false;
        };
        match entry.sink.deliver(Arc::new(message)) {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping client {}: {}", conn, e);
                self.clients.remove(&conn);
                false
            }
        }
    }

    /// Delivers to every client, dropping those that cannot keep up.
    /// Returns the number of successful deliveries.
    fn broadcast(&mut self, message: ServerMessage) -> usize {
        let message: Outbound = Arc::new(message);
        let mut failed = Vec::new();
        for (conn, entry) in &self.clients {
            if let Err(e) = entry.sink.deliver(Arc::clone(&message)) {
                warn!("Dropping client {}: {}", conn, e);
                failed.push(*conn);
            }
        }
        for conn in &failed {
            self.clients.remove(conn);
        }
        self.clients.len()
    }
}

/// Inputs to the hub's event loop.
#[derive(Debug)]
pub enum HubEvent {
    Register {
        conn: ConnId,
        player_id: PlayerId,
        sink: mpsc::Sender<Outbound>,
    },
    Unregister {
        conn: ConnId,
    },
    Input {
        conn: ConnId,
        input: PlayerInput,
    },
    DisplayName {
        conn: ConnId,
        name: String,
    },
    ClientId {
        conn: ConnId,
        player_id: PlayerId,
    },
    Countdown {
        generation: u64,
        remaining: u64,
    },
}

impl HubCore<mpsc::Sender<Outbound>> {
    /// Applies one event from the connection layer or the countdown.
    ///
    /// Returns the countdown outcome for `Countdown` events.
    pub fn handle_event(&mut self, event: HubEvent) -> Option<CountdownOutcome> {
        match event {
            HubEvent::Register {
                conn,
                player_id,
                sink,
            } => self.register(conn, player_id, sink),
            HubEvent::Unregister { conn } => {
                self.unregister(conn);
            }
            HubEvent::Input { conn, input } => {
                self.add_input(conn, input);
            }
            HubEvent::DisplayName { conn, name } => self.set_display_name(conn, &name),
            HubEvent::ClientId { conn, player_id } => self.update_client_id(conn, player_id),
            HubEvent::Countdown {
                generation,
                remaining,
            } => return Some(self.countdown(generation, remaining)),
        }
        None
    }
}

const EVENT_QUEUE: usize = 1024;

/// Cloneable entry point for connections.
#[derive(Clone)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
    next_conn: Arc<AtomicU64>,
}

impl HubHandle {
    pub fn next_conn_id(&self) -> ConnId {
        ConnId(self.next_conn.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn send(&self, event: HubEvent) -> Result<(), RelayError> {
        self.events
            .send(event)
            .await
            .map_err(|_| RelayError::HubClosed)
    }
}

enum Wake {
    Event(Option<HubEvent>),
    Tick,
}

/// Async driver around [`HubCore`].
///
/// Runs until every [`HubHandle`] is dropped.
pub struct Hub<Ctx: RelayContext> {
    core: HubCore<mpsc::Sender<Outbound>>,
    ctx: Arc<Ctx>,
    events: mpsc::Receiver<HubEvent>,
    /// Weak so that the hub alone does not keep its channel open
    loopback: mpsc::WeakSender<HubEvent>,
    countdown: Option<JoinHandle<()>>,
}

impl<Ctx: RelayContext> Hub<Ctx> {
    pub fn new(config: HubConfig, ctx: Arc<Ctx>) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        let hub = Self {
            core: HubCore::new(config),
            ctx,
            events: rx,
            loopback: tx.downgrade(),
            countdown: None,
        };
        let handle = HubHandle {
            events: tx,
            next_conn: Arc::new(AtomicU64::new(1)),
        };
        (hub, handle)
    }

    pub async fn run(mut self) {
        let ctx = Arc::clone(&self.ctx);
        let interval = self.core.config().tick_interval;
        info!("Hub started, running at {}ms per tick", interval.as_millis());

        let mut next_tick = ctx.now() + interval;
        loop {
            let wait = next_tick.saturating_sub(ctx.now());
            let wake = tokio::select! {
                event = self.events.recv() => Wake::Event(event),
                _ = ctx.sleep(wait) => Wake::Tick,
            };
            match wake {
                Wake::Event(Some(event)) => self.handle_event(event),
                Wake::Event(None) => break,
                Wake::Tick => {
                    self.on_tick();
                    // Missed deadlines are skipped, not replayed in a burst
                    next_tick += interval;
                    let now = ctx.now();
                    if next_tick <= now {
                        next_tick = now + interval;
                    }
                }
            }
        }

        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
        info!("Hub stopped");
    }

    fn handle_event(&mut self, event: HubEvent) {
        if self.core.handle_event(event) == Some(CountdownOutcome::SessionReset) {
            self.countdown = None;
        }
    }

    fn on_tick(&mut self) {
        if let FlushOutcome::SessionEnded { generation, .. } = self.core.flush_tick() {
            self.start_countdown(generation);
        }
    }

    fn start_countdown(&mut self, generation: u64) {
        if let Some(previous) = self.countdown.take() {
            previous.abort();
        }
        let Some(tx) = self.loopback.upgrade() else {
            return;
        };
        let ctx = Arc::clone(&self.ctx);
        let total = self.core.config().reset_timeout_secs;
        self.countdown = Some(self.ctx.spawn("reset-countdown", async move {
            for remaining in (0..=total).rev() {
                let step = HubEvent::Countdown {
                    generation,
                    remaining,
                };
                if tx.send(step).await.is_err() {
                    return;
                }
                if remaining > 0 {
                    ctx.sleep(Duration::from_secs(1)).await;
                }
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobber_env::{outbound_channel, EnvError, TokioContext};

    type Rx = mpsc::Receiver<Outbound>;

    fn config(max_ticks: u64) -> HubConfig {
        HubConfig::new(Duration::from_millis(50), max_ticks, 3)
    }

    fn join(hub: &mut HubCore<mpsc::Sender<Outbound>>, n: u64, id: &str) -> Rx {
        let (tx, rx) = outbound_channel(256);
        hub.register(ConnId(n), PlayerId::new(id), tx);
        rx
    }

    fn drain(rx: &mut Rx) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push((*msg).clone());
        }
        out
    }

    async fn next(rx: &mut Rx) -> ServerMessage {
        (*rx.recv().await.unwrap()).clone()
    }

    fn ticks(messages: &[ServerMessage]) -> Vec<u64> {
        messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::Tick(t) => Some(t.tick.tick),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_connect_starts_session() {
        let mut hub = HubCore::new(config(100));
        assert_eq!(hub.phase(), HubPhase::Idle);
        assert_eq!(hub.flush_tick(), FlushOutcome::Skipped);

        let mut rx = join(&mut hub, 1, "temp-a");
        assert_eq!(hub.phase(), HubPhase::Running);
        let messages = drain(&mut rx);
        match &messages[..] {
            [ServerMessage::Connect(c)] => {
                assert_eq!(c.player_id, PlayerId::new("temp-a"));
                assert_eq!(c.max_ticks, 100);
                assert_eq!(c.tick_interval, 50);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_inputs_land_in_next_tick_in_order() {
        let mut hub = HubCore::new(config(100));
        let mut rx = join(&mut hub, 1, "a");
        let _rx_b = join(&mut hub, 2, "b");
        drain(&mut rx);

        assert!(hub.add_input(ConnId(2), PlayerInput::idle(PlayerId::new("b"))));
        assert!(hub.add_input(ConnId(1), PlayerInput::idle(PlayerId::new("a"))));
        assert!(!hub.add_input(ConnId(9), PlayerInput::idle(PlayerId::new("ghost"))));
        assert_eq!(hub.flush_tick(), FlushOutcome::Emitted { tick: 0, recipients: 2 });
        assert_eq!(hub.flush_tick(), FlushOutcome::Emitted { tick: 1, recipients: 2 });

        let messages = drain(&mut rx);
        match &messages[0] {
            ServerMessage::Tick(t) => {
                let order: Vec<&str> = t.tick.inputs.iter().map(|i| i.player_id.as_str()).collect();
                assert_eq!(order, vec!["b", "a"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(&messages[1], ServerMessage::Tick(t) if t.tick.inputs.is_empty()));
        assert_eq!(hub.history().len(), 2);
    }

    #[test]
    fn test_late_joiner_gets_history_then_live_ticks() {
        let mut hub = HubCore::new(config(100));
        let _a = join(&mut hub, 1, "a");
        for _ in 0..5 {
            let _ = hub.flush_tick();
        }

        let mut rx = join(&mut hub, 2, "temp-b");
        hub.update_client_id(ConnId(2), PlayerId::new("bob"));
        for _ in 0..3 {
            let _ = hub.flush_tick();
        }

        let messages = drain(&mut rx);
        assert!(matches!(&messages[0], ServerMessage::Connect(c) if c.player_id.as_str() == "temp-b"));
        assert!(matches!(&messages[1], ServerMessage::Connect(c) if c.player_id.as_str() == "bob"));
        let replayed = match &messages[2] {
            ServerMessage::HistorySync(sync) => {
                assert_eq!((sync.from_tick, sync.to_tick), (0, 4));
                sync.history.iter().map(|r| r.tick).collect::<Vec<_>>()
            }
            other => panic!("unexpected {:?}", other),
        };
        let mut all = replayed;
        all.extend(ticks(&messages[3..]));
        assert_eq!(all, (0..8).collect::<Vec<u64>>());
    }

    #[test]
    fn test_no_history_on_fresh_session() {
        let mut hub = HubCore::new(config(100));
        let mut rx = join(&mut hub, 1, "temp-a");
        hub.update_client_id(ConnId(1), PlayerId::new("a"));
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| matches!(m, ServerMessage::Connect(_))));
        assert_eq!(hub.player_id(ConnId(1)), Some(&PlayerId::new("a")));
    }

    #[test]
    fn test_display_names_broadcast_and_transfer() {
        let mut hub = HubCore::new(config(100));
        let mut rx_a = join(&mut hub, 1, "temp-a");
        let mut rx_b = join(&mut hub, 2, "b");

        hub.set_display_name(ConnId(1), "  Alice  ");
        let names = |messages: &[ServerMessage]| match messages.last() {
            Some(ServerMessage::DisplayName(d)) => d.display_names.clone(),
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(names(&drain(&mut rx_b))[&PlayerId::new("temp-a")], "Alice");

        // Same name again changes nothing and is not rebroadcast
        hub.set_display_name(ConnId(1), "Alice");
        assert!(drain(&mut rx_b).is_empty());

        drain(&mut rx_a);
        hub.update_client_id(ConnId(1), PlayerId::new("alice-uuid"));
        let received = drain(&mut rx_a);
        let map = names(&received);
        assert_eq!(map.get(&PlayerId::new("alice-uuid")).map(String::as_str), Some("Alice"));
        assert!(!map.contains_key(&PlayerId::new("temp-a")));
    }

    #[test]
    fn test_display_name_is_capped_and_clearable() {
        let mut hub = HubCore::new(config(100));
        let _rx = join(&mut hub, 1, "a");
        hub.set_display_name(ConnId(1), &"x".repeat(100));
        assert_eq!(hub.display_names()[&PlayerId::new("a")].chars().count(), MAX_DISPLAY_NAME_CHARS);
        hub.set_display_name(ConnId(1), "   ");
        assert!(hub.display_names().is_empty());
    }

    #[test]
    fn test_slow_client_is_dropped() {
        let mut hub = HubCore::new(config(100));
        let (slow_tx, _slow_rx) = outbound_channel(2);
        hub.register(ConnId(1), PlayerId::new("slow"), slow_tx);
        let mut fast = join(&mut hub, 2, "fast");

        let _ = hub.flush_tick();
        assert_eq!(hub.client_count(), 2);
        assert_eq!(hub.flush_tick(), FlushOutcome::Emitted { tick: 1, recipients: 1 });
        assert_eq!(hub.client_count(), 1);
        assert_eq!(hub.player_id(ConnId(1)), None);
        assert_eq!(ticks(&drain(&mut fast)), vec![0, 1]);
    }

    #[test]
    fn test_session_end_countdown_and_reset() {
        let mut hub = HubCore::new(config(2));
        let mut rx = join(&mut hub, 1, "a");

        assert_eq!(hub.flush_tick(), FlushOutcome::Emitted { tick: 0, recipients: 1 });
        assert_eq!(hub.flush_tick(), FlushOutcome::Emitted { tick: 1, recipients: 1 });
        assert_eq!(hub.flush_tick(), FlushOutcome::SessionEnded { tick: 2, generation: 1 });
        assert_eq!(hub.phase(), HubPhase::ResetCountdown { generation: 1 });

        // No ticks and no inputs while counting down
        assert!(!hub.add_input(ConnId(1), PlayerInput::idle(PlayerId::new("a"))));
        assert_eq!(hub.flush_tick(), FlushOutcome::Skipped);

        assert_eq!(hub.countdown(7, 3), CountdownOutcome::Ignored);
        assert_eq!(hub.countdown(1, 3), CountdownOutcome::Announced { remaining: 3 });
        assert_eq!(hub.countdown(1, 0), CountdownOutcome::SessionReset);
        assert_eq!(hub.phase(), HubPhase::Running);
        assert_eq!(hub.current_tick(), 0);
        assert!(hub.history().is_empty());

        let messages = drain(&mut rx);
        assert_eq!(ticks(&messages), vec![0, 1, 2]);
        let resets: Vec<u64> = messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::Reset(r) => Some(r.countdown_sec),
                _ => None,
            })
            .collect();
        assert_eq!(resets, vec![3, 0]);
        assert!(matches!(messages.last(), Some(ServerMessage::Connect(_))));

        assert_eq!(hub.flush_tick(), FlushOutcome::Emitted { tick: 0, recipients: 1 });
    }

    #[test]
    fn test_reset_with_nobody_connected_goes_idle() {
        let mut hub = HubCore::new(config(0));
        let _rx = join(&mut hub, 1, "a");
        assert!(matches!(hub.flush_tick(), FlushOutcome::SessionEnded { .. }));
        hub.unregister(ConnId(1));
        assert_eq!(hub.countdown(1, 0), CountdownOutcome::SessionReset);
        assert_eq!(hub.phase(), HubPhase::Idle);
    }

    struct ClosedSink;

    impl ClientSink for ClosedSink {
        fn deliver(&self, _message: Outbound) -> Result<(), EnvError> {
            Err(EnvError::SinkClosed)
        }
    }

    #[test]
    fn test_closed_sink_is_dropped_on_connect() {
        let mut hub: HubCore<ClosedSink> = HubCore::new(config(10));
        hub.register(ConnId(1), PlayerId::new("gone"), ClosedSink);
        assert_eq!(hub.client_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_runs_a_whole_session() {
        let config = HubConfig::new(Duration::from_millis(50), 3, 2);
        let (hub, handle) = Hub::new(config, TokioContext::shared());
        let task = tokio::spawn(hub.run());

        let (tx, mut rx) = outbound_channel(64);
        let conn = handle.next_conn_id();
        handle
            .send(HubEvent::Register {
                conn,
                player_id: PlayerId::new("temp-a"),
                sink: tx,
            })
            .await
            .unwrap();

        assert!(matches!(next(&mut rx).await, ServerMessage::Connect(_)));
        for expected in 0..=3 {
            match next(&mut rx).await {
                ServerMessage::Tick(t) => assert_eq!(t.tick.tick, expected),
                other => panic!("unexpected {:?}", other),
            }
        }
        for expected in [2, 1, 0] {
            match next(&mut rx).await {
                ServerMessage::Reset(r) => {
                    assert_eq!(r.countdown_sec, expected);
                    assert_eq!(r.reset_time_sec, 2);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(matches!(next(&mut rx).await, ServerMessage::Connect(_)));
        assert!(matches!(next(&mut rx).await, ServerMessage::Tick(t) if t.tick.tick == 0));

        drop(handle);
        task.await.unwrap();
    }
}
