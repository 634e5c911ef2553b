//! Scenario runner - executes deterministic simulation scenarios.
//!
//! Each scenario builds a [`Harness`]: one hub, its simulated clients, an
//! oracle and a virtual clock. The harness plays the role of the relay's
//! async driver, firing tick deadlines every interval and countdown steps
//! every virtual second, so a whole session runs in milliseconds and the
//! same seed always produces the same run.

use crate::context::SimContext;
use crate::error::SimError;
use crate::network::{InputProfile, SimNetwork, DEFAULT_SINK_CAPACITY};
use crate::oracle::{Oracle, OracleStats};
use crate::scenarios::ScenarioId;
use blobber_core::EngineConfig;
use blobber_env::{PlayerId, RelayContext};
use blobber_relay::config::DEFAULT_MAX_TICKS;
use blobber_relay::hub::{CountdownOutcome, FlushOutcome};
use blobber_relay::{ConnId, HubConfig, HubPhase};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Ticks emitted by the hub, across sessions
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Relay messages consumed by clients
    pub messages_delivered: u64,

    /// Clients the hub dropped for not keeping up
    pub clients_dropped: u64,

    pub history_syncs: u64,

    /// Sessions that went through game over and reset
    pub sessions_completed: u64,

    /// What happened in the reference world
    pub world: OracleStats,
}

const RESET_TIMEOUT_SECS: u64 = 3;
const SESSION_RESET_LENGTH: u64 = 120;
const MIN_TICKS: u64 = 20;

struct PendingCountdown {
    generation: u64,
    remaining: u64,
    due: Duration,
}

/// One simulated relay deployment.
struct Harness {
    ctx: SimContext,
    net: SimNetwork,
    oracle: Oracle,
    interval: Duration,
    countdown: Option<PendingCountdown>,
    ticks_emitted: u64,
    sessions_completed: u64,
    joined: u64,
    dropped: u64,
}

impl Harness {
    fn new(seed: u64, hub: HubConfig, engine: EngineConfig) -> Self {
        // The oracle sees the session exactly as a client's `connect` shows it
        let session = engine.for_session(&hub.connect_message(PlayerId::new("oracle")));
        Self {
            ctx: SimContext::new(seed),
            interval: hub.tick_interval,
            net: SimNetwork::new(hub, engine),
            oracle: Oracle::new(session),
            countdown: None,
            ticks_emitted: 0,
            sessions_completed: 0,
            joined: 0,
            dropped: 0,
        }
    }

    fn join(&mut self, name: &str, profile: InputProfile) -> ConnId {
        self.join_with_capacity(name, profile, DEFAULT_SINK_CAPACITY)
    }

    fn join_with_capacity(&mut self, name: &str, profile: InputProfile, capacity: usize) -> ConnId {
        self.joined += 1;
        let rng = self.ctx.derive_rng(self.joined);
        self.net.connect(name, rng, profile, capacity)
    }

    /// One tick interval of virtual time: due countdown steps, client
    /// inputs, the tick deadline, then delivery.
    fn step(&mut self) -> Result<FlushOutcome, SimError> {
        self.ctx.advance_time(self.interval);
        self.run_countdown();
        self.net.play_round();

        let outcome = self.net.flush_tick();
        if outcome != FlushOutcome::Skipped {
            let record = self
                .net
                .hub()
                .history()
                .latest()
                .cloned()
                .ok_or_else(|| SimError::invariant("emitted tick missing from history"))?;
            self.oracle.observe(&record)?;
            self.oracle.check_conservation()?;
            self.ticks_emitted += 1;
        }
        if let FlushOutcome::SessionEnded { tick, generation } = outcome {
            debug!("Session ended at tick {} (generation {})", tick, generation);
            self.oracle.check_winner()?;
            self.countdown = Some(PendingCountdown {
                generation,
                remaining: self.net.hub().config().reset_timeout_secs,
                due: self.ctx.now(),
            });
            self.run_countdown();
        }

        self.net.deliver_all()?;
        Ok(outcome)
    }

    fn run_countdown(&mut self) {
        while let Some(pending) = self.countdown.take() {
            if self.ctx.now() < pending.due {
                self.countdown = Some(pending);
                return;
            }
            match self.net.countdown(pending.generation, pending.remaining) {
                CountdownOutcome::Announced { remaining } => {
                    self.countdown = Some(PendingCountdown {
                        generation: pending.generation,
                        remaining: remaining - 1,
                        due: pending.due + Duration::from_secs(1),
                    });
                }
                CountdownOutcome::SessionReset => {
                    self.oracle.reset();
                    self.sessions_completed += 1;
                }
                CountdownOutcome::Ignored => {
                    warn!("Countdown generation {} is stale", pending.generation);
                }
            }
        }
    }

    /// Forgets clients the hub has dropped. Returns them.
    fn reap(&mut self) -> Vec<ConnId> {
        let gone: Vec<ConnId> = self
            .net
            .clients()
            .filter(|c| self.net.hub().player_id(c.conn).is_none())
            .map(|c| c.conn)
            .collect();
        for conn in &gone {
            self.net.disconnect(*conn);
        }
        self.dropped += gone.len() as u64;
        gone
    }

    fn check_converged(&self) -> Result<(), SimError> {
        self.oracle
            .check_converged(self.net.live_clients().filter(|c| !c.is_stalled()))
    }

    /// No client saw a gap, a duplicate or a replay out of place.
    fn check_streams(&self) -> Result<(), SimError> {
        for client in self.net.clients() {
            if let Some(problem) = client.stats().sequence_errors.first() {
                return Err(SimError::invariant(format!(
                    "{}: {}",
                    client.persistent_id(),
                    problem
                )));
            }
        }
        Ok(())
    }

    fn metrics(&self) -> ScenarioMetrics {
        let still_attached = self
            .net
            .clients()
            .filter(|c| self.net.hub().player_id(c.conn).is_none())
            .count() as u64;
        ScenarioMetrics {
            messages_delivered: self.net.delivered(),
            clients_dropped: self.dropped + still_attached,
            history_syncs: self.net.clients().map(|c| c.stats().history_syncs).sum(),
            sessions_completed: self.sessions_completed,
            world: self.oracle.stats(),
        }
    }
}

/// Runs simulation scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Ticks played per scenario
    ticks: u64,

    tick_interval: Duration,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ticks: 600,
            tick_interval: Duration::from_millis(50),
        }
    }

    /// Sets the number of ticks each scenario plays.
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.ticks = ticks.max(MIN_TICKS);
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("  {}", scenario.description());

        let mut harness = self.harness(scenario);
        let outcome = match scenario {
            ScenarioId::Determinism => self.run_determinism(&mut harness),
            ScenarioId::LateJoin => self.run_late_join(&mut harness),
            ScenarioId::SessionReset => self.run_session_reset(&mut harness),
            ScenarioId::PaintWar => self.run_paint_war(&mut harness),
            ScenarioId::SlowReader => self.run_slow_reader(&mut harness),
        };

        let (passed, failure_reason) = match outcome {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            total_ticks: harness.ticks_emitted,
            final_time_secs: harness.ctx.now().as_secs_f64(),
            failure_reason,
            metrics: harness.metrics(),
        }
    }

    fn harness(&self, scenario: ScenarioId) -> Harness {
        let max_ticks = match scenario {
            ScenarioId::SessionReset => SESSION_RESET_LENGTH.min(self.ticks),
            _ => DEFAULT_MAX_TICKS,
        };
        let hub = HubConfig::new(self.tick_interval, max_ticks, RESET_TIMEOUT_SECS);
        let (width, height) = match scenario {
            ScenarioId::PaintWar => (21, 21),
            _ => (25, 25),
        };
        let engine = EngineConfig::default()
            .with_seed(self.seed)
            .with_size(width, height);
        Harness::new(self.seed, hub, engine)
    }

    /// Four players; every client matches the oracle, and a second run
    /// from the same seed ends in the same world.
    fn run_determinism(&self, harness: &mut Harness) -> Result<(), SimError> {
        let first = self.play_four(harness)?;
        let mut replay = self.harness(ScenarioId::Determinism);
        let second = self.play_four(&mut replay)?;
        if first != second {
            return Err(SimError::invariant(
                "a second run with the same seed produced a different world",
            ));
        }
        Ok(())
    }

    fn play_four(&self, harness: &mut Harness) -> Result<String, SimError> {
        for (i, name) in ["red", "blue", "green", "gold"].into_iter().enumerate() {
            let profile = if i % 2 == 0 {
                InputProfile::AGGRESSIVE
            } else {
                InputProfile::CASUAL
            };
            harness.join(name, profile);
        }
        for tick in 0..self.ticks {
            harness.step()?;
            if tick % 50 == 0 {
                harness.check_converged()?;
            }
        }
        harness.check_converged()?;
        harness.check_streams()?;
        Ok(harness.oracle.world().snapshot_json()?)
    }

    /// A third player joins halfway and must replay exactly ticks 0..N-1.
    fn run_late_join(&self, harness: &mut Harness) -> Result<(), SimError> {
        harness.join("early-1", InputProfile::AGGRESSIVE);
        harness.join("early-2", InputProfile::CASUAL);

        let half = self.ticks / 2;
        for _ in 0..half {
            harness.step()?;
        }
        let join_tick = harness.net.hub().current_tick();
        let late = harness.join("late", InputProfile::CASUAL);
        info!("Late joiner arrives at tick {}", join_tick);

        for _ in half..self.ticks {
            harness.step()?;
        }

        let replays = harness
            .net
            .client(late)
            .map(|c| c.stats().replays.clone())
            .ok_or_else(|| SimError::invariant("late joiner was dropped"))?;
        if replays != vec![(0, join_tick - 1)] {
            return Err(SimError::invariant(format!(
                "late joiner replayed {:?}, expected ticks 0..={}",
                replays,
                join_tick - 1
            )));
        }
        harness.check_streams()?;
        harness.check_converged()
    }

    /// A short session runs out, counts down and starts over at tick 0.
    fn run_session_reset(&self, harness: &mut Harness) -> Result<(), SimError> {
        let names = [("p1", "Ada"), ("p2", "Brick"), ("p3", "Cleo")];
        for (id, name) in names {
            let conn = harness.join(id, InputProfile::AGGRESSIVE);
            harness.net.set_display_name(conn, name);
        }

        let max_ticks = harness.net.hub().config().max_ticks;
        let steps_per_sec = (1000 / self.tick_interval.as_millis().max(1)) as u64;
        let limit = max_ticks + 1 + (RESET_TIMEOUT_SECS + 2) * steps_per_sec + MIN_TICKS;
        let mut ended_at = None;
        let mut steps = 0;
        while harness.sessions_completed == 0 || harness.net.hub().current_tick() < MIN_TICKS {
            if steps > limit {
                return Err(SimError::invariant("second session never started"));
            }
            if let FlushOutcome::SessionEnded { tick, .. } = harness.step()? {
                ended_at = Some(tick);
            }
            steps += 1;
        }

        if ended_at != Some(max_ticks) {
            return Err(SimError::invariant(format!(
                "session ended at {:?}, expected tick {}",
                ended_at, max_ticks
            )));
        }
        let expected: Vec<u64> = (0..=RESET_TIMEOUT_SECS).rev().collect();
        for client in harness.net.live_clients() {
            if client.stats().countdowns != expected {
                return Err(SimError::invariant(format!(
                    "{} saw countdown {:?}",
                    client.persistent_id(),
                    client.stats().countdowns
                )));
            }
            if client.lockstep().display_names().len() != names.len() {
                return Err(SimError::invariant(format!(
                    "{} lost display names across the reset",
                    client.persistent_id()
                )));
            }
        }
        if harness.net.hub().phase() != HubPhase::Running {
            return Err(SimError::invariant("hub is not running after the reset"));
        }
        let world = harness.oracle.world();
        if world.game_over || world.current_tick != Some(harness.net.hub().current_tick() - 1) {
            return Err(SimError::invariant("oracle did not start a fresh session"));
        }
        harness.check_streams()?;
        harness.check_converged()
    }

    /// Eight bombers on a small map; conservation is checked every tick
    /// by the harness itself.
    fn run_paint_war(&self, harness: &mut Harness) -> Result<(), SimError> {
        for i in 0..8 {
            harness.join(&format!("bomber-{}", i), InputProfile::AGGRESSIVE);
        }
        for _ in 0..self.ticks {
            harness.step()?;
        }
        let stats = harness.oracle.stats();
        debug!("Paint war stats: {:?}", stats);
        if self.ticks >= 200 && stats.bombs_detonated == 0 {
            return Err(SimError::invariant("no bomb went off"));
        }
        harness.check_streams()?;
        harness.check_converged()
    }

    /// A client stops reading, overflows its queue, is dropped by the hub
    /// and comes back on a new connection.
    fn run_slow_reader(&self, harness: &mut Harness) -> Result<(), SimError> {
        harness.join("steady-1", InputProfile::AGGRESSIVE);
        harness.join("steady-2", InputProfile::CASUAL);
        let sleepy = harness.join_with_capacity("sleepy", InputProfile::CASUAL, 8);
        harness.net.stall(sleepy, true);

        let mut rejoined = None;
        for _ in 0..self.ticks {
            harness.step()?;
            if rejoined.is_none() && harness.net.hub().player_id(sleepy).is_none() {
                let gone = harness.reap();
                info!("Hub dropped {:?}, reconnecting", gone);
                rejoined = Some(harness.join("sleepy", InputProfile::CASUAL));
            }
        }

        let Some(conn) = rejoined else {
            return Err(SimError::invariant("stalled client was never dropped"));
        };
        if harness.net.hub().player_id(conn) != Some(&PlayerId::new("sleepy")) {
            return Err(SimError::invariant("reconnected client lost its identity"));
        }
        if harness.net.live_clients().count() != 3 {
            return Err(SimError::invariant("a healthy client was dropped"));
        }
        harness.check_streams()?;
        harness.check_converged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass() {
        for seed in [1, 42] {
            let runner = ScenarioRunner::new(seed).with_ticks(240);
            for scenario in ScenarioId::all() {
                let result = runner.run(scenario);
                assert!(
                    result.passed,
                    "{} (seed={}) failed: {:?}",
                    scenario,
                    seed,
                    result.failure_reason
                );
                if scenario != ScenarioId::SessionReset {
                    assert!(result.total_ticks >= 240);
                }
            }
        }
    }

    #[test]
    fn test_session_reset_metrics() {
        let result = ScenarioRunner::new(7)
            .with_ticks(60)
            .run(ScenarioId::SessionReset);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.sessions_completed, 1);
        // 61 ticks, then 20 more in the new session
        assert_eq!(result.total_ticks, 61 + MIN_TICKS);
        assert!(result.final_time_secs >= RESET_TIMEOUT_SECS as f64);
    }

    #[test]
    fn test_slow_reader_is_counted() {
        let result = ScenarioRunner::new(3)
            .with_ticks(100)
            .run(ScenarioId::SlowReader);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.clients_dropped, 1);
        assert!(result.metrics.history_syncs >= 1);
    }

    #[test]
    fn test_result_serializes_for_summary() {
        let result = ScenarioRunner::new(5)
            .with_ticks(40)
            .run(ScenarioId::Determinism);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["scenario"], "determinism");
        assert_eq!(json["seed"], 5);
        assert_eq!(json["passed"], true);
        assert!(json["failure_reason"].is_null());
        assert!(json["metrics"]["world"]["bombs_detonated"].is_u64());
    }

    #[test]
    fn test_minimum_ticks() {
        let runner = ScenarioRunner::new(1).with_ticks(3);
        assert_eq!(runner.ticks, MIN_TICKS);
    }
}
