//! Ground truth oracle for simulation.
//!
//! The Oracle keeps the reference world: every record the hub emits is
//! applied straight from the hub's history, never through a client queue.
//! Clients are then judged against it.

use crate::error::SimError;
use crate::network::SimClient;
use blobber_core::{EngineConfig, PlayerIndex, TickOutcome, WorldEvent, WorldState};
use blobber_env::TickRecord;
use serde::Serialize;
use tracing::debug;

/// Counters gathered from the reference world's events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OracleStats {
    pub bombs_detonated: u64,
    pub chained_detonations: u64,
    pub walls_broken: u64,
    pub players_hit: u64,
    pub power_ups_spawned: u64,
    pub power_ups_collected: u64,
}

/// Reference engine fed directly by the hub.
pub struct Oracle {
    session: EngineConfig,
    world: WorldState,
    stats: OracleStats,
}

impl Oracle {
    /// `session` must match what clients derive from `connect`.
    pub fn new(session: EngineConfig) -> Self {
        Self {
            world: WorldState::new(session.clone()),
            session,
            stats: OracleStats::default(),
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn stats(&self) -> OracleStats {
        self.stats
    }

    /// Starts over for a new session. Stats accumulate across sessions.
    pub fn reset(&mut self) {
        debug!("Oracle reset");
        self.world = WorldState::new(self.session.clone());
    }

    /// Applies an emitted record. The hub never repeats a tick within a
    /// session, so a stale record is a relay bug.
    pub fn observe(&mut self, record: &TickRecord) -> Result<Vec<WorldEvent>, SimError> {
        match self.world.apply_tick(record) {
            TickOutcome::Applied(events) => {
                for event in &events {
                    self.count(event);
                }
                Ok(events)
            }
            TickOutcome::Stale { tick, current } => Err(SimError::invariant(format!(
                "hub emitted tick {} after {}",
                tick, current
            ))),
        }
    }

    fn count(&mut self, event: &WorldEvent) {
        match event {
            WorldEvent::BombDetonated { chained, .. } => {
                self.stats.bombs_detonated += 1;
                if *chained {
                    self.stats.chained_detonations += 1;
                }
            }
            WorldEvent::WallBroken { .. } => self.stats.walls_broken += 1,
            WorldEvent::PlayerHit { .. } => self.stats.players_hit += 1,
            WorldEvent::PowerUpSpawned { .. } => self.stats.power_ups_spawned += 1,
            WorldEvent::PowerUpCollected { .. } => self.stats.power_ups_collected += 1,
            _ => {}
        }
    }

    /// Painted totals fit in the open cells and agree with the grid.
    pub fn check_conservation(&self) -> Result<(), SimError> {
        check_conservation(&self.world)
    }

    /// A finished game names the sole leader, or nobody on a tie.
    pub fn check_winner(&self) -> Result<(), SimError> {
        let world = &self.world;
        if !world.game_over {
            return Err(SimError::invariant("session ended without game over"));
        }
        let best = world.painted_counts.values().copied().max();
        let leaders: Vec<_> = world
            .painted_counts
            .iter()
            .filter(|(_, count)| Some(**count) == best)
            .map(|(id, _)| id)
            .collect();
        let expected = match leaders.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
        if world.winner.as_ref() != expected {
            return Err(SimError::invariant(format!(
                "winner {:?} but leaders are {:?}",
                world.winner, leaders
            )));
        }
        Ok(())
    }

    /// Every given client holds exactly the reference world.
    pub fn check_converged<'a>(
        &self,
        clients: impl IntoIterator<Item = &'a SimClient>,
    ) -> Result<(), SimError> {
        for client in clients {
            if client.lockstep().world() != &self.world {
                return Err(SimError::Diverged {
                    player: client.persistent_id().clone(),
                    tick: client.lockstep().world().current_tick,
                });
            }
        }
        Ok(())
    }
}

/// Conservation check on any world.
pub fn check_conservation(world: &WorldState) -> Result<(), SimError> {
    let total: u64 = world.painted_counts.values().map(|c| u64::from(*c)).sum();
    let open = world.grid.open_cell_count() as u64;
    if total > open {
        return Err(SimError::invariant(format!(
            "{} painted tiles on {} open cells",
            total, open
        )));
    }
    for (i, id) in world.roster.iter().enumerate() {
        let counted = world.painted(id);
        let on_grid = world.grid.count_painted(PlayerIndex(i as u16));
        if counted != on_grid {
            return Err(SimError::invariant(format!(
                "{} counts {} tiles but owns {} on the grid",
                id, counted, on_grid
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobber_env::{PlayerId, PlayerInput};

    fn session() -> EngineConfig {
        EngineConfig::default().with_size(15, 15).with_max_ticks(20)
    }

    fn bomber(id: &str) -> PlayerInput {
        PlayerInput {
            place_bomb: true,
            ..PlayerInput::idle(PlayerId::new(id))
        }
    }

    #[test]
    fn test_observe_rejects_repeated_tick() {
        let mut oracle = Oracle::new(session());
        oracle.observe(&TickRecord::empty(0)).unwrap();
        assert!(matches!(
            oracle.observe(&TickRecord::empty(0)),
            Err(SimError::Invariant(_))
        ));
    }

    #[test]
    fn test_session_stats_and_winner() {
        let mut oracle = Oracle::new(session());
        oracle
            .observe(&TickRecord::new(0, vec![bomber("a")]))
            .unwrap();
        for tick in 1..=20 {
            oracle.observe(&TickRecord::empty(tick)).unwrap();
            oracle.check_conservation().unwrap();
        }
        // Fuse is longer than this session, so nobody painted anything
        assert_eq!(oracle.stats().bombs_detonated, 0);
        assert!(oracle.world().game_over);
        // A lone player with zero tiles still leads alone
        oracle.check_winner().unwrap();
        assert_eq!(oracle.world().winner, Some(PlayerId::new("a")));

        oracle.reset();
        assert_eq!(oracle.world().current_tick, None);
        assert!(oracle.check_winner().is_err());
    }
}
