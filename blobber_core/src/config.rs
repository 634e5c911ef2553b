//! Engine configuration and tuning constants.
//!
//! Every client must run with identical values here; only `max_ticks` and
//! `tick_interval_ms` are learned at runtime (from the relay's `connect`).

use blobber_env::protocol::ConnectMessage;

/// Seed shared by every client of a session.
pub const DEFAULT_WORLD_SEED: u64 = 0x0B10_BBE5_F00D_2024;

pub const DEFAULT_GRID_WIDTH: i32 = 41;
pub const DEFAULT_GRID_HEIGHT: i32 = 41;

/// Fraction of non-pillar interior cells that start as breakable walls.
pub const DEFAULT_BREAKABLE_DENSITY: f64 = 0.30;

/// Cells per tick at speed multiplier 1.0.
pub const BASE_MOVE_SPEED: f64 = 0.12;

/// Collision radius of a player, in cells.
pub const PLAYER_RADIUS: f64 = 0.35;

/// Ticks from placement to detonation at fuse multiplier 1.0.
pub const BASE_FUSE_TICKS: f64 = 60.0;

/// How long an explosion keeps painting.
pub const EXPLOSION_DURATION_TICKS: u64 = 10;

/// Power-ups younger than this survive explosions.
/// Must exceed `EXPLOSION_DURATION_TICKS`.
pub const POWERUP_IMMUNITY_TICKS: u64 = 15;

/// Percent chance that a broken wall reveals a power-up.
pub const POWERUP_SPAWN_PERCENT: u64 = 30;

pub const DEFAULT_MAX_BOMBS: u32 = 1;
pub const DEFAULT_EXPLOSION_RADIUS: u32 = 3;
pub const DEFAULT_FUSE_MULTIPLIER: f64 = 1.0;

pub const MAX_BOMBS_CAP: u32 = 5;
pub const EXPLOSION_RADIUS_CAP: u32 = 8;
pub const FUSE_MULTIPLIER_FLOOR: f64 = 0.4;

pub const SPEED_BOOST_MULTIPLIER: f64 = 1.5;
pub const SPEED_BOOST_TICKS: u64 = 200;
pub const SHIELD_TICKS: u64 = 200;

/// Random draws inside the central arena before falling back to quadrants.
pub const SPAWN_ARENA_ATTEMPTS: usize = 40;
/// Arena radius as a fraction of the smaller grid dimension.
pub const SPAWN_ARENA_FRACTION: f64 = 0.3;
pub const SPAWN_QUADRANT_ATTEMPTS: usize = 10;
/// New players keep at least this many cells from existing ones.
pub const SPAWN_MIN_DISTANCE: f64 = 3.0;

pub const DEFAULT_MAX_TICKS: u64 = 100_000;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;

/// Configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// World seed (grid layout, spawn placement, power-up table)
    pub seed: u64,

    pub width: i32,
    pub height: i32,

    pub breakable_density: f64,

    /// Session length; the game ends at this tick
    pub max_ticks: u64,

    /// Milliseconds between ticks (informational, the relay paces ticks)
    pub tick_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_WORLD_SEED,
            width: DEFAULT_GRID_WIDTH,
            height: DEFAULT_GRID_HEIGHT,
            breakable_density: DEFAULT_BREAKABLE_DENSITY,
            max_ticks: DEFAULT_MAX_TICKS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl EngineConfig {
    /// Sets the session length.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Sets the world seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the grid dimensions.
    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Adopts the session parameters announced by the relay.
    pub fn for_session(&self, connect: &ConnectMessage) -> Self {
        Self {
            max_ticks: connect.max_ticks,
            tick_interval_ms: connect.tick_interval,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immunity_outlasts_explosion() {
        assert!(POWERUP_IMMUNITY_TICKS > EXPLOSION_DURATION_TICKS);
    }

    #[test]
    fn test_for_session_keeps_world_parameters() {
        let base = EngineConfig::default().with_seed(7).with_size(15, 11);
        let connect = ConnectMessage {
            player_id: "p".into(),
            max_ticks: 600,
            tick_interval: 33,
        };
        let session = base.for_session(&connect);
        assert_eq!(session.seed, 7);
        assert_eq!((session.width, session.height), (15, 11));
        assert_eq!(session.max_ticks, 600);
        assert_eq!(session.tick_interval_ms, 33);
    }
}
