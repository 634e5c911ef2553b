//! Per-player simulation state.

use crate::config::{
    BASE_MOVE_SPEED, DEFAULT_EXPLOSION_RADIUS, DEFAULT_FUSE_MULTIPLIER, DEFAULT_MAX_BOMBS,
};
use crate::grid::{CellPos, PlayerIndex};
use crate::powerup::PowerUpKind;
use blobber_env::{Direction, PlayerId};
use nalgebra::Vector2;
use serde::Serialize;

/// A player's position, stats and active buffs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Slot used for painted-cell ownership
    pub index: PlayerIndex,

    /// Center of the player's footprint, in cells
    pub position: Vector2<f64>,

    /// Hue in degrees, derived from the player id
    pub color_hue: u16,

    pub last_direction: Direction,

    pub bombs_placed: u32,
    pub max_bombs: u32,
    pub explosion_radius: u32,
    pub fuse_multiplier: f64,

    /// Power-ups collected since the last reset
    pub power_ups: Vec<PowerUpKind>,

    pub speed_multiplier: f64,
    pub speed_expires_at: Option<u64>,

    pub shielded: bool,
    pub shield_expires_at: Option<u64>,

    pub can_jump: bool,
}

impl PlayerState {
    /// Creates a player with default stats.
    pub fn new(id: &PlayerId, index: PlayerIndex, position: Vector2<f64>) -> Self {
        Self {
            index,
            position,
            color_hue: color_hue_for(id),
            last_direction: Direction::Down,
            bombs_placed: 0,
            max_bombs: DEFAULT_MAX_BOMBS,
            explosion_radius: DEFAULT_EXPLOSION_RADIUS,
            fuse_multiplier: DEFAULT_FUSE_MULTIPLIER,
            power_ups: Vec::new(),
            speed_multiplier: 1.0,
            speed_expires_at: None,
            shielded: false,
            shield_expires_at: None,
            can_jump: false,
        }
    }

    /// The cell under the player's center.
    pub fn cell(&self) -> CellPos {
        CellPos::from_point(&self.position)
    }

    /// Drops every power-up and bonus. Position and live bombs are kept.
    pub fn reset_stats(&mut self) {
        self.max_bombs = DEFAULT_MAX_BOMBS;
        self.explosion_radius = DEFAULT_EXPLOSION_RADIUS;
        self.fuse_multiplier = DEFAULT_FUSE_MULTIPLIER;
        self.power_ups.clear();
        self.speed_multiplier = 1.0;
        self.speed_expires_at = None;
        self.shielded = false;
        self.shield_expires_at = None;
        self.can_jump = false;
    }

    /// Clears timed buffs whose expiry tick has been reached.
    pub fn expire_buffs(&mut self, tick: u64) {
        if self.speed_expires_at.is_some_and(|at| tick >= at) {
            self.speed_multiplier = 1.0;
            self.speed_expires_at = None;
        }
        if self.shield_expires_at.is_some_and(|at| tick >= at) {
            self.shielded = false;
            self.shield_expires_at = None;
        }
    }

    /// Cells moved per tick.
    pub fn speed(&self) -> f64 {
        BASE_MOVE_SPEED * self.speed_multiplier
    }

    pub fn has_default_stats(&self) -> bool {
        self.max_bombs == DEFAULT_MAX_BOMBS
            && self.explosion_radius == DEFAULT_EXPLOSION_RADIUS
            && self.fuse_multiplier == DEFAULT_FUSE_MULTIPLIER
            && self.power_ups.is_empty()
            && self.speed_multiplier == 1.0
            && !self.shielded
            && !self.can_jump
    }
}

/// FNV-1a over the id bytes, folded onto the color wheel.
fn color_hue_for(id: &PlayerId) -> u16 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in id.as_str().bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    (hash % 360) as u16
}
