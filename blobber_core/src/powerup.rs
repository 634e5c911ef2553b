//! Power-ups revealed by breaking walls.

use crate::config::{
    EXPLOSION_RADIUS_CAP, FUSE_MULTIPLIER_FLOOR, MAX_BOMBS_CAP, POWERUP_SPAWN_PERCENT,
    SHIELD_TICKS, SPEED_BOOST_MULTIPLIER, SPEED_BOOST_TICKS,
};
use crate::grid::CellPos;
use crate::player::PlayerState;
use crate::rng::cell_hash;
use serde::Serialize;

/// Buff or debuff carried by a power-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerUpKind {
    /// One more simultaneous bomb
    ExtraBomb,
    /// Arms reach one cell further
    BlastRadius,
    /// Bombs go off sooner, but reach one cell less
    ShortFuse,
    /// Temporary movement speed multiplier
    SpeedBoost,
    /// Temporary immunity to being hit
    Shield,
    /// One hop over an obstacle
    Jump,
}

impl PowerUpKind {
    /// Spawn table, indexed by the high bits of the cell hash.
    pub const ALL: [PowerUpKind; 6] = [
        PowerUpKind::ExtraBomb,
        PowerUpKind::BlastRadius,
        PowerUpKind::ShortFuse,
        PowerUpKind::SpeedBoost,
        PowerUpKind::Shield,
        PowerUpKind::Jump,
    ];

    /// Applies this power-up to `player`, clamping every stat.
    pub fn apply(self, player: &mut PlayerState, tick: u64) {
        match self {
            PowerUpKind::ExtraBomb => {
                player.max_bombs = (player.max_bombs + 1).min(MAX_BOMBS_CAP);
            }
            PowerUpKind::BlastRadius => {
                player.explosion_radius = (player.explosion_radius + 1).min(EXPLOSION_RADIUS_CAP);
            }
            PowerUpKind::ShortFuse => {
                player.fuse_multiplier = (player.fuse_multiplier * 0.75).max(FUSE_MULTIPLIER_FLOOR);
                player.explosion_radius = player.explosion_radius.saturating_sub(1).max(1);
            }
            PowerUpKind::SpeedBoost => {
                player.speed_multiplier = SPEED_BOOST_MULTIPLIER;
                player.speed_expires_at = Some(tick.saturating_add(SPEED_BOOST_TICKS));
            }
            PowerUpKind::Shield => {
                player.shielded = true;
                player.shield_expires_at = Some(tick.saturating_add(SHIELD_TICKS));
            }
            PowerUpKind::Jump => {
                player.can_jump = true;
            }
        }
        player.power_ups.push(self);
    }
}

/// A power-up lying on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUp {
    pub kind: PowerUpKind,
    pub cell: CellPos,
    pub spawned_at: u64,
}

/// Decides whether breaking the wall at `cell` reveals a power-up.
///
/// Depends only on the seed and the coordinates, so every client decides
/// identically no matter how many random draws happened before.
pub fn spawn_check(seed: u64, cell: CellPos) -> Option<PowerUpKind> {
    let hash = cell_hash(seed, cell.x, cell.y);
    if hash % 100 >= POWERUP_SPAWN_PERCENT {
        return None;
    }
    let slot = (hash >> 32) as usize % PowerUpKind::ALL.len();
    Some(PowerUpKind::ALL[slot])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::PlayerIndex;
    use blobber_env::PlayerId;
    use nalgebra::Vector2;

    fn player() -> PlayerState {
        PlayerState::new(&PlayerId::new("p"), PlayerIndex(0), Vector2::new(1.5, 1.5))
    }

    #[test]
    fn test_spawn_check_is_positional() {
        for x in 0..30 {
            for y in 0..30 {
                let cell = CellPos::new(x, y);
                assert_eq!(spawn_check(99, cell), spawn_check(99, cell));
            }
        }
    }

    #[test]
    fn test_spawn_rate_is_roughly_configured() {
        let spawned = (0..100)
            .flat_map(|x| (0..100).map(move |y| CellPos::new(x, y)))
            .filter(|cell| spawn_check(1234, *cell).is_some())
            .count();
        // 30% of 10_000 cells, with generous slack
        assert!((2_500..3_500).contains(&spawned), "spawned {}", spawned);
    }

    #[test]
    fn test_stats_are_clamped() {
        let mut p = player();
        for _ in 0..20 {
            PowerUpKind::ExtraBomb.apply(&mut p, 0);
            PowerUpKind::BlastRadius.apply(&mut p, 0);
        }
        assert_eq!(p.max_bombs, MAX_BOMBS_CAP);
        assert_eq!(p.explosion_radius, EXPLOSION_RADIUS_CAP);

        for _ in 0..20 {
            PowerUpKind::ShortFuse.apply(&mut p, 0);
        }
        assert_eq!(p.fuse_multiplier, FUSE_MULTIPLIER_FLOOR);
        assert_eq!(p.explosion_radius, 1);
    }

    #[test]
    fn test_timed_buffs_record_expiry() {
        let mut p = player();
        PowerUpKind::SpeedBoost.apply(&mut p, 40);
        PowerUpKind::Shield.apply(&mut p, 40);
        PowerUpKind::Jump.apply(&mut p, 40);
        assert_eq!(p.speed_expires_at, Some(40 + SPEED_BOOST_TICKS));
        assert_eq!(p.shield_expires_at, Some(40 + SHIELD_TICKS));
        assert!(p.shielded && p.can_jump);
        assert_eq!(p.power_ups.len(), 3);
    }

    #[test]
    fn test_buff_expiry_saturates_near_max_tick() {
        let mut p = player();
        PowerUpKind::SpeedBoost.apply(&mut p, u64::MAX - 1);
        PowerUpKind::Shield.apply(&mut p, u64::MAX - 1);
        assert_eq!(p.speed_expires_at, Some(u64::MAX));
        assert_eq!(p.shield_expires_at, Some(u64::MAX));
    }
}
