//! Deterministic spawn placement for new players.
//!
//! Search tiers, in order:
//! 1. Random points in a central arena circle, biased toward the middle.
//! 2. Random points per quadrant.
//! 3. Row-major scan of the whole grid, ignoring the distance rule.
//! 4. The grid center.
//!
//! Tiers 1 and 2 draw from the world's PRNG, so every client must call this
//! at the same point in the same tick to stay in sync.

use crate::collision::footprint_clear;
use crate::config::{
    PLAYER_RADIUS, SPAWN_ARENA_ATTEMPTS, SPAWN_ARENA_FRACTION, SPAWN_MIN_DISTANCE,
    SPAWN_QUADRANT_ATTEMPTS,
};
use crate::grid::{CellPos, Grid};
use crate::rng::SeededRng;
use nalgebra::Vector2;
use serde::Serialize;
use std::f64::consts::TAU;
use tracing::warn;

/// Which tier produced a spawn point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SpawnTier {
    Arena,
    Quadrant,
    Scan,
    Fallback,
}

/// Finds a spawn position for a new player.
pub fn find_spawn(
    grid: &Grid,
    occupied: &[Vector2<f64>],
    rng: &mut SeededRng,
) -> (Vector2<f64>, SpawnTier) {
    let acceptable = |candidate: &Vector2<f64>| {
        footprint_clear(grid, candidate, PLAYER_RADIUS)
            && occupied
                .iter()
                .all(|other| (other - candidate).norm() >= SPAWN_MIN_DISTANCE)
    };

    let width = f64::from(grid.width());
    let height = f64::from(grid.height());
    let middle = Vector2::new(width / 2.0, height / 2.0);
    let arena_radius = width.min(height) * SPAWN_ARENA_FRACTION;

    for _ in 0..SPAWN_ARENA_ATTEMPTS {
        // Squaring the radius draw piles candidates up near the middle
        let u = rng.next_f64();
        let angle = rng.next_f64() * TAU;
        let r = arena_radius * u * u;
        let point = middle + Vector2::new(r * angle.cos(), r * angle.sin());
        let candidate = CellPos::from_point(&point).center();
        if acceptable(&candidate) {
            return (candidate, SpawnTier::Arena);
        }
    }

    let half_w = grid.width() / 2;
    let half_h = grid.height() / 2;
    let quadrants = [
        (1, half_w, 1, half_h),
        (half_w, grid.width() - 1, 1, half_h),
        (1, half_w, half_h, grid.height() - 1),
        (half_w, grid.width() - 1, half_h, grid.height() - 1),
    ];
    for (x_lo, x_hi, y_lo, y_hi) in quadrants {
        if x_hi <= x_lo || y_hi <= y_lo {
            continue;
        }
        for _ in 0..SPAWN_QUADRANT_ATTEMPTS {
            let x = x_lo + rng.below((x_hi - x_lo) as u32) as i32;
            let y = y_lo + rng.below((y_hi - y_lo) as u32) as i32;
            let candidate = CellPos::new(x, y).center();
            if acceptable(&candidate) {
                return (candidate, SpawnTier::Quadrant);
            }
        }
    }

    if let Some((cell, _)) = grid
        .iter()
        .find(|(cell, _)| footprint_clear(grid, &cell.center(), PLAYER_RADIUS))
    {
        return (cell.center(), SpawnTier::Scan);
    }

    warn!("Spawn search exhausted, placing player at grid center");
    (
        CellPos::new(grid.width() / 2, grid.height() / 2).center(),
        SpawnTier::Fallback,
    )
}
