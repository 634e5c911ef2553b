//! Bombs and the explosions they leave behind.

use crate::config::{BASE_FUSE_TICKS, EXPLOSION_DURATION_TICKS};
use crate::grid::{CellContent, CellPos, Grid};
use blobber_env::{Direction, PlayerId};
use nalgebra::Vector2;
use serde::Serialize;

/// A placed bomb waiting for its fuse.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bomb {
    pub owner: PlayerId,
    /// Always the center of a cell
    pub position: Vector2<f64>,
    pub placed_at: u64,
    pub fuse_multiplier: f64,
    pub exploded: bool,
}

impl Bomb {
    pub fn cell(&self) -> CellPos {
        CellPos::from_point(&self.position)
    }

    /// True once `tick - placed_at >= BASE_FUSE_TICKS * fuse_multiplier`.
    pub fn fuse_elapsed(&self, tick: u64) -> bool {
        let elapsed = tick.saturating_sub(self.placed_at) as f64;
        elapsed >= BASE_FUSE_TICKS * self.fuse_multiplier
    }
}

/// One directional ray of an explosion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplosionArm {
    pub direction: Direction,
    /// Cells covered beyond the center
    pub length: i32,
    /// Furthest covered cell
    pub end: CellPos,
    /// Whether a wall ended the arm before its full range
    pub stopped: bool,
}

/// An explosion painting its cells for a fixed number of ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Explosion {
    pub owner: PlayerId,
    pub center: CellPos,
    pub arms: Vec<ExplosionArm>,
    pub started_at: u64,
}

impl Explosion {
    /// Center plus every arm cell, center first then arms in order.
    pub fn cells(&self) -> Vec<CellPos> {
        let mut cells = vec![self.center];
        for arm in &self.arms {
            cells.extend((1..=arm.length).map(|step| self.center.step(arm.direction, step)));
        }
        cells
    }

    pub fn covers(&self, cell: CellPos) -> bool {
        if cell == self.center {
            return true;
        }
        self.arms.iter().any(|arm| {
            (1..=arm.length).any(|step| self.center.step(arm.direction, step) == cell)
        })
    }

    /// Still within its painting window at `tick`.
    pub fn is_active(&self, tick: u64) -> bool {
        tick.saturating_sub(self.started_at) < EXPLOSION_DURATION_TICKS
    }
}

/// Result of detonating a bomb against the grid.
#[derive(Debug)]
pub struct Blast {
    pub explosion: Explosion,
    /// Breakable walls destroyed, in arm order
    pub broken: Vec<CellPos>,
}

/// Casts the four arms from `center`, breaking the first breakable wall each
/// arm meets.
///
/// A solid wall (or the grid edge) stops an arm before its cell; a breakable
/// wall is destroyed, covered, and stops the arm. Zero-length arms are
/// omitted.
pub fn detonate(grid: &mut Grid, owner: PlayerId, center: CellPos, radius: u32, tick: u64) -> Blast {
    let mut arms = Vec::with_capacity(4);
    let mut broken = Vec::new();
    let radius = radius as i32;

    for direction in Direction::ALL {
        let mut length = 0;
        let mut stopped = false;
        for step in 1..=radius {
            let cell = center.step(direction, step);
            match grid.content(cell) {
                CellContent::SolidWall => {
                    stopped = true;
                    break;
                }
                CellContent::BreakableWall => {
                    grid.set_content(cell, CellContent::Empty);
                    broken.push(cell);
                    length = step;
                    stopped = true;
                    break;
                }
                CellContent::Empty => length = step,
            }
        }
        if length > 0 {
            arms.push(ExplosionArm {
                direction,
                length,
                end: center.step(direction, length),
                stopped,
            });
        }
    }

    Blast {
        explosion: Explosion {
            owner,
            center,
            arms,
            started_at: tick,
        },
        broken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> PlayerId {
        PlayerId::new("bomber")
    }

    #[test]
    fn test_fuse_scales_with_multiplier() {
        let bomb = Bomb {
            owner: owner(),
            position: CellPos::new(1, 1).center(),
            placed_at: 100,
            fuse_multiplier: 0.5,
            exploded: false,
        };
        assert!(!bomb.fuse_elapsed(129));
        assert!(bomb.fuse_elapsed(130));
    }

    #[test]
    fn test_open_field_arms_reach_full_radius() {
        let mut grid = Grid::empty(11, 11);
        let blast = detonate(&mut grid, owner(), CellPos::new(5, 5), 3, 0);
        assert_eq!(blast.explosion.arms.len(), 4);
        assert!(blast.explosion.arms.iter().all(|a| a.length == 3 && !a.stopped));
        assert_eq!(blast.explosion.cells().len(), 13);
        assert!(blast.broken.is_empty());
    }

    #[test]
    fn test_walls_stop_arms() {
        let mut grid = Grid::empty(11, 11);
        grid.set_content(CellPos::new(5, 3), CellContent::SolidWall);
        grid.set_content(CellPos::new(7, 5), CellContent::BreakableWall);

        let blast = detonate(&mut grid, owner(), CellPos::new(5, 5), 3, 0);
        let arm = |d| blast.explosion.arms.iter().find(|a| a.direction == d).cloned();

        let up = arm(Direction::Up).unwrap();
        assert_eq!((up.length, up.stopped), (1, true));
        assert!(!blast.explosion.covers(CellPos::new(5, 3)));
        assert_eq!(grid.content(CellPos::new(5, 3)), CellContent::SolidWall);

        let right = arm(Direction::Right).unwrap();
        assert_eq!((right.length, right.stopped), (2, true));
        assert_eq!(right.end, CellPos::new(7, 5));
        assert!(blast.explosion.covers(CellPos::new(7, 5)));
        assert_eq!(grid.content(CellPos::new(7, 5)), CellContent::Empty);
        assert_eq!(blast.broken, vec![CellPos::new(7, 5)]);
    }

    #[test]
    fn test_adjacent_solid_wall_omits_arm() {
        let mut grid = Grid::empty(5, 5);
        grid.set_content(CellPos::new(2, 1), CellContent::SolidWall);
        let blast = detonate(&mut grid, owner(), CellPos::new(2, 2), 2, 0);
        assert!(blast.explosion.arms.iter().all(|a| a.direction != Direction::Up));
        assert_eq!(blast.explosion.arms.len(), 3);
    }

    #[test]
    fn test_explosion_lifetime() {
        let mut grid = Grid::empty(5, 5);
        let blast = detonate(&mut grid, owner(), CellPos::new(2, 2), 1, 20);
        assert!(blast.explosion.is_active(20));
        assert!(blast.explosion.is_active(20 + EXPLOSION_DURATION_TICKS - 1));
        assert!(!blast.explosion.is_active(20 + EXPLOSION_DURATION_TICKS));
    }
}
