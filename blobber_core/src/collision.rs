//! Circular footprint collision against the grid.
//!
//! The footprint is approximated by eight points on the player's
//! circumference. This is not a continuous test: a corner can poke between
//! two samples. Every client uses the same eight points, which is all
//! lockstep needs.

use crate::grid::{CellPos, Grid};
use nalgebra::Vector2;
use std::f64::consts::FRAC_1_SQRT_2;

/// Unit offsets of the sample points, counter-clockwise from +x.
const SAMPLE_OFFSETS: [(f64, f64); 8] = [
    (1.0, 0.0),
    (FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    (0.0, 1.0),
    (-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    (-1.0, 0.0),
    (-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
    (0.0, -1.0),
    (FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
];

/// True if every sample point of a circle at `center` lies on an empty cell.
pub fn footprint_clear(grid: &Grid, center: &Vector2<f64>, radius: f64) -> bool {
    SAMPLE_OFFSETS.iter().all(|(ox, oy)| {
        let point = Vector2::new(center.x + ox * radius, center.y + oy * radius);
        grid.is_empty(CellPos::from_point(&point))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellContent;

    fn corridor() -> Grid {
        // 5x3: walls everywhere except the middle row
        let mut grid = Grid::empty(5, 3);
        for x in 0..5 {
            grid.set_content(CellPos::new(x, 0), CellContent::SolidWall);
            grid.set_content(CellPos::new(x, 2), CellContent::SolidWall);
        }
        grid
    }

    #[test]
    fn test_centered_player_fits_in_corridor() {
        let grid = corridor();
        assert!(footprint_clear(&grid, &Vector2::new(2.5, 1.5), 0.35));
    }

    #[test]
    fn test_off_center_player_clips_wall() {
        let grid = corridor();
        assert!(!footprint_clear(&grid, &Vector2::new(2.5, 1.2), 0.35));
    }

    #[test]
    fn test_leaving_the_grid_is_blocked() {
        let grid = Grid::empty(3, 3);
        assert!(footprint_clear(&grid, &Vector2::new(0.5, 0.5), 0.35));
        assert!(!footprint_clear(&grid, &Vector2::new(0.2, 0.5), 0.35));
    }
}
