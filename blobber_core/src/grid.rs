//! The playing field: a flat array of cells.
//!
//! Cells are `Copy` and painted ownership is stored as a compact
//! [`PlayerIndex`], so cloning the grid for a new state is a single memcpy
//! of the backing vector.

use crate::rng::SeededRng;
use blobber_env::Direction;
use nalgebra::Vector2;
use serde::Serialize;

/// Join-order slot of a player; index into `WorldState::roster`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PlayerIndex(pub u16);

/// What occupies a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CellContent {
    Empty,
    SolidWall,
    BreakableWall,
}

/// One grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    pub content: CellContent,
    pub painted_by: Option<PlayerIndex>,
}

impl GridCell {
    const EMPTY: GridCell = GridCell {
        content: CellContent::Empty,
        painted_by: None,
    };
}

/// Integer cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
}

impl CellPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The cell containing a continuous point.
    pub fn from_point(point: &Vector2<f64>) -> Self {
        Self {
            x: point.x.floor() as i32,
            y: point.y.floor() as i32,
        }
    }

    /// Continuous coordinates of the cell's center.
    pub fn center(&self) -> Vector2<f64> {
        Vector2::new(f64::from(self.x) + 0.5, f64::from(self.y) + 0.5)
    }

    /// The cell `steps` cells away in `direction`.
    pub fn step(&self, direction: Direction, steps: i32) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x + dx * steps,
            y: self.y + dy * steps,
        }
    }
}

/// Row-major grid of cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<GridCell>,
}

impl Grid {
    /// An all-empty grid (used before first-tick generation and in tests).
    pub fn empty(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            cells: vec![GridCell::EMPTY; (width * height) as usize],
        }
    }

    /// Generates the wall layout.
    ///
    /// Border cells and interior cells with both coordinates even are solid;
    /// every other cell becomes breakable with probability `density`, one
    /// draw per candidate cell in row-major order.
    pub fn generate(width: i32, height: i32, density: f64, rng: &mut SeededRng) -> Self {
        let mut grid = Self::empty(width, height);
        for y in 0..grid.height {
            for x in 0..grid.width {
                let border = x == 0 || y == 0 || x == grid.width - 1 || y == grid.height - 1;
                let pillar = x % 2 == 0 && y % 2 == 0;
                let content = if border || pillar {
                    CellContent::SolidWall
                } else if rng.chance(density) {
                    CellContent::BreakableWall
                } else {
                    CellContent::Empty
                };
                grid.set_content(CellPos::new(x, y), content);
            }
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: CellPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: CellPos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    pub fn get(&self, pos: CellPos) -> Option<&GridCell> {
        self.index(pos).map(|i| &self.cells[i])
    }

    /// Content of a cell; out-of-bounds reads as solid.
    pub fn content(&self, pos: CellPos) -> CellContent {
        self.get(pos)
            .map_or(CellContent::SolidWall, |cell| cell.content)
    }

    /// True if the cell exists and holds no wall.
    pub fn is_empty(&self, pos: CellPos) -> bool {
        self.content(pos) == CellContent::Empty
    }

    /// Replaces a cell's content. Out-of-bounds writes are ignored.
    pub fn set_content(&mut self, pos: CellPos, content: CellContent) {
        if let Some(i) = self.index(pos) {
            self.cells[i].content = content;
        }
    }

    /// Marks a cell as owned by `owner`, returning the previous owner.
    ///
    /// Walls are never painted; painting them returns `None` and changes
    /// nothing.
    pub fn paint(&mut self, pos: CellPos, owner: PlayerIndex) -> Option<PlayerIndex> {
        let i = self.index(pos)?;
        let cell = &mut self.cells[i];
        if cell.content != CellContent::Empty {
            return None;
        }
        cell.painted_by.replace(owner)
    }

    /// Unpaints every cell owned by `owner`, returning how many there were.
    pub fn clear_paint(&mut self, owner: PlayerIndex) -> u32 {
        let mut cleared = 0;
        for cell in self.cells.iter_mut() {
            if cell.painted_by == Some(owner) {
                cell.painted_by = None;
                cleared += 1;
            }
        }
        cleared
    }

    /// Number of cells painted by `owner`.
    pub fn count_painted(&self, owner: PlayerIndex) -> u32 {
        self.cells
            .iter()
            .filter(|cell| cell.painted_by == Some(owner))
            .count() as u32
    }

    /// Number of cells that are not walls.
    pub fn open_cell_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.content == CellContent::Empty)
            .count()
    }

    /// Iterates all cells with their coordinates, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (CellPos, &GridCell)> {
        let width = self.width;
        self.cells.iter().enumerate().map(move |(i, cell)| {
            let i = i as i32;
            (CellPos::new(i % width, i / width), cell)
        })
    }
}
