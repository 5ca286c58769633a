//! Stage geometry as seen by the opponent AI.
//!
//! The physics collaborator owns the real collision shapes; the AI only asks
//! "is there ground at (x, y)?". Stages answer that from a coarse heatmap: a
//! row-major grid of cells, each `cell_px` square, sampled in stage pixels with
//! y growing downwards. Bundled layouts live in `stage_*.rs` and are built once.

use std::sync::OnceLock;

mod stage_bridge;
mod stage_club;
mod stage_rooftop;

/// The query surface the AI needs from stage collision.
pub trait StageGeometry {
    /// True if a point at `(x, y)` is inside solid ground.
    fn has_ground(&self, x: f64, y: f64) -> bool;
    /// Horizontal extent in pixels; outside `0..width` is off-stage.
    fn width(&self) -> f64;
    fn height(&self) -> f64;
}

// --- Heatmap ----------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cell {
    #[default]
    Air,
    Ground,
    /// One-way platform; solid from above.
    Platform,
}

impl Cell {
    pub fn is_solid(self) -> bool {
        !matches!(self, Cell::Air)
    }
}

/// Row-major cell grid. Samples outside the grid are `Air`.
#[derive(Clone, Debug, PartialEq)]
pub struct Heatmap {
    cols: usize,
    rows: usize,
    cell_px: f64,
    cells: Vec<Cell>, // length = cols * rows
}

impl Heatmap {
    pub fn new(cols: usize, rows: usize, cell_px: f64) -> Self {
        Self {
            cols,
            rows,
            cell_px: if cell_px > 0.0 { cell_px } else { 1.0 },
            cells: vec![Cell::Air; cols * rows],
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_px(&self) -> f64 {
        self.cell_px
    }

    pub fn cell(&self, col: usize, row: usize) -> Cell {
        if col >= self.cols || row >= self.rows {
            return Cell::Air;
        }
        self.cells[row * self.cols + col]
    }

    pub fn set(&mut self, col: usize, row: usize, cell: Cell) {
        if col < self.cols && row < self.rows {
            self.cells[row * self.cols + col] = cell;
        }
    }

    /// Fill columns `col0..col1` and rows `row0..row1` (half-open, clipped).
    pub fn fill_rect(&mut self, col0: usize, row0: usize, col1: usize, row1: usize, cell: Cell) {
        for row in row0..row1.min(self.rows) {
            for col in col0..col1.min(self.cols) {
                self.cells[row * self.cols + col] = cell;
            }
        }
    }

    /// Builder form of [`Heatmap::fill_rect`].
    pub fn with_rect(mut self, col0: usize, row0: usize, col1: usize, row1: usize, cell: Cell) -> Self {
        self.fill_rect(col0, row0, col1, row1, cell);
        self
    }

    /// Cell under a pixel position.
    pub fn sample(&self, x: f64, y: f64) -> Cell {
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return Cell::Air;
        }
        let col = (x / self.cell_px) as usize;
        let row = (y / self.cell_px) as usize;
        self.cell(col, row)
    }
}

impl StageGeometry for Heatmap {
    fn has_ground(&self, x: f64, y: f64) -> bool {
        self.sample(x, y).is_solid()
    }

    fn width(&self) -> f64 {
        self.cols as f64 * self.cell_px
    }

    fn height(&self) -> f64 {
        self.rows as f64 * self.cell_px
    }
}

// --- Stage descriptors ------------------------------------------------------

/// Immutable stage descriptor.
pub struct StageDesc {
    pub name: &'static str,
    pub bpm: f64,
    pub track: &'static str,
    pub heatmap: Heatmap,
    pub spawn_points: &'static [(f64, f64)], // feet positions, player 0 first
    pub dance_spot: (f64, f64, f64),         // centre x, centre y, radius
}

impl StageGeometry for StageDesc {
    fn has_ground(&self, x: f64, y: f64) -> bool {
        self.heatmap.has_ground(x, y)
    }

    fn width(&self) -> f64 {
        self.heatmap.width()
    }

    fn height(&self) -> f64 {
        self.heatmap.height()
    }
}

/// Bundled stages in menu order.
pub fn stages() -> &'static [&'static StageDesc] {
    static STAGES: OnceLock<Vec<&'static StageDesc>> = OnceLock::new();
    STAGES.get_or_init(|| {
        vec![
            stage_rooftop::rooftop(),
            stage_bridge::bridge(),
            stage_club::club(),
        ]
    })
}

pub fn stage_by_name(name: &str) -> Option<&'static StageDesc> {
    stages().iter().copied().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heatmap_samples_row_major_and_clips() {
        let map = Heatmap::new(4, 3, 10.0).with_rect(1, 2, 3, 3, Cell::Ground);
        assert!(map.has_ground(15.0, 25.0));
        assert!(!map.has_ground(5.0, 25.0));
        assert!(!map.has_ground(35.0, 25.0));
        assert!(!map.has_ground(-1.0, 25.0));
        assert!(!map.has_ground(15.0, 99.0));
        assert_eq!(map.width(), 40.0);
    }

    #[test]
    fn bundled_stages_have_ground_under_spawns() {
        for stage in stages() {
            assert!(stage.spawn_points.len() >= 2, "{} needs two spawns", stage.name);
            for &(x, y) in stage.spawn_points {
                assert!(stage.has_ground(x, y + 4.0), "{} spawn ({x},{y}) floats", stage.name);
            }
            let (dx, dy, _) = stage.dance_spot;
            assert!(stage.has_ground(dx, dy + 4.0), "{} dance spot floats", stage.name);
        }
        assert!(stage_by_name("Neon Rooftop").is_some());
        assert!(stage_by_name("nowhere").is_none());
    }
}
