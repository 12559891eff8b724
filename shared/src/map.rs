//! Coordinate and map bounds model.
//!
//! Grounded on `original_source/headers/coord.h` (`Coord`, `MANHATTAN_DISTANCE`)
//! and `original_source/headers/map.h` (height/width bounds, origin at the
//! top-left corner).

use serde::{Deserialize, Serialize};

/// A point on the grid. `x` indexes rows (bounded by map height), `y`
/// indexes columns (bounded by map width) — matching the original's
/// "x is the row, y is the column" convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another coordinate — the only distance measure
    /// the matcher uses.
    pub fn manhattan_distance(&self, other: &Coord) -> i64 {
        (self.x as i64 - other.x as i64).abs() + (self.y as i64 - other.y as i64).abs()
    }
}

/// Immutable-after-construction grid bounds.
#[derive(Debug, Clone, Copy)]
pub struct Map {
    pub height: i32,
    pub width: i32,
}

impl Map {
    pub fn new(height: i32, width: i32) -> Self {
        Self { height, width }
    }

    /// `0 <= x < height` and `0 <= y < width`. Out-of-range coordinates are
    /// rejected by callers, never clamped.
    pub fn contains(&self, coord: &Coord) -> bool {
        coord.x >= 0 && coord.x < self.height && coord.y >= 0 && coord.y < self.width
    }
}
