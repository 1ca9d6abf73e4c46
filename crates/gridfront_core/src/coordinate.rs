//! Integer grid coordinates and distance arithmetic.
//!
//! Every behavioral check (adjacency, attack range) compares exact integer
//! squared distances; the fixed-point Euclidean distance exists for callers
//! that need the scalar value itself.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_sqrt, Fixed};

/// A cell position on the grid.
///
/// Value type: hashable, ordered row-major (y first, then x) so sorted
/// collections of coordinates iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Coordinate {
    /// Column index.
    pub x: i32,
    /// Row index.
    pub y: i32,
}

impl Coordinate {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another cell. Exact integer math.
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another cell, in fixed-point.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(Fixed::from_num(self.distance_squared(other)))
    }

    /// Whether `other` lies within `range` cells (Euclidean).
    ///
    /// Compares squared integer distances, so a range of 1 includes the four
    /// cardinal neighbors but not the diagonals (distance sqrt(2)).
    #[must_use]
    pub const fn is_in_range(self, other: Self, range: u32) -> bool {
        let r = range as i64;
        self.distance_squared(other) <= r * r
    }

    /// Whether `other` is one of the 8 surrounding cells.
    #[must_use]
    pub const fn is_adjacent(self, other: Self) -> bool {
        let d = self.distance_squared(other);
        d > 0 && d <= 2
    }

    /// The cell offset by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl std::ops::Add<i32> for Coordinate {
    type Output = Self;

    /// Shift both components by a scalar (footprint corner arithmetic).
    fn add(self, rhs: i32) -> Self::Output {
        Self::new(self.x + rhs, self.y + rhs)
    }
}

impl std::ops::Sub<i32> for Coordinate {
    type Output = Self;

    fn sub(self, rhs: i32) -> Self::Output {
        Self::new(self.x - rhs, self.y - rhs)
    }
}

impl Ord for Coordinate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Coordinate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Offsets of the 8 surrounding cells, scan order (row-major).
pub const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Offsets of the 4 cardinal neighbors.
pub const NEIGHBORS_4: [(i32, i32); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
