//! Grid pathfinding using A*.
//!
//! All costs are integers (one per step, diagonal or not), so results are
//! deterministic across platforms; ties in the open set are broken by cell
//! coordinates rather than insertion order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::coordinate::{Coordinate, NEIGHBORS_4, NEIGHBORS_8};
use crate::error::{Result, SimError};
use crate::map::{Cell, Footprint, Map};

/// Which neighborhood moves may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    /// 8-directional movement.
    Diagonal,
    /// 4-directional movement.
    Cardinal,
}

/// A node in the A* open set.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    cell: Coordinate,
    /// g + heuristic.
    f_score: u32,
    /// Lower coordinates first when f scores tie, for determinism.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for min-heap behavior.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn tie_breaker(cell: Coordinate) -> u64 {
    ((cell.y as u64) << 32) | (cell.x as u64 & 0xFFFF_FFFF)
}

/// Admissible heuristic for the mode: Chebyshev for 8-directional movement,
/// Manhattan for 4-directional.
fn heuristic(from: Coordinate, to: Coordinate, mode: PathMode) -> u32 {
    let dx = from.x.abs_diff(to.x);
    let dy = from.y.abs_diff(to.y);
    match mode {
        PathMode::Diagonal => dx.max(dy),
        PathMode::Cardinal => dx + dy,
    }
}

/// Walkability matrix for one search: a cell is walkable iff it is empty or
/// is the start or end cell itself.
struct WalkGrid {
    size: u32,
    walkable: Vec<bool>,
}

impl WalkGrid {
    fn from_map(map: &Map, start: Coordinate, end: Coordinate) -> Self {
        let size = map.size();
        let mut walkable = Vec::with_capacity((size as usize) * (size as usize));
        for y in 0..size as i32 {
            for x in 0..size as i32 {
                let c = Coordinate::new(x, y);
                walkable.push(map.get(c) == Some(Cell::Empty) || c == start || c == end);
            }
        }
        Self { size, walkable }
    }

    /// Force-block every cell of `rect` except `keep`.
    fn block_rect(&mut self, rect: Footprint, keep: Coordinate) {
        for c in rect.cells() {
            if c != keep {
                self.set(c, false);
            }
        }
    }

    fn set(&mut self, cell: Coordinate, value: bool) {
        if let Some(idx) = self.index(cell) {
            self.walkable[idx] = value;
        }
    }

    fn index(&self, cell: Coordinate) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 || cell.x as u32 >= self.size || cell.y as u32 >= self.size {
            return None;
        }
        Some((cell.y as usize) * (self.size as usize) + cell.x as usize)
    }

    fn is_walkable(&self, cell: Coordinate) -> bool {
        self.index(cell).is_some_and(|idx| self.walkable[idx])
    }
}

/// Find a path on the live grid. The returned sequence excludes the start
/// cell; its last element is `end`. An empty path means start equals end.
pub fn find_path(
    map: &Map,
    start: Coordinate,
    end: Coordinate,
    mode: PathMode,
) -> Result<Vec<Coordinate>> {
    let grid = WalkGrid::from_map(map, start, end);
    search(&grid, start, end, mode)
}

/// Like [`find_path`] but force-blocks every cell of `avoid` except `end`,
/// so builders never route through the footprint under construction.
pub fn find_path_avoiding(
    map: &Map,
    start: Coordinate,
    end: Coordinate,
    avoid: Footprint,
) -> Result<Vec<Coordinate>> {
    let mut grid = WalkGrid::from_map(map, start, end);
    grid.block_rect(avoid, end);
    search(&grid, start, end, PathMode::Diagonal)
}

fn search(
    grid: &WalkGrid,
    start: Coordinate,
    end: Coordinate,
    mode: PathMode,
) -> Result<Vec<Coordinate>> {
    let no_path = || SimError::NoPath {
        from: start,
        to: end,
    };

    if !grid.is_walkable(start) || !grid.is_walkable(end) {
        return Err(no_path());
    }
    if start == end {
        return Ok(Vec::new());
    }

    let directions: &[(i32, i32)] = match mode {
        PathMode::Diagonal => &NEIGHBORS_8,
        PathMode::Cardinal => &NEIGHBORS_4,
    };

    let mut open_set = BinaryHeap::new();
    let mut came_from: HashMap<Coordinate, Coordinate> = HashMap::new();
    let mut g_score: HashMap<Coordinate, u32> = HashMap::new();

    g_score.insert(start, 0);
    open_set.push(AStarNode {
        cell: start,
        f_score: heuristic(start, end, mode),
        tie_breaker: tie_breaker(start),
    });

    while let Some(current) = open_set.pop() {
        if current.cell == end {
            return Ok(reconstruct(&came_from, start, end));
        }

        let current_g = g_score.get(&current.cell).copied().unwrap_or(u32::MAX);

        for &(dx, dy) in directions {
            let next = current.cell.offset(dx, dy);
            if !grid.is_walkable(next) {
                continue;
            }

            let tentative_g = current_g + 1;
            let next_g = g_score.get(&next).copied().unwrap_or(u32::MAX);
            if tentative_g < next_g {
                came_from.insert(next, current.cell);
                g_score.insert(next, tentative_g);
                open_set.push(AStarNode {
                    cell: next,
                    f_score: tentative_g + heuristic(next, end, mode),
                    tie_breaker: tie_breaker(next),
                });
            }
        }
    }

    Err(no_path())
}

fn reconstruct(
    came_from: &HashMap<Coordinate, Coordinate>,
    start: Coordinate,
    end: Coordinate,
) -> Vec<Coordinate> {
    let mut path = vec![end];
    let mut current = end;
    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
