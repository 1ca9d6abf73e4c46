//! The occupancy grid: footprint placement, reservations, spatial search.
//!
//! Cells hold ids, never object references; the objects themselves live in
//! the [`ObjectStore`](crate::objects::ObjectStore). A cell is either empty,
//! occupied by a placed object, or reserved by an in-flight spawn or build
//! command. Reserved cells block placement and pathing exactly like occupied
//! ones but have no occupant to attack or gather from.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::command::CommandId;
use crate::coordinate::{Coordinate, NEIGHBORS_8};
use crate::error::{Result, SimError};
use crate::objects::ObjectId;

/// One grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Cell {
    /// Nothing here.
    #[default]
    Empty,
    /// Part of the footprint of a placed object.
    Occupied(ObjectId),
    /// Held by an in-flight spawn or build command.
    Reserved(CommandId),
}

impl Cell {
    /// Whether the cell blocks placement and movement.
    #[must_use]
    pub const fn is_blocked(self) -> bool {
        !matches!(self, Self::Empty)
    }

    /// The placed occupant, if any. Reservations have none.
    #[must_use]
    pub const fn occupant(self) -> Option<ObjectId> {
        match self {
            Self::Occupied(id) => Some(id),
            _ => None,
        }
    }
}

/// The square block of cells an object or reservation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    /// Top-left cell.
    pub anchor: Coordinate,
    /// Edge length.
    pub size: u8,
}

impl Footprint {
    /// Iterate the covered cells in row-major order.
    pub fn cells(self) -> impl Iterator<Item = Coordinate> {
        let n = i32::from(self.size);
        (0..n).flat_map(move |dy| (0..n).map(move |dx| self.anchor.offset(dx, dy)))
    }

    /// Whether `coord` lies inside the footprint.
    #[must_use]
    pub fn contains(self, coord: Coordinate) -> bool {
        let n = i32::from(self.size);
        coord.x >= self.anchor.x
            && coord.x < self.anchor.x + n
            && coord.y >= self.anchor.y
            && coord.y < self.anchor.y + n
    }
}

/// Read-only point-in-time copy of the grid's cells.
///
/// Handed to consumers (AI known-map, renderers) so they never alias the
/// live grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapView {
    size: u32,
    cells: Vec<Cell>,
}

impl MapView {
    /// Grid edge length.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Cell contents, or `None` out of bounds.
    #[must_use]
    pub fn get(&self, coord: Coordinate) -> Option<Cell> {
        if !in_bounds(self.size, coord) {
            return None;
        }
        Some(self.cells[cell_index(self.size, coord)])
    }
}

/// The `S`x`S` occupancy grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Map {
    size: u32,
    cells: Vec<Cell>,
    placements: HashMap<ObjectId, Footprint>,
    reservations: HashMap<CommandId, Footprint>,
}

const fn in_bounds(size: u32, coord: Coordinate) -> bool {
    coord.x >= 0 && coord.y >= 0 && (coord.x as u32) < size && (coord.y as u32) < size
}

const fn cell_index(size: u32, coord: Coordinate) -> usize {
    (coord.y as usize) * (size as usize) + coord.x as usize
}

impl Map {
    /// Create an empty grid of `size` x `size` cells.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    #[must_use]
    pub fn new(size: u32) -> Self {
        assert!(size > 0, "map size must be positive");
        Self {
            size,
            cells: vec![Cell::Empty; (size as usize) * (size as usize)],
            placements: HashMap::new(),
            reservations: HashMap::new(),
        }
    }

    /// Grid edge length.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Whether `coord` lies on the grid.
    #[must_use]
    pub const fn contains(&self, coord: Coordinate) -> bool {
        in_bounds(self.size, coord)
    }

    /// Cell contents, or `None` out of bounds.
    #[must_use]
    pub fn get(&self, coord: Coordinate) -> Option<Cell> {
        if !self.contains(coord) {
            return None;
        }
        Some(self.cells[cell_index(self.size, coord)])
    }

    /// The placed occupant of a cell, if any.
    #[must_use]
    pub fn occupant(&self, coord: Coordinate) -> Option<ObjectId> {
        self.get(coord).and_then(Cell::occupant)
    }

    /// Footprint of a placed object.
    #[must_use]
    pub fn placement(&self, id: ObjectId) -> Option<Footprint> {
        self.placements.get(&id).copied()
    }

    /// True iff every cell of an `size` x `size` footprint anchored at
    /// `anchor` is in bounds and empty. Pure predicate, no mutation.
    #[must_use]
    pub fn check_placement(&self, size: u8, anchor: Coordinate) -> bool {
        Footprint { anchor, size }
            .cells()
            .all(|c| self.get(c) == Some(Cell::Empty))
    }

    fn fill(&mut self, footprint: Footprint, cell: Cell) {
        for c in footprint.cells() {
            let idx = cell_index(self.size, c);
            self.cells[idx] = cell;
        }
    }

    /// Write `id` into every cell of its footprint.
    pub fn place(&mut self, id: ObjectId, size: u8, anchor: Coordinate) -> Result<()> {
        if !self.check_placement(size, anchor) {
            return Err(SimError::Placement(anchor));
        }
        let footprint = Footprint { anchor, size };
        self.fill(footprint, Cell::Occupied(id));
        self.placements.insert(id, footprint);
        Ok(())
    }

    /// Clear the footprint of the occupant at `coord` and return its id.
    pub fn remove_at(&mut self, coord: Coordinate) -> Result<ObjectId> {
        let Some(cell) = self.get(coord) else {
            return Err(SimError::InvalidTarget {
                at: coord,
                reason: "out of bounds",
            });
        };
        let Cell::Occupied(id) = cell else {
            return Err(SimError::InvalidTarget {
                at: coord,
                reason: "cell is empty",
            });
        };
        // Placed cells always carry a footprint entry.
        let footprint = self
            .placements
            .remove(&id)
            .ok_or_else(|| SimError::InvalidState(format!("object {id} placed without footprint")))?;
        self.fill(footprint, Cell::Empty);
        Ok(id)
    }

    /// Move a placed object one step. The destination must be 8-adjacent to
    /// the current anchor and placeable; nothing changes on failure.
    pub fn relocate(&mut self, id: ObjectId, to: Coordinate) -> Result<()> {
        let footprint = self
            .placements
            .get(&id)
            .copied()
            .ok_or(SimError::ObjectNotFound(id))?;
        if !footprint.anchor.is_adjacent(to) {
            return Err(SimError::OutOfRange {
                from: footprint.anchor,
                to,
            });
        }
        // Single-cell movers never overlap their own footprint, so the
        // placement check can run before the old cells are cleared.
        if !self.check_placement(footprint.size, to) {
            return Err(SimError::Placement(to));
        }
        self.fill(footprint, Cell::Empty);
        let moved = Footprint {
            anchor: to,
            size: footprint.size,
        };
        self.fill(moved, Cell::Occupied(id));
        self.placements.insert(id, moved);
        Ok(())
    }

    /// Reserve a footprint for an in-flight command.
    pub fn reserve(&mut self, command: CommandId, size: u8, anchor: Coordinate) -> Result<()> {
        if !self.check_placement(size, anchor) {
            return Err(SimError::Placement(anchor));
        }
        let footprint = Footprint { anchor, size };
        self.fill(footprint, Cell::Reserved(command));
        self.reservations.insert(command, footprint);
        Ok(())
    }

    /// Release a command's reservation. Idempotent: releasing an unknown or
    /// already-released command is a no-op.
    pub fn release(&mut self, command: CommandId) {
        if let Some(footprint) = self.reservations.remove(&command) {
            self.fill(footprint, Cell::Empty);
        }
    }

    /// Footprint held by a reservation, if still live.
    #[must_use]
    pub fn reservation(&self, command: CommandId) -> Option<Footprint> {
        self.reservations.get(&command).copied()
    }

    /// Take a read-only snapshot of the cells.
    #[must_use]
    pub fn capture(&self) -> MapView {
        MapView {
            size: self.size,
            cells: self.cells.clone(),
        }
    }

    /// Anchors where a `footprint_size` object fits near `from`, with a
    /// one-cell buffer around it.
    ///
    /// Expanding ring search: each radius tests every ring cell as the
    /// anchor of a `(footprint_size + 1)` square probe on a scratch copy,
    /// collects the probe anchor shifted by one (so the buffer surrounds the
    /// real footprint), and marks the probe used so hits at the same radius
    /// do not overlap. Single-cell searches stop at the first radius that
    /// yields a hit; larger footprints scan until the grid is exhausted.
    #[must_use]
    pub fn find_nearest_empty_zones(
        &self,
        from: Coordinate,
        footprint_size: u8,
    ) -> Vec<Coordinate> {
        let probe = footprint_size + 1;
        let mut scratch = self.clone();
        let mut anchors = Vec::new();
        let max_radius = self.size as i32;

        for radius in 1..=max_radius {
            for cell in ring_cells(from, radius) {
                if scratch.check_placement(probe, cell) {
                    anchors.push(cell + 1);
                    // Any non-empty marker keeps later probes off this zone.
                    scratch.fill(
                        Footprint {
                            anchor: cell,
                            size: probe,
                        },
                        Cell::Reserved(CommandId(u64::MAX)),
                    );
                }
            }
            if footprint_size == 1 && !anchors.is_empty() {
                break;
            }
        }
        anchors
    }

    /// Coordinates of cells whose occupant matches `matches`, nearest first.
    ///
    /// Breadth-first over the 8-neighborhood from `from`, each cell visited
    /// once, so results come back in non-decreasing approximate distance.
    #[must_use]
    pub fn find_nearest_matching(
        &self,
        from: Coordinate,
        mut matches: impl FnMut(ObjectId) -> bool,
    ) -> Vec<Coordinate> {
        let mut found = Vec::new();
        if !self.contains(from) {
            return found;
        }

        let mut visited = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();
        visited[cell_index(self.size, from)] = true;
        queue.push_back(from);

        while let Some(cell) = queue.pop_front() {
            if let Some(id) = self.occupant(cell) {
                if matches(id) {
                    found.push(cell);
                }
            }
            for (dx, dy) in NEIGHBORS_8 {
                let next = cell.offset(dx, dy);
                if !self.contains(next) {
                    continue;
                }
                let idx = cell_index(self.size, next);
                if !visited[idx] {
                    visited[idx] = true;
                    queue.push_back(next);
                }
            }
        }
        found
    }
}

/// Cells at Chebyshev distance exactly `radius` from `center`, in row-major
/// scan order. Off-grid cells are included; callers bounds-check.
fn ring_cells(center: Coordinate, radius: i32) -> impl Iterator<Item = Coordinate> {
    (-radius..=radius).flat_map(move |dy| {
        (-radius..=radius).filter_map(move |dx| {
            if dx.abs() == radius || dy.abs() == radius {
                Some(center.offset(dx, dy))
            } else {
                None
            }
        })
    })
}
