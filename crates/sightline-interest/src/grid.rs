//! Spatial hash grid
//!
//! Occupants are bucketed by integer cell. A neighborhood query unions the
//! 3×3 block of cells around a position, so anything within one cell size of
//! it in every axis is found without scanning the whole world.
//!
//! ```text
//! ┌──────┬──────┬──────┐
//! │-1, 1 │ 0, 1 │ 1, 1 │
//! ├──────┼──────┼──────┤
//! │-1, 0 │ 0, 0 │ 1, 0 │   query_with_neighbors((0, 0))
//! ├──────┼──────┼──────┤
//! │-1,-1 │ 0,-1 │ 1,-1 │
//! └──────┴──────┴──────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Integer grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared distance in cells
    pub fn distance_squared(self, other: Cell) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Whether `other` is this cell or one of its 8 neighbors
    pub fn is_neighbor(self, other: Cell) -> bool {
        self.distance_squared(other) <= 2
    }
}

/// Neighbor offsets including the center cell
const NEIGHBORHOOD: [(i32, i32); 9] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (0, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Hash grid mapping cells to sets of occupants
#[derive(Debug, Clone)]
pub struct SpatialHashGrid<T> {
    cells: HashMap<Cell, HashSet<T>>,
}

impl<T: Copy + Eq + Hash> SpatialHashGrid<T> {
    pub fn new() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }

    /// Add an occupant to a cell
    pub fn add(&mut self, cell: Cell, occupant: T) {
        self.cells.entry(cell).or_default().insert(occupant);
    }

    /// Occupants of a single cell
    pub fn get(&self, cell: Cell) -> Option<&HashSet<T>> {
        self.cells.get(&cell)
    }

    /// Empty every cell
    ///
    /// Cell sets are cleared rather than dropped so the next rebuild reuses
    /// their allocations.
    pub fn clear_all(&mut self) {
        for occupants in self.cells.values_mut() {
            occupants.clear();
        }
    }

    /// Collect the occupants of `cell` and its 8 neighbors into `out`
    ///
    /// `out` is cleared first.
    pub fn query_with_neighbors(&self, cell: Cell, out: &mut HashSet<T>) {
        out.clear();
        for (dx, dy) in NEIGHBORHOOD {
            let neighbor = Cell::new(cell.x.wrapping_add(dx), cell.y.wrapping_add(dy));
            if let Some(occupants) = self.cells.get(&neighbor) {
                out.extend(occupants.iter().copied());
            }
        }
    }

    /// Number of allocated cells, including empty ones
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Total occupants across all cells
    pub fn occupant_count(&self) -> usize {
        self.cells.values().map(HashSet::len).sum()
    }
}

impl<T: Copy + Eq + Hash> Default for SpatialHashGrid<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbor_query() {
        let mut grid = SpatialHashGrid::new();
        grid.add(Cell::new(0, 0), 7u32);

        let mut out = HashSet::new();
        grid.query_with_neighbors(Cell::new(1, 1), &mut out);
        assert!(out.contains(&7));

        grid.query_with_neighbors(Cell::new(2, 2), &mut out);
        assert!(out.is_empty());

        grid.query_with_neighbors(Cell::new(-1, 0), &mut out);
        assert!(out.contains(&7));
    }

    #[test]
    fn test_query_unions_cells() {
        let mut grid = SpatialHashGrid::new();
        grid.add(Cell::new(0, 0), 1u32);
        grid.add(Cell::new(1, 0), 2);
        grid.add(Cell::new(1, 0), 2);
        grid.add(Cell::new(5, 5), 3);

        let mut out = HashSet::from([99]);
        grid.query_with_neighbors(Cell::new(0, 0), &mut out);
        assert_eq!(out, HashSet::from([1, 2]));
        assert_eq!(grid.occupant_count(), 3);
    }

    #[test]
    fn test_clear_all_keeps_cells() {
        let mut grid = SpatialHashGrid::new();
        grid.add(Cell::new(0, 0), 1u32);
        grid.add(Cell::new(3, 3), 2);

        grid.clear_all();
        assert_eq!(grid.cell_count(), 2);
        assert_eq!(grid.occupant_count(), 0);
        assert_eq!(grid.get(Cell::new(0, 0)).map(HashSet::len), Some(0));
    }

    #[test]
    fn test_cell_distance() {
        let origin = Cell::new(0, 0);
        assert!(origin.is_neighbor(Cell::new(1, 1)));
        assert!(origin.is_neighbor(Cell::new(-1, 0)));
        assert!(!origin.is_neighbor(Cell::new(2, 0)));
        assert!(!origin.is_neighbor(Cell::new(2, 2)));
        assert!(!Cell::new(i32::MIN, 0).is_neighbor(Cell::new(i32::MAX, i32::MAX)));
    }
}
