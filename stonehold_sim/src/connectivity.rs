// Incremental border-connectivity tracker.
//
// Classifies every solid voxel as *anchored* (a chain of face-adjacent solid
// voxels leads from it to one of the grid's six outer faces) or *floating*.
// Floating voxels are the ones that must cave in.
//
// ## Maintenance
//
// - Construction: one multi-source BFS seeded from every solid border voxel.
//   O(voxels), done once.
// - `change_solid_to_passable`: only the components touching the removed
//   voxel can lose their anchor. For each anchored face neighbour we run a
//   best-first search through anchored voxels, ordered by distance to the
//   nearest border face, and stop as soon as a border voxel is popped. If the
//   search exhausts its component without reaching the border, every voxel it
//   visited becomes floating and is reported. Neighbours already visited by a
//   successful search are skipped, so a removal costs at most one walk over
//   each affected component, never a whole-grid rescan.
// - `change_passable_to_solid`: a new solid voxel touching the border or an
//   anchored voxel becomes anchored and re-anchors any floating voxels it now
//   connects.
//
// Removing a floating voxel cannot disconnect anything (no anchored path runs
// through a floating voxel), which is what lets `World` feed reported voxels
// back through `change_solid_to_passable` from a plain work queue.
//
// See also: `world.rs`, which owns the tracker next to the `TerrainGrid` and
// keeps the two in lockstep.

use crate::geometry::face_neighbours;
use crate::grid::TerrainGrid;
use crate::types::VoxelCoord;
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cell {
    Passable,
    Anchored,
    Floating,
}

/// Logical mirror of the grid's solidity with a per-voxel anchor flag.
#[derive(Clone, Debug)]
pub struct BorderConnectivity {
    cells: Vec<Cell>,
    size_x: usize,
    size_y: usize,
    size_z: usize,
}

/// Frontier entry for the border search (min-heap via reversed ordering).
struct Frontier {
    border_distance: usize,
    index: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.border_distance == other.border_distance && self.index == other.index
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .border_distance
            .cmp(&self.border_distance)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl BorderConnectivity {
    /// Build the tracker for the current state of `grid`.
    pub fn new(grid: &TerrainGrid) -> Self {
        let mut tracker = Self {
            cells: vec![Cell::Passable; grid.len()],
            size_x: grid.size_x(),
            size_y: grid.size_y(),
            size_z: grid.size_z(),
        };

        let mut queue = VecDeque::new();
        for (i, coord) in grid.coords().enumerate() {
            if grid.is_solid(coord) {
                if grid.is_on_border(coord) {
                    tracker.cells[i] = Cell::Anchored;
                    queue.push_back(coord);
                } else {
                    tracker.cells[i] = Cell::Floating;
                }
            }
        }
        tracker.anchor_from(queue);
        tracker
    }

    /// Whether `voxel` is solid and reaches the border through solid voxels.
    pub fn is_solid_connected_to_border(&self, voxel: VoxelCoord) -> bool {
        self.cell(voxel) == Some(Cell::Anchored)
    }

    /// Whether the tracker believes `voxel` is solid.
    pub fn is_solid(&self, voxel: VoxelCoord) -> bool {
        matches!(self.cell(voxel), Some(Cell::Anchored | Cell::Floating))
    }

    /// Every solid voxel currently cut off from the border.
    pub fn floating_voxels(&self) -> Vec<VoxelCoord> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Cell::Floating)
            .map(|(i, _)| self.coord_of(i))
            .collect()
    }

    /// Mark `voxel` passable and return every other solid voxel that lost its
    /// border connection as a consequence. No-op for voxels that are already
    /// passable or out of bounds.
    pub fn change_solid_to_passable(&mut self, voxel: VoxelCoord) -> Vec<VoxelCoord> {
        let Some(i) = self.index(voxel) else {
            return Vec::new();
        };
        let previous = std::mem::replace(&mut self.cells[i], Cell::Passable);
        if previous != Cell::Anchored {
            return Vec::new();
        }

        let mut confirmed: FxHashSet<usize> = FxHashSet::default();
        let mut lost = Vec::new();

        for neighbour in face_neighbours(voxel) {
            let Some(ni) = self.index(neighbour) else {
                continue;
            };
            if self.cells[ni] != Cell::Anchored || confirmed.contains(&ni) {
                continue;
            }
            let (reached, visited) = self.search_border(ni);
            if reached {
                confirmed.extend(visited);
            } else {
                for vi in visited {
                    self.cells[vi] = Cell::Floating;
                    lost.push(self.coord_of(vi));
                }
            }
        }
        lost
    }

    /// Mark `voxel` solid. Returns the floating voxels (other than `voxel`)
    /// that became anchored again through it.
    pub fn change_passable_to_solid(&mut self, voxel: VoxelCoord) -> Vec<VoxelCoord> {
        let Some(i) = self.index(voxel) else {
            return Vec::new();
        };
        if self.cells[i] != Cell::Passable {
            return Vec::new();
        }
        self.cells[i] = Cell::Floating;

        let anchored = self.border_distance(i) == 0
            || face_neighbours(voxel).any(|n| self.cell(n) == Some(Cell::Anchored));
        if !anchored {
            return Vec::new();
        }

        self.cells[i] = Cell::Anchored;
        let mut queue = VecDeque::new();
        queue.push_back(voxel);
        let mut restored = self.anchor_from(queue);
        restored.retain(|&c| c != voxel);
        restored
    }

    /// Flood `Anchored` outward from the queued voxels through floating
    /// neighbours. Returns the voxels that changed.
    fn anchor_from(&mut self, mut queue: VecDeque<VoxelCoord>) -> Vec<VoxelCoord> {
        let mut changed = Vec::new();
        while let Some(current) = queue.pop_front() {
            for neighbour in face_neighbours(current) {
                if let Some(ni) = self.index(neighbour) {
                    if self.cells[ni] == Cell::Floating {
                        self.cells[ni] = Cell::Anchored;
                        changed.push(neighbour);
                        queue.push_back(neighbour);
                    }
                }
            }
        }
        changed
    }

    /// Best-first search from `start` through anchored voxels toward the
    /// nearest border. Returns whether the border was reached and every
    /// voxel visited on the way.
    fn search_border(&self, start: usize) -> (bool, Vec<usize>) {
        let mut visited: FxHashSet<usize> = FxHashSet::default();
        let mut order = Vec::new();
        let mut open = BinaryHeap::new();

        visited.insert(start);
        order.push(start);
        open.push(Frontier {
            border_distance: self.border_distance(start),
            index: start,
        });

        while let Some(Frontier {
            border_distance,
            index,
        }) = open.pop()
        {
            if border_distance == 0 {
                return (true, order);
            }
            for neighbour in face_neighbours(self.coord_of(index)) {
                let Some(ni) = self.index(neighbour) else {
                    continue;
                };
                if self.cells[ni] == Cell::Anchored && visited.insert(ni) {
                    order.push(ni);
                    open.push(Frontier {
                        border_distance: self.border_distance(ni),
                        index: ni,
                    });
                }
            }
        }
        (false, order)
    }

    fn cell(&self, voxel: VoxelCoord) -> Option<Cell> {
        self.index(voxel).map(|i| self.cells[i])
    }

    fn index(&self, c: VoxelCoord) -> Option<usize> {
        if c.x < 0 || c.y < 0 || c.z < 0 {
            return None;
        }
        let (x, y, z) = (c.x as usize, c.y as usize, c.z as usize);
        if x >= self.size_x || y >= self.size_y || z >= self.size_z {
            return None;
        }
        Some(x + y * self.size_x + z * self.size_x * self.size_y)
    }

    fn coord_of(&self, index: usize) -> VoxelCoord {
        let plane = self.size_x * self.size_y;
        let rem = index % plane;
        VoxelCoord::new(
            (rem % self.size_x) as i32,
            (rem / self.size_x) as i32,
            (index / plane) as i32,
        )
    }

    /// Steps to the closest of the six outer faces; 0 on the border.
    fn border_distance(&self, index: usize) -> usize {
        let c = self.coord_of(index);
        let (x, y, z) = (c.x as usize, c.y as usize, c.z as usize);
        x.min(y)
            .min(z)
            .min(self.size_x - 1 - x)
            .min(self.size_y - 1 - y)
            .min(self.size_z - 1 - z)
    }
}
