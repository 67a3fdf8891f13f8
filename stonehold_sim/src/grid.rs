// Dense 3D terrain grid.
//
// Stored as a flat `Vec<TerrainType>` indexed by `x + y * size_x + z * size_x
// * size_y`, giving O(1) read/write. Out-of-bounds reads return `None`, and
// the solidity helpers treat anything outside the grid as neither solid nor
// passable, so callers never walk a unit off the edge.
//
// The grid is the terrain truth; `connectivity.rs` mirrors its solidity and
// must be told about every solid-to-passable change. Only `World` mutates the
// grid so the two can never drift apart.
//
// See also: `world.rs` which owns the grid, `pathfinding.rs` which searches it.

use crate::error::SimError;
use crate::geometry::NEIGHBOUR_OFFSETS;
use crate::types::{TerrainType, VoxelCoord};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainGrid {
    /// Flat storage: index = x + y * size_x + z * size_x * size_y.
    cells: Vec<TerrainType>,
    size_x: usize,
    size_y: usize,
    size_z: usize,
}

impl TerrainGrid {
    /// A grid of the given size filled with `Air`.
    pub fn new(size_x: usize, size_y: usize, size_z: usize) -> Result<Self, SimError> {
        if size_x == 0 || size_y == 0 || size_z == 0 {
            return Err(SimError::DegenerateWorld(size_x, size_y, size_z));
        }
        Ok(Self {
            cells: vec![TerrainType::Air; size_x * size_y * size_z],
            size_x,
            size_y,
            size_z,
        })
    }

    /// Build a grid from terrain codes addressed as `codes[x][y][z]`.
    pub fn from_codes(codes: &[Vec<Vec<i32>>]) -> Result<Self, SimError> {
        let size_x = codes.len();
        let size_y = codes.first().map_or(0, Vec::len);
        let size_z = codes
            .first()
            .and_then(|plane| plane.first())
            .map_or(0, Vec::len);
        let mut grid = Self::new(size_x, size_y, size_z)?;

        for (x, plane) in codes.iter().enumerate() {
            if plane.len() != size_y {
                return Err(SimError::RaggedTerrain);
            }
            for (y, column) in plane.iter().enumerate() {
                if column.len() != size_z {
                    return Err(SimError::RaggedTerrain);
                }
                for (z, &code) in column.iter().enumerate() {
                    let at = VoxelCoord::new(x as i32, y as i32, z as i32);
                    let terrain = TerrainType::from_code(code)
                        .ok_or(SimError::UnknownTerrainCode { code, at })?;
                    grid.set(at, terrain);
                }
            }
        }
        Ok(grid)
    }

    pub fn size_x(&self) -> usize {
        self.size_x
    }

    pub fn size_y(&self) -> usize {
        self.size_y
    }

    pub fn size_z(&self) -> usize {
        self.size_z
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn in_bounds(&self, coord: VoxelCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && coord.z >= 0
            && (coord.x as usize) < self.size_x
            && (coord.y as usize) < self.size_y
            && (coord.z as usize) < self.size_z
    }

    /// Flat index of an in-bounds coordinate.
    pub fn index(&self, coord: VoxelCoord) -> Option<usize> {
        if self.in_bounds(coord) {
            let (x, y, z) = (coord.x as usize, coord.y as usize, coord.z as usize);
            Some(x + y * self.size_x + z * self.size_x * self.size_y)
        } else {
            None
        }
    }

    /// Inverse of `index`.
    pub fn coord_of(&self, index: usize) -> VoxelCoord {
        let plane = self.size_x * self.size_y;
        let z = index / plane;
        let rem = index % plane;
        VoxelCoord::new(
            (rem % self.size_x) as i32,
            (rem / self.size_x) as i32,
            z as i32,
        )
    }

    pub fn get(&self, coord: VoxelCoord) -> Option<TerrainType> {
        self.index(coord).map(|i| self.cells[i])
    }

    /// Write a voxel, returning the previous terrain. No-op out of bounds.
    pub fn set(&mut self, coord: VoxelCoord, terrain: TerrainType) -> Option<TerrainType> {
        let i = self.index(coord)?;
        Some(std::mem::replace(&mut self.cells[i], terrain))
    }

    pub fn is_solid(&self, coord: VoxelCoord) -> bool {
        self.get(coord).is_some_and(TerrainType::is_solid)
    }

    pub fn is_passable(&self, coord: VoxelCoord) -> bool {
        self.get(coord).is_some_and(TerrainType::is_passable)
    }

    /// On one of the six outer faces of the grid.
    pub fn is_on_border(&self, coord: VoxelCoord) -> bool {
        self.in_bounds(coord)
            && (coord.x == 0
                || coord.y == 0
                || coord.z == 0
                || coord.x as usize == self.size_x - 1
                || coord.y as usize == self.size_y - 1
                || coord.z as usize == self.size_z - 1)
    }

    /// Something to stand on: the world floor or a solid voxel below.
    pub fn is_supported(&self, coord: VoxelCoord) -> bool {
        coord.z == 0 || self.is_solid(coord.below())
    }

    /// A passable voxel a unit may be placed in.
    pub fn is_standable(&self, coord: VoxelCoord) -> bool {
        self.is_passable(coord) && self.is_supported(coord)
    }

    /// Whether any of the 26 surrounding voxels is solid. Voxels on the world
    /// floor count as touching solid ground.
    pub fn touches_solid(&self, coord: VoxelCoord) -> bool {
        coord.z == 0
            || NEIGHBOUR_OFFSETS
                .iter()
                .any(|&(dx, dy, dz)| self.is_solid(coord.offset(dx, dy, dz)))
    }

    /// Every coordinate in flat-index order.
    pub fn coords(&self) -> impl Iterator<Item = VoxelCoord> + '_ {
        (0..self.cells.len()).map(|i| self.coord_of(i))
    }
}
