// Falling physics shared by units and items.
//
// Anything resting on a passable voxel above the world floor drops straight
// down at a fixed speed until it reaches the vertical center of a voxel with
// support beneath it. A fall starts only once the body sits on the vertical
// axis through its voxel's center, so a unit in the middle of a step finishes
// the step first.
//
// `fall_step` integrates one time step and reports how many voxel centers
// were crossed. Units convert that into damage; items ignore it.
//
// See also: `activity.rs` (unit falling and fall damage), `world.rs` (item
// falling in the per-tick item pass).

use crate::geometry::{CENTER_EPSILON, cube_of, is_horizontally_centered};
use crate::grid::TerrainGrid;
use crate::types::VoxelCoord;
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// An ongoing fall. Stores the voxel level the fall began at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallState {
    pub start_level: i32,
}

/// Result of integrating one step of a fall.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FallProgress {
    /// Voxel centers passed this step, one per full level descended.
    pub levels: u32,
    /// The body reached a supported voxel center and stopped.
    pub landed: bool,
}

/// Whether a body at `position` should start falling.
pub fn should_fall(grid: &TerrainGrid, position: DVec3) -> bool {
    let cube = cube_of(position);
    is_horizontally_centered(position) && !grid.is_supported(cube)
}

/// Move a falling body down by `speed * dt`, stopping at the first supported
/// voxel center on the way.
pub fn fall_step(grid: &TerrainGrid, position: &mut DVec3, speed: f64, dt: f64) -> FallProgress {
    let mut remaining = speed * dt;
    let mut progress = FallProgress::default();

    loop {
        let cube = cube_of(*position);
        let mut target_z = cube.z as f64 + 0.5;
        if position.z <= target_z + CENTER_EPSILON {
            target_z -= 1.0;
        }
        let level = target_z.floor() as i32;
        if level < 0 {
            // Below the floor; clamp onto it.
            position.z = 0.5;
            progress.landed = true;
            break;
        }

        let distance = position.z - target_z;
        if remaining + CENTER_EPSILON < distance {
            position.z -= remaining;
            break;
        }
        remaining -= distance;
        position.z = target_z;
        progress.levels += 1;

        if grid.is_supported(VoxelCoord::new(cube.x, cube.y, level)) {
            progress.landed = true;
            break;
        }
    }
    progress
}
