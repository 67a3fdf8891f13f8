// Shared geometry helpers.
//
// Continuous positions are `glam::DVec3` in voxel units: the voxel
// `(x, y, z)` spans `[x, x+1) x [y, y+1) x [z, z+1)` and its center is at
// `+0.5` on every axis. This module converts between the two spaces,
// enumerates 6- and 26-neighbourhoods, and computes the velocity and facing
// used by moving units.
//
// See also: `types.rs` for `VoxelCoord`, `activity.rs` for the movement
// integration that consumes `velocity_towards` and `reached_or_passed`.

use crate::types::VoxelCoord;
use glam::DVec3;

/// Tolerance for "sitting at the voxel center" checks.
pub const CENTER_EPSILON: f64 = 1e-6;

/// The six face-sharing offsets.
pub const FACE_OFFSETS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// All 26 offsets of the 3x3x3 block minus the center, z-major order.
pub const NEIGHBOUR_OFFSETS: [(i32, i32, i32); 26] = {
    let mut out = [(0, 0, 0); 26];
    let mut i = 0;
    let mut dz = -1;
    while dz <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dx = -1;
            while dx <= 1 {
                if !(dx == 0 && dy == 0 && dz == 0) {
                    out[i] = (dx, dy, dz);
                    i += 1;
                }
                dx += 1;
            }
            dy += 1;
        }
        dz += 1;
    }
    out
};

/// Center point of a voxel.
pub fn cube_center(voxel: VoxelCoord) -> DVec3 {
    DVec3::new(
        voxel.x as f64 + 0.5,
        voxel.y as f64 + 0.5,
        voxel.z as f64 + 0.5,
    )
}

/// The voxel containing a point (floor on every axis).
pub fn cube_of(point: DVec3) -> VoxelCoord {
    VoxelCoord::new(
        point.x.floor() as i32,
        point.y.floor() as i32,
        point.z.floor() as i32,
    )
}

/// Euclidean distance between two voxel centers.
pub fn center_distance(a: VoxelCoord, b: VoxelCoord) -> f64 {
    cube_center(a).distance(cube_center(b))
}

pub fn face_neighbours(voxel: VoxelCoord) -> impl Iterator<Item = VoxelCoord> {
    FACE_OFFSETS
        .iter()
        .map(move |&(dx, dy, dz)| voxel.offset(dx, dy, dz))
}

/// Velocity of magnitude `speed` pointing from `from` to `to`. Zero when the
/// two points coincide.
pub fn velocity_towards(from: DVec3, to: DVec3, speed: f64) -> DVec3 {
    let delta = to - from;
    let len = delta.length();
    if len < CENTER_EPSILON {
        DVec3::ZERO
    } else {
        delta * (speed / len)
    }
}

/// Heading in the horizontal plane, `atan2(vy, vx)` in `[-pi, pi]`.
/// `None` for purely vertical or zero velocity, where heading is undefined.
pub fn heading_of(velocity: DVec3) -> Option<f64> {
    if velocity.x.abs() < CENTER_EPSILON && velocity.y.abs() < CENTER_EPSILON {
        None
    } else {
        Some(velocity.y.atan2(velocity.x))
    }
}

/// Heading from one point toward another; `None` when horizontally aligned.
pub fn heading_between(from: DVec3, to: DVec3) -> Option<f64> {
    heading_of(to - from)
}

/// Whether a moving point starting at `start` has reached or overshot
/// `target`. Uses distance from the start so float drift around the target
/// cannot make a unit oscillate.
pub fn reached_or_passed(start: DVec3, current: DVec3, target: DVec3) -> bool {
    start.distance(current) + CENTER_EPSILON >= start.distance(target)
}

/// Whether a point sits on the vertical axis through its voxel's center.
pub fn is_horizontally_centered(point: DVec3) -> bool {
    let center = cube_center(cube_of(point));
    (point.x - center.x).abs() < CENTER_EPSILON && (point.y - center.y).abs() < CENTER_EPSILON
}
