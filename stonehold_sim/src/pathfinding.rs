// A* route planning over passable voxels.
//
// Standard A* with a `BinaryHeap` open set (min-heap via reversed ordering).
// Scores and predecessor links live in `FxHashMap`s keyed by `VoxelCoord`;
// the Fx hasher is unseeded, so iteration-independent lookups stay
// deterministic across runs and platforms.
//
// - Heuristic: Euclidean distance between voxel centers. Edge costs are the
//   same distance, so the heuristic is admissible and consistent.
// - Neighbourhood: 6-connected without diagonals, 26-connected with them.
// - Pruning: a neighbour that does not touch any solid voxel (see
//   `TerrainGrid::touches_solid`) is closed without being explored, which
//   keeps routes from floating through open air. The goal is exempt.
// - Tie-break: among entries with equal f-score the one pushed first wins
//   (insertion sequence), so the search prefers the first-found candidate.
// - Bound: after `max_expansions` expanded nodes the search gives up with
//   `PathError::ExpansionLimit`; exhausting the open set first means there
//   is no route (`Ok(None)`).
//
// See also: `activity.rs`, which re-plans from each voxel a moving unit
// reaches and abandons the move on either failure.
//
// **Determinism.** The search is a pure function of the grid and endpoints.
// Float ordering uses `total_cmp`.

use crate::error::PathError;
use crate::geometry::{FACE_OFFSETS, NEIGHBOUR_OFFSETS, center_distance};
use crate::grid::TerrainGrid;
use crate::types::VoxelCoord;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Expansion cap used by units when planning moves.
pub const DEFAULT_MAX_EXPANSIONS: usize = 400;

/// Entry in the A* open set.
struct OpenEntry {
    voxel: VoxelCoord,
    f_score: f64,
    sequence: u64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score.total_cmp(&other.f_score) == Ordering::Equal
            && self.sequence == other.sequence
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f, then earliest push, is greatest.
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Find a route from `start` to `goal` with the default expansion cap.
pub fn path(
    start: VoxelCoord,
    goal: VoxelCoord,
    grid: &TerrainGrid,
    allow_diagonal: bool,
) -> Result<Option<Vec<VoxelCoord>>, PathError> {
    find_path(grid, start, goal, allow_diagonal, DEFAULT_MAX_EXPANSIONS)
}

/// Find a route from `start` to `goal`, both ends included.
///
/// Returns `Ok(None)` when either endpoint is not passable or the reachable
/// space is exhausted, and `Err` when the expansion cap is hit first. A
/// route from a voxel to itself is the single-element `[start]`.
pub fn find_path(
    grid: &TerrainGrid,
    start: VoxelCoord,
    goal: VoxelCoord,
    allow_diagonal: bool,
    max_expansions: usize,
) -> Result<Option<Vec<VoxelCoord>>, PathError> {
    if !grid.is_passable(start) || !grid.is_passable(goal) {
        return Ok(None);
    }
    if start == goal {
        return Ok(Some(vec![start]));
    }

    let offsets: &[(i32, i32, i32)] = if allow_diagonal {
        &NEIGHBOUR_OFFSETS
    } else {
        &FACE_OFFSETS
    };

    let mut g_score: FxHashMap<VoxelCoord, f64> = FxHashMap::default();
    let mut came_from: FxHashMap<VoxelCoord, VoxelCoord> = FxHashMap::default();
    let mut closed: FxHashSet<VoxelCoord> = FxHashSet::default();
    let mut open = BinaryHeap::new();
    let mut sequence = 0u64;
    let mut expansions = 0usize;

    g_score.insert(start, 0.0);
    open.push(OpenEntry {
        voxel: start,
        f_score: center_distance(start, goal),
        sequence,
    });

    while let Some(current) = open.pop() {
        let voxel = current.voxel;
        if voxel == goal {
            tracing::trace!(%start, %goal, expansions, "route found");
            return Ok(Some(reconstruct_path(&came_from, start, goal)));
        }
        if !closed.insert(voxel) {
            continue;
        }
        if expansions >= max_expansions {
            tracing::trace!(%start, %goal, expansions, "route search abandoned");
            return Err(PathError::ExpansionLimit { expansions });
        }
        expansions += 1;

        let current_g = g_score[&voxel];
        for &(dx, dy, dz) in offsets {
            let neighbour = voxel.offset(dx, dy, dz);
            if closed.contains(&neighbour) || !grid.is_passable(neighbour) {
                continue;
            }
            if neighbour != goal && !grid.touches_solid(neighbour) {
                closed.insert(neighbour);
                continue;
            }

            let tentative_g = current_g + center_distance(voxel, neighbour);
            let known = g_score.get(&neighbour).copied().unwrap_or(f64::INFINITY);
            if tentative_g < known {
                g_score.insert(neighbour, tentative_g);
                came_from.insert(neighbour, voxel);
                sequence += 1;
                open.push(OpenEntry {
                    voxel: neighbour,
                    f_score: tentative_g + center_distance(neighbour, goal),
                    sequence,
                });
            }
        }
    }

    Ok(None)
}

/// Walk predecessor links back from the goal, then reverse.
fn reconstruct_path(
    came_from: &FxHashMap<VoxelCoord, VoxelCoord>,
    start: VoxelCoord,
    goal: VoxelCoord,
) -> Vec<VoxelCoord> {
    let mut route = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(&previous) => {
                route.push(previous);
                current = previous;
            }
            None => break,
        }
    }
    route.reverse();
    route
}

/// Sum of center-to-center distances along a route.
pub fn route_length(route: &[VoxelCoord]) -> f64 {
    route
        .windows(2)
        .map(|pair| center_distance(pair[0], pair[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TerrainType;

    /// Flat world: rock floor at z = 0, air above.
    fn floor_world(sx: usize, sy: usize, sz: usize) -> TerrainGrid {
        let mut grid = TerrainGrid::new(sx, sy, sz).unwrap();
        for x in 0..sx as i32 {
            for y in 0..sy as i32 {
                grid.set(VoxelCoord::new(x, y, 0), TerrainType::Rock);
            }
        }
        grid
    }

    fn assert_valid_route(route: &[VoxelCoord], start: VoxelCoord, goal: VoxelCoord, diag: bool) {
        assert_eq!(route.first(), Some(&start));
        assert_eq!(route.last(), Some(&goal));
        for pair in route.windows(2) {
            assert!(pair[0].is_neighbour_of(pair[1]));
            if !diag {
                let d = pair[0];
                let e = pair[1];
                let manhattan = (d.x - e.x).abs() + (d.y - e.y).abs() + (d.z - e.z).abs();
                assert_eq!(manhattan, 1, "diagonal step in 6-connected route");
            }
        }
        assert!(route_length(route) + 1e-9 >= center_distance(start, goal));
    }

    #[test]
    fn same_start_and_goal_is_single_element() {
        let grid = floor_world(4, 4, 3);
        let v = VoxelCoord::new(1, 1, 1);
        assert_eq!(path(v, v, &grid, true), Ok(Some(vec![v])));
    }

    #[test]
    fn straight_route_on_floor() {
        let grid = floor_world(8, 3, 3);
        let start = VoxelCoord::new(0, 1, 1);
        let goal = VoxelCoord::new(6, 1, 1);
        let route = path(start, goal, &grid, false).unwrap().unwrap();
        assert_valid_route(&route, start, goal, false);
        assert_eq!(route.len(), 7);
    }

    #[test]
    fn diagonal_routes_are_shorter_but_cost_more_per_step() {
        let grid = floor_world(8, 8, 3);
        let start = VoxelCoord::new(0, 0, 1);
        let goal = VoxelCoord::new(5, 5, 1);
        let diag = path(start, goal, &grid, true).unwrap().unwrap();
        let ortho = path(start, goal, &grid, false).unwrap().unwrap();
        assert_valid_route(&diag, start, goal, true);
        assert_valid_route(&ortho, start, goal, false);
        assert_eq!(diag.len(), 6);
        assert_eq!(ortho.len(), 11);
        assert!((route_length(&diag) - 5.0 * 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn route_goes_around_a_wall() {
        let mut grid = floor_world(7, 7, 3);
        for y in 0..6 {
            grid.set(VoxelCoord::new(3, y, 1), TerrainType::Rock);
            grid.set(VoxelCoord::new(3, y, 2), TerrainType::Rock);
        }
        let start = VoxelCoord::new(1, 1, 1);
        let goal = VoxelCoord::new(5, 1, 1);
        let route = path(start, goal, &grid, true).unwrap().unwrap();
        assert_valid_route(&route, start, goal, true);
        assert!(route.iter().any(|v| v.y == 6));
        assert!(route.iter().all(|&v| grid.is_passable(v)));
    }

    #[test]
    fn solid_goal_has_no_route() {
        let grid = floor_world(4, 4, 3);
        let start = VoxelCoord::new(0, 0, 1);
        assert_eq!(path(start, VoxelCoord::new(2, 2, 0), &grid, true), Ok(None));
        assert_eq!(path(start, VoxelCoord::new(9, 9, 9), &grid, true), Ok(None));
    }

    #[test]
    fn enclosed_goal_exhausts_open_set() {
        let mut grid = floor_world(6, 6, 3);
        // Box the goal in on all sides at z = 1 and cap it.
        let goal = VoxelCoord::new(4, 4, 1);
        for &(dx, dy, dz) in &NEIGHBOUR_OFFSETS {
            let n = goal.offset(dx, dy, dz);
            if grid.in_bounds(n) && n.z >= 1 {
                grid.set(n, TerrainType::Rock);
            }
        }
        let result = path(VoxelCoord::new(0, 0, 1), goal, &grid, true);
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn floating_space_is_not_used_as_waypoints() {
        // Tall empty column: voxels at z >= 2 touch no solid and are pruned.
        let grid = floor_world(6, 1, 6);
        let start = VoxelCoord::new(0, 0, 1);
        let goal = VoxelCoord::new(5, 0, 1);
        let route = path(start, goal, &grid, true).unwrap().unwrap();
        assert!(route.iter().all(|v| v.z == 1));
        // A goal high in the air is still reachable only if a touching chain exists.
        assert_eq!(path(start, VoxelCoord::new(3, 0, 4), &grid, true), Ok(None));
    }

    #[test]
    fn huge_unreachable_search_hits_expansion_cap() {
        let mut grid = floor_world(40, 40, 2);
        let goal = VoxelCoord::new(39, 39, 1);
        grid.set(VoxelCoord::new(38, 39, 1), TerrainType::Rock);
        grid.set(VoxelCoord::new(39, 38, 1), TerrainType::Rock);
        grid.set(VoxelCoord::new(38, 38, 1), TerrainType::Rock);
        let result = path(VoxelCoord::new(0, 0, 1), goal, &grid, true);
        assert_eq!(
            result,
            Err(PathError::ExpansionLimit {
                expansions: DEFAULT_MAX_EXPANSIONS
            })
        );
    }

    #[test]
    fn search_is_deterministic() {
        let grid = floor_world(10, 10, 3);
        let a = VoxelCoord::new(0, 0, 1);
        let b = VoxelCoord::new(9, 4, 1);
        assert_eq!(path(a, b, &grid, true), path(a, b, &grid, true));
    }
}
