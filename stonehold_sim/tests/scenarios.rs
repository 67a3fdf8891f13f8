// End-to-end scenarios for the simulation.
//
// Each test builds a small world from terrain codes, drives it only through
// the public API (commands plus `advance_time`) and checks observable state:
// terrain, unit activity, health, events. The property tests at the bottom
// replay seeded random edit sequences and compare the incremental
// connectivity tracker against a from-scratch flood fill.

use std::collections::{BTreeSet, VecDeque};

use stonehold_sim::config::SimConfig;
use stonehold_sim::event::{CombatOutcome, SimEventKind};
use stonehold_sim::geometry::{center_distance, cube_center, cube_of, face_neighbours};
use stonehold_sim::pathfinding::{path, route_length};
use stonehold_sim::prng::SimRng;
use stonehold_sim::types::{TerrainType, UnitId, VoxelCoord};
use stonehold_sim::unit::{ActivityKind, Stats, UnitSpec};
use stonehold_sim::world::World;

/// `codes[x][y][z]`, all Air.
fn air(sx: usize, sy: usize, sz: usize) -> Vec<Vec<Vec<i32>>> {
    vec![vec![vec![0; sz]; sy]; sx]
}

/// Air with a Rock floor at z = 0.
fn floored(sx: usize, sy: usize, sz: usize) -> Vec<Vec<Vec<i32>>> {
    let mut codes = air(sx, sy, sz);
    for plane in codes.iter_mut() {
        for column in plane.iter_mut() {
            column[0] = TerrainType::Rock.code();
        }
    }
    codes
}

fn run(world: &mut World, steps: usize, dt: f64) {
    for _ in 0..steps {
        world.advance_time(dt).unwrap();
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn working_rock_caves_in_the_wood_above() {
    let mut codes = air(3, 3, 3);
    codes[1][1][0] = TerrainType::Rock.code();
    codes[1][1][1] = TerrainType::Wood.code();
    codes[2][2][2] = TerrainType::Workshop.code();
    let mut world = World::from_codes(&codes, SimConfig::default(), 7).unwrap();
    assert!(world.is_solid_connected_to_border(VoxelCoord::new(1, 1, 1)));

    let miner = world
        .add_unit(UnitSpec::new(
            "Delver",
            VoxelCoord::new(0, 0, 0),
            Stats::new(50, 50, 50, 50),
        ))
        .unwrap();
    assert!(world.work_at(miner, VoxelCoord::new(1, 1, 0)));

    // 500 / 50 = 10 s of work; fifty 0.2 s steps fall just short.
    run(&mut world, 51, 0.2);
    assert_eq!(world.terrain(VoxelCoord::new(1, 1, 0)), Some(TerrainType::Air));
    assert_eq!(world.terrain(VoxelCoord::new(1, 1, 1)), Some(TerrainType::Wood));
    assert!(!world.is_solid_connected_to_border(VoxelCoord::new(1, 1, 1)));

    run(&mut world, 1, 0.2);
    assert_eq!(world.terrain(VoxelCoord::new(1, 1, 1)), Some(TerrainType::Air));
    assert_eq!(
        world.terrain(VoxelCoord::new(2, 2, 2)),
        Some(TerrainType::Workshop)
    );

    let changed: Vec<VoxelCoord> = world
        .drain_events()
        .into_iter()
        .filter_map(|e| match e.kind {
            SimEventKind::TerrainChanged { voxel, .. } => Some(voxel),
            _ => None,
        })
        .collect();
    assert_eq!(
        changed,
        vec![VoxelCoord::new(1, 1, 0), VoxelCoord::new(1, 1, 1)]
    );
}

#[test]
fn working_empty_air_just_ends() {
    let mut world = World::from_codes(&floored(20, 40, 10), SimConfig::default(), 1).unwrap();
    let unit = world
        .add_unit(UnitSpec::new(
            "Nori",
            VoxelCoord::new(0, 0, 1),
            Stats::new(25, 25, 25, 25),
        ))
        .unwrap();
    assert_eq!(world.unit(unit).unwrap().max_points(), 13);

    assert!(world.work_at(unit, VoxelCoord::new(0, 0, 1)));
    assert!(world.unit(unit).unwrap().is_working());
    // 500 / 25 = 20 s, plus one step of slack for float accumulation.
    run(&mut world, 101, 0.2);
    let unit = world.unit(unit).unwrap();
    assert!(!unit.is_working());
    assert_eq!(unit.activity_kind(), ActivityKind::Nothing);
    assert_eq!(unit.voxel(), VoxelCoord::new(0, 0, 1));
}

#[test]
fn a_fight_resolves_exactly_once() {
    for seed in 0..20 {
        let mut world = World::from_codes(&floored(6, 6, 3), SimConfig::default(), seed).unwrap();
        let stats = Stats::new(50, 50, 50, 50);
        let a = world
            .add_unit(UnitSpec::new("Balin", VoxelCoord::new(2, 2, 1), stats))
            .unwrap();
        let d = world
            .add_unit(UnitSpec::new("Bolg", VoxelCoord::new(3, 2, 1), stats))
            .unwrap();
        world.drain_events();

        assert!(world.fight(a, d));
        run(&mut world, 5, 0.2);

        let outcomes: Vec<CombatOutcome> = world
            .drain_events()
            .into_iter()
            .filter_map(|e| match e.kind {
                SimEventKind::CombatResolved { outcome, .. } => Some(outcome),
                _ => None,
            })
            .collect();
        assert_eq!(outcomes.len(), 1, "seed {seed}");

        let defender = world.unit(d).unwrap();
        match outcomes[0] {
            CombatOutcome::Dodged { to } => {
                assert_eq!(defender.health, 50.0);
                assert_eq!(defender.voxel(), to);
                assert_ne!(to, VoxelCoord::new(3, 2, 1));
            }
            CombatOutcome::Blocked => assert_eq!(defender.health, 50.0),
            CombatOutcome::Hit { damage, killed } => {
                assert_eq!(damage, 5.0);
                assert!(!killed);
                assert_eq!(defender.health, 45.0);
            }
        }
        assert_eq!(world.unit(a).unwrap().activity_kind(), ActivityKind::Nothing);
    }
}

#[test]
fn path_to_self_is_a_single_voxel() {
    let world = World::from_codes(&floored(4, 4, 3), SimConfig::default(), 0).unwrap();
    let here = VoxelCoord::new(1, 1, 1);
    assert_eq!(path(here, here, world.grid(), true), Ok(Some(vec![here])));
    assert_eq!(path(here, here, world.grid(), false), Ok(Some(vec![here])));
}

#[test]
fn losing_support_drops_a_unit_one_level() {
    let mut codes = floored(5, 5, 4);
    codes[2][2][1] = TerrainType::Rock.code();
    let mut world = World::from_codes(&codes, SimConfig::default(), 3).unwrap();
    let unit = world
        .add_unit(UnitSpec::new(
            "Oin",
            VoxelCoord::new(2, 2, 2),
            Stats::new(50, 50, 50, 50),
        ))
        .unwrap();

    world
        .set_terrain(VoxelCoord::new(2, 2, 1), TerrainType::Air)
        .unwrap();
    world.advance_time(0.1).unwrap();
    assert!(world.unit(unit).unwrap().is_falling());

    // One voxel at 3 voxels/s takes a third of a second.
    run(&mut world, 5, 0.1);
    let unit = world.unit(unit).unwrap();
    assert!(!unit.is_falling());
    assert_eq!(unit.voxel(), VoxelCoord::new(2, 2, 1));
    assert_eq!(unit.health, 40.0);
}

#[test]
fn the_dead_drop_what_they_carry() {
    let config = SimConfig {
        dodge_factor: 0.0,
        block_factor: 0.0,
        ..SimConfig::default()
    };
    let mut world = World::from_codes(&floored(6, 6, 3), config, 4).unwrap();
    let a = world
        .add_unit(UnitSpec::new(
            "Thorin",
            VoxelCoord::new(2, 2, 1),
            Stats::new(100, 50, 50, 75),
        ))
        .unwrap();
    let d = world
        .add_unit(UnitSpec::new(
            "Gob",
            VoxelCoord::new(3, 2, 1),
            Stats::new(25, 25, 25, 25),
        ))
        .unwrap();
    let log = world
        .add_item(
            stonehold_sim::types::ItemKind::Log,
            20,
            VoxelCoord::new(3, 2, 1),
        )
        .unwrap();
    assert!(world.work_at(d, VoxelCoord::new(3, 2, 1)));
    run(&mut world, 101, 0.2);
    assert_eq!(world.item(log).unwrap().carrier(), Some(d));

    // 13 health, 10 per hit: two blows.
    for _ in 0..2 {
        assert!(world.fight(a, d));
        run(&mut world, 5, 0.2);
    }
    assert!(!world.is_alive(d));
    let item = world.item(log).unwrap();
    assert_eq!(item.carrier(), None);
    assert_eq!(item.voxel(), Some(VoxelCoord::new(3, 2, 1)));
}

#[test]
fn spawned_units_fill_five_factions_then_balance() {
    let mut world = World::from_codes(&floored(12, 12, 3), SimConfig::default(), 21).unwrap();
    let units: Vec<UnitId> = (0..12).map(|_| world.spawn_unit().unwrap()).collect();
    assert_eq!(world.active_factions().len(), 5);
    let sizes: Vec<usize> = world
        .active_factions()
        .into_iter()
        .map(|f| world.faction_members(f).len())
        .collect();
    assert_eq!(sizes.iter().sum::<usize>(), 12);
    assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    for id in units {
        let unit = world.unit(id).unwrap();
        assert!(world.grid().is_standable(unit.voxel()));
        assert!((25..=100).contains(&unit.stats.strength));
    }
}

#[test]
fn same_seed_same_history() {
    fn play(seed: u64) -> Vec<(UnitId, VoxelCoord, f64)> {
        let mut world = World::from_codes(&floored(10, 10, 4), SimConfig::default(), seed).unwrap();
        for _ in 0..6 {
            let id = world.spawn_unit().unwrap();
            world.set_default_behavior(id, true);
        }
        run(&mut world, 200, 0.2);
        world
            .units()
            .map(|u| (u.id, u.voxel(), u.health))
            .collect()
    }
    assert_eq!(play(99), play(99));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Solid voxels reachable from the border through solid face neighbours.
fn flood_from_border(world: &World) -> BTreeSet<VoxelCoord> {
    let grid = world.grid();
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<VoxelCoord> = grid
        .coords()
        .filter(|&v| grid.is_on_border(v) && grid.is_solid(v))
        .collect();
    seen.extend(queue.iter().copied());
    while let Some(v) = queue.pop_front() {
        for n in face_neighbours(v) {
            if grid.is_solid(n) && seen.insert(n) {
                queue.push_back(n);
            }
        }
    }
    seen
}

fn assert_connectivity_matches_flood(world: &World) {
    let anchored = flood_from_border(world);
    for v in world.grid().coords() {
        assert_eq!(
            world.is_solid_connected_to_border(v),
            anchored.contains(&v),
            "mismatch at {v}"
        );
    }
}

/// Random solid blob inside an 8x8x8 box.
fn random_cave(rng: &mut SimRng) -> Vec<Vec<Vec<i32>>> {
    let mut codes = air(8, 8, 8);
    for plane in codes.iter_mut() {
        for column in plane.iter_mut() {
            for cell in column.iter_mut() {
                if rng.chance(0.55) {
                    *cell = if rng.chance(0.5) {
                        TerrainType::Rock.code()
                    } else {
                        TerrainType::Wood.code()
                    };
                }
            }
        }
    }
    codes
}

#[test]
fn connectivity_tracks_random_edits() {
    let mut rng = SimRng::new(0xC0FFEE);
    for round in 0..4 {
        let mut world = World::from_codes(&random_cave(&mut rng), SimConfig::default(), round).unwrap();
        assert_connectivity_matches_flood(&world);
        for _ in 0..60 {
            let v = VoxelCoord::new(
                rng.range_i32(0, 8),
                rng.range_i32(0, 8),
                rng.range_i32(0, 8),
            );
            if rng.chance(0.5) {
                world.collapse_cube(v);
            } else {
                // Items from earlier cave-ins can block a voxel; that is fine.
                let _ = world.set_terrain(v, TerrainType::Rock);
            }
            assert_connectivity_matches_flood(&world);
            if rng.chance(0.3) {
                world.advance_time(0.2).unwrap();
                assert_connectivity_matches_flood(&world);
            }
        }
        // After a flush nothing is left floating.
        world.advance_time(0.2).unwrap();
        let grid = world.grid();
        assert!(grid
            .coords()
            .filter(|&v| grid.is_solid(v))
            .all(|v| world.is_solid_connected_to_border(v)));
    }
}

#[test]
fn routes_are_connected_and_no_shorter_than_a_straight_line() {
    let mut rng = SimRng::new(17);
    let mut codes = floored(12, 12, 4);
    for plane in codes.iter_mut() {
        for column in plane.iter_mut() {
            if rng.chance(0.2) {
                column[1] = TerrainType::Rock.code();
            }
        }
    }
    let world = World::from_codes(&codes, SimConfig::default(), 0).unwrap();
    let grid = world.grid();
    let standable: Vec<VoxelCoord> = grid.coords().filter(|&v| grid.is_standable(v)).collect();

    let mut found = 0;
    for _ in 0..200 {
        let a = *rng.choose(&standable).unwrap();
        let b = *rng.choose(&standable).unwrap();
        for diagonal in [true, false] {
            let Ok(Some(route)) = path(a, b, grid, diagonal) else {
                continue;
            };
            found += 1;
            assert_eq!(route.first(), Some(&a));
            assert_eq!(route.last(), Some(&b));
            for pair in route.windows(2) {
                assert!(grid.is_passable(pair[1]));
                if diagonal {
                    assert!(pair[0].is_neighbour_of(pair[1]));
                } else {
                    assert!(face_neighbours(pair[0]).any(|n| n == pair[1]));
                }
            }
            assert!(route_length(&route) + 1e-9 >= center_distance(a, b));
        }
    }
    assert!(found > 100);
}

#[test]
fn centers_round_trip() {
    for x in -3..4 {
        for y in -3..4 {
            for z in -3..4 {
                let v = VoxelCoord::new(x, y, z);
                assert_eq!(cube_of(cube_center(v)), v);
            }
        }
    }
}

#[test]
fn health_and_stamina_stay_in_bounds() {
    let mut world = World::from_codes(&floored(10, 10, 5), SimConfig::default(), 5).unwrap();
    for _ in 0..10 {
        let id = world.spawn_unit().unwrap();
        world.set_default_behavior(id, true);
    }
    for _ in 0..600 {
        world.advance_time(0.2).unwrap();
        for unit in world.units() {
            let max = f64::from(unit.max_points());
            assert!((0.0..=max).contains(&unit.health), "{}", unit.health);
            assert!((0.0..=max).contains(&unit.stamina), "{}", unit.stamina);
            assert_eq!(
                unit.max_points(),
                (unit.stats.weight * unit.stats.toughness).div_ceil(50)
            );
        }
    }
}

#[test]
fn substeps_converge_on_a_straight_walk() {
    fn walk(steps: usize, dt: f64) -> VoxelCoord {
        let mut world = World::from_codes(&floored(10, 3, 3), SimConfig::default(), 0).unwrap();
        let unit = world
            .add_unit(UnitSpec::new(
                "Fili",
                VoxelCoord::new(1, 1, 1),
                Stats::new(50, 50, 50, 50),
            ))
            .unwrap();
        assert!(world.move_to(unit, VoxelCoord::new(8, 1, 1)));
        run(&mut world, steps, dt);
        world.unit(unit).unwrap().voxel()
    }
    // 7 voxels at 1.5 voxels/s is under 5 s; 8 s is plenty either way.
    let coarse = walk(40, 0.2);
    let fine = walk(160, 0.05);
    assert_eq!(coarse, VoxelCoord::new(8, 1, 1));
    assert_eq!(coarse, fine);
}
