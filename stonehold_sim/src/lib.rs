// stonehold_sim: pure Rust cave-in simulation library.
//
// This crate holds all simulation logic for Stonehold: the voxel terrain,
// border connectivity and cave-ins, A* route planning, unit activities and
// combat, items, factions and the behavior-driver seam. It has no rendering
// or I/O dependencies and can be tested, benchmarked and run headless.
//
// Module overview:
// - `world.rs`:        World: owns everything, the tick loop, terrain writes, admission.
// - `grid.rs`:         Dense 3D terrain grid and support/standability queries.
// - `connectivity.rs`: Incremental "is this solid anchored to the border?" tracker.
// - `pathfinding.rs`:  Bounded A* over passable voxels.
// - `geometry.rs`:     Voxel centers, neighbour offsets, headings.
// - `physics.rs`:      Gravity for units and items.
// - `unit.rs`:         Unit state, stats, the activity state machine's data.
// - `activity.rs`:     Command handling and per-unit activity advancement.
// - `combat.rs`:       Attack wind-up and dodge/block/hit resolution.
// - `item.rs`:         Logs and boulders, on the ground or carried.
// - `faction.rs`:      Faction membership and auto-assignment helpers.
// - `behavior.rs`:     BehaviorDriver trait and the built-in random driver.
// - `command.rs`:      UnitCommand: every order a unit can be given.
// - `event.rs`:        Narrative SimEvents collected for the host.
// - `config.rs`:       SimConfig: all tunable parameters.
// - `names.rs`:        Unit name rules and random name generation.
// - `error.rs`:        SimError, PathError, StatsMaxed.
// - `types.rs`:        VoxelCoord, entity IDs, terrain and item kinds.
// - `prng`:            Re-exported from `stonehold_prng`.
//
// The companion crate `stonehold_cli` drives a world headless from the
// command line.
//
// **Critical constraint: determinism.** Given the same terrain, config, seed
// and command sequence, a world evolves identically. All randomness comes
// from the seeded `SimRng`; iteration-order-sensitive collections are
// `BTreeMap`/`BTreeSet`. No system time, no OS entropy.

pub mod activity;
pub mod behavior;
pub mod combat;
pub mod command;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod event;
pub mod faction;
pub mod geometry;
pub mod grid;
pub mod item;
pub mod names;
pub mod pathfinding;
pub mod physics;
pub use stonehold_prng as prng;
pub mod types;
pub mod unit;
pub mod world;
