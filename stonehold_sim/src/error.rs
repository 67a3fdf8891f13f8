// Error types for the simulation.
//
// Three families, kept separate because callers react to them differently:
// - `SimError`: construction and admission failures plus API misuse. These
//   are hard failures; the object or entity is not created.
// - `PathError`: the A* expansion cap was hit. Recoverable; the caller
//   abandons the route.
// - `StatsMaxed`: a level-up found every stat at the cap. The caller decides
//   what to do with the surplus experience.
//
// Illegal unit commands (moving into rock, attacking an ally, ...) are not
// errors at all: they are rejected silently and report `false`.

use crate::types::{FactionId, ItemId, UnitId, VoxelCoord};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("world dimensions must all be positive, got {0}x{1}x{2}")]
    DegenerateWorld(usize, usize, usize),

    #[error("unknown terrain code {code} at {at}")]
    UnknownTerrainCode { code: i32, at: VoxelCoord },

    #[error("terrain rows have inconsistent lengths")]
    RaggedTerrain,

    #[error("invalid unit name {0:?}")]
    InvalidName(String),

    #[error("{stat} must lie in [{min}, {max}], got {value}")]
    StatOutOfRange {
        stat: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("weight {weight} is below (strength + agility) / 2 = {minimum}")]
    WeightTooLow { weight: u32, minimum: u32 },

    #[error("item weight {0} is outside the allowed range")]
    InvalidItemWeight(u32),

    #[error("{0} lies outside the world")]
    OutOfBounds(VoxelCoord),

    #[error("{0} is not a passable voxel with solid ground beneath")]
    UnsupportedPosition(VoxelCoord),

    #[error("the world already holds the maximum of {0} units")]
    WorldFull(usize),

    #[error("{faction} already holds the maximum of {limit} units")]
    FactionFull { faction: FactionId, limit: usize },

    #[error("no more than {0} factions may be active at once")]
    TooManyFactions(usize),

    #[error("unknown faction {0}")]
    UnknownFaction(FactionId),

    #[error("{0} is occupied and cannot become solid")]
    OccupiedVoxel(VoxelCoord),

    #[error("no passable supported voxel is available for spawning")]
    NoSpawnLocation,

    #[error("time step {0} is outside (0, {1}]")]
    InvalidTimeStep(f64, f64),

    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),

    #[error("unknown item {0}")]
    UnknownItem(ItemId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A* gave up after expanding its maximum number of nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path search abandoned after {expansions} expansions")]
    ExpansionLimit { expansions: usize },
}

/// Every levelable stat is already at its cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("all stats are at the maximum of {cap}")]
pub struct StatsMaxed {
    pub cap: u32,
}
