// Core types shared across the simulation.
//
// Defines integer voxel coordinates (`VoxelCoord`), the terrain enumeration
// with its solidity rule, compact entity identifiers, and the small enums
// (item kinds, unit stats) that several modules exchange. Everything derives
// serde so worlds and events can be dumped as JSON.
//
// **Determinism.** Identifiers are handed out from monotonically increasing
// counters owned by `World`, never from OS entropy, so two worlds driven by
// the same seed and commands assign identical ids.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A voxel position in the terrain grid.
///
/// X and Y span the horizontal plane; Z is vertical with `z = 0` the world
/// floor. Derives `Ord` so coordinates can key `BTreeMap`/`BTreeSet`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The voxel directly underneath.
    pub const fn below(self) -> Self {
        self.offset(0, 0, -1)
    }

    /// Largest per-axis difference (king-move distance in 3D).
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        (self.x - other.x)
            .unsigned_abs()
            .max((self.y - other.y).unsigned_abs())
            .max((self.z - other.z).unsigned_abs())
    }

    /// `true` for the 26 voxels sharing a face, edge or corner with `self`.
    pub fn is_neighbour_of(self, other: Self) -> bool {
        self.chebyshev_distance(other) == 1
    }

    /// `true` for `self` and its 26 neighbours.
    pub fn is_adjacent_or_same(self, other: Self) -> bool {
        self.chebyshev_distance(other) <= 1
    }
}

impl fmt::Display for VoxelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Terrain material of a single voxel.
///
/// The numeric codes are the external world-description format:
/// 0 = Air, 1 = Rock, 2 = Wood, 3 = Workshop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainType {
    #[default]
    Air,
    Rock,
    Wood,
    Workshop,
}

impl TerrainType {
    pub const ALL: [TerrainType; 4] = [Self::Air, Self::Rock, Self::Wood, Self::Workshop];

    /// Rock and Wood are solid; Air and Workshop can be occupied.
    pub const fn is_solid(self) -> bool {
        matches!(self, Self::Rock | Self::Wood)
    }

    pub const fn is_passable(self) -> bool {
        !self.is_solid()
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Air),
            1 => Some(Self::Rock),
            2 => Some(Self::Wood),
            3 => Some(Self::Workshop),
            _ => None,
        }
    }

    pub const fn code(self) -> i32 {
        match self {
            Self::Air => 0,
            Self::Rock => 1,
            Self::Wood => 2,
            Self::Workshop => 3,
        }
    }

    /// The item a collapsing voxel of this terrain may leave behind.
    pub const fn loot(self) -> Option<ItemKind> {
        match self {
            Self::Rock => Some(ItemKind::Boulder),
            Self::Wood => Some(ItemKind::Log),
            Self::Air | Self::Workshop => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Entity IDs: compact sequential integers
// ---------------------------------------------------------------------------

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

entity_id!(/// Identifier of a unit, unique for the lifetime of its world.
UnitId);
entity_id!(/// Identifier of a log or boulder.
ItemId);
entity_id!(/// Identifier of a faction.
FactionId);

/// Hands out sequential ids. Ids are never reused, so a stale id held by a
/// driver simply stops resolving once its entity is gone.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn next_raw(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

// ---------------------------------------------------------------------------
// Small enums
// ---------------------------------------------------------------------------

/// Kind of portable material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    Log,
    Boulder,
}

/// Unit attribute raised by a level-up or a workshop improvement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stat {
    Strength,
    Agility,
    Toughness,
    Weight,
}
