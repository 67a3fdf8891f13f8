// Narrative events emitted by the simulation.
//
// The world appends a `SimEvent` whenever something observable happens:
// terrain changes (direct or cascaded), loot drops, spawns, deaths, level-ups,
// combat outcomes and workshop improvements. Renderers and drivers drain the
// log with `World::drain_events()`; the simulation never reads it back, so
// dropping events on the floor changes nothing.
//
// `TerrainChanged` is the terrain-change notification: exactly one event per
// voxel whose terrain actually changed, in the order the changes were applied.
//
// See also: `world.rs` which owns the `EventLog`, `combat.rs` for
// `CombatOutcome` construction.
//
// **Critical constraint: determinism.** Events are appended in simulation
// order, so two identical runs produce identical logs.

use crate::types::*;
use serde::{Deserialize, Serialize};

/// A narrative event stamped with the world time at which it happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Seconds of simulated time since the world was built.
    pub time: f64,
    pub kind: SimEventKind,
}

/// How a resolved attack turned out.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CombatOutcome {
    /// The defender stepped aside into another voxel.
    Dodged { to: VoxelCoord },
    /// The defender parried the blow.
    Blocked,
    /// The blow landed.
    Hit { damage: f64, killed: bool },
}

/// Types of narrative events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimEventKind {
    /// A voxel's terrain changed.
    TerrainChanged {
        voxel: VoxelCoord,
        terrain: TerrainType,
    },
    /// A collapsing voxel left an item behind.
    ItemDropped {
        item: ItemId,
        kind: ItemKind,
        voxel: VoxelCoord,
    },
    UnitSpawned {
        unit: UnitId,
        faction: FactionId,
        voxel: VoxelCoord,
    },
    UnitDied { unit: UnitId, name: String },
    LevelUp { unit: UnitId, stat: Stat, value: u32 },
    CombatResolved {
        attacker: UnitId,
        defender: UnitId,
        outcome: CombatOutcome,
    },
    /// A unit combined a log and a boulder at a workshop.
    Workshop { unit: UnitId, voxel: VoxelCoord },
}

/// Append-only event buffer drained by the driver.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<SimEvent>,
}

impl EventLog {
    pub fn push(&mut self, time: f64, kind: SimEventKind) {
        self.events.push(SimEvent { time, kind });
    }

    /// Remove and return every buffered event, oldest first.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
