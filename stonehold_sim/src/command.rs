// Commands that drive units.
//
// Every unit primitive is a `UnitCommand`. External drivers (a player UI, a
// script interpreter, the built-in `RandomBehavior`) hand commands to
// `World::issue(unit, command, origin)`, which validates and applies them in
// one place. Commands that are illegal in the current state (moving into rock,
// attacking an ally, working out of reach) are rejected as silent no-ops and
// `issue` reports `false`; nothing else changes.
//
// `CommandOrigin` separates player intent from autonomous decisions: a
// `Player` command switches the unit's default behavior off so the behavior
// driver does not override it on the next idle step.
//
// See also: `activity.rs` for the handlers behind `World::issue`,
// `behavior.rs` for the autonomous driver that emits these.

use crate::types::*;
use serde::{Deserialize, Serialize};

/// Who issued a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOrigin {
    /// An explicit instruction. Disables the unit's default behavior.
    Player,
    /// A decision made on the unit's behalf by its behavior driver.
    Autonomous,
}

/// A single unit primitive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum UnitCommand {
    /// Step into a neighbouring voxel. Each delta must be -1, 0 or 1 and not
    /// all zero. Completes atomically once started.
    MoveToAdjacent { dx: i32, dy: i32, dz: i32 },
    /// Plan a route to `target` and walk it.
    MoveTo { target: VoxelCoord },
    /// Work the voxel `target`, which must be the unit's own or a neighbour.
    Work { target: VoxelCoord },
    Rest,
    /// Attack an adjacent unit of another faction.
    Attack { target: UnitId },
    /// Walk toward another unit until adjacent to it.
    Follow { target: UnitId },
    StartSprinting,
    StopSprinting,
}
