// Portable items: logs and boulders.
//
// An item is either on the ground inside the world or carried by exactly one
// unit, never both; `ItemPlacement` makes the two cases exclusive. A carried
// item has no position of its own and follows its carrier. The carrier
// records the item id too (`Unit::carried`), and `World` updates both sides
// together in `pick_up_item` / `drop_item`.
//
// See also: `world.rs` for spawning, falling and the per-tick item pass,
// `activity.rs` for the work rules that pick up and consume items.

use crate::geometry::{cube_center, cube_of};
use crate::physics::FallState;
use crate::types::{ItemId, ItemKind, UnitId, VoxelCoord};
use glam::DVec3;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ItemPlacement {
    Ground {
        position: DVec3,
        fall: Option<FallState>,
    },
    Carried {
        by: UnitId,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub weight: u32,
    pub placement: ItemPlacement,
}

impl Item {
    /// A new item resting at the center of `voxel`.
    pub fn on_ground(id: ItemId, kind: ItemKind, weight: u32, voxel: VoxelCoord) -> Self {
        Self {
            id,
            kind,
            weight,
            placement: ItemPlacement::Ground {
                position: cube_center(voxel),
                fall: None,
            },
        }
    }

    /// The voxel the item lies in, or `None` while carried.
    pub fn voxel(&self) -> Option<VoxelCoord> {
        match self.placement {
            ItemPlacement::Ground { position, .. } => Some(cube_of(position)),
            ItemPlacement::Carried { .. } => None,
        }
    }

    pub fn carrier(&self) -> Option<UnitId> {
        match self.placement {
            ItemPlacement::Carried { by } => Some(by),
            ItemPlacement::Ground { .. } => None,
        }
    }

    pub fn is_falling(&self) -> bool {
        matches!(
            self.placement,
            ItemPlacement::Ground { fall: Some(_), .. }
        )
    }
}
