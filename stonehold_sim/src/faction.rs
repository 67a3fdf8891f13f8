// Factions: allegiance groups that decide who may fight whom.
//
// `FactionRegistry` owns every faction ever created, keyed by `FactionId`.
// Membership is the single source of truth for allegiance; a unit stores its
// faction id and `World` keeps the two in step when units join or die. A
// faction with no members is inactive and stops counting toward the active
// limit, but its id is never reused.
//
// See also: `world.rs` for the admission caps enforced at unit creation.

use crate::types::{FactionId, IdAllocator, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faction {
    pub members: BTreeSet<UnitId>,
}

impl Faction {
    pub fn is_active(&self) -> bool {
        !self.members.is_empty()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FactionRegistry {
    factions: BTreeMap<FactionId, Faction>,
    ids: IdAllocator,
}

impl FactionRegistry {
    /// Register a new, empty faction.
    pub fn create(&mut self) -> FactionId {
        let id = FactionId(self.ids.next_raw());
        self.factions.insert(id, Faction::default());
        tracing::info!(faction = %id, "faction created");
        id
    }

    pub fn get(&self, id: FactionId) -> Option<&Faction> {
        self.factions.get(&id)
    }

    pub fn contains(&self, id: FactionId) -> bool {
        self.factions.contains_key(&id)
    }

    pub fn add_member(&mut self, id: FactionId, unit: UnitId) -> bool {
        match self.factions.get_mut(&id) {
            Some(faction) => faction.members.insert(unit),
            None => false,
        }
    }

    pub fn remove_member(&mut self, id: FactionId, unit: UnitId) -> bool {
        self.factions
            .get_mut(&id)
            .is_some_and(|faction| faction.members.remove(&unit))
    }

    pub fn member_count(&self, id: FactionId) -> usize {
        self.factions.get(&id).map_or(0, |f| f.members.len())
    }

    /// Factions with at least one member, in id order.
    pub fn active(&self) -> impl Iterator<Item = FactionId> + '_ {
        self.factions
            .iter()
            .filter(|(_, f)| f.is_active())
            .map(|(&id, _)| id)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// The active faction with the fewest members. Ties go to the lowest id.
    pub fn smallest_active(&self) -> Option<FactionId> {
        self.factions
            .iter()
            .filter(|(_, f)| f.is_active())
            .min_by_key(|(id, f)| (f.members.len(), **id))
            .map(|(&id, _)| id)
    }
}
