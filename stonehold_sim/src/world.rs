// The world: terrain, connectivity, entities and the fixed-step tick.
//
// `World` owns everything the simulation mutates:
// - the `TerrainGrid` and its `BorderConnectivity` mirror, always changed
//   together through `change_terrain`,
// - the pending-collapse queue (`BTreeSet`, so flush order is deterministic),
// - units, items and factions keyed by compact ids in `BTreeMap`s,
// - the world `SimRng`, the behavior driver and the narrative event log.
//
// Entities never hold references to one another or to the world. A unit
// names its carried item by id, an attack names its target by id, and every
// cross-entity rule runs as a `World` method that looks both sides up.
//
// ## One step (`advance_time`)
//
// 1. Flush the collapses queued before this step. A queued voxel caves in
//    only if it is still solid and still floating; caving rolls loot, turns
//    the voxel to Air and emits `TerrainChanged`.
// 2. Advance every unit (`activity.rs`). An error in one unit is logged and
//    skipped; the others still run.
// 3. Advance every log, then every boulder (falling only).
//
// A voxel cleared during a step (`collapse_cube`, `set_terrain`) changes at
// once; the voxels it disconnects join the queue and cave in at the start of
// the next step.
//
// See also: `activity.rs` and `combat.rs` for the unit half of the tick,
// `connectivity.rs` for the incremental anchor tracking, `behavior.rs` for
// the driver consulted by idle units.
//
// **Critical constraint: determinism.** All randomness comes from the world
// `SimRng`. Iteration is over `BTreeMap`/`BTreeSet` only.

use crate::behavior::{BehaviorDriver, RandomBehavior};
use crate::config::SimConfig;
use crate::connectivity::BorderConnectivity;
use crate::error::SimError;
use crate::event::{EventLog, SimEvent, SimEventKind};
use crate::faction::FactionRegistry;
use crate::geometry::cube_center;
use crate::grid::TerrainGrid;
use crate::item::{Item, ItemPlacement};
use crate::names::{generate_name, validate_name};
use crate::pathfinding::find_path;
use crate::physics::{FallState, fall_step, should_fall};
use crate::types::*;
use crate::unit::{Activity, Stats, Unit, UnitSpec};
use std::collections::{BTreeMap, BTreeSet};
use stonehold_prng::SimRng;

/// Random picks tried by `random_reachable_voxel` before giving up.
const REACHABLE_ATTEMPTS: usize = 8;

pub struct World {
    pub(crate) config: SimConfig,
    pub(crate) grid: TerrainGrid,
    pub(crate) connectivity: BorderConnectivity,
    pub(crate) pending_collapses: BTreeSet<VoxelCoord>,
    pub(crate) units: BTreeMap<UnitId, Unit>,
    pub(crate) items: BTreeMap<ItemId, Item>,
    pub(crate) factions: FactionRegistry,
    unit_ids: IdAllocator,
    item_ids: IdAllocator,
    pub(crate) rng: SimRng,
    pub(crate) behavior: Option<Box<dyn BehaviorDriver>>,
    pub(crate) events: EventLog,
    pub(crate) time: f64,
}

impl World {
    /// Build a world around an existing grid. Solids that are already
    /// floating are queued to cave in on the first step.
    pub fn new(grid: TerrainGrid, config: SimConfig, seed: u64) -> Result<Self, SimError> {
        config.validate()?;
        let connectivity = BorderConnectivity::new(&grid);
        let pending_collapses: BTreeSet<VoxelCoord> =
            connectivity.floating_voxels().into_iter().collect();
        if !pending_collapses.is_empty() {
            tracing::debug!(
                count = pending_collapses.len(),
                "initial terrain has floating solids"
            );
        }
        let mut rng = SimRng::new(seed);
        let behavior: Box<dyn BehaviorDriver> = Box::new(RandomBehavior::new(rng.fork()));
        Ok(Self {
            config,
            grid,
            connectivity,
            pending_collapses,
            units: BTreeMap::new(),
            items: BTreeMap::new(),
            factions: FactionRegistry::default(),
            unit_ids: IdAllocator::default(),
            item_ids: IdAllocator::default(),
            rng,
            behavior: Some(behavior),
            events: EventLog::default(),
            time: 0.0,
        })
    }

    /// Build a world from terrain codes addressed as `codes[x][y][z]`
    /// (0 = Air, 1 = Rock, 2 = Wood, 3 = Workshop).
    pub fn from_codes(
        codes: &[Vec<Vec<i32>>],
        config: SimConfig,
        seed: u64,
    ) -> Result<Self, SimError> {
        Self::new(TerrainGrid::from_codes(codes)?, config, seed)
    }

    /// Replace the driver consulted by idle units with default behavior.
    pub fn set_behavior_driver(&mut self, driver: Box<dyn BehaviorDriver>) {
        self.behavior = Some(driver);
    }

    // -----------------------------------------------------------------------
    // Terrain
    // -----------------------------------------------------------------------

    pub fn grid(&self) -> &TerrainGrid {
        &self.grid
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn terrain(&self, voxel: VoxelCoord) -> Option<TerrainType> {
        self.grid.get(voxel)
    }

    pub fn is_passable(&self, voxel: VoxelCoord) -> bool {
        self.grid.is_passable(voxel)
    }

    pub fn is_supported(&self, voxel: VoxelCoord) -> bool {
        self.grid.is_supported(voxel)
    }

    pub fn is_solid_connected_to_border(&self, voxel: VoxelCoord) -> bool {
        self.connectivity.is_solid_connected_to_border(voxel)
    }

    /// Voxels that will cave in at the start of the next step.
    pub fn pending_collapses(&self) -> impl Iterator<Item = VoxelCoord> + '_ {
        self.pending_collapses.iter().copied()
    }

    /// Change a voxel's terrain. A voxel holding a unit or a resting item
    /// cannot become solid.
    pub fn set_terrain(&mut self, voxel: VoxelCoord, terrain: TerrainType) -> Result<(), SimError> {
        if !self.grid.in_bounds(voxel) {
            return Err(SimError::OutOfBounds(voxel));
        }
        if terrain.is_solid() && self.is_occupied(voxel) {
            return Err(SimError::OccupiedVoxel(voxel));
        }
        self.change_terrain(voxel, terrain);
        Ok(())
    }

    /// Cave in a solid voxel now: roll for loot, turn it to Air and queue
    /// whatever it disconnects. Returns `false` for anything not solid.
    pub fn collapse_cube(&mut self, voxel: VoxelCoord) -> bool {
        let Some(terrain) = self.grid.get(voxel).filter(|t| t.is_solid()) else {
            return false;
        };
        let loot = terrain
            .loot()
            .filter(|_| self.rng.chance(self.config.loot_chance));
        self.change_terrain(voxel, TerrainType::Air);
        tracing::debug!(%voxel, ?terrain, ?loot, "voxel caved in");
        if let Some(kind) = loot {
            let weight = self.random_item_weight();
            let id = self.insert_item(kind, weight, voxel);
            self.events.push(
                self.time,
                SimEventKind::ItemDropped {
                    item: id,
                    kind,
                    voxel,
                },
            );
        }
        true
    }

    /// The single path for terrain writes: keeps grid, tracker, collapse
    /// queue and event log in lockstep.
    fn change_terrain(&mut self, voxel: VoxelCoord, terrain: TerrainType) {
        let Some(old) = self.grid.set(voxel, terrain) else {
            return;
        };
        if old == terrain {
            return;
        }
        match (old.is_solid(), terrain.is_solid()) {
            (true, false) => {
                let lost = self.connectivity.change_solid_to_passable(voxel);
                if !lost.is_empty() {
                    tracing::debug!(%voxel, count = lost.len(), "voxels lost their anchor");
                }
                self.pending_collapses.extend(lost);
            }
            (false, true) => {
                self.connectivity.change_passable_to_solid(voxel);
                if !self.connectivity.is_solid_connected_to_border(voxel) {
                    self.pending_collapses.insert(voxel);
                }
            }
            _ => {}
        }
        self.events
            .push(self.time, SimEventKind::TerrainChanged { voxel, terrain });
    }

    fn flush_collapses(&mut self) {
        let pending = std::mem::take(&mut self.pending_collapses);
        for voxel in pending {
            if self.grid.is_solid(voxel) && !self.connectivity.is_solid_connected_to_border(voxel)
            {
                self.collapse_cube(voxel);
            }
        }
    }

    fn is_occupied(&self, voxel: VoxelCoord) -> bool {
        self.units.values().any(|u| u.voxel() == voxel)
            || self.items.values().any(|i| i.voxel() == Some(voxel))
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Seconds of simulated time since construction.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Advance the whole world by `dt` seconds, `0 < dt <= max_time_step`.
    pub fn advance_time(&mut self, dt: f64) -> Result<(), SimError> {
        let max = self.config.max_time_step;
        if !(dt > 0.0 && dt <= max) {
            return Err(SimError::InvalidTimeStep(dt, max));
        }
        self.time += dt;
        self.flush_collapses();

        let unit_ids: Vec<UnitId> = self.units.keys().copied().collect();
        for id in unit_ids {
            if !self.units.contains_key(&id) {
                continue;
            }
            if let Err(err) = self.advance_unit(id, dt) {
                tracing::warn!(unit = %id, %err, "unit update skipped");
            }
        }

        for kind in [ItemKind::Log, ItemKind::Boulder] {
            let item_ids: Vec<ItemId> = self
                .items
                .values()
                .filter(|i| i.kind == kind)
                .map(|i| i.id)
                .collect();
            for id in item_ids {
                if let Err(err) = self.advance_item(id, dt) {
                    tracing::warn!(item = %id, %err, "item update skipped");
                }
            }
        }
        Ok(())
    }

    /// Items only fall; carried items ride along with their unit.
    fn advance_item(&mut self, id: ItemId, dt: f64) -> Result<(), SimError> {
        let item = self.items.get_mut(&id).ok_or(SimError::UnknownItem(id))?;
        if let ItemPlacement::Ground { position, fall } = &mut item.placement {
            if fall.is_none() && should_fall(&self.grid, *position) {
                *fall = Some(FallState {
                    start_level: crate::geometry::cube_of(*position).z,
                });
            }
            if fall.is_some() {
                let progress = fall_step(&self.grid, position, self.config.fall_speed, dt);
                if progress.landed {
                    *fall = None;
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Units and factions
    // -----------------------------------------------------------------------

    /// Register an empty faction that units can later be added to.
    pub fn create_faction(&mut self) -> FactionId {
        self.factions.create()
    }

    /// Create a unit from an explicit spec.
    pub fn add_unit(&mut self, spec: UnitSpec) -> Result<UnitId, SimError> {
        if self.units.len() >= self.config.max_units {
            return Err(SimError::WorldFull(self.config.max_units));
        }
        if !self.grid.in_bounds(spec.voxel) {
            return Err(SimError::OutOfBounds(spec.voxel));
        }
        if !self.grid.is_standable(spec.voxel) {
            return Err(SimError::UnsupportedPosition(spec.voxel));
        }
        validate_name(&spec.name)?;
        spec.stats
            .validate(self.config.initial_stat_min, self.config.initial_stat_max)?;

        let faction = self.admit_to_faction(spec.faction)?;
        let id = UnitId(self.unit_ids.next_raw());
        let voxel = spec.voxel;
        let unit = Unit::new(id, faction, spec, &self.config)?;
        self.factions.add_member(faction, id);
        tracing::debug!(unit = %id, name = %unit.name, %faction, %voxel, "unit added");
        self.units.insert(id, unit);
        self.events
            .push(self.time, SimEventKind::UnitSpawned { unit: id, faction, voxel });
        Ok(id)
    }

    /// Create a unit with a random name, random stats and a random standable
    /// position. Spawned units start with default behavior enabled.
    pub fn spawn_unit(&mut self) -> Result<UnitId, SimError> {
        if self.units.len() >= self.config.max_units {
            return Err(SimError::WorldFull(self.config.max_units));
        }
        let (low, high) = (self.config.initial_stat_min, self.config.initial_stat_max);
        let name = generate_name(&mut self.rng);
        let strength = self.rng.range_u32_inclusive(low, high);
        let agility = self.rng.range_u32_inclusive(low, high);
        let toughness = self.rng.range_u32_inclusive(low, high);
        let min_weight = ((strength + agility) / 2).max(low);
        let weight = self.rng.range_u32_inclusive(min_weight, high);

        let spots: Vec<VoxelCoord> = self
            .grid
            .coords()
            .filter(|&v| self.grid.is_standable(v))
            .collect();
        let voxel = *self.rng.choose(&spots).ok_or(SimError::NoSpawnLocation)?;

        let spec = UnitSpec::new(name, voxel, Stats::new(strength, agility, toughness, weight))
            .with_default_behavior(true);
        self.add_unit(spec)
    }

    /// Pick the faction a new unit joins, enforcing the faction caps.
    fn admit_to_faction(&mut self, requested: Option<FactionId>) -> Result<FactionId, SimError> {
        let per_faction = self.config.max_units_per_faction;
        let max_active = self.config.max_active_factions;
        match requested {
            Some(faction) => {
                let Some(existing) = self.factions.get(faction) else {
                    return Err(SimError::UnknownFaction(faction));
                };
                if existing.members.len() >= per_faction {
                    return Err(SimError::FactionFull {
                        faction,
                        limit: per_faction,
                    });
                }
                if !existing.is_active() && self.factions.active_count() >= max_active {
                    return Err(SimError::TooManyFactions(max_active));
                }
                Ok(faction)
            }
            None if self.factions.active_count() < max_active => Ok(self.factions.create()),
            None => {
                let faction = self
                    .factions
                    .smallest_active()
                    .ok_or(SimError::TooManyFactions(max_active))?;
                if self.factions.member_count(faction) >= per_faction {
                    return Err(SimError::FactionFull {
                        faction,
                        limit: per_faction,
                    });
                }
                Ok(faction)
            }
        }
    }

    /// Remove a unit for good. Its carried item drops where it stood.
    pub(crate) fn terminate_unit(&mut self, id: UnitId) {
        let Some(unit) = self.units.remove(&id) else {
            return;
        };
        if let Some(item_id) = unit.carried {
            if let Some(item) = self.items.get_mut(&item_id) {
                item.placement = ItemPlacement::Ground {
                    position: cube_center(unit.voxel()),
                    fall: None,
                };
            }
        }
        self.factions.remove_member(unit.faction, id);
        tracing::info!(unit = %id, name = %unit.name, voxel = %unit.voxel(), "unit died");
        self.events.push(
            self.time,
            SimEventKind::UnitDied {
                unit: id,
                name: unit.name,
            },
        );
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn is_alive(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    pub fn faction_of(&self, id: UnitId) -> Option<FactionId> {
        self.units.get(&id).map(|u| u.faction)
    }

    pub fn faction_members(&self, faction: FactionId) -> Vec<UnitId> {
        self.factions
            .get(faction)
            .map(|f| f.members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn active_factions(&self) -> Vec<FactionId> {
        self.factions.active().collect()
    }

    /// Two distinct living units of different factions.
    pub fn are_enemies(&self, a: UnitId, b: UnitId) -> bool {
        match (self.units.get(&a), self.units.get(&b)) {
            (Some(x), Some(y)) => a != b && x.faction != y.faction,
            _ => false,
        }
    }

    /// Whether any unit is winding up an attack on `id`.
    pub fn is_under_attack(&self, id: UnitId) -> bool {
        self.units
            .values()
            .any(|u| matches!(u.activity, Activity::Attack(a) if a.target == id))
    }

    /// A random standable voxel that `from` has a route to, if one turns up
    /// within a few tries.
    pub fn random_reachable_voxel(&mut self, from: VoxelCoord) -> Option<VoxelCoord> {
        let spots: Vec<VoxelCoord> = self
            .grid
            .coords()
            .filter(|&v| self.grid.is_standable(v))
            .collect();
        for _ in 0..REACHABLE_ATTEMPTS {
            let candidate = *self.rng.choose(&spots)?;
            let route = find_path(
                &self.grid,
                from,
                candidate,
                self.config.path_allow_diagonal,
                self.config.path_max_expansions,
            );
            if matches!(route, Ok(Some(_))) {
                return Some(candidate);
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Place an item of a given weight at a passable voxel. It falls if
    /// nothing holds it up.
    pub fn add_item(
        &mut self,
        kind: ItemKind,
        weight: u32,
        voxel: VoxelCoord,
    ) -> Result<ItemId, SimError> {
        let (low, high) = self.config.item_weight_range;
        if !(low..=high).contains(&weight) {
            return Err(SimError::InvalidItemWeight(weight));
        }
        if !self.grid.in_bounds(voxel) {
            return Err(SimError::OutOfBounds(voxel));
        }
        if !self.grid.is_passable(voxel) {
            return Err(SimError::UnsupportedPosition(voxel));
        }
        Ok(self.insert_item(kind, weight, voxel))
    }

    fn insert_item(&mut self, kind: ItemKind, weight: u32, voxel: VoxelCoord) -> ItemId {
        let id = ItemId(self.item_ids.next_raw());
        self.items.insert(id, Item::on_ground(id, kind, weight, voxel));
        id
    }

    fn random_item_weight(&mut self) -> u32 {
        let (low, high) = self.config.item_weight_range;
        self.rng.range_u32_inclusive(low, high)
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Items lying on the ground in `voxel`.
    pub fn items_at(&self, voxel: VoxelCoord) -> impl Iterator<Item = &Item> {
        self.items
            .values()
            .filter(move |i| i.voxel() == Some(voxel))
    }

    pub(crate) fn pick_up_item(&mut self, unit: UnitId, item: ItemId) {
        if let (Some(u), Some(i)) = (self.units.get_mut(&unit), self.items.get_mut(&item)) {
            i.placement = ItemPlacement::Carried { by: unit };
            u.carried = Some(item);
            tracing::debug!(%unit, %item, kind = ?i.kind, "item picked up");
        }
    }

    pub(crate) fn drop_item(&mut self, unit: UnitId, voxel: VoxelCoord) {
        let Some(u) = self.units.get_mut(&unit) else {
            return;
        };
        let Some(item_id) = u.carried.take() else {
            return;
        };
        if let Some(i) = self.items.get_mut(&item_id) {
            i.placement = ItemPlacement::Ground {
                position: cube_center(voxel),
                fall: None,
            };
            tracing::debug!(%unit, item = %item_id, %voxel, "item dropped");
        }
    }

    /// Remove an item from the world entirely.
    pub(crate) fn consume_item(&mut self, id: ItemId) {
        self.items.remove(&id);
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Take every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }

    pub fn events(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }
}
