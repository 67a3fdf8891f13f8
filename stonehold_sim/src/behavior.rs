// Autonomous unit behavior.
//
// A unit with default behavior enabled asks the world's `BehaviorDriver`
// for orders whenever it is idle and standing still. The driver only sees a
// read-only `World` and answers with zero or more `UnitCommand`s, which the
// world applies through `World::issue` with `CommandOrigin::Autonomous`.
// An external program interpreter plugs in here by implementing the trait.
//
// `RandomBehavior` is the built-in driver: fight an adjacent enemy if there
// is one, otherwise pick uniformly between wandering to a random standable
// voxel (sprinting half the time), working a random voxel within reach, and
// resting. It owns its own `SimRng`, forked from the world's at construction,
// so its choices are reproducible for a given world seed.

use crate::command::UnitCommand;
use crate::geometry::NEIGHBOUR_OFFSETS;
use crate::types::{UnitId, VoxelCoord};
use crate::world::World;
use smallvec::SmallVec;
use stonehold_prng::SimRng;

/// Commands produced by one driver decision.
pub type Orders = SmallVec<[UnitCommand; 2]>;

pub trait BehaviorDriver {
    /// Decide what an idle unit does next. An empty answer leaves it idle.
    fn next_orders(&mut self, world: &World, unit: UnitId) -> Orders;
}

/// Random tries at finding a standable wander target before giving up.
const WANDER_ATTEMPTS: usize = 16;

#[derive(Clone, Debug)]
pub struct RandomBehavior {
    rng: SimRng,
}

impl RandomBehavior {
    pub fn new(rng: SimRng) -> Self {
        Self { rng }
    }

    fn wander_target(&mut self, world: &World) -> Option<VoxelCoord> {
        let grid = world.grid();
        (0..WANDER_ATTEMPTS)
            .map(|_| {
                VoxelCoord::new(
                    self.rng.range_i32(0, grid.size_x() as i32),
                    self.rng.range_i32(0, grid.size_y() as i32),
                    self.rng.range_i32(0, grid.size_z() as i32),
                )
            })
            .find(|&v| grid.is_standable(v))
    }
}

impl BehaviorDriver for RandomBehavior {
    fn next_orders(&mut self, world: &World, unit: UnitId) -> Orders {
        let mut orders = Orders::new();
        let Some(me) = world.unit(unit) else {
            return orders;
        };

        let here = me.voxel();
        let enemy = world
            .units()
            .find(|other| world.are_enemies(unit, other.id) && other.voxel().is_adjacent_or_same(here));
        if let Some(enemy) = enemy {
            orders.push(UnitCommand::Attack { target: enemy.id });
            return orders;
        }

        match self.rng.range_u32_inclusive(0, 2) {
            0 => {
                if let Some(target) = self.wander_target(world) {
                    orders.push(UnitCommand::MoveTo { target });
                    if self.rng.chance(0.5) {
                        orders.push(UnitCommand::StartSprinting);
                    }
                }
            }
            1 => {
                let pick = self.rng.range_usize(0, NEIGHBOUR_OFFSETS.len() + 1);
                let target = match NEIGHBOUR_OFFSETS.get(pick) {
                    Some(&(dx, dy, dz)) => here.offset(dx, dy, dz),
                    None => here,
                };
                if world.grid().in_bounds(target) {
                    orders.push(UnitCommand::Work { target });
                }
            }
            _ => orders.push(UnitCommand::Rest),
        }
        orders
    }
}
