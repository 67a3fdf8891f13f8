// Unit activity state machine.
//
// Command handling (`World::issue`) and the per-unit half of the tick
// (`World::advance_unit`) live here as `World` methods keyed by `UnitId`,
// since nearly every rule needs the terrain or another entity.
//
// ## Per-unit step
//
// 1. Falling. A unit already falling keeps falling; one standing centered on
//    an unsupported voxel (and not partway through a step) starts to. While
//    falling nothing else happens. Each voxel center passed costs
//    `fall_damage_per_level` health.
// 2. Forced rest. Once `rest_clock` reaches `rest_interval` the current
//    activity is parked inside a `Rest` and resumed afterwards. Deferred while
//    the unit is mid-step or winding up an attack.
// 3. Default behavior. An idle unit with default behavior enabled takes its
//    next orders from the world's `BehaviorDriver`.
// 4. The activity itself: move, work, rest or attack.
//
// ## Interruption
//
// A new command replaces the current activity on the spot, except a single
// adjacent step in progress, which must finish first, and any command while
// falling. Interrupting a route mid-step leaves the unit where it is; the
// next move re-centers it. Sprint toggles never interrupt anything.
//
// See also: `combat.rs` for attack resolution, `unit.rs` for the activity
// data types, `pathfinding.rs` for route planning.

use crate::command::{CommandOrigin, UnitCommand};
use crate::error::SimError;
use crate::event::SimEventKind;
use crate::geometry::{
    CENTER_EPSILON, cube_center, cube_of, heading_between, heading_of, reached_or_passed,
    velocity_towards,
};
use crate::pathfinding::find_path;
use crate::physics::{FallState, fall_step, should_fall};
use crate::types::*;
use crate::unit::{
    Activity, ActivityKind, AttackState, MovePlan, MoveState, RestState, Step, WorkState,
};
use crate::world::World;

impl World {
    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Apply a command to a unit. Returns `false`, changing nothing, when the
    /// command is illegal in the unit's current state.
    pub fn issue(&mut self, id: UnitId, command: UnitCommand, origin: CommandOrigin) -> bool {
        let Some(unit) = self.units.get(&id) else {
            return false;
        };
        let blocked = unit.is_falling() || unit.activity.is_uninterruptible();

        let accepted = match command {
            UnitCommand::StartSprinting => self.start_sprinting(id),
            UnitCommand::StopSprinting => self.stop_sprinting(id),
            _ if blocked => false,
            UnitCommand::MoveToAdjacent { dx, dy, dz } => self.command_step(id, dx, dy, dz),
            UnitCommand::MoveTo { target } => self.command_move_to(id, target),
            UnitCommand::Work { target } => self.command_work(id, target),
            UnitCommand::Rest => self.command_rest(id),
            UnitCommand::Attack { target } => self.command_attack(id, target),
            UnitCommand::Follow { target } => self.command_follow(id, target),
        };

        if let Some(unit) = self.units.get_mut(&id) {
            if accepted {
                tracing::debug!(unit = %id, ?command, ?origin, "command accepted");
                if origin == CommandOrigin::Player {
                    unit.default_behavior = false;
                }
            }
            if !matches!(unit.activity, Activity::Move(_)) {
                unit.sprinting = false;
            }
        }
        accepted
    }

    pub fn move_to_adjacent(&mut self, id: UnitId, dx: i32, dy: i32, dz: i32) -> bool {
        self.issue(id, UnitCommand::MoveToAdjacent { dx, dy, dz }, CommandOrigin::Player)
    }

    pub fn move_to(&mut self, id: UnitId, target: VoxelCoord) -> bool {
        self.issue(id, UnitCommand::MoveTo { target }, CommandOrigin::Player)
    }

    pub fn work_at(&mut self, id: UnitId, target: VoxelCoord) -> bool {
        self.issue(id, UnitCommand::Work { target }, CommandOrigin::Player)
    }

    pub fn rest(&mut self, id: UnitId) -> bool {
        self.issue(id, UnitCommand::Rest, CommandOrigin::Player)
    }

    pub fn fight(&mut self, id: UnitId, target: UnitId) -> bool {
        self.issue(id, UnitCommand::Attack { target }, CommandOrigin::Player)
    }

    pub fn follow(&mut self, id: UnitId, target: UnitId) -> bool {
        self.issue(id, UnitCommand::Follow { target }, CommandOrigin::Player)
    }

    pub fn start_sprinting(&mut self, id: UnitId) -> bool {
        match self.units.get_mut(&id) {
            Some(unit)
                if matches!(unit.activity, Activity::Move(_))
                    && !unit.is_falling()
                    && unit.stamina > 0.0 =>
            {
                unit.sprinting = true;
                true
            }
            _ => false,
        }
    }

    pub fn stop_sprinting(&mut self, id: UnitId) -> bool {
        match self.units.get_mut(&id) {
            Some(unit) => {
                unit.sprinting = false;
                true
            }
            None => false,
        }
    }

    /// Toggle autonomous behavior for a unit.
    pub fn set_default_behavior(&mut self, id: UnitId, enabled: bool) -> bool {
        match self.units.get_mut(&id) {
            Some(unit) => {
                unit.default_behavior = enabled;
                true
            }
            None => false,
        }
    }

    fn command_step(&mut self, id: UnitId, dx: i32, dy: i32, dz: i32) -> bool {
        let deltas_ok = [dx, dy, dz].iter().all(|d| (-1..=1).contains(d)) && (dx, dy, dz) != (0, 0, 0);
        if !deltas_ok {
            return false;
        }
        let Some(unit) = self.units.get(&id) else {
            return false;
        };
        let target = unit.voxel().offset(dx, dy, dz);
        if !self.grid.is_passable(target) {
            return false;
        }
        let step = Step {
            start: unit.position,
            target,
        };
        self.set_activity(
            id,
            Activity::Move(MoveState {
                plan: MovePlan::Adjacent,
                step: Some(step),
            }),
        );
        true
    }

    fn command_move_to(&mut self, id: UnitId, target: VoxelCoord) -> bool {
        let Some(unit) = self.units.get(&id) else {
            return false;
        };
        let route = find_path(
            &self.grid,
            unit.voxel(),
            target,
            self.config.path_allow_diagonal,
            self.config.path_max_expansions,
        );
        let remaining = match route {
            Ok(Some(route)) => route[1..].to_vec(),
            Ok(None) | Err(_) => {
                tracing::trace!(unit = %id, %target, "move target unreachable");
                return false;
            }
        };
        self.set_activity(
            id,
            Activity::Move(MoveState {
                plan: MovePlan::Route {
                    destination: target,
                    remaining,
                },
                step: None,
            }),
        );
        true
    }

    fn command_work(&mut self, id: UnitId, target: VoxelCoord) -> bool {
        let Some(unit) = self.units.get_mut(&id) else {
            return false;
        };
        let here = unit.voxel();
        if !self.grid.in_bounds(target) || !here.is_adjacent_or_same(target) {
            return false;
        }
        if let Some(heading) = heading_between(unit.position, cube_center(target)) {
            unit.orientation = heading;
        }

        if unit.carried.is_some() {
            // Dropping is instantaneous.
            let spot = if self.grid.is_passable(target) {
                target
            } else {
                here
            };
            self.set_activity(id, Activity::Idle);
            self.drop_item(id, spot);
            self.grant_experience(id, self.config.experience_work);
            return true;
        }

        let duration = self.config.work_duration(unit.stats.strength);
        self.set_activity(
            id,
            Activity::Work(WorkState {
                target,
                elapsed: 0.0,
                duration,
            }),
        );
        true
    }

    fn command_rest(&mut self, id: UnitId) -> bool {
        let Some(unit) = self.units.get_mut(&id) else {
            return false;
        };
        unit.rest_clock = 0.0;
        unit.activity = Activity::Rest(RestState {
            elapsed: 0.0,
            resume: Box::new(Activity::Idle),
        });
        true
    }

    fn command_attack(&mut self, id: UnitId, target: UnitId) -> bool {
        if !self.are_enemies(id, target) {
            return false;
        }
        let (Some(me), Some(them)) = (self.units.get(&id), self.units.get(&target)) else {
            return false;
        };
        if !me.voxel().is_adjacent_or_same(them.voxel()) {
            return false;
        }
        self.set_activity(
            id,
            Activity::Attack(AttackState {
                target,
                elapsed: 0.0,
            }),
        );
        true
    }

    fn command_follow(&mut self, id: UnitId, target: UnitId) -> bool {
        if id == target || !self.is_alive(target) || !self.is_alive(id) {
            return false;
        }
        self.set_activity(
            id,
            Activity::Move(MoveState {
                plan: MovePlan::Follow { target },
                step: None,
            }),
        );
        true
    }

    fn set_activity(&mut self, id: UnitId, activity: Activity) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.activity = activity;
        }
    }

    // -----------------------------------------------------------------------
    // Per-unit step
    // -----------------------------------------------------------------------

    pub(crate) fn advance_unit(&mut self, id: UnitId, dt: f64) -> Result<(), SimError> {
        let unit = self.units.get(&id).ok_or(SimError::UnknownUnit(id))?;

        if unit.is_falling() || (!unit.activity.is_mid_step() && should_fall(&self.grid, unit.position))
        {
            self.advance_fall(id, dt);
            return Ok(());
        }

        self.tick_rest_clock(id, dt);

        let wants_orders = self
            .units
            .get(&id)
            .is_some_and(|u| u.is_idle() && u.default_behavior);
        if wants_orders {
            if let Some(mut driver) = self.behavior.take() {
                let orders = driver.next_orders(self, id);
                self.behavior = Some(driver);
                for order in orders {
                    self.issue(id, order, CommandOrigin::Autonomous);
                }
            }
        }

        let kind = self
            .units
            .get(&id)
            .map(|u| u.activity.kind())
            .ok_or(SimError::UnknownUnit(id))?;
        match kind {
            ActivityKind::Nothing => {}
            ActivityKind::Move => self.advance_move(id, dt),
            ActivityKind::Work => self.advance_work(id, dt),
            ActivityKind::Rest => self.advance_rest(id, dt),
            ActivityKind::Attack => self.advance_attack(id, dt),
        }
        Ok(())
    }

    fn advance_fall(&mut self, id: UnitId, dt: f64) {
        let damage_per_level = self.config.fall_damage_per_level;
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        if unit.fall.is_none() {
            unit.fall = Some(FallState {
                start_level: unit.voxel().z,
            });
            unit.sprinting = false;
            tracing::debug!(unit = %id, voxel = %unit.voxel(), "unit started falling");
        }

        let progress = fall_step(&self.grid, &mut unit.position, self.config.fall_speed, dt);
        let died = progress.levels > 0 && unit.take_damage(f64::from(progress.levels) * damage_per_level);
        if progress.landed {
            let fallen = unit.fall.take().map_or(0, |f| f.start_level - unit.voxel().z);
            tracing::debug!(unit = %id, voxel = %unit.voxel(), levels = fallen, "unit landed");
            if let Activity::Move(state) = &mut unit.activity {
                state.step = None;
            }
        }
        if died {
            self.terminate_unit(id);
        }
    }

    /// Count toward the next forced rest and start it when due.
    fn tick_rest_clock(&mut self, id: UnitId, dt: f64) {
        let interval = self.config.rest_interval;
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        if matches!(unit.activity, Activity::Rest(_)) {
            return;
        }
        unit.rest_clock += dt;
        let deferred =
            unit.activity.is_mid_step() || matches!(unit.activity, Activity::Attack(_));
        if unit.rest_clock >= interval && !deferred {
            unit.rest_clock = 0.0;
            unit.sprinting = false;
            let resume = std::mem::take(&mut unit.activity);
            tracing::debug!(unit = %id, resume = ?resume.kind(), "forced rest");
            unit.activity = Activity::Rest(RestState {
                elapsed: 0.0,
                resume: Box::new(resume),
            });
        }
    }

    // -----------------------------------------------------------------------
    // Moving
    // -----------------------------------------------------------------------

    fn advance_move(&mut self, id: UnitId, dt: f64) {
        let Some(unit) = self.units.get(&id) else {
            return;
        };
        let Activity::Move(state) = &unit.activity else {
            return;
        };

        let current = state.step;
        let step = match current {
            Some(step) => step,
            None => match self.next_step(id) {
                Some((step, remaining)) => {
                    if let Some(Activity::Move(state)) =
                        self.units.get_mut(&id).map(|u| &mut u.activity)
                    {
                        state.step = Some(step);
                        if let MovePlan::Route { remaining: r, .. } = &mut state.plan {
                            *r = remaining;
                        }
                    }
                    step
                }
                None => {
                    self.finish_move(id);
                    return;
                }
            },
        };

        if !self.grid.is_passable(step.target) {
            tracing::debug!(unit = %id, target = %step.target, "step target blocked");
            self.finish_move(id);
            return;
        }

        let speed = self.move_speed(id, &step);
        let drain = self.config.sprint_stamina_per_second;
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        let target_center = cube_center(step.target);
        let velocity = velocity_towards(unit.position, target_center, speed);
        if let Some(heading) = heading_of(velocity) {
            unit.orientation = heading;
        }
        let next = unit.position + velocity * dt;
        let arrived = reached_or_passed(step.start, next, target_center);
        unit.position = if arrived { target_center } else { next };

        if unit.sprinting {
            unit.stamina = (unit.stamina - drain * dt).max(0.0);
            if unit.stamina <= 0.0 {
                unit.sprinting = false;
            }
        }

        if !arrived {
            return;
        }
        let here = unit.voxel();
        let done = match &mut unit.activity {
            Activity::Move(state) => {
                state.step = None;
                match &state.plan {
                    MovePlan::Adjacent => true,
                    MovePlan::Route { destination, .. } => *destination == here,
                    MovePlan::Follow { .. } => false,
                }
            }
            _ => false,
        };
        // Re-centering inside the same voxel crosses nothing.
        if step.target != cube_of(step.start) {
            self.grant_experience(id, self.config.experience_move);
        }
        if done {
            self.finish_move(id);
        }
    }

    /// Plan the next leg of a route or follow. Returns the step and the
    /// waypoints left after it, or `None` when the move is over.
    fn next_step(&self, id: UnitId) -> Option<(Step, Vec<VoxelCoord>)> {
        let unit = self.units.get(&id)?;
        let Activity::Move(state) = &unit.activity else {
            return None;
        };
        let here = unit.voxel();

        let goal = match &state.plan {
            MovePlan::Adjacent => return None,
            MovePlan::Route { destination, .. } => Some(*destination),
            MovePlan::Follow { target } => self
                .units
                .get(target)
                .map(|leader| leader.voxel())
                .filter(|&there| !there.is_adjacent_or_same(here)),
        };

        // Re-center first if an interrupted step left the unit off-center.
        if unit.position.distance(cube_center(here)) > CENTER_EPSILON {
            let step = Step {
                start: unit.position,
                target: here,
            };
            return Some((step, Vec::new()));
        }
        let goal = goal.filter(|&g| g != here)?;

        match find_path(
            &self.grid,
            here,
            goal,
            self.config.path_allow_diagonal,
            self.config.path_max_expansions,
        ) {
            Ok(Some(route)) if route.len() >= 2 => {
                let step = Step {
                    start: unit.position,
                    target: route[1],
                };
                Some((step, route[2..].to_vec()))
            }
            Ok(_) => {
                tracing::trace!(unit = %id, %goal, "no route, move abandoned");
                None
            }
            Err(err) => {
                tracing::trace!(unit = %id, %goal, %err, "route search gave up, move abandoned");
                None
            }
        }
    }

    fn finish_move(&mut self, id: UnitId) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.activity = Activity::Idle;
            unit.sprinting = false;
        }
    }

    /// Current speed along `step`, including slope and sprint modifiers. The
    /// slope is judged from the level the step started on.
    fn move_speed(&self, id: UnitId, step: &Step) -> f64 {
        let Some(unit) = self.units.get(&id) else {
            return 0.0;
        };
        let carried = unit
            .carried
            .and_then(|item| self.items.get(&item))
            .map_or(0, |item| item.weight);
        let mut speed = unit.base_speed(carried, &self.config);
        let from = cube_of(step.start).z;
        if step.target.z < from {
            speed *= self.config.descend_speed_modifier;
        } else if step.target.z > from {
            speed *= self.config.ascend_speed_modifier;
        }
        if unit.sprinting {
            speed *= self.config.sprint_multiplier;
        }
        speed
    }

    // -----------------------------------------------------------------------
    // Working
    // -----------------------------------------------------------------------

    fn advance_work(&mut self, id: UnitId, dt: f64) {
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        let Activity::Work(state) = &mut unit.activity else {
            return;
        };
        state.elapsed += dt;
        if state.elapsed < state.duration {
            return;
        }
        let target = state.target;
        unit.activity = Activity::Idle;
        if !unit.voxel().is_adjacent_or_same(target) {
            tracing::debug!(unit = %id, %target, "work target out of reach");
            return;
        }
        self.resolve_work(id, target);
        self.grant_experience(id, self.config.experience_work);
    }

    /// Apply the first matching work rule at `target`.
    fn resolve_work(&mut self, id: UnitId, target: VoxelCoord) {
        let log = self
            .items_at(target)
            .find(|i| i.kind == ItemKind::Log)
            .map(|i| i.id);
        let boulder = self
            .items_at(target)
            .find(|i| i.kind == ItemKind::Boulder)
            .map(|i| i.id);
        let terrain = self.grid.get(target);
        let carrying = self.units.get(&id).is_some_and(|u| u.carried.is_some());

        match (terrain, log, boulder) {
            (Some(TerrainType::Workshop), Some(log), Some(boulder)) => {
                self.consume_item(log);
                self.consume_item(boulder);
                let bonus = self.config.workshop_bonus;
                if let Some(unit) = self.units.get_mut(&id) {
                    let toughness = unit.raise_stat(Stat::Toughness, bonus, &self.config);
                    let weight = unit.raise_stat(Stat::Weight, bonus, &self.config);
                    tracing::debug!(unit = %id, %target, toughness, weight, "workshop improvement");
                }
                self.events
                    .push(self.time, SimEventKind::Workshop { unit: id, voxel: target });
            }
            (_, _, Some(item)) | (_, Some(item), None) if !carrying => {
                self.pick_up_item(id, item);
            }
            (Some(TerrainType::Rock | TerrainType::Wood), _, _) => {
                self.collapse_cube(target);
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Resting
    // -----------------------------------------------------------------------

    fn advance_rest(&mut self, id: UnitId, dt: f64) {
        let under_attack = self.is_under_attack(id);
        let config = &self.config;
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        let Activity::Rest(state) = &mut unit.activity else {
            return;
        };
        state.elapsed += dt;
        if state.elapsed >= config.rest_threshold(unit.stats.toughness) {
            unit.rest_threshold_met = true;
        }

        let max = f64::from(unit.max_points());
        let toughness = f64::from(unit.stats.toughness);
        let ticks = dt / config.rest_tick;
        if !under_attack {
            if unit.health < max {
                unit.health = (unit.health + ticks * toughness / config.heal_divisor).min(max);
            } else if unit.stamina < max {
                unit.stamina = (unit.stamina + ticks * toughness / config.stamina_divisor).min(max);
            }
        }

        if unit.rest_threshold_met && unit.health >= max && unit.stamina >= max {
            unit.rest_threshold_met = false;
            let resume = match std::mem::take(&mut unit.activity) {
                Activity::Rest(state) => *state.resume,
                other => other,
            };
            tracing::debug!(unit = %id, resume = ?resume.kind(), "rest complete");
            unit.activity = resume;
        }
    }

    // -----------------------------------------------------------------------
    // Experience
    // -----------------------------------------------------------------------

    /// Bank experience and apply any level-ups it earns. Experience past the
    /// stat cap stays banked; the surplus level-ups are dropped.
    pub(crate) fn grant_experience(&mut self, id: UnitId, amount: u32) {
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        let levels = unit.add_experience(amount, self.config.experience_per_level);
        for _ in 0..levels {
            match unit.level_up(&self.config, &mut self.rng) {
                Ok((stat, value)) => {
                    tracing::debug!(unit = %id, ?stat, value, "level up");
                    self.events
                        .push(self.time, SimEventKind::LevelUp { unit: id, stat, value });
                }
                Err(maxed) => {
                    tracing::debug!(unit = %id, %maxed, "experience banked past the cap");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::unit::{ActivityKind, Stats, UnitSpec};

    fn floor_codes(sx: usize, sy: usize, sz: usize) -> Vec<Vec<Vec<i32>>> {
        let mut codes = vec![vec![vec![0; sz]; sy]; sx];
        for plane in codes.iter_mut() {
            for column in plane.iter_mut() {
                column[0] = 1;
            }
        }
        codes
    }

    fn world_with(config: SimConfig) -> World {
        World::from_codes(&floor_codes(8, 8, 5), config, 11).unwrap()
    }

    fn world() -> World {
        world_with(SimConfig::default())
    }

    fn add(world: &mut World, name: &str, at: VoxelCoord) -> UnitId {
        world
            .add_unit(UnitSpec::new(name, at, Stats::new(50, 50, 50, 50)))
            .unwrap()
    }

    fn run(world: &mut World, seconds: f64) {
        let steps = (seconds / 0.1).round() as usize;
        for _ in 0..steps {
            world.advance_time(0.1).unwrap();
        }
    }

    #[test]
    fn adjacent_step_reaches_center_and_is_atomic() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        assert!(w.move_to_adjacent(u, 1, 0, 0));
        w.advance_time(0.1).unwrap();
        assert!(w.unit(u).unwrap().is_moving());
        // Mid-step commands are refused.
        assert!(!w.rest(u));
        assert!(!w.move_to_adjacent(u, 0, 1, 0));
        run(&mut w, 1.0);
        let unit = w.unit(u).unwrap();
        assert_eq!(unit.voxel(), VoxelCoord::new(3, 2, 1));
        assert_eq!(unit.position, cube_center(VoxelCoord::new(3, 2, 1)));
        assert!(unit.is_idle());
        assert_eq!(unit.orientation, 0.0);
        assert_eq!(unit.experience, 1);
    }

    #[test]
    fn illegal_steps_are_rejected() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        assert!(!w.move_to_adjacent(u, 2, 0, 0));
        assert!(!w.move_to_adjacent(u, 0, 0, 0));
        assert!(!w.move_to_adjacent(u, 0, 0, -1));
        assert!(w.unit(u).unwrap().is_idle());
    }

    #[test]
    fn move_to_walks_the_route() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(0, 0, 1));
        let goal = VoxelCoord::new(5, 3, 1);
        assert!(w.move_to(u, goal));
        assert!(!w.unit(u).unwrap().route().is_empty());
        run(&mut w, 10.0);
        let unit = w.unit(u).unwrap();
        assert_eq!(unit.voxel(), goal);
        assert!(unit.is_idle());
        assert_eq!(unit.experience, 5);
    }

    #[test]
    fn unreachable_move_is_rejected() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(0, 0, 1));
        assert!(!w.move_to(u, VoxelCoord::new(3, 3, 0)));
        assert!(w.unit(u).unwrap().is_idle());
    }

    #[test]
    fn interrupted_route_recenters_on_next_move() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(0, 0, 1));
        assert!(w.move_to(u, VoxelCoord::new(6, 0, 1)));
        run(&mut w, 0.3);
        assert!(w.rest(u));
        assert!(w.unit(u).unwrap().is_resting());
        assert!(w.move_to(u, VoxelCoord::new(0, 0, 1)));
        run(&mut w, 5.0);
        let unit = w.unit(u).unwrap();
        assert_eq!(unit.position, cube_center(VoxelCoord::new(0, 0, 1)));
        assert!(unit.is_idle());
        // Sliding back to the center of the same voxel earns nothing.
        assert_eq!(unit.experience, 0);
    }

    /// Seconds a single adjacent step takes at a fine time step.
    fn time_step(w: &mut World, u: UnitId, dx: i32, dy: i32, dz: i32) -> f64 {
        assert!(w.move_to_adjacent(u, dx, dy, dz));
        let mut elapsed = 0.0;
        while w.unit(u).unwrap().is_moving() {
            w.advance_time(0.01).unwrap();
            elapsed += 0.01;
            assert!(elapsed < 5.0, "step never finished");
        }
        elapsed
    }

    #[test]
    fn slope_modifier_holds_for_the_whole_step() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        w.set_terrain(VoxelCoord::new(3, 2, 1), TerrainType::Rock).unwrap();
        let diagonal = 2f64.sqrt();

        // Base speed 1.5: up at 1.8, down at 0.75.
        let up = time_step(&mut w, u, 1, 0, 1);
        assert_eq!(w.unit(u).unwrap().voxel(), VoxelCoord::new(3, 2, 2));
        assert!((up - diagonal / 1.8).abs() < 0.02, "ascent took {up}");

        let down = time_step(&mut w, u, -1, 0, -1);
        assert_eq!(w.unit(u).unwrap().voxel(), VoxelCoord::new(2, 2, 1));
        assert!((down - diagonal / 0.75).abs() < 0.02, "descent took {down}");
    }

    #[test]
    fn sprinting_is_faster_and_drains_stamina() {
        let mut w = world();
        let a = add(&mut w, "Alpha", VoxelCoord::new(0, 0, 1));
        let b = add(&mut w, "Beta", VoxelCoord::new(0, 2, 1));
        assert!(!w.start_sprinting(a));
        assert!(w.move_to_adjacent(a, 1, 0, 0));
        assert!(w.move_to_adjacent(b, 1, 0, 0));
        assert!(w.start_sprinting(a));
        w.advance_time(0.2).unwrap();
        let (ua, ub) = (w.unit(a).unwrap(), w.unit(b).unwrap());
        assert!(ua.position.x - 0.5 > 1.9 * (ub.position.x - 0.5));
        assert!(ua.stamina < ub.stamina);
        assert!((ub.stamina - 50.0).abs() < 1e-12);
    }

    #[test]
    fn sprint_stops_when_stamina_runs_out() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(0, 0, 1));
        w.units.get_mut(&u).unwrap().stamina = 1.0;
        assert!(w.move_to(u, VoxelCoord::new(7, 7, 1)));
        assert!(w.start_sprinting(u));
        w.advance_time(0.2).unwrap();
        let unit = w.unit(u).unwrap();
        assert_eq!(unit.stamina, 0.0);
        assert!(!unit.sprinting);
    }

    #[test]
    fn falling_costs_ten_per_level() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        // Raise the unit onto a pillar, then remove the pillar.
        w.units.get_mut(&u).unwrap().position = cube_center(VoxelCoord::new(2, 2, 3));
        w.advance_time(0.1).unwrap();
        assert!(w.unit(u).unwrap().is_falling());
        assert!(!w.rest(u));
        run(&mut w, 1.5);
        let unit = w.unit(u).unwrap();
        assert!(!unit.is_falling());
        assert_eq!(unit.voxel(), VoxelCoord::new(2, 2, 1));
        assert_eq!(unit.health, 30.0);
    }

    #[test]
    fn work_on_rock_collapses_it() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        let rock = VoxelCoord::new(3, 2, 1);
        w.set_terrain(rock, TerrainType::Rock).unwrap();
        assert!(w.work_at(u, rock));
        assert!(w.unit(u).unwrap().is_working());
        run(&mut w, 9.9);
        assert_eq!(w.terrain(rock), Some(TerrainType::Rock));
        run(&mut w, 0.2);
        assert_eq!(w.terrain(rock), Some(TerrainType::Air));
        let unit = w.unit(u).unwrap();
        assert!(unit.is_idle());
        assert_eq!(unit.experience, 10);
        assert!(!w.work_at(u, VoxelCoord::new(5, 5, 1)));
    }

    #[test]
    fn work_picks_up_then_drops_instantly() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        let spot = VoxelCoord::new(2, 3, 1);
        let log = w.add_item(ItemKind::Log, 20, spot).unwrap();
        let boulder = w.add_item(ItemKind::Boulder, 20, spot).unwrap();
        assert!(w.work_at(u, spot));
        run(&mut w, 10.1);
        assert_eq!(w.unit(u).unwrap().carried, Some(boulder));
        assert_eq!(w.item(log).unwrap().voxel(), Some(spot));

        let drop_at = VoxelCoord::new(1, 2, 1);
        assert!(w.work_at(u, drop_at));
        let unit = w.unit(u).unwrap();
        assert!(unit.is_idle());
        assert_eq!(unit.carried, None);
        assert_eq!(w.item(boulder).unwrap().voxel(), Some(drop_at));
    }

    #[test]
    fn drop_on_solid_target_lands_at_own_voxel() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        let item = w.add_item(ItemKind::Log, 20, VoxelCoord::new(2, 2, 1)).unwrap();
        w.pick_up_item(u, item);
        assert!(w.work_at(u, VoxelCoord::new(2, 2, 0)));
        assert_eq!(w.item(item).unwrap().voxel(), Some(VoxelCoord::new(2, 2, 1)));
    }

    #[test]
    fn workshop_consumes_log_and_boulder() {
        let config = SimConfig {
            experience_per_level: 1000,
            ..SimConfig::default()
        };
        let mut w = world_with(config);
        let u = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        let shop = VoxelCoord::new(3, 3, 1);
        w.set_terrain(shop, TerrainType::Workshop).unwrap();
        w.add_item(ItemKind::Log, 20, shop).unwrap();
        w.add_item(ItemKind::Boulder, 20, shop).unwrap();
        assert!(w.work_at(u, shop));
        run(&mut w, 10.1);
        let unit = w.unit(u).unwrap();
        assert_eq!(unit.stats.toughness, 55);
        assert_eq!(unit.stats.weight, 55);
        assert_eq!(unit.carried, None);
        assert_eq!(w.items().count(), 0);
    }

    #[test]
    fn rest_heals_then_restores_stamina_then_resumes() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        {
            let unit = w.units.get_mut(&u).unwrap();
            unit.health = 49.0;
            unit.stamina = 45.0;
        }
        assert!(w.rest(u));
        // Toughness 50 heals 0.25 per 0.2 s.
        w.advance_time(0.2).unwrap();
        let unit = w.unit(u).unwrap();
        assert_eq!(unit.health, 49.25);
        assert_eq!(unit.stamina, 45.0);

        // Six steps finish healing, the next four restore 1.0 stamina.
        run(&mut w, 1.0);
        let unit = w.unit(u).unwrap();
        assert_eq!(unit.health, 50.0);
        assert_eq!(unit.stamina, 46.0);
        assert!(unit.is_resting());
        assert!(unit.rest_threshold_met);

        run(&mut w, 2.0);
        let unit = w.unit(u).unwrap();
        assert_eq!(unit.stamina, 50.0);
        assert!(unit.is_idle());
        assert!(!unit.rest_threshold_met);
    }

    #[test]
    fn no_recovery_during_an_enemy_wind_up() {
        let config = SimConfig {
            dodge_factor: 0.0,
            block_factor: 0.0,
            ..SimConfig::default()
        };
        let mut w = world_with(config);
        let d = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        let a = add(&mut w, "Azog", VoxelCoord::new(3, 2, 1));
        {
            let unit = w.units.get_mut(&d).unwrap();
            unit.health = 40.0;
            unit.stamina = 40.0;
        }
        assert!(w.rest(d));
        assert!(w.fight(a, d));
        for _ in 0..4 {
            w.advance_time(0.2).unwrap();
            let unit = w.unit(d).unwrap();
            assert!(unit.is_resting());
            assert_eq!(unit.health, 40.0);
            assert_eq!(unit.stamina, 40.0);
        }

        // The blow lands, then healing picks up again.
        while !w.unit(a).unwrap().is_idle() {
            w.advance_time(0.2).unwrap();
        }
        let struck = w.unit(d).unwrap().health;
        assert!(struck <= 35.0);
        w.advance_time(0.2).unwrap();
        assert!(w.unit(d).unwrap().health > struck);
    }

    #[test]
    fn rest_lasts_at_least_the_threshold() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        assert!(w.rest(u));
        // 40 / 50 = 0.8 s minimum even at full health.
        run(&mut w, 0.7);
        assert!(w.unit(u).unwrap().is_resting());
        run(&mut w, 0.2);
        assert!(w.unit(u).unwrap().is_idle());
    }

    #[test]
    fn forced_rest_resumes_interrupted_work() {
        let config = SimConfig {
            rest_interval: 1.0,
            ..SimConfig::default()
        };
        let mut w = world_with(config);
        let u = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        let rock = VoxelCoord::new(3, 2, 1);
        w.set_terrain(rock, TerrainType::Rock).unwrap();
        assert!(w.work_at(u, rock));
        run(&mut w, 1.1);
        let unit = w.unit(u).unwrap();
        assert!(unit.is_resting());
        run(&mut w, 1.0);
        let unit = w.unit(u).unwrap();
        assert_eq!(unit.activity_kind(), ActivityKind::Work);
    }

    #[test]
    fn follow_ends_next_to_the_leader() {
        let mut w = world();
        let a = add(&mut w, "Alpha", VoxelCoord::new(0, 0, 1));
        let b = add(&mut w, "Beta", VoxelCoord::new(6, 5, 1));
        assert!(!w.follow(a, a));
        assert!(w.follow(a, b));
        run(&mut w, 10.0);
        let ua = w.unit(a).unwrap();
        assert!(ua.is_idle());
        assert!(ua.voxel().is_adjacent_or_same(VoxelCoord::new(6, 5, 1)));
    }

    #[test]
    fn player_commands_disable_default_behavior() {
        let mut w = world();
        let u = w
            .add_unit(
                UnitSpec::new("Gimli", VoxelCoord::new(2, 2, 1), Stats::new(50, 50, 50, 50))
                    .with_default_behavior(true),
            )
            .unwrap();
        assert!(w.issue(u, UnitCommand::Rest, CommandOrigin::Autonomous));
        assert!(w.unit(u).unwrap().default_behavior);
        assert!(w.rest(u));
        assert!(!w.unit(u).unwrap().default_behavior);
    }

    #[test]
    fn default_behavior_keeps_units_busy() {
        let mut w = world();
        let u = w
            .add_unit(
                UnitSpec::new("Gimli", VoxelCoord::new(2, 2, 1), Stats::new(50, 50, 50, 50))
                    .with_default_behavior(true),
            )
            .unwrap();
        let mut busy = false;
        for _ in 0..20 {
            w.advance_time(0.1).unwrap();
            busy |= !w.unit(u).unwrap().is_idle();
        }
        assert!(busy);
    }

    #[test]
    fn leveling_emits_events() {
        let mut w = world();
        let u = add(&mut w, "Gimli", VoxelCoord::new(2, 2, 1));
        w.drain_events();
        w.grant_experience(u, 25);
        let ups = w
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e.kind, SimEventKind::LevelUp { .. }))
            .count();
        assert_eq!(ups, 2);
        let s = w.unit(u).unwrap().stats;
        assert_eq!(s.strength + s.agility + s.toughness, 152);
    }
}
