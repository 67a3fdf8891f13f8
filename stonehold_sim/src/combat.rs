// Melee combat between adjacent units of different factions.
//
// An attack is an activity with a fixed wind-up (`attack_duration`). When
// the wind-up completes the attacker goes back to idle and, if the defender
// is still alive and within reach, one exchange is resolved:
//
// 1. Dodge: succeeds with probability `dodge_factor * defender agility /
//    attacker agility`. The defender side-steps to a random passable voxel
//    on its own level and loses any pending route.
// 2. Block: if the dodge failed, succeeds with probability `block_factor *
//    (defender strength + agility) / (attacker strength + agility)`.
// 3. Hit: otherwise the defender loses `attacker strength / damage_divisor`
//    health and dies at zero.
//
// Dodges and blocks reward the defender with combat experience, hits reward
// the attacker. Both combatants turn to face each other whatever happens.
//
// Reach is only re-checked at resolution: a defender that walks away during
// the wind-up escapes the blow, and the attacker simply idles.
//
// See also: `activity.rs` for how the attack command is accepted,
// `event.rs` for `CombatOutcome`.

use crate::event::{CombatOutcome, SimEventKind};
use crate::geometry::{cube_center, heading_between};
use crate::types::*;
use crate::unit::{Activity, Stats};
use crate::world::World;

/// Probability that a defender with `defender` stats dodges an attacker with
/// `attacker` stats.
pub fn dodge_chance(attacker: &Stats, defender: &Stats, dodge_factor: f64) -> f64 {
    dodge_factor * f64::from(defender.agility) / f64::from(attacker.agility.max(1))
}

/// Probability that a defender blocks once the dodge has failed.
pub fn block_chance(attacker: &Stats, defender: &Stats, block_factor: f64) -> f64 {
    let defence = f64::from(defender.strength + defender.agility);
    let offence = f64::from((attacker.strength + attacker.agility).max(1));
    block_factor * defence / offence
}

/// Health removed by a successful hit.
pub fn hit_damage(attacker: &Stats, damage_divisor: f64) -> f64 {
    f64::from(attacker.strength) / damage_divisor
}

impl World {
    pub(crate) fn advance_attack(&mut self, id: UnitId, dt: f64) {
        let duration = self.config.attack_duration;
        let Some(unit) = self.units.get_mut(&id) else {
            return;
        };
        let Activity::Attack(state) = &mut unit.activity else {
            return;
        };
        state.elapsed += dt;
        if state.elapsed < duration {
            return;
        }
        let target = state.target;
        let here = unit.voxel();
        unit.activity = Activity::Idle;

        let in_reach = self
            .units
            .get(&target)
            .is_some_and(|defender| defender.voxel().is_adjacent_or_same(here));
        if in_reach && self.are_enemies(id, target) {
            self.resolve_combat(id, target);
        } else {
            tracing::trace!(attacker = %id, defender = %target, "attack found nobody in reach");
        }
    }

    /// Resolve one exchange. Both units must exist.
    fn resolve_combat(&mut self, attacker: UnitId, defender: UnitId) {
        let (Some(a), Some(d)) = (self.units.get(&attacker), self.units.get(&defender)) else {
            return;
        };
        let (a_stats, d_stats) = (a.stats, d.stats);
        let (a_pos, d_pos) = (a.position, d.position);
        let d_voxel = d.voxel();

        self.face(attacker, heading_between(a_pos, d_pos));
        self.face(defender, heading_between(d_pos, a_pos));

        let combat_xp = self.config.experience_combat;
        let outcome = if self.rng.next_f64() < dodge_chance(&a_stats, &d_stats, self.config.dodge_factor) {
            let to = self.dodge_destination(d_voxel);
            if let Some(unit) = self.units.get_mut(&defender) {
                if let Some(to) = to {
                    unit.position = cube_center(to);
                }
                // Side-stepping abandons whatever route the defender had.
                if matches!(unit.activity, Activity::Move(_)) {
                    unit.activity = Activity::Idle;
                    unit.sprinting = false;
                }
            }
            self.grant_experience(defender, combat_xp);
            CombatOutcome::Dodged {
                to: to.unwrap_or(d_voxel),
            }
        } else if self.rng.next_f64() < block_chance(&a_stats, &d_stats, self.config.block_factor) {
            self.grant_experience(defender, combat_xp);
            CombatOutcome::Blocked
        } else {
            let damage = hit_damage(&a_stats, self.config.damage_divisor);
            let killed = self
                .units
                .get_mut(&defender)
                .is_some_and(|unit| unit.take_damage(damage));
            self.grant_experience(attacker, combat_xp);
            CombatOutcome::Hit { damage, killed }
        };

        tracing::debug!(%attacker, %defender, ?outcome, "combat resolved");
        self.events.push(
            self.time,
            SimEventKind::CombatResolved {
                attacker,
                defender,
                outcome,
            },
        );
        if let CombatOutcome::Hit { killed: true, .. } = outcome {
            self.terminate_unit(defender);
        }
    }

    fn face(&mut self, id: UnitId, heading: Option<f64>) {
        if let (Some(unit), Some(heading)) = (self.units.get_mut(&id), heading) {
            unit.orientation = heading;
        }
    }

    /// A random passable voxel beside `from` on the same level.
    fn dodge_destination(&mut self, from: VoxelCoord) -> Option<VoxelCoord> {
        let options: Vec<VoxelCoord> = (-1..=1)
            .flat_map(|dx| (-1..=1).map(move |dy| (dx, dy)))
            .filter(|&(dx, dy)| (dx, dy) != (0, 0))
            .map(|(dx, dy)| from.offset(dx, dy, 0))
            .filter(|&v| self.grid.is_passable(v))
            .collect();
        self.rng.choose(&options).copied()
    }
}
