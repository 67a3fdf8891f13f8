// Units: the principal actors of the simulation.
//
// A `Unit` is plain data: name, faction, stats, health and stamina, a
// continuous position and facing, and the current `Activity`. All behavior
// that needs the terrain, other units or items lives on `World` (see
// `activity.rs` and `combat.rs`), keyed by `UnitId`, so a unit never holds a
// reference to anything else.
//
// Activities are a tagged union: each variant carries only the state that
// activity needs (a move its plan and current step, work its target and
// timer, a rest the activity it interrupted, an attack its target). Falling
// is orthogonal and lives in `fall`; while it is set the activity is frozen
// and the unit reports itself as moving.
//
// Stat rules:
// - strength, agility, toughness and weight lie in `[stat_min, stat_max]`;
//   new units are created inside `[initial_stat_min, initial_stat_max]`.
// - weight is never below `(strength + agility) / 2`.
// - `max_points = ceil(weight * toughness / 50)` bounds health and stamina.
//
// See also: `world.rs` for creation and admission, `config.rs` for every
// constant used here.

use crate::config::SimConfig;
use crate::error::{SimError, StatsMaxed};
use crate::geometry::{cube_center, cube_of};
use crate::names::validate_name;
use crate::physics::FallState;
use crate::types::*;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use stonehold_prng::SimRng;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub strength: u32,
    pub agility: u32,
    pub toughness: u32,
    pub weight: u32,
}

impl Stats {
    pub fn new(strength: u32, agility: u32, toughness: u32, weight: u32) -> Self {
        Self {
            strength,
            agility,
            toughness,
            weight,
        }
    }

    /// Lowest weight allowed for the current strength and agility.
    pub fn min_weight(&self) -> u32 {
        (self.strength + self.agility) / 2
    }

    /// Capacity of both health and stamina.
    pub fn max_points(&self) -> u32 {
        (self.weight * self.toughness).div_ceil(50)
    }

    pub fn get(&self, stat: Stat) -> u32 {
        match stat {
            Stat::Strength => self.strength,
            Stat::Agility => self.agility,
            Stat::Toughness => self.toughness,
            Stat::Weight => self.weight,
        }
    }

    fn get_mut(&mut self, stat: Stat) -> &mut u32 {
        match stat {
            Stat::Strength => &mut self.strength,
            Stat::Agility => &mut self.agility,
            Stat::Toughness => &mut self.toughness,
            Stat::Weight => &mut self.weight,
        }
    }

    /// Check every stat against `[min, max]` and the weight rule.
    pub fn validate(&self, min: u32, max: u32) -> Result<(), SimError> {
        for (stat, value) in [
            ("strength", self.strength),
            ("agility", self.agility),
            ("toughness", self.toughness),
            ("weight", self.weight),
        ] {
            if !(min..=max).contains(&value) {
                return Err(SimError::StatOutOfRange {
                    stat,
                    value,
                    min,
                    max,
                });
            }
        }
        if self.weight < self.min_weight() {
            return Err(SimError::WeightTooLow {
                weight: self.weight,
                minimum: self.min_weight(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

/// Externally visible activity, as reported by `Unit::activity_kind`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    Nothing,
    Move,
    Work,
    Rest,
    Attack,
}

/// One leg of a move: from wherever the unit stood when the leg began to
/// the center of `target`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub start: DVec3,
    pub target: VoxelCoord,
}

/// Where a move is headed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MovePlan {
    /// A single step into a neighbouring voxel. Cannot be interrupted.
    Adjacent,
    /// Walk a planned route. `remaining` holds the waypoints still ahead,
    /// re-derived from a fresh search at every voxel boundary.
    Route {
        destination: VoxelCoord,
        remaining: Vec<VoxelCoord>,
    },
    /// Walk toward another unit until adjacent to it.
    Follow { target: UnitId },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveState {
    pub plan: MovePlan,
    pub step: Option<Step>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkState {
    pub target: VoxelCoord,
    pub elapsed: f64,
    pub duration: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestState {
    pub elapsed: f64,
    /// The activity to return to once the rest completes.
    pub resume: Box<Activity>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackState {
    pub target: UnitId,
    pub elapsed: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Activity {
    #[default]
    Idle,
    Move(MoveState),
    Work(WorkState),
    Rest(RestState),
    Attack(AttackState),
}

impl Activity {
    pub fn kind(&self) -> ActivityKind {
        match self {
            Self::Idle => ActivityKind::Nothing,
            Self::Move(_) => ActivityKind::Move,
            Self::Work(_) => ActivityKind::Work,
            Self::Rest(_) => ActivityKind::Rest,
            Self::Attack(_) => ActivityKind::Attack,
        }
    }

    /// A single adjacent step that has not finished yet.
    pub fn is_uninterruptible(&self) -> bool {
        matches!(
            self,
            Self::Move(MoveState {
                plan: MovePlan::Adjacent,
                step: Some(_),
            })
        )
    }

    /// Whether the unit is partway between two voxel centers.
    pub fn is_mid_step(&self) -> bool {
        matches!(self, Self::Move(MoveState { step: Some(_), .. }))
    }
}

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

/// Everything needed to create a unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    pub voxel: VoxelCoord,
    pub stats: Stats,
    /// Join this faction, or let the world pick one.
    pub faction: Option<FactionId>,
    pub default_behavior: bool,
}

impl UnitSpec {
    pub fn new(name: impl Into<String>, voxel: VoxelCoord, stats: Stats) -> Self {
        Self {
            name: name.into(),
            voxel,
            stats,
            faction: None,
            default_behavior: false,
        }
    }

    pub fn in_faction(mut self, faction: FactionId) -> Self {
        self.faction = Some(faction);
        self
    }

    pub fn with_default_behavior(mut self, enabled: bool) -> Self {
        self.default_behavior = enabled;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub faction: FactionId,
    pub stats: Stats,
    pub health: f64,
    pub stamina: f64,
    pub position: DVec3,
    /// Heading in the horizontal plane, radians in `[-pi, pi]`.
    pub orientation: f64,
    pub activity: Activity,
    pub fall: Option<FallState>,
    pub sprinting: bool,
    pub carried: Option<ItemId>,
    /// Total experience ever earned. Never decreases.
    pub experience: u32,
    /// Seconds of activity since the last rest began.
    pub rest_clock: f64,
    /// Set once a rest has lasted long enough; cleared when a rest completes.
    pub rest_threshold_met: bool,
    pub default_behavior: bool,
}

impl Unit {
    /// Build a unit from a spec. The caller has already checked the voxel.
    pub fn new(
        id: UnitId,
        faction: FactionId,
        spec: UnitSpec,
        config: &SimConfig,
    ) -> Result<Self, SimError> {
        validate_name(&spec.name)?;
        spec.stats
            .validate(config.initial_stat_min, config.initial_stat_max)?;
        let max = f64::from(spec.stats.max_points());
        Ok(Self {
            id,
            name: spec.name,
            faction,
            stats: spec.stats,
            health: max,
            stamina: max,
            position: cube_center(spec.voxel),
            orientation: FRAC_PI_2,
            activity: Activity::Idle,
            fall: None,
            sprinting: false,
            carried: None,
            experience: 0,
            rest_clock: 0.0,
            rest_threshold_met: false,
            default_behavior: spec.default_behavior,
        })
    }

    pub fn voxel(&self) -> VoxelCoord {
        cube_of(self.position)
    }

    pub fn max_points(&self) -> u32 {
        self.stats.max_points()
    }

    pub fn is_falling(&self) -> bool {
        self.fall.is_some()
    }

    /// The reported activity. A falling unit reports `Move`.
    pub fn activity_kind(&self) -> ActivityKind {
        if self.is_falling() {
            ActivityKind::Move
        } else {
            self.activity.kind()
        }
    }

    pub fn is_moving(&self) -> bool {
        self.activity_kind() == ActivityKind::Move
    }

    pub fn is_working(&self) -> bool {
        self.activity_kind() == ActivityKind::Work
    }

    pub fn is_resting(&self) -> bool {
        self.activity_kind() == ActivityKind::Rest
    }

    pub fn is_attacking(&self) -> bool {
        self.activity_kind() == ActivityKind::Attack
    }

    pub fn is_idle(&self) -> bool {
        self.activity_kind() == ActivityKind::Nothing
    }

    /// Waypoints still ahead on a planned route.
    pub fn route(&self) -> &[VoxelCoord] {
        match &self.activity {
            Activity::Move(MoveState {
                plan: MovePlan::Route { remaining, .. },
                ..
            }) => remaining,
            _ => &[],
        }
    }

    /// Walking speed before sprinting, for a unit carrying `carried_weight`.
    pub fn base_speed(&self, carried_weight: u32, config: &SimConfig) -> f64 {
        let weight = f64::from(self.stats.weight + carried_weight);
        config.base_speed_factor * f64::from(self.stats.strength + self.stats.agility)
            / (2.0 * weight)
    }

    /// Lower health, flooring at zero. Returns `true` if the unit died.
    pub fn take_damage(&mut self, amount: f64) -> bool {
        self.health = (self.health - amount).max(0.0);
        self.health <= 0.0
    }

    /// Bank experience and report how many level thresholds were crossed.
    pub fn add_experience(&mut self, amount: u32, per_level: u32) -> u32 {
        let per_level = per_level.max(1);
        let before = self.experience / per_level;
        self.experience = self.experience.saturating_add(amount);
        self.experience / per_level - before
    }

    /// Raise one of agility, strength or toughness, chosen uniformly among
    /// those below the cap. Weight follows strength and agility upward.
    pub fn level_up(
        &mut self,
        config: &SimConfig,
        rng: &mut SimRng,
    ) -> Result<(Stat, u32), StatsMaxed> {
        let candidates: Vec<Stat> = [Stat::Agility, Stat::Strength, Stat::Toughness]
            .into_iter()
            .filter(|&s| self.stats.get(s) < config.stat_max)
            .collect();
        let stat = *rng.choose(&candidates).ok_or(StatsMaxed {
            cap: config.stat_max,
        })?;
        *self.stats.get_mut(stat) += 1;
        self.stats.weight = self.stats.weight.max(self.stats.min_weight());
        Ok((stat, self.stats.get(stat)))
    }

    /// Add `amount` to a stat, capped at `stat_max`.
    pub fn raise_stat(&mut self, stat: Stat, amount: u32, config: &SimConfig) -> u32 {
        let value = self.stats.get_mut(stat);
        *value = (*value + amount).min(config.stat_max);
        *value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(stats: Stats) -> Unit {
        let spec = UnitSpec::new("Gimli", VoxelCoord::new(0, 0, 1), stats);
        Unit::new(UnitId(0), FactionId(0), spec, &SimConfig::default()).unwrap()
    }

    #[test]
    fn max_points_rounds_up() {
        assert_eq!(Stats::new(25, 25, 25, 25).max_points(), 13);
        assert_eq!(Stats::new(50, 50, 50, 50).max_points(), 50);
        assert_eq!(Stats::new(100, 100, 100, 100).max_points(), 200);
    }

    #[test]
    fn new_unit_starts_full_and_centered() {
        let u = unit(Stats::new(25, 25, 25, 25));
        assert_eq!(u.health, 13.0);
        assert_eq!(u.stamina, 13.0);
        assert_eq!(u.position, DVec3::new(0.5, 0.5, 1.5));
        assert_eq!(u.voxel(), VoxelCoord::new(0, 0, 1));
        assert!(u.is_idle());
    }

    #[test]
    fn creation_validates_name_and_stats() {
        let config = SimConfig::default();
        let ok = Stats::new(50, 50, 50, 50);
        let bad_name = UnitSpec::new("gimli", VoxelCoord::new(0, 0, 0), ok);
        assert!(matches!(
            Unit::new(UnitId(0), FactionId(0), bad_name, &config),
            Err(SimError::InvalidName(_))
        ));

        let low = UnitSpec::new("Gimli", VoxelCoord::new(0, 0, 0), Stats::new(24, 50, 50, 50));
        assert!(matches!(
            Unit::new(UnitId(0), FactionId(0), low, &config),
            Err(SimError::StatOutOfRange { stat: "strength", .. })
        ));

        let light = UnitSpec::new("Gimli", VoxelCoord::new(0, 0, 0), Stats::new(100, 100, 50, 60));
        assert_eq!(
            Unit::new(UnitId(0), FactionId(0), light, &config).unwrap_err(),
            SimError::WeightTooLow {
                weight: 60,
                minimum: 100
            }
        );
    }

    #[test]
    fn falling_reports_as_moving() {
        let mut u = unit(Stats::new(25, 25, 25, 25));
        u.fall = Some(FallState { start_level: 1 });
        assert!(u.is_moving());
        assert_eq!(u.activity.kind(), ActivityKind::Nothing);
    }

    #[test]
    fn speed_uses_effective_weight() {
        let config = SimConfig::default();
        let u = unit(Stats::new(50, 50, 50, 50));
        assert!((u.base_speed(0, &config) - 1.5).abs() < 1e-12);
        assert!((u.base_speed(50, &config) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn experience_counts_threshold_crossings() {
        let mut u = unit(Stats::new(25, 25, 25, 25));
        assert_eq!(u.add_experience(9, 10), 0);
        assert_eq!(u.add_experience(1, 10), 1);
        assert_eq!(u.add_experience(25, 10), 2);
        assert_eq!(u.experience, 35);
    }

    #[test]
    fn level_up_raises_one_stat_and_keeps_weight_rule() {
        let config = SimConfig::default();
        let mut rng = SimRng::new(3);
        let mut u = unit(Stats::new(100, 100, 25, 100));
        for _ in 0..50 {
            let before = u.stats;
            let (stat, value) = u.level_up(&config, &mut rng).unwrap();
            assert_eq!(u.stats.get(stat), value);
            assert_eq!(value, before.get(stat) + 1);
            assert!(u.stats.weight >= u.stats.min_weight());
        }
    }

    #[test]
    fn level_up_skips_capped_stats_and_reports_maxed() {
        let config = SimConfig::default();
        let mut rng = SimRng::new(5);
        let mut u = unit(Stats::new(25, 25, 25, 25));
        u.stats = Stats::new(200, 200, 199, 200);
        assert_eq!(
            u.level_up(&config, &mut rng),
            Ok((Stat::Toughness, 200))
        );
        assert_eq!(u.level_up(&config, &mut rng), Err(StatsMaxed { cap: 200 }));
        assert_eq!(u.stats, Stats::new(200, 200, 200, 200));
    }

    #[test]
    fn raise_stat_caps() {
        let config = SimConfig::default();
        let mut u = unit(Stats::new(25, 25, 25, 25));
        u.stats.toughness = 198;
        assert_eq!(u.raise_stat(Stat::Toughness, 5, &config), 200);
        assert_eq!(u.raise_stat(Stat::Weight, 5, &config), 30);
    }

    #[test]
    fn adjacent_steps_cannot_be_interrupted() {
        let step = Step {
            start: DVec3::ZERO,
            target: VoxelCoord::new(1, 0, 0),
        };
        let adjacent = Activity::Move(MoveState {
            plan: MovePlan::Adjacent,
            step: Some(step),
        });
        assert!(adjacent.is_uninterruptible());
        let route = Activity::Move(MoveState {
            plan: MovePlan::Route {
                destination: VoxelCoord::new(3, 0, 0),
                remaining: vec![],
            },
            step: Some(step),
        });
        assert!(!route.is_uninterruptible());
        assert!(route.is_mid_step());
    }
}
