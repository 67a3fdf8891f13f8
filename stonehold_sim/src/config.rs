// Data-driven simulation configuration.
//
// Every tunable constant lives in `SimConfig`, loaded from JSON or taken from
// `Default`. The sim never uses magic numbers for balance values; it reads
// them from the config owned by `World`. Missing JSON fields fall back to the
// defaults, so a config file only needs to name what it changes.
//
// Parameters are grouped by the subsystem that reads them:
// - world limits and time step (`world.rs`),
// - movement and falling (`activity.rs`, `physics.rs`),
// - work, rest and combat timing (`activity.rs`, `combat.rs`),
// - experience and stat bounds (`unit.rs`),
// - route planning (`pathfinding.rs`).
//
// See also: `world.rs` which owns the config, `error.rs` for
// `SimError::InvalidConfig` returned by `validate()`.
//
// **Critical constraint: determinism.** Config values feed directly into
// simulation logic. Two worlds built from the same config, terrain and seed
// produce identical results.

use crate::error::SimError;
use serde::{Deserialize, Serialize};

/// Top-level simulation configuration. Never mutated once a world is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // -- World limits --------------------------------------------------------
    /// Largest `dt` accepted by `World::advance_time`, in seconds.
    pub max_time_step: f64,
    /// Maximum number of living units in one world.
    pub max_units: usize,
    /// Maximum number of units in one faction.
    pub max_units_per_faction: usize,
    /// Maximum number of factions with at least one member.
    pub max_active_factions: usize,

    // -- Cave-ins and items --------------------------------------------------
    /// Probability that a collapsing Rock or Wood voxel drops loot.
    pub loot_chance: f64,
    /// Inclusive `(min, max)` weight of a spawned item.
    pub item_weight_range: (u32, u32),

    // -- Movement ------------------------------------------------------------
    /// Falling speed in voxels per second, shared by units and items.
    pub fall_speed: f64,
    /// Health lost per full voxel fallen.
    pub fall_damage_per_level: f64,
    /// `base = factor * (strength + agility) / (2 * weight)`.
    pub base_speed_factor: f64,
    pub descend_speed_modifier: f64,
    pub ascend_speed_modifier: f64,
    pub sprint_multiplier: f64,
    /// Stamina drained per second of sprinting.
    pub sprint_stamina_per_second: f64,

    // -- Work and rest -------------------------------------------------------
    /// Work duration is `work_time_factor / strength` seconds.
    pub work_time_factor: f64,
    /// A rest must last `rest_threshold_factor / toughness` seconds before it
    /// can end.
    pub rest_threshold_factor: f64,
    /// Seconds of activity between forced rests.
    pub rest_interval: f64,
    /// Reference step for recovery rates: rates scale with `dt / rest_tick`.
    pub rest_tick: f64,
    /// Health regained per second is `(dt / rest_tick) * toughness / heal_divisor`.
    pub heal_divisor: f64,
    /// Stamina regained per second is `(dt / rest_tick) * toughness / stamina_divisor`.
    pub stamina_divisor: f64,

    // -- Combat --------------------------------------------------------------
    /// Wind-up in seconds before an attack resolves.
    pub attack_duration: f64,
    pub dodge_factor: f64,
    pub block_factor: f64,
    /// Damage dealt is `attacker strength / damage_divisor`.
    pub damage_divisor: f64,

    // -- Experience ----------------------------------------------------------
    /// Experience needed for each level-up.
    pub experience_per_level: u32,
    pub experience_move: u32,
    pub experience_work: u32,
    pub experience_combat: u32,
    /// Toughness and weight gained from a workshop improvement.
    pub workshop_bonus: u32,

    // -- Stat bounds ---------------------------------------------------------
    pub stat_min: u32,
    pub stat_max: u32,
    /// Inclusive range for the stats of randomly spawned units.
    pub initial_stat_min: u32,
    pub initial_stat_max: u32,

    // -- Route planning ------------------------------------------------------
    pub path_max_expansions: usize,
    pub path_allow_diagonal: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_time_step: 0.2,
            max_units: 100,
            max_units_per_faction: 50,
            max_active_factions: 5,
            loot_chance: 0.25,
            item_weight_range: (10, 50),
            fall_speed: 3.0,
            fall_damage_per_level: 10.0,
            base_speed_factor: 1.5,
            descend_speed_modifier: 0.5,
            ascend_speed_modifier: 1.2,
            sprint_multiplier: 2.0,
            sprint_stamina_per_second: 10.0,
            work_time_factor: 500.0,
            rest_threshold_factor: 40.0,
            rest_interval: 180.0,
            rest_tick: 0.2,
            heal_divisor: 200.0,
            stamina_divisor: 100.0,
            attack_duration: 1.0,
            dodge_factor: 0.20,
            block_factor: 0.25,
            damage_divisor: 10.0,
            experience_per_level: 10,
            experience_move: 1,
            experience_work: 10,
            experience_combat: 20,
            workshop_bonus: 5,
            stat_min: 1,
            stat_max: 200,
            initial_stat_min: 25,
            initial_stat_max: 100,
            path_max_expansions: crate::pathfinding::DEFAULT_MAX_EXPANSIONS,
            path_allow_diagonal: true,
        }
    }
}

impl SimConfig {
    /// Parse a config from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SimError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), SimError> {
        let positive = [
            ("max_time_step", self.max_time_step),
            ("fall_speed", self.fall_speed),
            ("base_speed_factor", self.base_speed_factor),
            ("descend_speed_modifier", self.descend_speed_modifier),
            ("ascend_speed_modifier", self.ascend_speed_modifier),
            ("sprint_multiplier", self.sprint_multiplier),
            ("work_time_factor", self.work_time_factor),
            ("rest_threshold_factor", self.rest_threshold_factor),
            ("rest_interval", self.rest_interval),
            ("rest_tick", self.rest_tick),
            ("heal_divisor", self.heal_divisor),
            ("stamina_divisor", self.stamina_divisor),
            ("attack_duration", self.attack_duration),
            ("damage_divisor", self.damage_divisor),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.loot_chance) {
            return Err(SimError::InvalidConfig(format!(
                "loot_chance must lie in [0, 1], got {}",
                self.loot_chance
            )));
        }
        if self.sprint_stamina_per_second < 0.0 || self.fall_damage_per_level < 0.0 {
            return Err(SimError::InvalidConfig(
                "sprint drain and fall damage must not be negative".into(),
            ));
        }
        let (item_min, item_max) = self.item_weight_range;
        if item_min == 0 || item_min > item_max {
            return Err(SimError::InvalidConfig(format!(
                "item_weight_range ({item_min}, {item_max}) is empty or includes zero"
            )));
        }
        if self.stat_min == 0 || self.stat_min > self.stat_max {
            return Err(SimError::InvalidConfig(format!(
                "stat range [{}, {}] is invalid",
                self.stat_min, self.stat_max
            )));
        }
        if self.initial_stat_min < self.stat_min
            || self.initial_stat_max > self.stat_max
            || self.initial_stat_min > self.initial_stat_max
        {
            return Err(SimError::InvalidConfig(format!(
                "initial stat range [{}, {}] must sit inside [{}, {}]",
                self.initial_stat_min, self.initial_stat_max, self.stat_min, self.stat_max
            )));
        }
        if self.experience_per_level == 0 {
            return Err(SimError::InvalidConfig(
                "experience_per_level must be positive".into(),
            ));
        }
        if self.max_units == 0
            || self.max_units_per_faction == 0
            || self.max_active_factions == 0
        {
            return Err(SimError::InvalidConfig("unit limits must be positive".into()));
        }
        if self.path_max_expansions == 0 {
            return Err(SimError::InvalidConfig(
                "path_max_expansions must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Seconds needed to finish one work action.
    pub fn work_duration(&self, strength: u32) -> f64 {
        self.work_time_factor / f64::from(strength.max(1))
    }

    /// Seconds a rest must last before it may end.
    pub fn rest_threshold(&self, toughness: u32) -> f64 {
        self.rest_threshold_factor / f64::from(toughness.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_and_serializes() {
        let config = SimConfig::default();
        config.validate().unwrap();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
        assert_eq!(restored.path_max_expansions, 400);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{
            "max_time_step": 0.1,
            "loot_chance": 1.0,
            "item_weight_range": [20, 30]
        }"#;
        let config = SimConfig::from_json(json).unwrap();
        assert_eq!(config.max_time_step, 0.1);
        assert_eq!(config.loot_chance, 1.0);
        assert_eq!(config.item_weight_range, (20, 30));
        assert_eq!(config.max_units, 100);
        assert_eq!(config.attack_duration, 1.0);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = SimConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig(_)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = SimConfig::default();
        config.rest_tick = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.loot_chance = 1.5;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.item_weight_range = (60, 50);
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.initial_stat_max = 300;
        assert!(config.validate().is_err());

        assert!(SimConfig::from_json(r#"{ "max_time_step": -1.0 }"#).is_err());
    }

    #[test]
    fn derived_durations() {
        let config = SimConfig::default();
        assert_eq!(config.work_duration(25), 20.0);
        assert_eq!(config.rest_threshold(40), 1.0);
    }
}
