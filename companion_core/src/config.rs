// Data-driven companion configuration.
//
// Every threshold, cap, radius, timeout and probability the machines use is
// a named field here. The machines never use magic numbers; they read from
// the config group they were started with. Time budgets are in ticks; the
// defaults are written as seconds times `DEFAULT_TICKS_PER_SECOND` so the
// intent stays readable.
//
// `CompanionConfig` loads from JSON. Every struct is `#[serde(default)]`, so
// a file only needs the fields it overrides.
//
// See also: `gather.rs`, `survival.rs`, `construction.rs` (consumers),
// `error.rs` for `ConfigError`, `src/bin/sandbox.rs` which loads a config
// file from the command line.
//
// **Critical constraint: determinism.** The survival ladder's random
// choices read their probabilities from here; identical configs and seeds
// replay identical decisions.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TICKS_PER_SECOND: u64 = 20;

const fn secs(s: u64) -> u64 {
    s * DEFAULT_TICKS_PER_SECOND
}

// ---------------------------------------------------------------------------
// Gathering
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatherConfig {
    /// Maximum positions in an ore (or generic block) work queue.
    pub vein_cap: usize,
    /// Maximum log positions in a tree work queue.
    pub tree_cap: usize,
    /// During felling, leaves of any species within this Chebyshev radius of
    /// the origin log connect branches to the trunk.
    pub leaf_link_radius: u32,
    /// Upper bound on positions visited by one flood fill, including
    /// connectors that never enter the queue.
    pub flood_visit_budget: usize,
    /// Largest shell radius scanned while searching.
    pub search_radius: u32,
    /// Shells scanned per tick while searching.
    pub shells_per_tick: u32,
    /// Searching ticks without finding a target before the session fails.
    pub search_timeout_ticks: u64,
    /// Ticks spent on one target (travel plus work) before abandoning it.
    pub target_dwell_ticks: u64,
    /// Distance within which the agent can break a block.
    pub reach: f64,
    pub move_speed: f64,
    pub min_break_ticks: u32,
    pub base_break_ticks: u32,
    /// Ticks added per unit of block hardness.
    pub hardness_factor: f32,
    pub pickup_radius: u32,
    /// Generic stone and soil above this Y are minable only without open sky.
    pub surface_depth_threshold: i32,
    /// Radius scanned for landmarks when building the protected zone.
    pub protected_scan_radius: u32,
    /// Chebyshev radius protected around each landmark.
    pub protected_landmark_radius: u32,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            vein_cap: 64,
            tree_cap: 128,
            leaf_link_radius: 6,
            flood_visit_budget: 4096,
            search_radius: 32,
            shells_per_tick: 2,
            search_timeout_ticks: secs(10),
            target_dwell_ticks: secs(15),
            reach: 4.5,
            move_speed: 1.0,
            min_break_ticks: 5,
            base_break_ticks: 10,
            hardness_factor: 15.0,
            pickup_radius: 3,
            surface_depth_threshold: 50,
            protected_scan_radius: 16,
            protected_landmark_radius: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// Survival
// ---------------------------------------------------------------------------

/// Tick ceilings after which each survival state returns to Assessing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateCeilings {
    pub assessing: u64,
    pub hunting: u64,
    pub gathering: u64,
    pub equipping: u64,
    pub storing: u64,
    pub retrieving: u64,
    pub exploring: u64,
    pub patrolling: u64,
    pub resting: u64,
}

impl Default for StateCeilings {
    fn default() -> Self {
        Self {
            assessing: 20,
            hunting: secs(60),
            gathering: secs(120),
            equipping: 20,
            storing: secs(30),
            retrieving: secs(30),
            exploring: secs(60),
            patrolling: secs(60),
            resting: secs(20),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurvivalConfig {
    /// Food items below which the agent looks for food.
    pub food_threshold: u32,
    /// Assessing timeline: tick of the environment scan, self scan, and
    /// decision, counted from entering Assessing.
    pub environment_scan_tick: u64,
    pub self_scan_tick: u64,
    pub decision_tick: u64,
    /// Radius scanned for containers and points of interest.
    pub environment_scan_radius: u32,
    pub access_point_radius: u32,
    pub hunt_radius: u32,
    pub attack_reach: f64,
    /// Distance within which the agent can use a container or access point.
    pub interact_reach: f64,
    pub attack_interval_ticks: u64,
    /// After a hunt finds nothing, skip hunting for this long.
    pub hunt_cooldown_ticks: u64,
    /// After external storage yields nothing, skip it for this long.
    pub retrieval_cooldown_ticks: u64,
    /// Fences or walls within this radius of an animal count toward the
    /// enclosure heuristic.
    pub enclosure_radius: i32,
    pub enclosure_block_threshold: u32,
    /// Probability an armed agent explores rather than patrols.
    pub armed_explore_chance: f64,
    /// Probability an unarmed agent explores rather than rests.
    pub unarmed_explore_chance: f64,
    pub explore_min_distance: i32,
    pub explore_max_distance: i32,
    /// Distance scored best for a waypoint.
    pub explore_preferred_distance: f64,
    pub explore_candidates: u32,
    pub explore_poi_radius: f64,
    pub explore_poi_bonus: f64,
    pub explore_visited_radius: f64,
    pub explore_visited_penalty: f64,
    pub waypoint_history: usize,
    pub patrol_radius: i32,
    pub threat_radius: u32,
    pub patrol_wander_interval_ticks: u64,
    /// Mature crops harvested per survival gathering session.
    pub crop_gather_count: u32,
    /// Food items requested per external-storage extraction.
    pub retrieve_max: u32,
    pub move_speed: f64,
    pub ceilings: StateCeilings,
}

impl Default for SurvivalConfig {
    fn default() -> Self {
        Self {
            food_threshold: 8,
            environment_scan_tick: 0,
            self_scan_tick: 1,
            decision_tick: 2,
            environment_scan_radius: 16,
            access_point_radius: 32,
            hunt_radius: 24,
            attack_reach: 3.0,
            interact_reach: 4.5,
            attack_interval_ticks: 10,
            hunt_cooldown_ticks: secs(30),
            retrieval_cooldown_ticks: secs(60),
            enclosure_radius: 3,
            enclosure_block_threshold: 4,
            armed_explore_chance: 1.0 / 3.0,
            unarmed_explore_chance: 0.1,
            explore_min_distance: 12,
            explore_max_distance: 40,
            explore_preferred_distance: 24.0,
            explore_candidates: 8,
            explore_poi_radius: 8.0,
            explore_poi_bonus: 0.5,
            explore_visited_radius: 10.0,
            explore_visited_penalty: 1.0,
            waypoint_history: 16,
            patrol_radius: 12,
            threat_radius: 16,
            patrol_wander_interval_ticks: secs(5),
            crop_gather_count: 8,
            retrieve_max: 32,
            move_speed: 1.0,
            ceilings: StateCeilings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    /// Distance from the origin at which Starting counts as arrived.
    pub arrive_radius: f64,
    pub travel_timeout_ticks: u64,
    /// Ticks without the material shortfall shrinking before failing.
    pub gather_timeout_ticks: u64,
    pub place_interval_ticks: u64,
    pub place_reach: f64,
    /// Ticks spent trying to reach one placement before skipping it.
    pub placement_dwell_ticks: u64,
    /// Extra cells cleared around the plan footprint.
    pub site_margin: i32,
    pub site_prep_timeout_ticks: u64,
    pub clears_per_tick: u32,
    pub storage_radius: u32,
    pub container_radius: u32,
    pub move_speed: f64,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            arrive_radius: 3.0,
            travel_timeout_ticks: secs(60),
            gather_timeout_ticks: secs(300),
            place_interval_ticks: 4,
            place_reach: 5.0,
            placement_dwell_ticks: secs(10),
            site_margin: 1,
            site_prep_timeout_ticks: secs(30),
            clears_per_tick: 4,
            storage_radius: 32,
            container_radius: 16,
            move_speed: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    pub ticks_per_second: u64,
    pub gather: GatherConfig,
    pub survival: SurvivalConfig,
    pub construction: ConstructionConfig,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            gather: GatherConfig::default(),
            survival: SurvivalConfig::default(),
            construction: ConstructionConfig::default(),
        }
    }
}

impl CompanionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = CompanionConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored = CompanionConfig::from_json_str(&json).unwrap();
        assert_eq!(config.gather.vein_cap, restored.gather.vein_cap);
        assert_eq!(config.construction, restored.construction);
        assert_eq!(config.survival.ceilings, restored.survival.ceilings);
        assert!((config.survival.armed_explore_chance - restored.survival.armed_explore_chance).abs() < 1e-12);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{ "gather": { "vein_cap": 16 }, "survival": { "armed_explore_chance": 0.5 } }"#;
        let config = CompanionConfig::from_json_str(json).unwrap();
        assert_eq!(config.gather.vein_cap, 16);
        assert_eq!(config.gather.tree_cap, 128);
        assert_eq!(config.survival.armed_explore_chance, 0.5);
        assert_eq!(config.survival.ceilings, StateCeilings::default());
        assert_eq!(config.ticks_per_second, DEFAULT_TICKS_PER_SECOND);
    }

    #[test]
    fn default_timeouts_match_seconds() {
        let g = GatherConfig::default();
        assert_eq!(g.search_timeout_ticks, 200);
        assert_eq!(g.target_dwell_ticks, 300);
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(matches!(
            CompanionConfig::from_json_str("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            CompanionConfig::load("/nonexistent/companion.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
