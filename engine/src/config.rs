//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use clap::Parser;
use hearthguard_common::CombatStance;
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "engine/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "engine/.env"
    )]
    pub env_file: Option<String>,

    #[arg(
        short = 't',
        long = "ticks",
        help = "Stop after this many ticks instead of running until interrupted"
    )]
    pub ticks: Option<u64>,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
            ticks: None,
        }
    }
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open config file: {0}")]
    Open(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

impl Configuration {
    pub fn load(path: &str) -> Result<Configuration, ConfigError> {
        let conf = serde_yaml::from_reader(std::fs::File::open(path)?)?;
        Ok(conf)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Ticks per simulated second
    pub tick_rate: u32,
    /// Number of companions spawned into the demo scenario
    pub companions: u32,
    /// Seed for the sandbox's scripted hostiles and wander points
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            companions: 2,
            seed: 0x5eed,
        }
    }
}

impl SimulationConfig {
    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding one profile document per companion
    #[serde(default)]
    pub directory: EnvField<String>,
}

impl PersistenceConfig {
    pub const DEFAULT_DIRECTORY: &'static str = "data/companions";

    /// Configured directory, falling back to the default when unset
    pub fn directory(&self) -> &str {
        let directory = self.directory.as_str();
        if directory.is_empty() {
            Self::DEFAULT_DIRECTORY
        } else {
            directory
        }
    }
}

/// Every tunable used by the behavior controllers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub resource: ResourceConfig,
    pub follow: FollowConfig,
    pub targeting: TargetingConfig,
    pub combat: CombatConfig,
    pub harvest: HarvestConfig,
    pub smelt: SmeltConfig,
    pub home: HomeConfig,
    pub command: CommandConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub base_max: f32,
    pub regen_per_second: f32,
    pub rest_multiplier: f32,
    /// Seconds after a drain before regeneration resumes
    pub regen_delay: f32,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            base_max: 100.0,
            regen_per_second: 6.0,
            rest_multiplier: 2.0,
            regen_delay: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    pub inner_exit: f32,
    pub comfort_to_inner: f32,
    pub comfort_exit: f32,
    pub catch_up_to_comfort: f32,
    pub catch_up_exit: f32,
    pub sprint_to_catch_up: f32,
    pub hold_distance: f32,
    pub hold_speed: f32,
    pub anchor_back: f32,
    pub anchor_side: f32,
    pub catch_up_anchor_scale: f32,
    pub sprint_anchor_scale: f32,
    pub direct_pursuit_distance: f32,
    pub teleport_distance: f32,
    pub teleport_behind: f32,
    pub stuck_min_gap: f32,
    /// Speed toward the owner below this counts as no progress
    pub stuck_progress: f32,
    pub stuck_nudge_after: f32,
    pub stuck_teleport_after: f32,
    pub nudge_distance: f32,
    pub owner_leash: f32,
    pub waypoint_run_distance: f32,
    pub waypoint_stop_radius: f32,
    pub run_cost_per_second: f32,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            inner_exit: 2.2,
            comfort_to_inner: 1.5,
            comfort_exit: 4.0,
            catch_up_to_comfort: 3.0,
            catch_up_exit: 10.0,
            sprint_to_catch_up: 8.0,
            hold_distance: 2.7,
            hold_speed: 0.75,
            anchor_back: 2.0,
            anchor_side: 1.2,
            catch_up_anchor_scale: 0.75,
            sprint_anchor_scale: 0.5,
            direct_pursuit_distance: 12.0,
            teleport_distance: 40.0,
            teleport_behind: 2.5,
            stuck_min_gap: 4.0,
            stuck_progress: 0.4,
            stuck_nudge_after: 1.5,
            stuck_teleport_after: 3.0,
            nudge_distance: 2.5,
            owner_leash: 30.0,
            waypoint_run_distance: 6.0,
            waypoint_stop_radius: 0.4,
            run_cost_per_second: 4.0,
        }
    }
}

/// A value that may differ per combat stance
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StanceValues {
    pub balanced: f32,
    pub aggressive: f32,
    pub defensive: f32,
    pub passive: f32,
}

impl StanceValues {
    pub fn uniform(value: f32) -> Self {
        Self {
            balanced: value,
            aggressive: value,
            defensive: value,
            passive: value,
        }
    }

    pub fn get(&self, stance: CombatStance) -> f32 {
        match stance {
            CombatStance::Balanced => self.balanced,
            CombatStance::Aggressive => self.aggressive,
            CombatStance::Defensive => self.defensive,
            CombatStance::Passive => self.passive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    pub self_defense_radius: StanceValues,
    pub aggro_radius: StanceValues,
    pub directed_lock_seconds: f32,
    /// Free locks drop targets that wander farther than this
    pub release_radius: f32,
    /// While following, non-directed locks drop once the owner is farther than this
    pub owner_tether: f32,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            self_defense_radius: StanceValues::uniform(10.0),
            aggro_radius: StanceValues {
                balanced: 15.0,
                aggressive: 20.0,
                defensive: 8.0,
                passive: 0.0,
            },
            directed_lock_seconds: 10.0,
            release_radius: 35.0,
            owner_tether: 40.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub melee_range: f32,
    pub shuffle_margin: f32,
    pub approach_run_distance: f32,
    /// Stamina per second spent running toward a target
    pub approach_run_cost: f32,
    pub ranged_enter_distance: f32,
    pub ranged_exit_distance: f32,
    pub min_projectile_speed: f32,
    pub gravity: f32,
    pub attack_interval: f32,
    pub attack_cost: f32,
    pub power_attack_cost: f32,
    pub power_attack_cooldown: f32,
    pub block_cost: f32,
    pub dodge_cost: f32,
    pub dodge_distance: f32,
    pub threat_radius: f32,
    pub projectile_radius: f32,
    pub retreat_health: f32,
    pub retreat_stamina: f32,
    pub reengage_health: f32,
    pub reengage_stamina: f32,
    pub retreat_distance: f32,
    pub wear_per_strike: f32,
    pub wear_per_hit: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            melee_range: 2.2,
            shuffle_margin: 1.5,
            approach_run_distance: 6.0,
            approach_run_cost: 4.0,
            ranged_enter_distance: 20.0,
            ranged_exit_distance: 12.0,
            min_projectile_speed: 15.0,
            gravity: 9.81,
            attack_interval: 1.0,
            attack_cost: 10.0,
            power_attack_cost: 20.0,
            power_attack_cooldown: 3.0,
            block_cost: 5.0,
            dodge_cost: 12.0,
            dodge_distance: 3.0,
            threat_radius: 4.0,
            projectile_radius: 15.0,
            retreat_health: 0.30,
            retreat_stamina: 0.15,
            reengage_health: 0.50,
            reengage_stamina: 0.30,
            retreat_distance: 12.0,
            wear_per_strike: 1.0,
            wear_per_hit: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub search_radius: f32,
    pub standing_tree_penalty: f32,
    pub strike_range: f32,
    pub strike_interval: f32,
    pub strike_cost: f32,
    pub tool_wear: f32,
    pub drop_radius: f32,
    pub pickup_range: f32,
    /// Overweight once carried weight reaches capacity minus this margin
    pub overweight_margin: f32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            search_radius: 40.0,
            standing_tree_penalty: 3.0,
            strike_range: 2.0,
            strike_interval: 1.2,
            strike_cost: 6.0,
            tool_wear: 1.0,
            drop_radius: 8.0,
            pickup_range: 1.5,
            overweight_margin: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmeltConfig {
    pub facility_radius: f32,
    pub container_radius: f32,
    pub ore_trip_cap: u32,
    pub fuel_trip_cap: u32,
    pub fuel_critical_ratio: f32,
    pub interact_range: f32,
    pub output_drop_radius: f32,
    /// Seconds to skip a facility after collecting from it moved nothing
    pub collect_backoff: f32,
}

impl Default for SmeltConfig {
    fn default() -> Self {
        Self {
            facility_radius: 25.0,
            container_radius: 25.0,
            ore_trip_cap: 20,
            fuel_trip_cap: 40,
            fuel_critical_ratio: 0.25,
            interact_range: 1.5,
            output_drop_radius: 3.0,
            collect_backoff: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeConfig {
    pub leash_radius: f32,
    pub drop_grace: f32,
    pub wander_radius: f32,
    pub wander_pause: f32,
    pub hold_radius: f32,
    pub deposit_range: f32,
}

impl Default for HomeConfig {
    fn default() -> Self {
        Self {
            leash_radius: 50.0,
            drop_grace: 6.0,
            wander_radius: 15.0,
            wander_pause: 4.0,
            hold_radius: 1.0,
            deposit_range: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Radius around the aim point searched for a better target
    pub aim_snap_radius: f32,
    pub interact_range: f32,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            aim_snap_radius: 1.5,
            interact_range: 1.5,
        }
    }
}
