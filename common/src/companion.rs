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

//! Shared companion types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of resource a gather mode collects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarvestKind {
    Wood,
    Stone,
    Ore,
    Forage,
}

impl HarvestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvestKind::Wood => "Wood",
            HarvestKind::Stone => "Stone",
            HarvestKind::Ore => "Ore",
            HarvestKind::Forage => "Forage",
        }
    }
}

/// What the companion is doing when nothing more urgent is happening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActionMode {
    #[default]
    Follow,
    GatherWood,
    GatherStone,
    GatherOre,
    Forage,
    Smelt,
    StayPatrol,
}

impl ActionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionMode::Follow => "Follow",
            ActionMode::GatherWood => "GatherWood",
            ActionMode::GatherStone => "GatherStone",
            ActionMode::GatherOre => "GatherOre",
            ActionMode::Forage => "Forage",
            ActionMode::Smelt => "Smelt",
            ActionMode::StayPatrol => "StayPatrol",
        }
    }

    /// The resource kind collected by a gather mode
    pub fn harvest_kind(&self) -> Option<HarvestKind> {
        match self {
            ActionMode::GatherWood => Some(HarvestKind::Wood),
            ActionMode::GatherStone => Some(HarvestKind::Stone),
            ActionMode::GatherOre => Some(HarvestKind::Ore),
            ActionMode::Forage => Some(HarvestKind::Forage),
            _ => None,
        }
    }

    /// The gather mode that collects the given kind
    pub fn for_harvest(kind: HarvestKind) -> Self {
        match kind {
            HarvestKind::Wood => ActionMode::GatherWood,
            HarvestKind::Stone => ActionMode::GatherStone,
            HarvestKind::Ore => ActionMode::GatherOre,
            HarvestKind::Forage => ActionMode::Forage,
        }
    }

    pub fn is_gather(&self) -> bool {
        self.harvest_kind().is_some()
    }

    /// Gather and smelt modes are tasks; follow and patrol are not
    pub fn is_task(&self) -> bool {
        self.is_gather() || *self == ActionMode::Smelt
    }
}

/// How eagerly the companion starts and sustains fights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CombatStance {
    #[default]
    Balanced,
    Aggressive,
    Defensive,
    Passive,
}

impl CombatStance {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombatStance::Balanced => "Balanced",
            CombatStance::Aggressive => "Aggressive",
            CombatStance::Defensive => "Defensive",
            CombatStance::Passive => "Passive",
        }
    }

    /// Passive companions only fight when explicitly told to
    pub fn initiates_combat(&self) -> bool {
        !matches!(self, CombatStance::Passive)
    }
}

/// Independent on/off switches layered on top of the action mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorToggles {
    /// Keep following the owner while working in another mode
    pub follow: bool,
    pub stay_home: bool,
    pub wander: bool,
    pub auto_pickup: bool,
    pub commandable: bool,
}

impl Default for BehaviorToggles {
    fn default() -> Self {
        Self {
            follow: false,
            stay_home: false,
            wander: true,
            auto_pickup: true,
            commandable: true,
        }
    }
}

/// Persisted companion record
/// Maps to: one document per companion in the agent store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionProfile {
    pub agent_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub mode: ActionMode,
    #[serde(default)]
    pub toggles: BehaviorToggles,
    #[serde(default)]
    pub home_anchor: Option<[f32; 3]>,
    #[serde(default)]
    pub stance: CombatStance,
    pub updated_at: DateTime<Utc>,
}

impl CompanionProfile {
    /// Create a fresh profile for a newly spawned companion
    pub fn new(agent_id: Uuid, owner_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            agent_id,
            owner_id,
            name: name.into(),
            mode: ActionMode::default(),
            toggles: BehaviorToggles::default(),
            home_anchor: None,
            stance: CombatStance::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_mode(mut self, mode: ActionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_stance(mut self, stance: CombatStance) -> Self {
        self.stance = stance;
        self
    }

    pub fn with_home_anchor(mut self, anchor: [f32; 3]) -> Self {
        self.home_anchor = Some(anchor);
        self
    }

    /// Stamp the record as modified now
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
