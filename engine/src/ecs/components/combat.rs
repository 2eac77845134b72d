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

//! Combat components for target locks and engagement state

use crate::services::{InventoryStore, ItemId, ObjectId};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// How a target lock was acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockKind {
    /// Picked up by the companion's own aggro scan
    Free,
    /// Ordered by the owner; expires on a timer
    Directed,
    /// A hostile came too close during a gather or smelt task
    SelfDefense,
}

impl LockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::Free => "Free",
            LockKind::Directed => "Directed",
            LockKind::SelfDefense => "SelfDefense",
        }
    }
}

/// Commitment to one hostile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetLock {
    pub target: ObjectId,
    pub kind: LockKind,
    /// Seconds left for directed locks, `None` for open-ended locks
    pub remaining: Option<f32>,
}

impl TargetLock {
    pub fn free(target: ObjectId) -> Self {
        Self {
            target,
            kind: LockKind::Free,
            remaining: None,
        }
    }

    pub fn self_defense(target: ObjectId) -> Self {
        Self {
            target,
            kind: LockKind::SelfDefense,
            remaining: None,
        }
    }

    pub fn directed(target: ObjectId, seconds: f32) -> Self {
        Self {
            target,
            kind: LockKind::Directed,
            remaining: Some(seconds),
        }
    }

    pub fn is_directed(&self) -> bool {
        self.kind == LockKind::Directed
    }

    /// Count the timer down, returning false once it has run out
    pub fn tick(&mut self, delta_time: f32) -> bool {
        match self.remaining.as_mut() {
            Some(remaining) => {
                *remaining -= delta_time;
                *remaining > 1e-4
            }
            None => true,
        }
    }
}

/// Engagement state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CombatPhase {
    #[default]
    Idle,
    Approach,
    EngageMelee,
    EngageRanged,
    Block,
    Retreat,
    Recover,
}

impl CombatPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombatPhase::Idle => "Idle",
            CombatPhase::Approach => "Approach",
            CombatPhase::EngageMelee => "EngageMelee",
            CombatPhase::EngageRanged => "EngageRanged",
            CombatPhase::Block => "Block",
            CombatPhase::Retreat => "Retreat",
            CombatPhase::Recover => "Recover",
        }
    }
}

/// Preferred weapon reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EngagementRange {
    #[default]
    Melee,
    Ranged,
}

/// Gear that reached zero durability
///
/// Items stay excluded from auto-equip until the host reports durability
/// above zero again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokenGear {
    items: Vec<ItemId>,
}

impl BrokenGear {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, item: ItemId) {
        if !self.items.contains(&item) {
            self.items.push(item);
        }
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.items.contains(&item)
    }

    /// Items to pass as the exclusion list to `best_weapon_for`
    pub fn excluded(&self) -> &[ItemId] {
        &self.items
    }

    /// Drop anything that has been repaired
    pub fn refresh(&mut self, inventory: &dyn InventoryStore) {
        self.items.retain(|item| inventory.durability(*item) <= 0.0);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Explicit owned combat state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatState {
    pub phase: CombatPhase,
    pub target: Option<ObjectId>,
    pub range: EngagementRange,
    /// Seconds the block has been raised
    pub block_timer: f32,
    /// Target to punish after a perfect parry
    pub counter_pending: Option<ObjectId>,
    pub attack_cooldown: f32,
    pub power_attack_cooldown: f32,
    /// Where the current retreat is heading
    pub retreat_point: Option<Vec3>,
    pub broken: BrokenGear,
}

impl CombatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_engaged(&self) -> bool {
        self.phase != CombatPhase::Idle
    }

    /// Count cooldowns down
    pub fn update_timers(&mut self, delta_time: f32) {
        self.attack_cooldown = (self.attack_cooldown - delta_time).max(0.0);
        self.power_attack_cooldown = (self.power_attack_cooldown - delta_time).max(0.0);
        if self.phase == CombatPhase::Block {
            self.block_timer += delta_time;
        }
    }

    /// Return to Idle, keeping cooldowns and broken gear
    pub fn reset(&mut self) {
        self.phase = CombatPhase::Idle;
        self.target = None;
        self.range = EngagementRange::Melee;
        self.block_timer = 0.0;
        self.counter_pending = None;
        self.retreat_point = None;
    }
}
