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

//! Test utilities for controller testing
//!
//! Lightweight in-memory collaborators. Controllers are exercised against
//! these directly; end-to-end behavior is covered by the sandbox tests.

use crate::ecs::systems::TickContext;
use crate::services::*;
use glam::Vec3;
use hearthguard_common::HarvestKind;
use std::collections::HashMap;

/// Movement that teleports straight to each requested point's stop radius
#[derive(Debug, Default)]
pub struct StubMovement {
    pub position: Vec3,
    pub forward: Vec3,
    pub requests: Vec<(Vec3, f32, bool)>,
    pub stops: usize,
    pub teleports: Vec<Vec3>,
    pub refuse: bool,
}

impl StubMovement {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            forward: Vec3::Z,
            ..Default::default()
        }
    }

    pub fn last_request(&self) -> Option<(Vec3, f32, bool)> {
        self.requests.last().copied()
    }
}

impl MovementService for StubMovement {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn forward(&self) -> Vec3 {
        self.forward
    }

    fn request_move_to(&mut self, point: Vec3, stop_distance: f32, run: bool) -> MoveResult {
        self.requests.push((point, stop_distance, run));
        if self.refuse {
            MoveResult::Failed
        } else {
            MoveResult::Accepted
        }
    }

    fn stop(&mut self) {
        self.stops += 1;
    }

    fn teleport_to(&mut self, point: Vec3) {
        self.teleports.push(point);
        self.position = point;
    }
}

/// Sensor returning whatever the test put in it
#[derive(Debug, Default)]
pub struct StubSensor {
    pub owner: Option<OwnerState>,
    pub vitals: AgentVitals,
    pub agent: Vec3,
    pub hostiles: Vec<HostileInfo>,
    pub projectiles: Vec<ProjectileInfo>,
    pub entities: Vec<WorldEntity>,
    pub aim: Option<AimHit>,
    pub ground: Option<f32>,
}

impl StubSensor {
    pub fn with_owner(position: Vec3) -> Self {
        Self {
            owner: Some(OwnerState {
                position,
                velocity: Vec3::ZERO,
                forward: Vec3::Z,
                running: false,
            }),
            ..Default::default()
        }
    }

    pub fn hostile(id: u64, position: Vec3) -> HostileInfo {
        HostileInfo {
            id: ObjectId(id),
            position,
            velocity: Vec3::ZERO,
            alive: true,
            staggered: false,
            attack_imminent: false,
        }
    }

    fn within(&self, center: Vec3, radius: f32) -> impl Iterator<Item = &WorldEntity> {
        self.entities
            .iter()
            .filter(move |entity| planar_distance(center, entity.position) <= radius)
    }
}

impl WorldSensor for StubSensor {
    fn owner(&self) -> Option<OwnerState> {
        self.owner
    }

    fn vitals(&self) -> AgentVitals {
        self.vitals
    }

    fn scan_candidates(&self, kind: HarvestKind, radius: f32) -> Vec<WorldEntity> {
        self.within(self.agent, radius)
            .filter(|entity| entity.harvest_source().is_some_and(|source| source.kind() == kind))
            .cloned()
            .collect()
    }

    fn scan_hostiles(&self, radius: f32) -> Vec<HostileInfo> {
        self.hostiles
            .iter()
            .filter(|hostile| planar_distance(self.agent, hostile.position) <= radius)
            .copied()
            .collect()
    }

    fn hostile(&self, id: ObjectId) -> Option<HostileInfo> {
        self.hostiles.iter().find(|hostile| hostile.id == id).copied()
    }

    fn incoming_projectiles(&self, radius: f32) -> Vec<ProjectileInfo> {
        self.projectiles
            .iter()
            .filter(|projectile| planar_distance(self.agent, projectile.position) <= radius)
            .copied()
            .collect()
    }

    fn scan_drops(&self, center: Vec3, radius: f32) -> Vec<WorldEntity> {
        self.within(center, radius)
            .filter(|entity| matches!(entity.kind, WorldEntityKind::ItemDrop { .. }))
            .cloned()
            .collect()
    }

    fn scan_facilities(&self, radius: f32) -> Vec<WorldEntity> {
        self.within(self.agent, radius)
            .filter(|entity| entity.facility().is_some())
            .cloned()
            .collect()
    }

    fn scan_containers(&self, center: Vec3, radius: f32) -> Vec<WorldEntity> {
        self.within(center, radius)
            .filter(|entity| entity.container().is_some())
            .cloned()
            .collect()
    }

    fn entity(&self, id: ObjectId) -> Option<WorldEntity> {
        self.entities.iter().find(|entity| entity.id == id).cloned()
    }

    fn entities_near(&self, point: Vec3, radius: f32) -> Vec<WorldEntity> {
        self.within(point, radius).cloned().collect()
    }

    fn raycast_under_aim(&self) -> Option<AimHit> {
        self.aim.clone()
    }

    fn ground_height(&self, _x: f32, _z: f32) -> Option<f32> {
        self.ground
    }
}

/// Inventory with fixed weight and a simple item list
#[derive(Debug)]
pub struct StubInventory {
    pub weight: f32,
    pub capacity: f32,
    pub materials: HashMap<Material, u32>,
    pub items: Vec<(Item, f32)>,
    pub equipped: Vec<ItemId>,
}

impl Default for StubInventory {
    fn default() -> Self {
        Self {
            weight: 0.0,
            capacity: 300.0,
            materials: HashMap::new(),
            items: Vec::new(),
            equipped: Vec::new(),
        }
    }
}

impl StubInventory {
    pub fn with_item(mut self, id: u64, class: ItemClass, durability: f32) -> Self {
        self.items.push((Item { id: ItemId(id), class }, durability));
        self
    }
}

impl InventoryStore for StubInventory {
    fn carried_weight(&self) -> f32 {
        self.weight
    }

    fn capacity(&self) -> f32 {
        self.capacity
    }

    fn count(&self, material: Material) -> u32 {
        self.materials.get(&material).copied().unwrap_or(0)
    }

    fn equipped(&self) -> Vec<Item> {
        self.items
            .iter()
            .filter(|(item, _)| self.equipped.contains(&item.id))
            .map(|(item, _)| *item)
            .collect()
    }

    fn best_weapon_for(&self, context: WeaponContext, exclude: &[ItemId]) -> Option<Item> {
        self.items
            .iter()
            .filter(|(item, durability)| *durability > 0.0 && !exclude.contains(&item.id))
            .filter(|(item, _)| match context {
                WeaponContext::Melee => item.class == ItemClass::MeleeWeapon,
                WeaponContext::Ranged => item.class.is_ranged(),
                WeaponContext::Harvest(tool) => item.class == ItemClass::Tool(tool),
            })
            .map(|(item, _)| *item)
            .next()
    }

    fn equip(&mut self, item: ItemId) -> bool {
        if !self.items.iter().any(|(candidate, _)| candidate.id == item) {
            return false;
        }
        if !self.equipped.contains(&item) {
            self.equipped.push(item);
        }
        true
    }

    fn unequip(&mut self, item: ItemId) {
        self.equipped.retain(|equipped| *equipped != item);
    }

    fn durability(&self, item: ItemId) -> f32 {
        self.items
            .iter()
            .find(|(candidate, _)| candidate.id == item)
            .map(|(_, durability)| *durability)
            .unwrap_or(0.0)
    }

    fn wear(&mut self, item: ItemId, amount: f32) -> f32 {
        match self.items.iter_mut().find(|(candidate, _)| candidate.id == item) {
            Some((_, durability)) => {
                *durability = (*durability - amount).max(0.0);
                *durability
            }
            None => 0.0,
        }
    }
}

/// Records every action request
#[derive(Debug, Default)]
pub struct StubActions {
    pub attacks: Vec<(ObjectId, AttackKind)>,
    pub blocking: bool,
    pub dodges: Vec<Vec3>,
    pub strikes: Vec<ObjectId>,
    pub strike_outcome: Option<StrikeOutcome>,
    pub interactions: Vec<(ObjectId, Interaction)>,
    pub deposits: Vec<(ObjectId, Material, u32)>,
    pub feeds: Vec<(ObjectId, FacilitySlot, u32)>,
}

impl ActionService for StubActions {
    fn attack(&mut self, target: ObjectId, attack: AttackKind) -> bool {
        self.attacks.push((target, attack));
        true
    }

    fn set_blocking(&mut self, raised: bool) {
        self.blocking = raised;
    }

    fn dodge(&mut self, direction: Vec3) -> bool {
        self.dodges.push(direction);
        true
    }

    fn strike(&mut self, candidate: ObjectId) -> StrikeOutcome {
        self.strikes.push(candidate);
        self.strike_outcome.unwrap_or(StrikeOutcome::Hit)
    }

    fn pick_up(&mut self, _drop: ObjectId) -> u32 {
        1
    }

    fn withdraw(&mut self, _container: ObjectId, _material: Material, amount: u32) -> u32 {
        amount
    }

    fn deposit(&mut self, container: ObjectId, material: Material, amount: u32) -> u32 {
        self.deposits.push((container, material, amount));
        amount
    }

    fn feed(&mut self, facility: ObjectId, slot: FacilitySlot, amount: u32) -> u32 {
        self.feeds.push((facility, slot, amount));
        amount
    }

    fn collect_output(&mut self, _facility: ObjectId) -> u32 {
        0
    }

    fn interact(&mut self, target: ObjectId, interaction: Interaction) -> bool {
        self.interactions.push((target, interaction));
        true
    }
}

/// Bundle of stub collaborators that can lend out a tick context
#[derive(Debug, Default)]
pub struct StubHost {
    pub movement: StubMovement,
    pub sensor: StubSensor,
    pub inventory: StubInventory,
    pub actions: StubActions,
    pub ui: NoPanel,
}

impl StubHost {
    pub fn new(agent: Vec3) -> Self {
        let mut host = Self::default();
        host.movement = StubMovement::at(agent);
        host.sensor.agent = agent;
        host
    }

    /// Move the agent in both the movement stub and the sensor
    pub fn place_agent(&mut self, position: Vec3) {
        self.movement.position = position;
        self.sensor.agent = position;
    }

    pub fn context(&mut self, delta_time: f32) -> TickContext<'_> {
        TickContext {
            delta_time,
            movement: &mut self.movement,
            sensor: &self.sensor,
            inventory: &mut self.inventory,
            actions: &mut self.actions,
            ui: &self.ui,
        }
    }
}
