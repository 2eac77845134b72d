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

//! Sandbox world objects: the owner avatar, scripted hostiles, resources,
//! facilities, storage and the companion's own pack and vitals.

use crate::services::{
    FacilityClass, FacilitySlot, HarvestSource, Interaction, Item, ItemClass, ItemId, Material,
    MaterialStack, SlotLevel, WeaponContext,
};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Marks the player body companions follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OwnerAvatar {
    pub running: bool,
}

/// A scripted creature that chases and swings at companions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostileCreature {
    pub health: f32,
    pub speed: f32,
    pub reach: f32,
    pub damage: f32,
    pub aggro_radius: f32,
    pub attack_interval: f32,
    pub windup_time: f32,
    /// Seconds until a wound-up swing lands, zero when idle
    pub windup: f32,
    pub cooldown: f32,
    /// Seconds of stagger left after a blocked swing or power hit
    pub stagger: f32,
}

impl Default for HostileCreature {
    fn default() -> Self {
        Self {
            health: 60.0,
            speed: 3.0,
            reach: 2.0,
            damage: 8.0,
            aggro_radius: 18.0,
            attack_interval: 2.0,
            windup_time: 0.6,
            windup: 0.0,
            cooldown: 0.0,
            stagger: 0.0,
        }
    }
}

impl HostileCreature {
    pub fn alive(&self) -> bool {
        self.health > 0.0
    }

    /// A creature that never moves or attacks
    pub fn dummy(health: f32) -> Self {
        Self {
            health,
            speed: 0.0,
            damage: 0.0,
            aggro_radius: 0.0,
            ..Self::default()
        }
    }
}

/// Something that yields materials when struck enough times
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Harvestable {
    pub source: HarvestSource,
    pub hits_left: u32,
    pub yield_count: u32,
}

impl Harvestable {
    pub fn new(source: HarvestSource) -> Self {
        let (hits_left, yield_count) = match source {
            HarvestSource::StandingTree => (4, 10),
            HarvestSource::FallenLog => (3, 8),
            HarvestSource::Stump => (2, 4),
            HarvestSource::Rock => (3, 6),
            HarvestSource::OreVein => (4, 5),
            HarvestSource::Pickable => (1, 2),
        };
        Self {
            source,
            hits_left,
            yield_count,
        }
    }
}

/// Loose materials lying on the ground
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemDrop {
    pub material: Material,
    pub count: u32,
}

/// A kiln or furnace that converts its slots over time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub class: FacilityClass,
    pub fuel: Option<SlotLevel>,
    pub input: SlotLevel,
    pub output_ready: u32,
    pub cycle_seconds: f32,
    pub progress: f32,
}

impl Facility {
    pub fn new(class: FacilityClass) -> Self {
        match class {
            FacilityClass::Kiln => Self {
                class,
                fuel: None,
                input: SlotLevel {
                    material: Material::Wood,
                    current: 0,
                    capacity: 50,
                },
                output_ready: 0,
                cycle_seconds: 4.0,
                progress: 0.0,
            },
            FacilityClass::Furnace => Self {
                class,
                fuel: Some(SlotLevel {
                    material: Material::Coal,
                    current: 0,
                    capacity: 40,
                }),
                input: SlotLevel {
                    material: Material::Ore,
                    current: 0,
                    capacity: 20,
                },
                output_ready: 0,
                cycle_seconds: 6.0,
                progress: 0.0,
            },
        }
    }

    pub fn slot_mut(&mut self, slot: FacilitySlot) -> Option<&mut SlotLevel> {
        match slot {
            FacilitySlot::Fuel => self.fuel.as_mut(),
            FacilitySlot::Input => Some(&mut self.input),
        }
    }

    fn can_cycle(&self) -> bool {
        self.input.current > 0 && self.fuel.is_none_or(|fuel| fuel.current > 0)
    }

    /// Run the conversion clock, returning how many units finished
    pub fn process(&mut self, delta_time: f32) -> u32 {
        if !self.can_cycle() {
            self.progress = 0.0;
            return 0;
        }
        self.progress += delta_time;
        let mut finished = 0;
        while self.progress >= self.cycle_seconds && self.can_cycle() {
            self.progress -= self.cycle_seconds;
            self.input.current -= 1;
            if let Some(fuel) = self.fuel.as_mut() {
                fuel.current -= 1;
            }
            self.output_ready += 1;
            finished += 1;
        }
        finished
    }
}

/// A chest with a fixed number of stack slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub slots: u32,
    pub stack_size: u32,
    pub stacks: Vec<MaterialStack>,
}

impl Storage {
    pub fn new(slots: u32) -> Self {
        Self {
            slots,
            stack_size: 50,
            stacks: Vec::new(),
        }
    }

    pub fn with(mut self, material: Material, count: u32) -> Self {
        self.store(material, count);
        self
    }

    pub fn free_slots(&self) -> u32 {
        self.slots.saturating_sub(self.stacks.len() as u32)
    }

    pub fn count(&self, material: Material) -> u32 {
        self.stacks
            .iter()
            .filter(|stack| stack.material == material)
            .map(|stack| stack.count)
            .sum()
    }

    /// Add up to `amount`, topping up partial stacks before opening new ones
    pub fn store(&mut self, material: Material, amount: u32) -> u32 {
        let mut remaining = amount;
        for stack in self.stacks.iter_mut().filter(|stack| stack.material == material) {
            let room = self.stack_size.saturating_sub(stack.count).min(remaining);
            stack.count += room;
            remaining -= room;
        }
        while remaining > 0 && (self.stacks.len() as u32) < self.slots {
            let count = remaining.min(self.stack_size);
            self.stacks.push(MaterialStack { material, count });
            remaining -= count;
        }
        amount - remaining
    }

    /// Remove up to `amount`, dropping emptied stacks
    pub fn take(&mut self, material: Material, amount: u32) -> u32 {
        let mut remaining = amount;
        for stack in self.stacks.iter_mut().rev().filter(|stack| stack.material == material) {
            let taken = stack.count.min(remaining);
            stack.count -= taken;
            remaining -= taken;
        }
        self.stacks.retain(|stack| stack.count > 0);
        amount - remaining
    }
}

/// Furniture and vehicles that only respond to interactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixtureKind {
    Door { open: bool },
    Cart { attached: bool },
    Bed,
    Chair,
    Ship,
    RepairStation,
}

impl FixtureKind {
    pub fn accepts(&self, interaction: Interaction) -> bool {
        matches!(
            (self, interaction),
            (FixtureKind::Door { .. }, Interaction::OpenDoor)
                | (FixtureKind::Cart { .. }, Interaction::AttachCart | Interaction::DetachCart)
                | (FixtureKind::Bed, Interaction::Sleep)
                | (FixtureKind::Chair, Interaction::Sit)
                | (FixtureKind::Ship, Interaction::Board)
                | (FixtureKind::RepairStation, Interaction::Repair)
        )
    }
}

/// A projectile in flight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub velocity: Vec3,
    pub ttl: f32,
}

/// One item in a companion's pack
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackItem {
    pub item: Item,
    pub durability: f32,
    /// Ranking used when choosing between items of the same class
    pub power: f32,
    pub weight: f32,
}

/// Materials and gear carried by a companion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    pub capacity: f32,
    pub materials: BTreeMap<Material, u32>,
    pub items: Vec<PackItem>,
    pub equipped: Vec<ItemId>,
}

impl Default for Pack {
    fn default() -> Self {
        Self {
            capacity: 300.0,
            materials: BTreeMap::new(),
            items: Vec::new(),
            equipped: Vec::new(),
        }
    }
}

/// Carry weight of one unit of material
pub fn material_weight(material: Material) -> f32 {
    match material {
        Material::Wood => 1.5,
        Material::Stone => 2.0,
        Material::Ore => 2.5,
        Material::Coal => 1.0,
        Material::Metal => 3.0,
        Material::Forage => 0.5,
    }
}

impl Pack {
    pub fn weight(&self) -> f32 {
        let materials: f32 = self
            .materials
            .iter()
            .map(|(material, count)| material_weight(*material) * *count as f32)
            .sum();
        let items: f32 = self.items.iter().map(|item| item.weight).sum();
        materials + items
    }

    pub fn count(&self, material: Material) -> u32 {
        self.materials.get(&material).copied().unwrap_or(0)
    }

    pub fn add(&mut self, material: Material, amount: u32) {
        if amount > 0 {
            *self.materials.entry(material).or_insert(0) += amount;
        }
    }

    /// Remove up to `amount`, returning what was actually removed
    pub fn remove(&mut self, material: Material, amount: u32) -> u32 {
        let held = self.count(material);
        let taken = held.min(amount);
        if taken == held {
            self.materials.remove(&material);
        } else {
            self.materials.insert(material, held - taken);
        }
        taken
    }

    pub fn item(&self, id: ItemId) -> Option<&PackItem> {
        self.items.iter().find(|entry| entry.item.id == id)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut PackItem> {
        self.items.iter_mut().find(|entry| entry.item.id == id)
    }

    /// Highest powered, still usable item fitting the context
    pub fn best_for(&self, context: WeaponContext, exclude: &[ItemId]) -> Option<Item> {
        self.items
            .iter()
            .filter(|entry| entry.durability > 0.0 && !exclude.contains(&entry.item.id))
            .filter(|entry| match (context, entry.item.class) {
                (WeaponContext::Melee, ItemClass::MeleeWeapon) => true,
                (WeaponContext::Ranged, ItemClass::RangedWeapon { .. }) => true,
                (WeaponContext::Harvest(wanted), ItemClass::Tool(kind)) => wanted == kind,
                _ => false,
            })
            .max_by(|a, b| a.power.total_cmp(&b.power))
            .map(|entry| entry.item)
    }

    /// Equip an item, replacing anything held in the same hand
    pub fn equip(&mut self, id: ItemId) -> bool {
        let Some(entry) = self.item(id).copied() else {
            return false;
        };
        if entry.durability <= 0.0 {
            return false;
        }
        let hand = Hand::of(entry.item.class);
        let items = &self.items;
        self.equipped.retain(|held| {
            items
                .iter()
                .find(|other| other.item.id == *held)
                .is_none_or(|other| Hand::of(other.item.class) != hand)
        });
        self.equipped.push(id);
        true
    }

    pub fn unequip(&mut self, id: ItemId) {
        self.equipped.retain(|held| *held != id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hand {
    Main,
    Off,
    Body,
}

impl Hand {
    fn of(class: ItemClass) -> Self {
        match class {
            ItemClass::MeleeWeapon | ItemClass::RangedWeapon { .. } | ItemClass::Tool(_) => {
                Hand::Main
            }
            ItemClass::Shield => Hand::Off,
            ItemClass::Armor => Hand::Body,
        }
    }
}

/// Health, rest and the blocking pose of a companion body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub health: f32,
    pub max_health: f32,
    pub stamina_bonus: f32,
    pub resting: bool,
    pub blocking: bool,
    /// Hits landed since the owning brain last ticked
    pub hits_taken: u32,
    pub regen_per_second: f32,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            health: 100.0,
            max_health: 100.0,
            stamina_bonus: 0.0,
            resting: false,
            blocking: false,
            hits_taken: 0,
            regen_per_second: 0.5,
        }
    }
}

/// One request a companion made of the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActionRecord {
    Attack { target: u64, landed: bool },
    Strike { target: u64 },
    PickUp { material: Material, count: u32 },
    Withdraw { material: Material, count: u32 },
    Deposit { material: Material, count: u32 },
    Feed { slot: FacilitySlot, count: u32 },
    Collect { material: Material, count: u32 },
    Interact { target: u64, interaction: Interaction },
    Dodge,
}

/// Everything a companion asked the sandbox to do, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    pub entries: Vec<ActionRecord>,
}

impl ActionLog {
    pub const LIMIT: usize = 256;

    pub fn push(&mut self, record: ActionRecord) {
        if self.entries.len() == Self::LIMIT {
            self.entries.remove(0);
        }
        self.entries.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sword(id: u64, power: f32) -> PackItem {
        PackItem {
            item: Item {
                id: ItemId(id),
                class: ItemClass::MeleeWeapon,
            },
            durability: 50.0,
            power,
            weight: 4.0,
        }
    }

    #[test]
    fn test_storage_tops_up_before_new_slot() {
        let mut storage = Storage::new(2).with(Material::Ore, 40);

        assert_eq!(storage.store(Material::Ore, 30), 30);
        assert_eq!(storage.stacks.len(), 2);
        assert_eq!(storage.count(Material::Ore), 70);
        assert_eq!(storage.free_slots(), 0);

        assert_eq!(storage.store(Material::Ore, 50), 30);
        assert_eq!(storage.store(Material::Coal, 5), 0);
    }

    #[test]
    fn test_storage_take_frees_slots() {
        let mut storage = Storage::new(4).with(Material::Coal, 60);

        assert_eq!(storage.take(Material::Coal, 100), 60);
        assert_eq!(storage.free_slots(), 4);
    }

    #[test]
    fn test_furnace_needs_fuel() {
        let mut furnace = Facility::new(FacilityClass::Furnace);
        furnace.input.current = 5;

        assert_eq!(furnace.process(30.0), 0);

        if let Some(fuel) = furnace.slot_mut(FacilitySlot::Fuel) {
            fuel.current = 2;
        }
        assert_eq!(furnace.process(30.0), 2);
        assert_eq!(furnace.output_ready, 2);
        assert_eq!(furnace.input.current, 3);
    }

    #[test]
    fn test_kiln_burns_input() {
        let mut kiln = Facility::new(FacilityClass::Kiln);
        kiln.input.current = 3;

        assert_eq!(kiln.process(kiln.cycle_seconds * 2.0), 2);
        assert_eq!(kiln.input.current, 1);
    }

    #[test]
    fn test_pack_weight_and_remove() {
        let mut pack = Pack::default();
        pack.add(Material::Wood, 10);
        pack.items.push(sword(1, 10.0));

        assert_eq!(pack.weight(), 19.0);
        assert_eq!(pack.remove(Material::Wood, 25), 10);
        assert_eq!(pack.count(Material::Wood), 0);
    }

    #[test]
    fn test_pack_best_and_equip_swaps_hand() {
        let mut pack = Pack::default();
        pack.items.push(sword(1, 10.0));
        pack.items.push(sword(2, 20.0));

        let best = pack.best_for(WeaponContext::Melee, &[]).map(|item| item.id);
        assert_eq!(best, Some(ItemId(2)));
        let fallback = pack.best_for(WeaponContext::Melee, &[ItemId(2)]).map(|item| item.id);
        assert_eq!(fallback, Some(ItemId(1)));

        assert!(pack.equip(ItemId(1)));
        assert!(pack.equip(ItemId(2)));
        assert_eq!(pack.equipped, vec![ItemId(2)]);
    }
}
