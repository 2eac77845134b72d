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

//! Collaborator contracts consumed by the behavior core
//!
//! The core never computes paths, geometry or item data itself. Everything it
//! needs from the surrounding game is reached through the narrow traits in
//! this module:
//! - [`MovementService`] moves the agent and reports where it is
//! - [`WorldSensor`] answers read-only questions about the world
//! - [`InventoryStore`] exposes carried weight, materials and equipment
//! - [`ActionService`] performs interactions (attacks, strikes, deposits)
//! - [`UiFocus`] reports whether the companion's own panel is open
//!
//! World objects are classified once, at sensor level, into the tagged
//! [`WorldEntityKind`] so the controllers never inspect open-ended types.

use glam::Vec3;
use hearthguard_common::HarvestKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of a world object as handed out by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of an inventory item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

/// Stackable materials moved around by gathering and smelting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Material {
    Wood,
    Stone,
    Ore,
    Coal,
    Metal,
    Forage,
}

impl Material {
    pub fn as_str(&self) -> &'static str {
        match self {
            Material::Wood => "Wood",
            Material::Stone => "Stone",
            Material::Ore => "Ore",
            Material::Coal => "Coal",
            Material::Metal => "Metal",
            Material::Forage => "Forage",
        }
    }

    /// Material yielded by harvesting the given kind
    pub fn from_harvest(kind: HarvestKind) -> Self {
        match kind {
            HarvestKind::Wood => Material::Wood,
            HarvestKind::Stone => Material::Stone,
            HarvestKind::Ore => Material::Ore,
            HarvestKind::Forage => Material::Forage,
        }
    }
}

/// Result of a movement request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    Accepted,
    Failed,
}

impl MoveResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, MoveResult::Accepted)
    }
}

/// Movement and pathfinding owned by the host
#[cfg_attr(test, mockall::automock)]
pub trait MovementService {
    /// Current agent position
    fn position(&self) -> Vec3;

    /// Current facing, unit length on the ground plane
    fn forward(&self) -> Vec3;

    /// Ask the pathfinder to bring the agent within `stop_distance` of `point`
    fn request_move_to(&mut self, point: Vec3, stop_distance: f32, run: bool) -> MoveResult;

    fn stop(&mut self);

    /// Relocate instantly, bypassing pathfinding
    fn teleport_to(&mut self, point: Vec3);
}

/// Snapshot of the owning player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OwnerState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub forward: Vec3,
    pub running: bool,
}

impl OwnerState {
    /// Speed on the ground plane
    pub fn planar_speed(&self) -> f32 {
        Vec3::new(self.velocity.x, 0.0, self.velocity.z).length()
    }
}

/// Health and rest state of the agent itself
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentVitals {
    pub health: f32,
    pub max_health: f32,
    /// Extra pool capacity granted by food, gear or buffs
    pub stamina_bonus: f32,
    pub resting: bool,
    /// Hits landed on the agent since the previous tick
    pub hits_taken: u32,
}

impl AgentVitals {
    pub fn health_ratio(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            (self.health / self.max_health).clamp(0.0, 1.0)
        }
    }
}

impl Default for AgentVitals {
    fn default() -> Self {
        Self {
            health: 100.0,
            max_health: 100.0,
            stamina_bonus: 0.0,
            resting: false,
            hits_taken: 0,
        }
    }
}

/// A creature hostile to the agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostileInfo {
    pub id: ObjectId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub alive: bool,
    pub staggered: bool,
    /// The creature is winding up an attack that will land shortly
    pub attack_imminent: bool,
}

/// A projectile in flight near the agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileInfo {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Where something harvestable came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarvestSource {
    StandingTree,
    FallenLog,
    Stump,
    Rock,
    OreVein,
    Pickable,
}

impl HarvestSource {
    pub fn kind(&self) -> HarvestKind {
        match self {
            HarvestSource::StandingTree | HarvestSource::FallenLog | HarvestSource::Stump => {
                HarvestKind::Wood
            }
            HarvestSource::Rock => HarvestKind::Stone,
            HarvestSource::OreVein => HarvestKind::Ore,
            HarvestSource::Pickable => HarvestKind::Forage,
        }
    }
}

/// Class of a production facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacilityClass {
    /// Turns wood into coal
    Kiln,
    /// Burns coal to turn ore into metal
    Furnace,
}

impl FacilityClass {
    pub fn output(&self) -> Material {
        match self {
            FacilityClass::Kiln => Material::Coal,
            FacilityClass::Furnace => Material::Metal,
        }
    }
}

/// Which side of a facility is being fed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacilitySlot {
    Fuel,
    Input,
}

/// Fill level of one facility slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotLevel {
    pub material: Material,
    pub current: u32,
    pub capacity: u32,
}

impl SlotLevel {
    pub fn space(&self) -> u32 {
        self.capacity.saturating_sub(self.current)
    }

    pub fn ratio(&self) -> f32 {
        if self.capacity == 0 {
            1.0
        } else {
            self.current as f32 / self.capacity as f32
        }
    }
}

/// Observable state of a kiln or furnace
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityState {
    pub class: FacilityClass,
    /// Kilns burn their input and have no separate fuel slot
    pub fuel: Option<SlotLevel>,
    pub input: SlotLevel,
    /// Finished output waiting in the facility's queue
    pub output_ready: u32,
    pub fuel_point: Vec3,
    pub input_point: Vec3,
    pub output_point: Vec3,
}

impl FacilityState {
    pub fn slot(&self, slot: FacilitySlot) -> Option<&SlotLevel> {
        match slot {
            FacilitySlot::Fuel => self.fuel.as_ref(),
            FacilitySlot::Input => Some(&self.input),
        }
    }

    pub fn point(&self, slot: FacilitySlot) -> Vec3 {
        match slot {
            FacilitySlot::Fuel => self.fuel_point,
            FacilitySlot::Input => self.input_point,
        }
    }
}

/// One stack inside a storage container
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialStack {
    pub material: Material,
    pub count: u32,
}

/// Observable state of a storage container
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContainerState {
    pub free_slots: u32,
    pub contents: Vec<MaterialStack>,
}

impl ContainerState {
    pub fn count(&self, material: Material) -> u32 {
        self.contents
            .iter()
            .filter(|stack| stack.material == material)
            .map(|stack| stack.count)
            .sum()
    }

    pub fn has_space(&self) -> bool {
        self.free_slots > 0
    }
}

/// Classification of a world object, resolved once by the sensor
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEntityKind {
    Hostile,
    Harvestable(HarvestSource),
    ItemDrop { material: Material, count: u32 },
    Facility(FacilityState),
    Container(ContainerState),
    Door,
    Cart,
    Bed,
    Chair,
    Ship,
    RepairStation,
}

/// A world object visible to the sensor
#[derive(Debug, Clone, PartialEq)]
pub struct WorldEntity {
    pub id: ObjectId,
    pub position: Vec3,
    pub kind: WorldEntityKind,
}

impl WorldEntity {
    pub fn new(id: ObjectId, position: Vec3, kind: WorldEntityKind) -> Self {
        Self { id, position, kind }
    }

    pub fn harvest_source(&self) -> Option<HarvestSource> {
        match self.kind {
            WorldEntityKind::Harvestable(source) => Some(source),
            _ => None,
        }
    }

    pub fn facility(&self) -> Option<&FacilityState> {
        match &self.kind {
            WorldEntityKind::Facility(state) => Some(state),
            _ => None,
        }
    }

    pub fn container(&self) -> Option<&ContainerState> {
        match &self.kind {
            WorldEntityKind::Container(state) => Some(state),
            _ => None,
        }
    }
}

/// Result of casting the owner's aim into the world
#[derive(Debug, Clone, PartialEq)]
pub struct AimHit {
    pub point: Vec3,
    pub entity: Option<WorldEntity>,
}

/// Read-only view of the world around one agent
///
/// Radius scans are centred on the agent unless a centre is passed explicitly.
pub trait WorldSensor {
    fn owner(&self) -> Option<OwnerState>;

    fn vitals(&self) -> AgentVitals;

    fn scan_candidates(&self, kind: HarvestKind, radius: f32) -> Vec<WorldEntity>;

    fn scan_hostiles(&self, radius: f32) -> Vec<HostileInfo>;

    /// Look up a specific hostile regardless of distance
    fn hostile(&self, id: ObjectId) -> Option<HostileInfo>;

    fn incoming_projectiles(&self, radius: f32) -> Vec<ProjectileInfo>;

    fn scan_drops(&self, center: Vec3, radius: f32) -> Vec<WorldEntity>;

    fn scan_facilities(&self, radius: f32) -> Vec<WorldEntity>;

    fn scan_containers(&self, center: Vec3, radius: f32) -> Vec<WorldEntity>;

    fn entity(&self, id: ObjectId) -> Option<WorldEntity>;

    fn entities_near(&self, point: Vec3, radius: f32) -> Vec<WorldEntity>;

    /// What the owner is currently aiming at
    fn raycast_under_aim(&self) -> Option<AimHit>;

    fn ground_height(&self, x: f32, z: f32) -> Option<f32>;
}

/// Implement kinds a harvest tool can be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    Axe,
    Pickaxe,
}

impl ToolKind {
    /// Tool needed to harvest a kind, if any
    pub fn for_harvest(kind: HarvestKind) -> Option<Self> {
        match kind {
            HarvestKind::Wood => Some(ToolKind::Axe),
            HarvestKind::Stone | HarvestKind::Ore => Some(ToolKind::Pickaxe),
            HarvestKind::Forage => None,
        }
    }
}

/// What an item is for
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ItemClass {
    MeleeWeapon,
    RangedWeapon { projectile_speed: f32 },
    Tool(ToolKind),
    Shield,
    Armor,
}

impl ItemClass {
    pub fn is_weapon(&self) -> bool {
        matches!(self, ItemClass::MeleeWeapon | ItemClass::RangedWeapon { .. })
    }

    pub fn is_ranged(&self) -> bool {
        matches!(self, ItemClass::RangedWeapon { .. })
    }

    /// Gear that wears when the agent is hit
    pub fn is_protective(&self) -> bool {
        matches!(self, ItemClass::Shield | ItemClass::Armor)
    }
}

/// An equippable item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub class: ItemClass,
}

/// Why a weapon is being chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeaponContext {
    Melee,
    Ranged,
    Harvest(ToolKind),
}

/// Carried items, weight and equipment
pub trait InventoryStore {
    fn carried_weight(&self) -> f32;

    fn capacity(&self) -> f32;

    /// Heavy enough that running is refused
    fn encumbered(&self) -> bool {
        let capacity = self.capacity();
        capacity > 0.0 && self.carried_weight() / capacity >= 0.9
    }

    fn count(&self, material: Material) -> u32;

    fn equipped(&self) -> Vec<Item>;

    /// Best item for the context, skipping anything in `exclude`
    fn best_weapon_for(&self, context: WeaponContext, exclude: &[ItemId]) -> Option<Item>;

    fn equip(&mut self, item: ItemId) -> bool;

    fn unequip(&mut self, item: ItemId);

    fn durability(&self, item: ItemId) -> f32;

    /// Reduce durability, returning what is left
    fn wear(&mut self, item: ItemId, amount: f32) -> f32;
}

/// Kind of combat swing requested
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackKind {
    Normal,
    Power,
    Counter,
    Ranged { aim: Vec3 },
}

/// Outcome of one harvesting strike
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeOutcome {
    Hit,
    /// The candidate broke or was used up by this strike
    Destroyed,
    OutOfRange,
    /// The candidate no longer exists
    Invalid,
}

/// One-shot interactions with world objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interaction {
    OpenDoor,
    Sleep,
    Sit,
    Board,
    AttachCart,
    DetachCart,
    Repair,
}

impl Interaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interaction::OpenDoor => "OpenDoor",
            Interaction::Sleep => "Sleep",
            Interaction::Sit => "Sit",
            Interaction::Board => "Board",
            Interaction::AttachCart => "AttachCart",
            Interaction::DetachCart => "DetachCart",
            Interaction::Repair => "Repair",
        }
    }

    /// Interactions that keep the agent in place until told otherwise
    pub fn holds_position(&self) -> bool {
        matches!(self, Interaction::Sleep | Interaction::Sit | Interaction::Board)
    }
}

/// Interaction requests issued by the core
pub trait ActionService {
    fn attack(&mut self, target: ObjectId, attack: AttackKind) -> bool;

    fn set_blocking(&mut self, raised: bool);

    fn dodge(&mut self, direction: Vec3) -> bool;

    fn strike(&mut self, candidate: ObjectId) -> StrikeOutcome;

    /// Pick up a drop, returning how many items were taken
    fn pick_up(&mut self, drop: ObjectId) -> u32;

    fn withdraw(&mut self, container: ObjectId, material: Material, amount: u32) -> u32;

    fn deposit(&mut self, container: ObjectId, material: Material, amount: u32) -> u32;

    fn feed(&mut self, facility: ObjectId, slot: FacilitySlot, amount: u32) -> u32;

    fn collect_output(&mut self, facility: ObjectId) -> u32;

    fn interact(&mut self, target: ObjectId, interaction: Interaction) -> bool;
}

/// Whether the companion's own interaction panel is open
#[cfg_attr(test, mockall::automock)]
pub trait UiFocus {
    fn panel_open(&self, agent: Uuid) -> bool;
}

/// UI focus for hosts without a panel
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPanel;

impl UiFocus for NoPanel {
    fn panel_open(&self, _agent: Uuid) -> bool {
        false
    }
}

/// Flatten a vector onto the ground plane
pub fn planar(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Distance between two points ignoring height
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    planar(a - b).length()
}
