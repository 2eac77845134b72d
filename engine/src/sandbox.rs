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

//! In-repo host for companion brains
//!
//! The sandbox keeps the owner avatar, companions and every world object in
//! one `hecs` world. Each tick it lends every brain a set of collaborators
//! built over that world (see [`adapters`]), then advances the scripted parts
//! of the world: walking bodies, hostiles, projectiles and facilities.
//!
//! World objects are identified to the behavior core by [`ObjectId`]s derived
//! from their entity bits, so ids stay valid until the entity despawns.

pub mod adapters;
pub mod scenario;
mod scripts;

use crate::config::BehaviorConfig;
use crate::ecs::components::{
    ActionLog, ActionRecord, BehaviorError, Facility, Facing, FixtureKind, Harvestable, HostileCreature,
    ItemDrop, Mover, Obstacle, OwnerAvatar, Pack, PackItem, Pinned, Position, Projectile, Storage, Velocity,
    Vitals,
};
use crate::ecs::events::EventBus;
use crate::ecs::systems::{ActiveController, BehaviorController, CommandInput, CompanionBrain, TickContext};
use crate::ecs::{EcsEntity, EntityRegistry, GameWorld, RegistryError};
use crate::services::{FacilityClass, HarvestSource, Item, ItemClass, ItemId, Material, ObjectId, UiFocus};
use adapters::{SandboxActions, SandboxInventory, SandboxMovement, SandboxSensor};
use glam::Vec3;
use hearthguard_common::{ActionMode, BehaviorToggles, CombatStance, CompanionProfile};
use hecs::CommandBuffer;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use scenario::{OwnerRoute, Scenario};

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("No companion {0} in the sandbox")]
    UnknownAgent(Uuid),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Behavior(#[from] BehaviorError),
}

pub type SandboxResult<T> = Result<T, SandboxError>;

/// Object id handed to the behavior core for an entity
pub fn object_id(entity: EcsEntity) -> ObjectId {
    ObjectId(entity.to_bits().get())
}

/// Entity behind an object id, if the bits are well formed
pub fn entity_of(id: ObjectId) -> Option<EcsEntity> {
    EcsEntity::from_bits(id.0)
}

/// Which companion, if any, has its interaction panel open
#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxPanel {
    pub open: Option<Uuid>,
}

impl UiFocus for SandboxPanel {
    fn panel_open(&self, agent: Uuid) -> bool {
        self.open == Some(agent)
    }
}

pub struct Sandbox {
    world: GameWorld,
    registry: EntityRegistry,
    events: EventBus,
    config: Arc<BehaviorConfig>,
    owner: Option<EcsEntity>,
    aim: Option<Vec3>,
    panel: SandboxPanel,
    next_item: u64,
    ticks: u64,
    elapsed: f64,
}

impl Sandbox {
    pub fn new(config: Arc<BehaviorConfig>) -> Self {
        Self {
            world: GameWorld::new(),
            registry: EntityRegistry::new(),
            events: EventBus::new(),
            config,
            owner: None,
            aim: None,
            panel: SandboxPanel::default(),
            next_item: 1,
            ticks: 0,
            elapsed: 0.0,
        }
    }

    pub fn world(&self) -> &GameWorld {
        &self.world
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &Arc<BehaviorConfig> {
        &self.config
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulated seconds since the sandbox was created
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn agents(&self) -> Vec<Uuid> {
        self.registry.agents()
    }

    // Owner

    /// Place the owner avatar, replacing any previous one
    pub fn spawn_owner(&mut self, position: Vec3) -> EcsEntity {
        if let Some(previous) = self.owner.take() {
            let _ = self.world.despawn(previous);
        }
        let owner = self.world.spawn((
            Position(position),
            Facing::default(),
            Velocity::default(),
            OwnerAvatar::default(),
        ));
        self.owner = Some(owner);
        owner
    }

    pub fn owner_position(&self) -> Option<Vec3> {
        let owner = self.owner?;
        self.world.get::<&Position>(owner).ok().map(|position| position.0)
    }

    pub fn set_owner_position(&mut self, position: Vec3) {
        let Some(owner) = self.owner else {
            return;
        };
        if let Ok(mut current) = self.world.get::<&mut Position>(owner) {
            current.0 = position;
        }
    }

    /// Constant owner velocity applied every step until changed
    pub fn set_owner_velocity(&mut self, velocity: Vec3, running: bool) {
        let Some(owner) = self.owner else {
            return;
        };
        if let Ok(mut current) = self.world.get::<&mut Velocity>(owner) {
            current.0 = velocity;
        }
        if let Ok(mut avatar) = self.world.get::<&mut OwnerAvatar>(owner) {
            avatar.running = running;
        }
        let _ = self.world.remove_one::<OwnerRoute>(owner);
    }

    /// Walk the owner along a looping route
    pub fn set_owner_route(&mut self, route: OwnerRoute) {
        if let Some(owner) = self.owner {
            let _ = self.world.insert_one(owner, route);
        }
    }

    /// Point the owner's aim at a spot in the world, or at nothing
    pub fn set_aim(&mut self, point: Option<Vec3>) {
        self.aim = point;
    }

    pub fn open_panel(&mut self, agent: Option<Uuid>) {
        self.panel.open = agent;
    }

    // Companions

    /// Spawn a companion from its profile at `position`
    pub fn spawn_companion(&mut self, profile: &CompanionProfile, position: Vec3) -> SandboxResult<EcsEntity> {
        if self.registry.contains_agent(profile.agent_id) {
            return Err(RegistryError::AgentTaken(profile.agent_id).into());
        }
        let brain = CompanionBrain::from_profile(profile, Arc::clone(&self.config), self.events.clone());
        let entity = self.world.spawn((
            Position(position),
            Facing::default(),
            Velocity::default(),
            Mover::default(),
            Pack::default(),
            Vitals::default(),
            ActionLog::default(),
            brain,
        ));
        self.registry.register(entity, profile.agent_id)?;
        tracing::info!(agent = %profile.agent_id, name = %profile.name, "Spawned companion");
        Ok(entity)
    }

    /// Remove a companion, returning its final profile
    pub fn despawn_companion(&mut self, agent: Uuid) -> SandboxResult<CompanionProfile> {
        let entity = self.registry.unregister_agent(agent).ok_or(SandboxError::UnknownAgent(agent))?;
        let profile = self
            .world
            .get::<&CompanionBrain>(entity)
            .map(|brain| brain.profile())
            .map_err(|_| SandboxError::UnknownAgent(agent))?;
        let _ = self.world.despawn(entity);
        self.events.forget(agent);
        Ok(profile)
    }

    fn entity(&self, agent: Uuid) -> SandboxResult<EcsEntity> {
        self.registry.get_entity(agent).ok_or(SandboxError::UnknownAgent(agent))
    }

    pub fn brain(&self, agent: Uuid) -> Option<hecs::Ref<'_, CompanionBrain>> {
        let entity = self.registry.get_entity(agent)?;
        self.world.get::<&CompanionBrain>(entity).ok()
    }

    pub fn brain_mut(&self, agent: Uuid) -> Option<hecs::RefMut<'_, CompanionBrain>> {
        let entity = self.registry.get_entity(agent)?;
        self.world.get::<&mut CompanionBrain>(entity).ok()
    }

    pub fn position(&self, agent: Uuid) -> Option<Vec3> {
        let entity = self.registry.get_entity(agent)?;
        self.world.get::<&Position>(entity).ok().map(|position| position.0)
    }

    pub fn place(&mut self, agent: Uuid, position: Vec3) -> SandboxResult<()> {
        let entity = self.entity(agent)?;
        if let Ok(mut current) = self.world.get::<&mut Position>(entity) {
            current.0 = position;
        }
        Ok(())
    }

    /// Freeze or release a companion's body; pinned bodies accept orders but never move
    pub fn pin(&mut self, agent: Uuid, pinned: bool) -> SandboxResult<()> {
        let entity = self.entity(agent)?;
        if pinned {
            let _ = self.world.insert_one(entity, Pinned);
        } else {
            let _ = self.world.remove_one::<Pinned>(entity);
        }
        Ok(())
    }

    pub fn pack(&self, agent: Uuid) -> Option<hecs::Ref<'_, Pack>> {
        let entity = self.registry.get_entity(agent)?;
        self.world.get::<&Pack>(entity).ok()
    }

    pub fn vitals_mut(&self, agent: Uuid) -> Option<hecs::RefMut<'_, Vitals>> {
        let entity = self.registry.get_entity(agent)?;
        self.world.get::<&mut Vitals>(entity).ok()
    }

    pub fn action_log(&self, agent: Uuid) -> Vec<ActionRecord> {
        self.registry
            .get_entity(agent)
            .and_then(|entity| self.world.get::<&ActionLog>(entity).ok().map(|log| log.entries.clone()))
            .unwrap_or_default()
    }

    /// Add an item to a companion's pack, returning its new id
    pub fn give_item(&mut self, agent: Uuid, class: ItemClass, power: f32) -> SandboxResult<ItemId> {
        let entity = self.entity(agent)?;
        let id = ItemId(self.next_item);
        self.next_item += 1;
        let weight = match class {
            ItemClass::Armor => 8.0,
            ItemClass::Shield => 5.0,
            _ => 3.0,
        };
        let mut pack = self.world.get::<&mut Pack>(entity).map_err(|_| SandboxError::UnknownAgent(agent))?;
        pack.items.push(PackItem {
            item: Item { id, class },
            durability: 100.0,
            power,
            weight,
        });
        Ok(id)
    }

    pub fn give_material(&mut self, agent: Uuid, material: Material, count: u32) -> SandboxResult<()> {
        let entity = self.entity(agent)?;
        let mut pack = self.world.get::<&mut Pack>(entity).map_err(|_| SandboxError::UnknownAgent(agent))?;
        pack.add(material, count);
        Ok(())
    }

    // Companion controls

    pub fn set_mode(&mut self, agent: Uuid, mode: ActionMode) -> SandboxResult<()> {
        let entity = self.entity(agent)?;
        let inventory = SandboxInventory::new(&self.world, entity);
        let mut brain = self
            .world
            .get::<&mut CompanionBrain>(entity)
            .map_err(|_| SandboxError::UnknownAgent(agent))?;
        brain.set_mode(mode, &inventory)?;
        Ok(())
    }

    pub fn set_toggles(&mut self, agent: Uuid, toggles: BehaviorToggles) -> SandboxResult<()> {
        let mut brain = self.brain_mut(agent).ok_or(SandboxError::UnknownAgent(agent))?;
        brain.set_toggles(toggles)?;
        Ok(())
    }

    pub fn set_home_anchor(&mut self, agent: Uuid, anchor: Option<Vec3>) -> SandboxResult<()> {
        let mut brain = self.brain_mut(agent).ok_or(SandboxError::UnknownAgent(agent))?;
        brain.set_home_anchor(anchor);
        Ok(())
    }

    pub fn set_stance(&mut self, agent: Uuid, stance: CombatStance) -> SandboxResult<()> {
        let mut brain = self.brain_mut(agent).ok_or(SandboxError::UnknownAgent(agent))?;
        brain.set_stance(stance);
        Ok(())
    }

    /// Queue owner input for a companion's next tick
    pub fn issue(&mut self, agent: Uuid, input: CommandInput) -> SandboxResult<()> {
        let mut brain = self.brain_mut(agent).ok_or(SandboxError::UnknownAgent(agent))?;
        brain.try_issue(input)?;
        Ok(())
    }

    /// Profiles of every companion whose persisted state changed since the last call
    pub fn take_dirty_profiles(&mut self) -> Vec<CompanionProfile> {
        self.world
            .query_mut::<&mut CompanionBrain>()
            .into_iter()
            .filter_map(|brain| brain.take_dirty().then(|| brain.profile()))
            .collect()
    }

    pub fn profiles(&self) -> Vec<CompanionProfile> {
        self.world
            .query::<&CompanionBrain>()
            .iter()
            .map(|brain| brain.profile())
            .collect()
    }

    // World objects

    pub fn spawn_hostile(&mut self, position: Vec3, creature: HostileCreature) -> ObjectId {
        object_id(self.world.spawn((Position(position), Velocity::default(), creature)))
    }

    pub fn spawn_harvestable(&mut self, position: Vec3, source: HarvestSource) -> ObjectId {
        object_id(self.world.spawn((Position(position), Harvestable::new(source))))
    }

    pub fn spawn_drop(&mut self, position: Vec3, material: Material, count: u32) -> ObjectId {
        object_id(self.world.spawn((Position(position), ItemDrop { material, count })))
    }

    pub fn spawn_facility(&mut self, position: Vec3, facility: Facility) -> ObjectId {
        object_id(self.world.spawn((Position(position), facility)))
    }

    pub fn spawn_empty_facility(&mut self, position: Vec3, class: FacilityClass) -> ObjectId {
        self.spawn_facility(position, Facility::new(class))
    }

    pub fn spawn_storage(&mut self, position: Vec3, storage: Storage) -> ObjectId {
        object_id(self.world.spawn((Position(position), storage)))
    }

    pub fn spawn_fixture(&mut self, position: Vec3, fixture: FixtureKind) -> ObjectId {
        object_id(self.world.spawn((Position(position), fixture)))
    }

    pub fn spawn_projectile(&mut self, position: Vec3, velocity: Vec3, ttl: f32) -> ObjectId {
        object_id(self.world.spawn((Position(position), Projectile { velocity, ttl })))
    }

    pub fn spawn_obstacle(&mut self, center: Vec3, radius: f32) -> ObjectId {
        object_id(self.world.spawn((Position(center), Obstacle { radius })))
    }

    /// Whether the object still exists
    pub fn exists(&self, id: ObjectId) -> bool {
        entity_of(id).is_some_and(|entity| self.world.contains(entity))
    }

    pub fn object_position(&self, id: ObjectId) -> Option<Vec3> {
        let entity = entity_of(id)?;
        self.world.get::<&Position>(entity).ok().map(|position| position.0)
    }

    pub fn hostile(&self, id: ObjectId) -> Option<HostileCreature> {
        let entity = entity_of(id)?;
        self.world.get::<&HostileCreature>(entity).ok().map(|creature| *creature)
    }

    pub fn facility(&self, id: ObjectId) -> Option<Facility> {
        let entity = entity_of(id)?;
        self.world.get::<&Facility>(entity).ok().map(|facility| (*facility).clone())
    }

    pub fn storage(&self, id: ObjectId) -> Option<Storage> {
        let entity = entity_of(id)?;
        self.world.get::<&Storage>(entity).ok().map(|storage| (*storage).clone())
    }

    pub fn fixture(&self, id: ObjectId) -> Option<FixtureKind> {
        let entity = entity_of(id)?;
        self.world.get::<&FixtureKind>(entity).ok().map(|fixture| *fixture)
    }

    // Simulation

    /// Tick every companion brain, then advance the scripted world
    ///
    /// Companions tick in ascending agent id order. Spawns and despawns a
    /// companion causes apply before the next companion ticks.
    pub fn tick(&mut self, delta_time: f32) -> Vec<(Uuid, ActiveController)> {
        let mut report = Vec::with_capacity(self.registry.len());
        for agent in self.registry.agents() {
            let Some(entity) = self.registry.get_entity(agent) else {
                continue;
            };
            let Ok(mut brain) = self.world.remove_one::<CompanionBrain>(entity) else {
                tracing::warn!(%agent, "Companion entity lost its brain");
                continue;
            };

            let mut commands = CommandBuffer::new();
            let active = {
                let mut movement = SandboxMovement::new(&self.world, entity);
                let sensor = SandboxSensor::new(&self.world, entity, self.owner, self.aim);
                let mut inventory = SandboxInventory::new(&self.world, entity);
                let mut actions = SandboxActions::new(&self.world, entity, &mut commands);
                let mut ctx = TickContext {
                    delta_time,
                    movement: &mut movement,
                    sensor: &sensor,
                    inventory: &mut inventory,
                    actions: &mut actions,
                    ui: &self.panel,
                };
                brain.tick(&mut ctx)
            };

            if let Ok(mut vitals) = self.world.get::<&mut Vitals>(entity) {
                vitals.hits_taken = 0;
            }
            commands.run_on(&mut self.world);
            if self.world.insert_one(entity, brain).is_err() {
                tracing::warn!(%agent, "Companion despawned during its own tick");
                self.registry.unregister_agent(agent);
                continue;
            }
            report.push((agent, active));
        }

        scripts::step_world(&mut self.world, delta_time);
        self.ticks += 1;
        self.elapsed += f64::from(delta_time);
        report
    }
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("companions", &self.registry.len())
            .field("entities", &self.world.len())
            .field("ticks", &self.ticks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox_with_companion() -> (Sandbox, Uuid) {
        let mut sandbox = Sandbox::new(Arc::new(BehaviorConfig::default()));
        sandbox.spawn_owner(Vec3::ZERO);
        let profile = CompanionProfile::new(Uuid::new_v4(), Uuid::new_v4(), "Sigrun");
        let agent = profile.agent_id;
        sandbox.spawn_companion(&profile, Vec3::new(3.0, 0.0, 0.0)).unwrap();
        (sandbox, agent)
    }

    #[test]
    fn test_object_id_round_trip() {
        let mut world = GameWorld::new();
        let entity = world.spawn((Position(Vec3::ZERO),));
        assert_eq!(entity_of(object_id(entity)), Some(entity));
        assert_eq!(entity_of(ObjectId(0)), None);
    }

    #[test]
    fn test_duplicate_companion_rejected() {
        let (mut sandbox, agent) = sandbox_with_companion();
        let profile = sandbox.brain(agent).unwrap().profile();

        let result = sandbox.spawn_companion(&profile, Vec3::ZERO);

        assert!(matches!(result, Err(SandboxError::Registry(RegistryError::AgentTaken(_)))));
    }

    #[test]
    fn test_tick_keeps_brain_attached() {
        let (mut sandbox, agent) = sandbox_with_companion();

        let report = sandbox.tick(0.05);

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].0, agent);
        assert!(sandbox.brain(agent).is_some());
        assert_eq!(sandbox.ticks(), 1);
    }

    #[test]
    fn test_dirty_profiles_reported_once() {
        let (mut sandbox, agent) = sandbox_with_companion();

        sandbox.set_stance(agent, CombatStance::Aggressive).unwrap();

        let dirty = sandbox.take_dirty_profiles();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].stance, CombatStance::Aggressive);
        assert!(sandbox.take_dirty_profiles().is_empty());
    }

    #[test]
    fn test_unknown_agent() {
        let (mut sandbox, _) = sandbox_with_companion();
        let stranger = Uuid::new_v4();

        assert!(matches!(
            sandbox.issue(stranger, CommandInput::Recall),
            Err(SandboxError::UnknownAgent(id)) if id == stranger
        ));
    }

    #[test]
    fn test_despawn_returns_profile() {
        let (mut sandbox, agent) = sandbox_with_companion();

        let profile = sandbox.despawn_companion(agent).unwrap();

        assert_eq!(profile.agent_id, agent);
        assert!(sandbox.agents().is_empty());
        assert!(sandbox.tick(0.05).is_empty());
    }
}
