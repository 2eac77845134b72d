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

//! Collaborator implementations over the sandbox world
//!
//! Each adapter borrows the world immutably for the length of one brain
//! tick and mutates individual components through `hecs`' per-component
//! borrows. Structural changes (spawning drops, despawning what was picked
//! up or killed) are deferred to a [`CommandBuffer`] the sandbox applies once
//! the brain is done.

use super::{entity_of, object_id};
use crate::ecs::components::{
    ActionLog, ActionRecord, Facility, Facing, FixtureKind, Harvestable, HostileCreature, ItemDrop, Mover,
    MoveOrder, Obstacle, OwnerAvatar, Pack, Position, Projectile, Storage, Velocity, Vitals,
};
use crate::ecs::{EcsEntity, GameWorld};
use crate::services::{
    planar, planar_distance, ActionService, AgentVitals, AimHit, AttackKind, ContainerState, FacilitySlot,
    FacilityState, HostileInfo, InventoryStore, Interaction, Item, ItemId, Material, MoveResult, MovementService,
    ObjectId, OwnerState, ProjectileInfo, StrikeOutcome, WeaponContext, WorldEntity, WorldEntityKind, WorldSensor,
};
use glam::Vec3;
use hearthguard_common::HarvestKind;
use hecs::CommandBuffer;

/// Reach for strikes, pickups and container or facility use
pub const INTERACT_REACH: f32 = 3.0;
pub const MELEE_REACH: f32 = 3.0;
pub const RANGED_REACH: f32 = 40.0;
/// Radius around the aim point that counts as hitting an object
pub const AIM_TOLERANCE: f32 = 1.0;

fn position_of(world: &GameWorld, entity: EcsEntity) -> Option<Vec3> {
    world.get::<&Position>(entity).ok().map(|position| position.0)
}

fn facility_state(facility: &Facility, position: Vec3) -> FacilityState {
    FacilityState {
        class: facility.class,
        fuel: facility.fuel,
        input: facility.input,
        output_ready: facility.output_ready,
        fuel_point: position + Vec3::X,
        input_point: position + Vec3::Z,
        output_point: position - Vec3::Z,
    }
}

/// Classify an entity the way the behavior core sees it
///
/// Companions, the owner and dead hostiles are not world objects.
pub fn describe(world: &GameWorld, entity: EcsEntity) -> Option<WorldEntity> {
    let view = world.entity(entity).ok()?;
    let position = view.get::<&Position>()?.0;
    let kind = if let Some(creature) = view.get::<&HostileCreature>() {
        if !creature.alive() {
            return None;
        }
        WorldEntityKind::Hostile
    } else if let Some(harvestable) = view.get::<&Harvestable>() {
        WorldEntityKind::Harvestable(harvestable.source)
    } else if let Some(drop) = view.get::<&ItemDrop>() {
        WorldEntityKind::ItemDrop {
            material: drop.material,
            count: drop.count,
        }
    } else if let Some(facility) = view.get::<&Facility>() {
        WorldEntityKind::Facility(facility_state(&facility, position))
    } else if let Some(storage) = view.get::<&Storage>() {
        WorldEntityKind::Container(ContainerState {
            free_slots: storage.free_slots(),
            contents: storage.stacks.clone(),
        })
    } else if let Some(fixture) = view.get::<&FixtureKind>() {
        match *fixture {
            FixtureKind::Door { .. } => WorldEntityKind::Door,
            FixtureKind::Cart { .. } => WorldEntityKind::Cart,
            FixtureKind::Bed => WorldEntityKind::Bed,
            FixtureKind::Chair => WorldEntityKind::Chair,
            FixtureKind::Ship => WorldEntityKind::Ship,
            FixtureKind::RepairStation => WorldEntityKind::RepairStation,
        }
    } else {
        return None;
    };
    Some(WorldEntity::new(object_id(entity), position, kind))
}

/// Drives the agent's [`Mover`]
pub struct SandboxMovement<'w> {
    world: &'w GameWorld,
    agent: EcsEntity,
}

impl<'w> SandboxMovement<'w> {
    pub fn new(world: &'w GameWorld, agent: EcsEntity) -> Self {
        Self { world, agent }
    }

    fn blocked(&self, point: Vec3) -> bool {
        self.world
            .query::<(&Position, &Obstacle)>()
            .iter()
            .any(|(center, obstacle)| obstacle.blocks(center.0, point))
    }
}

impl MovementService for SandboxMovement<'_> {
    fn position(&self) -> Vec3 {
        position_of(self.world, self.agent).unwrap_or(Vec3::ZERO)
    }

    fn forward(&self) -> Vec3 {
        self.world
            .get::<&Facing>(self.agent)
            .map(|facing| facing.0)
            .unwrap_or(Vec3::Z)
    }

    fn request_move_to(&mut self, point: Vec3, stop_distance: f32, run: bool) -> MoveResult {
        if !point.is_finite() || self.blocked(point) {
            return MoveResult::Failed;
        }
        let Ok(mut mover) = self.world.get::<&mut Mover>(self.agent) else {
            return MoveResult::Failed;
        };
        mover.order = Some(MoveOrder {
            target: point,
            stop_distance,
            run,
        });
        MoveResult::Accepted
    }

    fn stop(&mut self) {
        if let Ok(mut mover) = self.world.get::<&mut Mover>(self.agent) {
            mover.order = None;
        }
    }

    fn teleport_to(&mut self, point: Vec3) {
        self.stop();
        if let Ok(mut position) = self.world.get::<&mut Position>(self.agent) {
            position.0 = point;
        }
    }
}

/// Read-only view of the world around one companion
pub struct SandboxSensor<'w> {
    world: &'w GameWorld,
    agent: EcsEntity,
    owner: Option<EcsEntity>,
    aim: Option<Vec3>,
}

impl<'w> SandboxSensor<'w> {
    pub fn new(world: &'w GameWorld, agent: EcsEntity, owner: Option<EcsEntity>, aim: Option<Vec3>) -> Self {
        Self {
            world,
            agent,
            owner,
            aim,
        }
    }

    fn origin(&self) -> Vec3 {
        position_of(self.world, self.agent).unwrap_or(Vec3::ZERO)
    }

    fn hostile_info(&self, entity: EcsEntity) -> Option<HostileInfo> {
        let view = self.world.entity(entity).ok()?;
        let creature = view.get::<&HostileCreature>()?;
        Some(HostileInfo {
            id: object_id(entity),
            position: view.get::<&Position>()?.0,
            velocity: view.get::<&Velocity>().map(|velocity| velocity.0).unwrap_or(Vec3::ZERO),
            alive: creature.alive(),
            staggered: creature.stagger > 0.0,
            attack_imminent: creature.windup > 0.0,
        })
    }

    /// Describe every object of component `T` within `radius` of `center`
    fn objects_near<T: hecs::Component>(&self, center: Vec3, radius: f32) -> Vec<WorldEntity> {
        let entities: Vec<EcsEntity> = self
            .world
            .query::<(hecs::Entity, &Position, &T)>()
            .iter()
            .filter(|(_, position, _)| planar_distance(center, position.0) <= radius)
            .map(|(entity, _, _)| entity)
            .collect();
        entities
            .into_iter()
            .filter_map(|entity| describe(self.world, entity))
            .collect()
    }
}

impl WorldSensor for SandboxSensor<'_> {
    fn owner(&self) -> Option<OwnerState> {
        let view = self.world.entity(self.owner?).ok()?;
        Some(OwnerState {
            position: view.get::<&Position>()?.0,
            velocity: view.get::<&Velocity>().map(|velocity| velocity.0).unwrap_or(Vec3::ZERO),
            forward: view.get::<&Facing>().map(|facing| facing.0).unwrap_or(Vec3::Z),
            running: view.get::<&OwnerAvatar>().is_some_and(|avatar| avatar.running),
        })
    }

    fn vitals(&self) -> AgentVitals {
        self.world
            .get::<&Vitals>(self.agent)
            .map(|vitals| AgentVitals {
                health: vitals.health,
                max_health: vitals.max_health,
                stamina_bonus: vitals.stamina_bonus,
                resting: vitals.resting,
                hits_taken: vitals.hits_taken,
            })
            .unwrap_or_default()
    }

    fn scan_candidates(&self, kind: HarvestKind, radius: f32) -> Vec<WorldEntity> {
        self.objects_near::<Harvestable>(self.origin(), radius)
            .into_iter()
            .filter(|entity| entity.harvest_source().is_some_and(|source| source.kind() == kind))
            .collect()
    }

    fn scan_hostiles(&self, radius: f32) -> Vec<HostileInfo> {
        let origin = self.origin();
        let entities: Vec<EcsEntity> = self
            .world
            .query::<(hecs::Entity, &Position, &HostileCreature)>()
            .iter()
            .filter(|(_, position, creature)| creature.alive() && planar_distance(origin, position.0) <= radius)
            .map(|(entity, _, _)| entity)
            .collect();
        entities
            .into_iter()
            .filter_map(|entity| self.hostile_info(entity))
            .collect()
    }

    fn hostile(&self, id: ObjectId) -> Option<HostileInfo> {
        self.hostile_info(entity_of(id)?)
    }

    fn incoming_projectiles(&self, radius: f32) -> Vec<ProjectileInfo> {
        let origin = self.origin();
        self.world
            .query::<(&Position, &Projectile)>()
            .iter()
            .filter(|(position, _)| planar_distance(origin, position.0) <= radius)
            .map(|(position, projectile)| ProjectileInfo {
                position: position.0,
                velocity: projectile.velocity,
            })
            .collect()
    }

    fn scan_drops(&self, center: Vec3, radius: f32) -> Vec<WorldEntity> {
        self.objects_near::<ItemDrop>(center, radius)
    }

    fn scan_facilities(&self, radius: f32) -> Vec<WorldEntity> {
        self.objects_near::<Facility>(self.origin(), radius)
    }

    fn scan_containers(&self, center: Vec3, radius: f32) -> Vec<WorldEntity> {
        self.objects_near::<Storage>(center, radius)
    }

    fn entity(&self, id: ObjectId) -> Option<WorldEntity> {
        describe(self.world, entity_of(id)?)
    }

    fn entities_near(&self, point: Vec3, radius: f32) -> Vec<WorldEntity> {
        let entities: Vec<EcsEntity> = self
            .world
            .query::<(hecs::Entity, &Position)>()
            .iter()
            .filter(|(_, position)| planar_distance(point, position.0) <= radius)
            .map(|(entity, _)| entity)
            .collect();
        entities
            .into_iter()
            .filter_map(|entity| describe(self.world, entity))
            .collect()
    }

    fn raycast_under_aim(&self) -> Option<AimHit> {
        let point = self.aim?;
        let entity = self
            .entities_near(point, AIM_TOLERANCE)
            .into_iter()
            .min_by(|a, b| planar_distance(point, a.position).total_cmp(&planar_distance(point, b.position)));
        Some(AimHit { point, entity })
    }

    fn ground_height(&self, _x: f32, _z: f32) -> Option<f32> {
        Some(0.0)
    }
}

/// The companion's [`Pack`] as an inventory
pub struct SandboxInventory<'w> {
    world: &'w GameWorld,
    agent: EcsEntity,
}

impl<'w> SandboxInventory<'w> {
    pub fn new(world: &'w GameWorld, agent: EcsEntity) -> Self {
        Self { world, agent }
    }

    fn read<R: Default>(&self, f: impl FnOnce(&Pack) -> R) -> R {
        self.world.get::<&Pack>(self.agent).map(|pack| f(&pack)).unwrap_or_default()
    }

    fn write<R: Default>(&self, f: impl FnOnce(&mut Pack) -> R) -> R {
        self.world
            .get::<&mut Pack>(self.agent)
            .map(|mut pack| f(&mut pack))
            .unwrap_or_default()
    }
}

impl InventoryStore for SandboxInventory<'_> {
    fn carried_weight(&self) -> f32 {
        self.read(|pack| pack.weight())
    }

    fn capacity(&self) -> f32 {
        self.read(|pack| pack.capacity)
    }

    fn count(&self, material: Material) -> u32 {
        self.read(|pack| pack.count(material))
    }

    fn equipped(&self) -> Vec<Item> {
        self.read(|pack| {
            pack.equipped
                .iter()
                .filter_map(|id| pack.item(*id).map(|entry| entry.item))
                .collect()
        })
    }

    fn best_weapon_for(&self, context: WeaponContext, exclude: &[ItemId]) -> Option<Item> {
        self.read(|pack| pack.best_for(context, exclude))
    }

    fn equip(&mut self, item: ItemId) -> bool {
        self.write(|pack| pack.equip(item))
    }

    fn unequip(&mut self, item: ItemId) {
        self.write(|pack| pack.unequip(item))
    }

    fn durability(&self, item: ItemId) -> f32 {
        self.read(|pack| pack.item(item).map(|entry| entry.durability).unwrap_or(0.0))
    }

    fn wear(&mut self, item: ItemId, amount: f32) -> f32 {
        self.write(|pack| match pack.item_mut(item) {
            Some(entry) => {
                entry.durability = (entry.durability - amount).max(0.0);
                entry.durability
            }
            None => 0.0,
        })
    }
}

/// Interactions performed on behalf of one companion
pub struct SandboxActions<'w> {
    world: &'w GameWorld,
    agent: EcsEntity,
    commands: &'w mut CommandBuffer,
}

impl<'w> SandboxActions<'w> {
    pub fn new(world: &'w GameWorld, agent: EcsEntity, commands: &'w mut CommandBuffer) -> Self {
        Self { world, agent, commands }
    }

    fn record(&self, record: ActionRecord) {
        if let Ok(mut log) = self.world.get::<&mut ActionLog>(self.agent) {
            log.push(record);
        }
    }

    /// Resolve a target that exists and lies within `range` of the agent
    fn in_reach(&self, id: ObjectId, range: f32) -> Option<EcsEntity> {
        let entity = entity_of(id)?;
        let target = position_of(self.world, entity)?;
        let origin = position_of(self.world, self.agent)?;
        (planar_distance(origin, target) <= range).then_some(entity)
    }

    fn with_pack<R: Default>(&self, f: impl FnOnce(&mut Pack) -> R) -> R {
        self.world
            .get::<&mut Pack>(self.agent)
            .map(|mut pack| f(&mut pack))
            .unwrap_or_default()
    }
}

impl ActionService for SandboxActions<'_> {
    fn attack(&mut self, target: ObjectId, attack: AttackKind) -> bool {
        let range = match attack {
            AttackKind::Ranged { .. } => RANGED_REACH,
            _ => MELEE_REACH,
        };
        let Some(entity) = self.in_reach(target, range) else {
            self.record(ActionRecord::Attack {
                target: target.0,
                landed: false,
            });
            return false;
        };
        let Ok(mut creature) = self.world.get::<&mut HostileCreature>(entity) else {
            return false;
        };
        if !creature.alive() {
            return false;
        }
        let (damage, stagger) = match attack {
            AttackKind::Normal => (10.0, 0.0),
            AttackKind::Power => (25.0, 1.0),
            AttackKind::Counter => (15.0, 0.5),
            AttackKind::Ranged { .. } => (8.0, 0.0),
        };
        creature.health -= damage;
        creature.stagger = creature.stagger.max(stagger);
        if !creature.alive() {
            tracing::debug!(target = %target, "Hostile killed");
            self.commands.despawn(entity);
        }
        self.record(ActionRecord::Attack {
            target: target.0,
            landed: true,
        });
        true
    }

    fn set_blocking(&mut self, raised: bool) {
        if let Ok(mut vitals) = self.world.get::<&mut Vitals>(self.agent) {
            vitals.blocking = raised;
        }
    }

    fn dodge(&mut self, direction: Vec3) -> bool {
        let Ok(mut position) = self.world.get::<&mut Position>(self.agent) else {
            return false;
        };
        position.0 += planar(direction);
        self.record(ActionRecord::Dodge);
        true
    }

    fn strike(&mut self, candidate: ObjectId) -> StrikeOutcome {
        let Some(entity) = entity_of(candidate) else {
            return StrikeOutcome::Invalid;
        };
        let Ok(mut harvestable) = self.world.get::<&mut Harvestable>(entity) else {
            return StrikeOutcome::Invalid;
        };
        if harvestable.hits_left == 0 {
            return StrikeOutcome::Invalid;
        }
        if self.in_reach(candidate, INTERACT_REACH).is_none() {
            return StrikeOutcome::OutOfRange;
        }
        harvestable.hits_left -= 1;
        self.record(ActionRecord::Strike { target: candidate.0 });
        if harvestable.hits_left > 0 {
            return StrikeOutcome::Hit;
        }

        let origin = position_of(self.world, entity).unwrap_or(Vec3::ZERO);
        let drop = ItemDrop {
            material: Material::from_harvest(harvestable.source.kind()),
            count: harvestable.yield_count,
        };
        self.commands.spawn((Position(origin + Vec3::new(0.5, 0.0, 0.5)), drop));
        self.commands.despawn(entity);
        StrikeOutcome::Destroyed
    }

    fn pick_up(&mut self, drop: ObjectId) -> u32 {
        let Some(entity) = self.in_reach(drop, INTERACT_REACH) else {
            return 0;
        };
        let Some(found) = self.world.get::<&ItemDrop>(entity).ok().map(|found| *found) else {
            return 0;
        };
        self.with_pack(|pack| pack.add(found.material, found.count));
        self.commands.despawn(entity);
        self.record(ActionRecord::PickUp {
            material: found.material,
            count: found.count,
        });
        found.count
    }

    fn withdraw(&mut self, container: ObjectId, material: Material, amount: u32) -> u32 {
        let Some(entity) = self.in_reach(container, INTERACT_REACH) else {
            return 0;
        };
        let Ok(mut storage) = self.world.get::<&mut Storage>(entity) else {
            return 0;
        };
        let taken = storage.take(material, amount);
        self.with_pack(|pack| pack.add(material, taken));
        self.record(ActionRecord::Withdraw { material, count: taken });
        taken
    }

    fn deposit(&mut self, container: ObjectId, material: Material, amount: u32) -> u32 {
        let Some(entity) = self.in_reach(container, INTERACT_REACH) else {
            return 0;
        };
        let Ok(mut storage) = self.world.get::<&mut Storage>(entity) else {
            return 0;
        };
        let offered = self.with_pack(|pack| pack.count(material)).min(amount);
        let stored = storage.store(material, offered);
        self.with_pack(|pack| pack.remove(material, stored));
        self.record(ActionRecord::Deposit { material, count: stored });
        stored
    }

    fn feed(&mut self, facility: ObjectId, slot: FacilitySlot, amount: u32) -> u32 {
        let Some(entity) = self.in_reach(facility, INTERACT_REACH) else {
            return 0;
        };
        let Ok(mut target) = self.world.get::<&mut Facility>(entity) else {
            return 0;
        };
        let Some(level) = target.slot_mut(slot) else {
            return 0;
        };
        let carried = self.with_pack(|pack| pack.count(level.material));
        let fed = amount.min(carried).min(level.space());
        level.current += fed;
        let material = level.material;
        self.with_pack(|pack| pack.remove(material, fed));
        self.record(ActionRecord::Feed { slot, count: fed });
        fed
    }

    fn collect_output(&mut self, facility: ObjectId) -> u32 {
        let Some(entity) = self.in_reach(facility, INTERACT_REACH) else {
            return 0;
        };
        let Ok(mut target) = self.world.get::<&mut Facility>(entity) else {
            return 0;
        };
        let count = std::mem::take(&mut target.output_ready);
        let material = target.class.output();
        self.with_pack(|pack| pack.add(material, count));
        self.record(ActionRecord::Collect { material, count });
        count
    }

    fn interact(&mut self, target: ObjectId, interaction: Interaction) -> bool {
        let Some(entity) = self.in_reach(target, INTERACT_REACH) else {
            return false;
        };
        let Ok(mut fixture) = self.world.get::<&mut FixtureKind>(entity) else {
            return false;
        };
        if !fixture.accepts(interaction) {
            return false;
        }
        match (&mut *fixture, interaction) {
            (FixtureKind::Door { open }, _) => *open = !*open,
            (FixtureKind::Cart { attached }, Interaction::AttachCart) => *attached = true,
            (FixtureKind::Cart { attached }, Interaction::DetachCart) => *attached = false,
            _ => {}
        }
        self.record(ActionRecord::Interact {
            target: target.0,
            interaction,
        });
        true
    }
}
