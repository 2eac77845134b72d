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

//! Harvest controller
//!
//! Cycle: Seeking -> Approaching -> Striking -> CollectingDrops -> Seeking.
//! Candidates the pathfinder cannot reach are blacklisted until the mode
//! changes. Being interrupted by combat leaves the task untouched.

use super::behavior::TickContext;
use super::combat::wear_item;
use super::navigation::Navigator;
use crate::config::{FollowConfig, HarvestConfig};
use crate::ecs::components::{
    score_candidate, BrokenGear, Companion, HarvestPhase, HarvestTask, ResourcePool,
};
use crate::ecs::events::EventBus;
use crate::services::{
    planar_distance, InventoryStore, ItemId, ObjectId, StrikeOutcome, ToolKind, WeaponContext,
    WorldEntity,
};
use hearthguard_common::HarvestKind;
use metrics::counter;
use std::collections::HashSet;

/// What the harvest controller did this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HarvestOutcome {
    Working(HarvestPhase),
    /// Nothing reachable to harvest
    Idle,
    /// Carried weight reached the stop threshold
    Overweight { carried: f32, capacity: f32 },
}

/// Carried weight at or above capacity minus the configured margin
pub fn is_overweight(inventory: &dyn InventoryStore, config: &HarvestConfig) -> bool {
    inventory.carried_weight() >= inventory.capacity() - config.overweight_margin
}

#[derive(Debug, Clone, Default)]
pub struct HarvestController {
    kind: Option<HarvestKind>,
    task: Option<HarvestTask>,
    blacklist: HashSet<ObjectId>,
    tool: Option<ItemId>,
}

impl HarvestController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(&self) -> Option<&HarvestTask> {
        self.task.as_ref()
    }

    pub fn is_blacklisted(&self, candidate: ObjectId) -> bool {
        self.blacklist.contains(&candidate)
    }

    pub fn wants_to_act(&self, companion: &Companion) -> bool {
        companion.mode.is_gather()
    }

    /// Forget everything about the current mode
    pub fn reset(&mut self) {
        self.kind = None;
        self.task = None;
        self.blacklist.clear();
        self.tool = None;
    }

    /// Drop the current task but keep the mode's blacklist and tool
    pub fn interrupt(&mut self) {
        self.task = None;
    }

    /// Start approaching a specific candidate chosen by the owner
    ///
    /// # Returns
    /// False when the entity is not harvestable or lies outside the leash.
    pub fn inject(&mut self, entity: &WorldEntity, nav: &Navigator, config: &HarvestConfig) -> bool {
        let Some(source) = entity.harvest_source() else {
            return false;
        };
        if !nav.allows(entity.position, false) {
            tracing::debug!("Candidate {} lies outside the leash", entity.id);
            return false;
        }
        if self.kind != Some(source.kind()) {
            self.reset();
            self.kind = Some(source.kind());
        }
        self.blacklist.remove(&entity.id);
        self.task = Some(HarvestTask::approach(entity, source, score_candidate(source, 0.0, config.standing_tree_penalty)));
        true
    }

    /// Seek, approach, strike and collect for the current gather mode
    ///
    /// # Returns
    /// * `Working(phase)` - A candidate is being worked
    /// * `Overweight` - Pack is full; nothing was done
    /// * `Idle` - No reachable candidate in range
    #[allow(clippy::too_many_arguments)]
    pub fn act(
        &mut self,
        companion: &Companion,
        pool: &mut ResourcePool,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        broken: &mut BrokenGear,
        events: &EventBus,
        config: &HarvestConfig,
        follow: &FollowConfig,
    ) -> HarvestOutcome {
        let Some(kind) = companion.mode.harvest_kind() else {
            return HarvestOutcome::Idle;
        };
        if self.kind != Some(kind) {
            self.reset();
            self.kind = Some(kind);
        }

        if is_overweight(ctx.inventory, config) {
            nav.stop(ctx.movement);
            return HarvestOutcome::Overweight {
                carried: ctx.inventory.carried_weight(),
                capacity: ctx.inventory.capacity(),
            };
        }

        if self.task.is_none() && !self.seek(companion, kind, nav, ctx, config) {
            nav.stop(ctx.movement);
            return HarvestOutcome::Idle;
        }

        let Some(phase) = self.task.as_ref().map(|task| task.phase) else {
            return HarvestOutcome::Idle;
        };
        match phase {
            HarvestPhase::Seeking => {}
            HarvestPhase::Approaching => self.approach(companion, kind, nav, ctx, broken, config, follow),
            HarvestPhase::Striking => self.strike(companion, pool, nav, ctx, broken, events, config),
            HarvestPhase::CollectingDrops => self.collect(nav, ctx, config),
        }
        match &self.task {
            Some(task) => HarvestOutcome::Working(task.phase),
            None => HarvestOutcome::Working(HarvestPhase::Seeking),
        }
    }

    fn seek(
        &mut self,
        companion: &Companion,
        kind: HarvestKind,
        nav: &Navigator,
        ctx: &mut TickContext<'_>,
        config: &HarvestConfig,
    ) -> bool {
        let position = ctx.movement.position();
        let best = ctx
            .sensor
            .scan_candidates(kind, config.search_radius)
            .into_iter()
            .filter(|entity| !self.blacklist.contains(&entity.id) && nav.allows(entity.position, false))
            .filter_map(|entity| {
                let source = entity.harvest_source()?;
                let score = score_candidate(
                    source,
                    planar_distance(position, entity.position),
                    config.standing_tree_penalty,
                );
                Some((entity, source, score))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2));

        match best {
            Some((entity, source, score)) => {
                tracing::debug!(
                    agent = %companion.agent_id,
                    "Harvest candidate {} ({:?}) scored {:.1}",
                    entity.id,
                    source,
                    score
                );
                self.task = Some(HarvestTask::approach(&entity, source, score));
                true
            }
            None => false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn approach(
        &mut self,
        companion: &Companion,
        kind: HarvestKind,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        broken: &BrokenGear,
        config: &HarvestConfig,
        follow: &FollowConfig,
    ) {
        let Some(candidate) = self.task.as_ref().map(|task| task.candidate) else {
            return;
        };
        let Some(entity) = ctx.sensor.entity(candidate) else {
            self.task = None;
            return;
        };
        if !nav.allows(entity.position, false) {
            tracing::debug!(agent = %companion.agent_id, "{} is outside the leash, blacklisting", candidate);
            counter!("companion.harvest.blacklisted").increment(1);
            self.blacklist.insert(candidate);
            self.task = None;
            return;
        }
        self.ensure_tool(kind, ctx.inventory, broken);

        let distance = planar_distance(ctx.movement.position(), entity.position);
        if distance <= config.strike_range {
            nav.stop(ctx.movement);
            if let Some(task) = self.task.as_mut() {
                task.position = entity.position;
                task.phase = HarvestPhase::Striking;
                task.strike_timer = 0.0;
            }
            return;
        }

        let result = nav.waypoint(ctx.movement, entity.position, config.strike_range * 0.8, follow);
        if !result.is_accepted() {
            tracing::debug!(agent = %companion.agent_id, "Cannot reach {}, blacklisting", candidate);
            counter!("companion.harvest.blacklisted").increment(1);
            self.blacklist.insert(candidate);
            self.task = None;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn strike(
        &mut self,
        companion: &Companion,
        pool: &mut ResourcePool,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        broken: &mut BrokenGear,
        events: &EventBus,
        config: &HarvestConfig,
    ) {
        let Some(task) = self.task.as_mut() else {
            return;
        };
        task.strike_timer -= ctx.delta_time;
        if task.strike_timer > 0.0 || !pool.try_spend(config.strike_cost) {
            return;
        }
        task.strike_timer = config.strike_interval;

        let candidate = task.candidate;
        let center = task.position;
        let outcome = ctx.actions.strike(candidate);
        if matches!(outcome, StrikeOutcome::Hit | StrikeOutcome::Destroyed) {
            if let Some(tool) = self.tool {
                if wear_item(ctx.inventory, broken, tool, config.tool_wear, companion.agent_id, events) {
                    self.tool = None;
                }
            }
        }

        match outcome {
            StrikeOutcome::Hit => {}
            StrikeOutcome::Destroyed => {
                counter!("companion.harvest.felled").increment(1);
                if companion.toggles.auto_pickup {
                    if let Some(task) = self.task.as_mut() {
                        task.phase = HarvestPhase::CollectingDrops;
                        task.position = center;
                    }
                } else {
                    self.task = None;
                }
            }
            StrikeOutcome::OutOfRange => {
                if let Some(task) = self.task.as_mut() {
                    task.phase = HarvestPhase::Approaching;
                }
            }
            StrikeOutcome::Invalid => {
                nav.stop(ctx.movement);
                self.task = None;
            }
        }
    }

    fn collect(&mut self, nav: &mut Navigator, ctx: &mut TickContext<'_>, config: &HarvestConfig) {
        let Some(center) = self.task.as_ref().map(|task| task.position) else {
            return;
        };
        let position = ctx.movement.position();
        let nearest = ctx
            .sensor
            .scan_drops(center, config.drop_radius)
            .into_iter()
            .filter(|drop| !self.blacklist.contains(&drop.id))
            .min_by(|a, b| {
                planar_distance(position, a.position).total_cmp(&planar_distance(position, b.position))
            });

        let Some(drop) = nearest else {
            self.task = None;
            return;
        };
        if planar_distance(position, drop.position) <= config.pickup_range {
            if ctx.actions.pick_up(drop.id) == 0 {
                self.blacklist.insert(drop.id);
            }
        } else if !nav
            .move_to(ctx.movement, drop.position, config.pickup_range * 0.8, false, true)
            .is_accepted()
        {
            self.blacklist.insert(drop.id);
        }
    }

    /// Keep the right tool in hand for the whole mode
    fn ensure_tool(&mut self, kind: HarvestKind, inventory: &mut dyn InventoryStore, broken: &BrokenGear) {
        let Some(tool_kind) = ToolKind::for_harvest(kind) else {
            return;
        };
        let held = inventory.equipped();
        if let Some(tool) = self.tool {
            if held.iter().any(|item| item.id == tool) {
                return;
            }
        }
        let Some(item) = inventory.best_weapon_for(WeaponContext::Harvest(tool_kind), broken.excluded()) else {
            self.tool = None;
            return;
        };
        for other in held.iter().filter(|other| !other.class.is_protective()) {
            inventory.unequip(other.id);
        }
        if inventory.equip(item.id) {
            tracing::debug!("Equipped {:?} for {}", tool_kind, kind.as_str());
            self.tool = Some(item.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::systems::Leash;
    use crate::ecs::test_utils::StubHost;
    use crate::services::{HarvestSource, ItemClass, Material, WorldEntityKind};
    use glam::Vec3;
    use hearthguard_common::ActionMode;
    use uuid::Uuid;

    fn gatherer(mode: ActionMode) -> Companion {
        let mut companion = Companion::new(Uuid::new_v4(), Uuid::new_v4(), "Brin");
        companion.mode = mode;
        companion
    }

    fn harvestable(id: u64, position: Vec3, source: HarvestSource) -> WorldEntity {
        WorldEntity::new(ObjectId(id), position, WorldEntityKind::Harvestable(source))
    }

    struct Rig {
        host: StubHost,
        harvest: HarvestController,
        pool: ResourcePool,
        nav: Navigator,
        broken: BrokenGear,
        events: EventBus,
        config: HarvestConfig,
        follow: FollowConfig,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                host: StubHost::new(Vec3::ZERO),
                harvest: HarvestController::new(),
                pool: ResourcePool::default(),
                nav: Navigator::new(),
                broken: BrokenGear::new(),
                events: EventBus::new(),
                config: HarvestConfig::default(),
                follow: FollowConfig::default(),
            }
        }

        fn tick(&mut self, companion: &Companion) -> HarvestOutcome {
            let mut ctx = self.host.context(0.05);
            self.harvest.act(
                companion,
                &mut self.pool,
                &mut self.nav,
                &mut ctx,
                &mut self.broken,
                &self.events,
                &self.config,
                &self.follow,
            )
        }
    }

    #[test]
    fn test_stump_beats_nearer_standing_tree() {
        let mut rig = Rig::new();
        rig.host.sensor.entities.push(harvestable(1, Vec3::new(10.0, 0.0, 0.0), HarvestSource::StandingTree));
        rig.host.sensor.entities.push(harvestable(2, Vec3::new(0.0, 0.0, 14.0), HarvestSource::Stump));

        rig.tick(&gatherer(ActionMode::GatherWood));
        assert_eq!(rig.harvest.task().map(|t| t.candidate), Some(ObjectId(2)));
    }

    #[test]
    fn test_equips_axe_for_wood() {
        let mut rig = Rig::new();
        rig.host.inventory = std::mem::take(&mut rig.host.inventory)
            .with_item(1, ItemClass::MeleeWeapon, 10.0)
            .with_item(2, ItemClass::Tool(ToolKind::Axe), 10.0);
        rig.host.inventory.equipped.push(ItemId(1));
        rig.host.sensor.entities.push(harvestable(5, Vec3::new(6.0, 0.0, 0.0), HarvestSource::FallenLog));

        rig.tick(&gatherer(ActionMode::GatherWood));
        assert_eq!(rig.host.inventory.equipped, vec![ItemId(2)]);
    }

    #[test]
    fn test_unreachable_candidate_is_blacklisted() {
        let mut rig = Rig::new();
        rig.host.movement.refuse = true;
        rig.host.sensor.entities.push(harvestable(1, Vec3::new(8.0, 0.0, 0.0), HarvestSource::Rock));
        rig.host.sensor.entities.push(harvestable(2, Vec3::new(12.0, 0.0, 0.0), HarvestSource::Rock));
        let companion = gatherer(ActionMode::GatherStone);

        rig.tick(&companion);
        assert!(rig.harvest.is_blacklisted(ObjectId(1)));

        rig.host.movement.refuse = false;
        rig.tick(&companion);
        assert_eq!(rig.harvest.task().map(|t| t.candidate), Some(ObjectId(2)));
    }

    #[test]
    fn test_strike_until_destroyed_then_collect() {
        let mut rig = Rig::new();
        rig.host.sensor.entities.push(harvestable(1, Vec3::new(1.0, 0.0, 0.0), HarvestSource::OreVein));
        let companion = gatherer(ActionMode::GatherOre);

        rig.tick(&companion);
        assert_eq!(rig.harvest.task().map(|t| t.phase), Some(HarvestPhase::Striking));
        assert!(rig.host.actions.strikes.is_empty());

        rig.host.actions.strike_outcome = Some(StrikeOutcome::Destroyed);
        rig.tick(&companion);
        assert_eq!(rig.host.actions.strikes, vec![ObjectId(1)]);
        assert_eq!(rig.harvest.task().map(|t| t.phase), Some(HarvestPhase::CollectingDrops));

        rig.host.sensor.entities.clear();
        rig.host.sensor.entities.push(WorldEntity::new(
            ObjectId(40),
            Vec3::new(1.5, 0.0, 0.5),
            WorldEntityKind::ItemDrop { material: Material::Ore, count: 2 },
        ));
        rig.tick(&companion);
        assert_eq!(rig.harvest.task().map(|t| t.phase), Some(HarvestPhase::CollectingDrops));
        assert!(!rig.harvest.is_blacklisted(ObjectId(40)));
    }

    #[test]
    fn test_strikes_wait_for_interval_and_stamina() {
        let mut rig = Rig::new();
        rig.host.sensor.entities.push(harvestable(1, Vec3::new(1.0, 0.0, 0.0), HarvestSource::Rock));
        let companion = gatherer(ActionMode::GatherStone);

        rig.tick(&companion);
        rig.tick(&companion);
        rig.tick(&companion);
        assert_eq!(rig.host.actions.strikes.len(), 1);

        rig.pool.drain(rig.pool.current());
        for _ in 0..30 {
            rig.tick(&companion);
        }
        assert_eq!(rig.host.actions.strikes.len(), 1);
    }

    #[test]
    fn test_no_drop_collection_without_auto_pickup() {
        let mut rig = Rig::new();
        rig.host.sensor.entities.push(harvestable(1, Vec3::new(1.0, 0.0, 0.0), HarvestSource::Pickable));
        rig.host.actions.strike_outcome = Some(StrikeOutcome::Destroyed);
        let mut companion = gatherer(ActionMode::Forage);
        companion.toggles.auto_pickup = false;

        rig.tick(&companion);
        rig.tick(&companion);
        assert_eq!(rig.host.actions.strikes.len(), 1);
        assert!(rig.harvest.task().is_none());
    }

    #[test]
    fn test_overweight_stops_harvest() {
        let mut rig = Rig::new();
        rig.host.inventory.weight = 298.0;
        rig.host.sensor.entities.push(harvestable(1, Vec3::new(3.0, 0.0, 0.0), HarvestSource::Rock));

        let outcome = rig.tick(&gatherer(ActionMode::GatherStone));
        assert_eq!(outcome, HarvestOutcome::Overweight { carried: 298.0, capacity: 300.0 });

        rig.host.inventory.weight = 297.9;
        assert!(!is_overweight(&rig.host.inventory, &rig.config));
    }

    #[test]
    fn test_injected_candidate_skips_seeking() {
        let mut rig = Rig::new();
        let log = harvestable(9, Vec3::new(20.0, 0.0, 0.0), HarvestSource::FallenLog);
        rig.host.sensor.entities.push(log.clone());

        assert!(rig.harvest.inject(&log, &rig.nav, &rig.config));
        assert_eq!(rig.harvest.task().map(|t| t.phase), Some(HarvestPhase::Approaching));

        rig.tick(&gatherer(ActionMode::GatherWood));
        assert_eq!(rig.harvest.task().map(|t| t.candidate), Some(ObjectId(9)));
        let (point, _, run) = rig.host.movement.last_request().unwrap();
        assert_eq!(point, Vec3::new(20.0, 0.0, 0.0));
        assert!(run);
    }

    #[test]
    fn test_candidate_outside_leash_is_refused() {
        let mut rig = Rig::new();
        rig.nav.set_leash(Some(Leash::new(Vec3::ZERO, 10.0, 2.0)));
        let far = harvestable(9, Vec3::new(30.0, 0.0, 0.0), HarvestSource::Rock);
        let near = harvestable(4, Vec3::new(6.0, 0.0, 0.0), HarvestSource::Rock);
        rig.host.sensor.entities.push(near.clone());

        assert!(!rig.harvest.inject(&far, &rig.nav, &rig.config));
        assert!(rig.harvest.task().is_none());

        // Anchor moved after the task began
        assert!(rig.harvest.inject(&near, &rig.nav, &rig.config));
        rig.nav.set_leash(Some(Leash::new(Vec3::new(-20.0, 0.0, 0.0), 10.0, 2.0)));
        rig.tick(&gatherer(ActionMode::GatherStone));
        assert!(rig.harvest.is_blacklisted(ObjectId(4)));
        assert!(rig.harvest.task().is_none());
    }
}
