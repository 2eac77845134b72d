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

//! Combat controller for melee and ranged engagement

use super::behavior::TickContext;
use super::navigation::Navigator;
use crate::config::CombatConfig;
use crate::ecs::components::{
    BrokenGear, CombatPhase, CombatState, Companion, EngagementRange, LockKind, ResourcePool,
    TargetLock,
};
use crate::ecs::events::{CompanionEvent, EventBus};
use crate::services::{
    planar, planar_distance, AttackKind, HostileInfo, InventoryStore, ItemClass, ItemId,
    ProjectileInfo, WeaponContext,
};
use glam::Vec3;
use hearthguard_common::CombatStance;
use metrics::counter;
use uuid::Uuid;

const RETREAT_STOP: f32 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct CombatController {
    state: CombatState,
}

impl CombatController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CombatState {
        &self.state
    }

    pub fn broken_gear_mut(&mut self) -> &mut BrokenGear {
        &mut self.state.broken
    }

    /// Passive companions only fight directed locks
    pub fn wants_to_act(&self, lock: Option<&TargetLock>, stance: CombatStance) -> bool {
        match lock {
            Some(lock) => stance.initiates_combat() || lock.kind == LockKind::Directed,
            None => false,
        }
    }

    /// Drop back to Idle and lower any raised block
    pub fn stand_down(&mut self, ctx: &mut TickContext<'_>) {
        if self.state.is_engaged() {
            tracing::debug!("Standing down from {}", self.state.phase.as_str());
            ctx.actions.set_blocking(false);
        }
        self.state.reset();
    }

    /// Fight the locked target for one tick
    ///
    /// Retreat and recovery take precedence over threats, threats over
    /// attacking. Weapons are swapped in for the chosen engagement range.
    ///
    /// # Arguments
    /// * `lock` - Target the arbitrator committed to
    /// * `pool` - Stamina paid for swings, blocks and dodges
    /// * `nav` - Movement front-end
    /// * `ctx` - Collaborators for this tick
    /// * `events` - Bus for engage, retreat and broken gear notices
    ///
    /// # Returns
    /// The combat phase after acting; `Idle` once the target is dead or gone.
    #[allow(clippy::too_many_arguments)]
    pub fn act(
        &mut self,
        companion: &Companion,
        lock: &TargetLock,
        pool: &mut ResourcePool,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        events: &EventBus,
        config: &CombatConfig,
    ) -> CombatPhase {
        let Some(target) = ctx.sensor.hostile(lock.target).filter(|hostile| hostile.alive) else {
            self.stand_down(ctx);
            return CombatPhase::Idle;
        };

        let agent = companion.agent_id;
        let position = ctx.movement.position();
        let distance = planar_distance(position, target.position);
        let vitals = ctx.sensor.vitals();

        self.state.broken.refresh(ctx.inventory);
        self.state.update_timers(ctx.delta_time);

        if !self.state.is_engaged() || self.state.target != Some(target.id) {
            self.state.reset();
            self.state.target = Some(target.id);
            self.state.phase = CombatPhase::Approach;
            tracing::info!(agent = %agent, "Engaging {} ({}) at {:.1}", target.id, lock.kind.as_str(), distance);
            counter!("companion.combat.engagements", "lock" => lock.kind.as_str()).increment(1);
            events.publish(CompanionEvent::Engaged { agent, target: target.id });
            self.select_range(distance, ctx.inventory, config);
            self.ensure_weapon(ctx.inventory);
        }

        if vitals.hits_taken > 0 {
            self.wear_protection(vitals.hits_taken, ctx.inventory, agent, events, config);
        }

        let health = vitals.health_ratio();
        let stamina = pool.ratio();
        if self.state.phase != CombatPhase::Retreat
            && (health < config.retreat_health || stamina < config.retreat_stamina)
        {
            tracing::info!(agent = %agent, "Retreating from {} (health {:.2}, stamina {:.2})", target.id, health, stamina);
            ctx.actions.set_blocking(false);
            self.state.phase = CombatPhase::Retreat;
            self.state.counter_pending = None;
            events.publish(CompanionEvent::Retreating { agent, target: target.id });
        }

        if self.state.phase == CombatPhase::Retreat {
            if health >= config.reengage_health && stamina >= config.reengage_stamina {
                tracing::info!(agent = %agent, "Recovered, re-engaging {}", target.id);
                self.state.phase = CombatPhase::Recover;
                self.state.retreat_point = None;
                events.publish(CompanionEvent::Reengaging { agent, target: target.id });
            } else {
                self.retreat(position, &target, nav, ctx, config);
                return CombatPhase::Retreat;
            }
        }

        if self.state.phase == CombatPhase::Recover {
            self.select_range(distance, ctx.inventory, config);
            self.ensure_weapon(ctx.inventory);
            self.state.phase = CombatPhase::Approach;
        }

        if let Some(countered) = self.state.counter_pending.take() {
            ctx.actions.set_blocking(false);
            self.state.phase = CombatPhase::EngageMelee;
            if countered == target.id && pool.can_afford(config.attack_cost) {
                if ctx.actions.attack(target.id, AttackKind::Counter) {
                    tracing::debug!(agent = %agent, "Counter-strike on {}", target.id);
                    pool.drain(config.attack_cost);
                    self.state.attack_cooldown = config.attack_interval;
                    self.wear_weapon(ctx.inventory, agent, events, config);
                }
            }
            return self.state.phase;
        }

        if let Some(phase) = self.handle_threats(companion, &target, position, distance, pool, ctx, config) {
            return phase;
        }
        if self.state.phase == CombatPhase::Block {
            ctx.actions.set_blocking(false);
            self.state.phase = CombatPhase::EngageMelee;
        }

        self.select_range(distance, ctx.inventory, config);
        match self.state.range {
            EngagementRange::Ranged => self.engage_ranged(agent, &target, position, pool, nav, ctx, events, config),
            EngagementRange::Melee => self.engage_melee(agent, &target, distance, pool, nav, ctx, events, config),
        }
    }

    /// Head for the retreat point, then hold there unless the target follows
    fn retreat(
        &mut self,
        position: Vec3,
        target: &HostileInfo,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        config: &CombatConfig,
    ) {
        let arrived = self
            .state
            .retreat_point
            .is_some_and(|point| planar_distance(position, point) <= RETREAT_STOP + 0.1);
        let pressed = planar_distance(position, target.position) < config.retreat_distance * 0.5;
        if self.state.retreat_point.is_none() || (arrived && pressed) {
            self.state.retreat_point = Some(retreat_point(position, target.position, ctx.movement.forward(), config));
        } else if arrived {
            nav.stop(ctx.movement);
            return;
        }
        if let Some(point) = self.state.retreat_point {
            nav.move_to(ctx.movement, point, RETREAT_STOP, false, false);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_threats(
        &mut self,
        companion: &Companion,
        target: &HostileInfo,
        position: Vec3,
        distance: f32,
        pool: &mut ResourcePool,
        ctx: &mut TickContext<'_>,
        config: &CombatConfig,
    ) -> Option<CombatPhase> {
        let side = companion.follow_side();
        let incoming = ctx
            .sensor
            .incoming_projectiles(config.projectile_radius)
            .into_iter()
            .find(|projectile| heading_toward(projectile, position));

        if let Some(projectile) = incoming {
            let direction = perpendicular(planar(projectile.velocity), side);
            if pool.can_afford(config.dodge_cost) && ctx.actions.dodge(direction * config.dodge_distance) {
                tracing::debug!(agent = %companion.agent_id, "Dodging projectile");
                pool.drain(config.dodge_cost);
                return Some(self.state.phase);
            }
            if pool.try_spend(config.block_cost) {
                ctx.actions.set_blocking(true);
                self.state.phase = CombatPhase::Block;
                return Some(CombatPhase::Block);
            }
        }

        if target.attack_imminent && distance <= config.threat_radius {
            if pool.try_spend(config.block_cost) {
                tracing::debug!(agent = %companion.agent_id, "Parrying {}", target.id);
                ctx.actions.set_blocking(true);
                self.state.phase = CombatPhase::Block;
                self.state.block_timer = 0.0;
                self.state.counter_pending = Some(target.id);
                return Some(CombatPhase::Block);
            }
            let direction = perpendicular(planar(target.position - position), side);
            if pool.can_afford(config.dodge_cost) && ctx.actions.dodge(direction * config.dodge_distance) {
                tracing::debug!(agent = %companion.agent_id, "Dodging attack from {}", target.id);
                pool.drain(config.dodge_cost);
                return Some(self.state.phase);
            }
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn engage_ranged(
        &mut self,
        agent: Uuid,
        target: &HostileInfo,
        position: Vec3,
        pool: &mut ResourcePool,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        events: &EventBus,
        config: &CombatConfig,
    ) -> CombatPhase {
        self.state.phase = CombatPhase::EngageRanged;
        nav.stop(ctx.movement);
        if self.state.attack_cooldown > 0.0 || !pool.can_afford(config.attack_cost) {
            return self.state.phase;
        }
        let speed = ctx
            .inventory
            .equipped()
            .iter()
            .find_map(|item| match item.class {
                ItemClass::RangedWeapon { projectile_speed } => Some(projectile_speed),
                _ => None,
            })
            .unwrap_or(config.min_projectile_speed);
        let aim = lead_aim(position, target.position, target.velocity, speed, config);
        if ctx.actions.attack(target.id, AttackKind::Ranged { aim }) {
            pool.drain(config.attack_cost);
            self.state.attack_cooldown = config.attack_interval;
            self.wear_weapon(ctx.inventory, agent, events, config);
        }
        self.state.phase
    }

    #[allow(clippy::too_many_arguments)]
    fn engage_melee(
        &mut self,
        agent: Uuid,
        target: &HostileInfo,
        distance: f32,
        pool: &mut ResourcePool,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        events: &EventBus,
        config: &CombatConfig,
    ) -> CombatPhase {
        if distance > config.melee_range {
            let shuffle = distance <= config.melee_range + config.shuffle_margin;
            let run = !shuffle
                && distance > config.approach_run_distance
                && !ctx.inventory.encumbered()
                && pool.try_spend(config.approach_run_cost * ctx.delta_time);
            nav.move_to(ctx.movement, target.position, config.melee_range * 0.8, run, false);
            self.state.phase = if shuffle { CombatPhase::EngageMelee } else { CombatPhase::Approach };
            return self.state.phase;
        }

        nav.stop(ctx.movement);
        self.state.phase = CombatPhase::EngageMelee;

        let power_ready = target.staggered
            && self.state.attack_cooldown <= 0.0
            && self.state.power_attack_cooldown <= 0.0
            && pool.can_afford(config.power_attack_cost);
        let (kind, cost) = if power_ready {
            (AttackKind::Power, config.power_attack_cost)
        } else if self.state.attack_cooldown <= 0.0 && pool.can_afford(config.attack_cost) {
            (AttackKind::Normal, config.attack_cost)
        } else {
            return self.state.phase;
        };

        if ctx.actions.attack(target.id, kind) {
            pool.drain(cost);
            self.state.attack_cooldown = config.attack_interval;
            if kind == AttackKind::Power {
                tracing::debug!(agent = %agent, "Power attack on staggered {}", target.id);
                self.state.power_attack_cooldown = config.power_attack_cooldown;
            }
            self.wear_weapon(ctx.inventory, agent, events, config);
        } else {
            nav.move_to(ctx.movement, target.position, config.melee_range * 0.5, false, false);
        }
        self.state.phase
    }

    /// Choose melee or ranged for the current distance
    fn select_range(&mut self, distance: f32, inventory: &mut dyn InventoryStore, config: &CombatConfig) {
        let ranged_available = has_equipped(inventory, |class| class.is_ranged())
            || inventory
                .best_weapon_for(WeaponContext::Ranged, self.state.broken.excluded())
                .is_some();
        let next = match self.state.range {
            EngagementRange::Melee if distance > config.ranged_enter_distance && ranged_available => {
                EngagementRange::Ranged
            }
            EngagementRange::Ranged if distance < config.ranged_exit_distance || !ranged_available => {
                EngagementRange::Melee
            }
            range => range,
        };
        if next != self.state.range {
            tracing::debug!("Switching to {:?} at {:.1}", next, distance);
            self.state.range = next;
            self.ensure_weapon(inventory);
        }
    }

    /// Equip a real weapon for the current range when a tool or nothing is held
    fn ensure_weapon(&mut self, inventory: &mut dyn InventoryStore) {
        let (context, satisfied) = match self.state.range {
            EngagementRange::Melee => (
                WeaponContext::Melee,
                has_equipped(inventory, |class| class == ItemClass::MeleeWeapon),
            ),
            EngagementRange::Ranged => (
                WeaponContext::Ranged,
                has_equipped(inventory, |class| class.is_ranged()),
            ),
        };
        if satisfied {
            return;
        }
        if let Some(item) = inventory.best_weapon_for(context, self.state.broken.excluded()) {
            for held in inventory.equipped() {
                if !held.class.is_protective() {
                    inventory.unequip(held.id);
                }
            }
            if inventory.equip(item.id) {
                tracing::debug!("Equipped {:?} for {:?}", item.id, context);
            } else {
                tracing::warn!("Inventory refused to equip {:?}", item.id);
            }
        }
    }

    fn wear_weapon(&mut self, inventory: &mut dyn InventoryStore, agent: Uuid, events: &EventBus, config: &CombatConfig) {
        let weapon = inventory.equipped().into_iter().find(|item| item.class.is_weapon());
        if let Some(weapon) = weapon {
            if wear_item(inventory, &mut self.state.broken, weapon.id, config.wear_per_strike, agent, events) {
                self.ensure_weapon(inventory);
            }
        }
    }

    fn wear_protection(
        &mut self,
        hits: u32,
        inventory: &mut dyn InventoryStore,
        agent: Uuid,
        events: &EventBus,
        config: &CombatConfig,
    ) {
        let amount = config.wear_per_hit * hits as f32;
        let protective: Vec<_> = inventory
            .equipped()
            .into_iter()
            .filter(|item| item.class.is_protective())
            .collect();
        for item in protective {
            wear_item(inventory, &mut self.state.broken, item.id, amount, agent, events);
        }
    }
}

/// Wear an item, unequipping and remembering it when it breaks
///
/// Returns true if the item broke.
pub fn wear_item(
    inventory: &mut dyn InventoryStore,
    broken: &mut BrokenGear,
    item: ItemId,
    amount: f32,
    agent: Uuid,
    events: &EventBus,
) -> bool {
    if amount <= 0.0 {
        return false;
    }
    if inventory.wear(item, amount) > 0.0 {
        return false;
    }
    tracing::warn!(agent = %agent, "Item {:?} broke", item);
    inventory.unequip(item);
    broken.mark(item);
    counter!("companion.equipment.broken").increment(1);
    events.publish(CompanionEvent::EquipmentBroken { agent, item });
    true
}

/// Aim point leading a moving target, compensating for projectile drop
pub fn lead_aim(origin: Vec3, target: Vec3, velocity: Vec3, projectile_speed: f32, config: &CombatConfig) -> Vec3 {
    let speed = projectile_speed.max(config.min_projectile_speed);
    let time = origin.distance(target) / speed;
    let mut aim = target + velocity * time;
    aim.y += 0.5 * config.gravity * time * time;
    aim
}

/// Point `retreat_distance` directly away from the target
pub fn retreat_point(position: Vec3, target: Vec3, forward: Vec3, config: &CombatConfig) -> Vec3 {
    let away = planar(position - target)
        .try_normalize()
        .unwrap_or_else(|| -planar(forward).normalize_or_zero());
    position + away * config.retreat_distance
}

fn has_equipped(inventory: &dyn InventoryStore, predicate: impl Fn(ItemClass) -> bool) -> bool {
    inventory.equipped().iter().any(|item| predicate(item.class))
}

fn heading_toward(projectile: &ProjectileInfo, position: Vec3) -> bool {
    planar(projectile.velocity).dot(planar(position - projectile.position)) > 0.0
}

fn perpendicular(direction: Vec3, side: f32) -> Vec3 {
    let direction = direction.normalize_or_zero();
    Vec3::new(-direction.z, 0.0, direction.x) * side
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::test_utils::{StubHost, StubSensor};
    use crate::services::{ObjectId, ToolKind};

    fn setup(hostile_at: Vec3) -> (StubHost, Companion, TargetLock) {
        let mut host = StubHost::new(Vec3::ZERO);
        host.sensor.hostiles.push(StubSensor::hostile(9, hostile_at));
        host.inventory = host
            .inventory
            .with_item(1, ItemClass::Tool(ToolKind::Axe), 50.0)
            .with_item(2, ItemClass::MeleeWeapon, 50.0);
        host.inventory.equipped.push(ItemId(1));
        let companion = Companion::new(Uuid::new_v4(), Uuid::new_v4(), "Brin");
        (host, companion, TargetLock::free(ObjectId(9)))
    }

    #[test]
    fn test_lead_aim_compensates_motion_and_drop() {
        let config = CombatConfig::default();
        let aim = lead_aim(Vec3::ZERO, Vec3::new(30.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 3.0), 30.0, &config);
        assert!((aim.z - 3.0).abs() < 1e-4);
        assert!((aim.y - 0.5 * config.gravity).abs() < 1e-4);
    }

    #[test]
    fn test_lead_aim_floors_projectile_speed() {
        let config = CombatConfig::default();
        let slow = lead_aim(Vec3::ZERO, Vec3::new(15.0, 0.0, 0.0), Vec3::ZERO, 1.0, &config);
        let floor = lead_aim(Vec3::ZERO, Vec3::new(15.0, 0.0, 0.0), Vec3::ZERO, config.min_projectile_speed, &config);
        assert_eq!(slow, floor);
    }

    #[test]
    fn test_retreat_point_is_away_from_target() {
        let config = CombatConfig::default();
        let point = retreat_point(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::Z, &config);
        assert!((point - Vec3::new(-12.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_engage_swaps_tool_for_weapon_and_attacks() {
        let (mut host, companion, lock) = setup(Vec3::new(1.5, 0.0, 0.0));
        let mut combat = CombatController::new();
        let mut pool = ResourcePool::default();
        let mut nav = Navigator::new();
        let events = EventBus::new();
        let config = CombatConfig::default();

        let phase = combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);

        assert_eq!(phase, CombatPhase::EngageMelee);
        assert_eq!(host.inventory.equipped, vec![ItemId(2)]);
        assert_eq!(host.actions.attacks, vec![(ObjectId(9), AttackKind::Normal)]);
        assert!(events.drain().iter().any(|e| matches!(e, CompanionEvent::Engaged { .. })));
    }

    #[test]
    fn test_attack_is_gated_by_stamina() {
        let (mut host, companion, lock) = setup(Vec3::new(1.5, 0.0, 0.0));
        let mut combat = CombatController::new();
        let mut pool = ResourcePool::default();
        pool.set_current(20.0);
        let mut nav = Navigator::new();
        let events = EventBus::new();
        let mut config = CombatConfig::default();
        config.attack_cost = 30.0;

        combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert!(host.actions.attacks.is_empty());
    }

    #[test]
    fn test_ranged_beyond_twenty_and_back_under_twelve() {
        let (mut host, companion, lock) = setup(Vec3::new(25.0, 0.0, 0.0));
        host.inventory = host
            .inventory
            .with_item(3, ItemClass::RangedWeapon { projectile_speed: 40.0 }, 50.0);
        let mut combat = CombatController::new();
        let mut pool = ResourcePool::default();
        let mut nav = Navigator::new();
        let events = EventBus::new();
        let config = CombatConfig::default();

        let phase = combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert_eq!(phase, CombatPhase::EngageRanged);
        assert!(host.inventory.equipped.contains(&ItemId(3)));
        assert!(matches!(host.actions.attacks.last(), Some((_, AttackKind::Ranged { .. }))));

        host.sensor.hostiles[0].position = Vec3::new(15.0, 0.0, 0.0);
        combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert_eq!(combat.state().range, EngagementRange::Ranged);

        host.sensor.hostiles[0].position = Vec3::new(11.0, 0.0, 0.0);
        combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert_eq!(combat.state().range, EngagementRange::Melee);
        assert!(host.inventory.equipped.contains(&ItemId(2)));
    }

    #[test]
    fn test_perfect_parry_then_counter() {
        let (mut host, companion, lock) = setup(Vec3::new(1.5, 0.0, 0.0));
        host.sensor.hostiles[0].attack_imminent = true;
        let mut combat = CombatController::new();
        let mut pool = ResourcePool::default();
        let mut nav = Navigator::new();
        let events = EventBus::new();
        let config = CombatConfig::default();

        let phase = combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert_eq!(phase, CombatPhase::Block);
        assert!(host.actions.blocking);
        assert_eq!(combat.state().block_timer, 0.0);

        host.sensor.hostiles[0].attack_imminent = false;
        combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert!(!host.actions.blocking);
        assert_eq!(host.actions.attacks.last(), Some(&(ObjectId(9), AttackKind::Counter)));
    }

    #[test]
    fn test_dodges_when_block_unaffordable() {
        let (mut host, companion, lock) = setup(Vec3::new(1.5, 0.0, 0.0));
        host.sensor.hostiles[0].attack_imminent = true;
        let mut combat = CombatController::new();
        let mut pool = ResourcePool::default();
        let mut nav = Navigator::new();
        let events = EventBus::new();
        let mut config = CombatConfig::default();
        config.block_cost = 500.0;

        combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert_eq!(host.actions.dodges.len(), 1);
        assert!(host.actions.dodges[0].x.abs() < 1e-4);
    }

    #[test]
    fn test_power_attack_on_stagger_respects_cooldown() {
        let (mut host, companion, lock) = setup(Vec3::new(1.5, 0.0, 0.0));
        host.sensor.hostiles[0].staggered = true;
        let mut combat = CombatController::new();
        let mut pool = ResourcePool::default();
        let mut nav = Navigator::new();
        let events = EventBus::new();
        let config = CombatConfig::default();

        combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert_eq!(host.actions.attacks.last(), Some(&(ObjectId(9), AttackKind::Power)));

        for _ in 0..30 {
            combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        }
        let powers = host
            .actions
            .attacks
            .iter()
            .filter(|(_, kind)| *kind == AttackKind::Power)
            .count();
        assert_eq!(powers, 1);
    }

    #[test]
    fn test_retreat_and_reengage() {
        let (mut host, companion, lock) = setup(Vec3::new(1.5, 0.0, 0.0));
        host.sensor.vitals.health = 20.0;
        let mut combat = CombatController::new();
        let mut pool = ResourcePool::default();
        let mut nav = Navigator::new();
        let events = EventBus::new();
        let config = CombatConfig::default();

        let phase = combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert_eq!(phase, CombatPhase::Retreat);
        let (point, _, _) = host.movement.last_request().unwrap();
        assert!(point.x < -10.0);

        host.sensor.vitals.health = 40.0;
        let phase = combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert_eq!(phase, CombatPhase::Retreat);

        host.sensor.vitals.health = 60.0;
        let phase = combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert_ne!(phase, CombatPhase::Retreat);
        let events = events.drain();
        assert!(events.iter().any(|e| matches!(e, CompanionEvent::Retreating { .. })));
        assert!(events.iter().any(|e| matches!(e, CompanionEvent::Reengaging { .. })));
    }

    #[test]
    fn test_power_attack_waits_for_swing_cooldown() {
        let (mut host, companion, lock) = setup(Vec3::new(1.5, 0.0, 0.0));
        let mut combat = CombatController::new();
        let mut pool = ResourcePool::default();
        let mut nav = Navigator::new();
        let events = EventBus::new();
        let config = CombatConfig::default();

        combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert_eq!(host.actions.attacks, vec![(ObjectId(9), AttackKind::Normal)]);

        host.sensor.hostiles[0].staggered = true;
        combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert_eq!(host.actions.attacks.len(), 1);

        combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(config.attack_interval), &events, &config);
        assert_eq!(host.actions.attacks.last(), Some(&(ObjectId(9), AttackKind::Power)));
    }

    #[test]
    fn test_retreat_keeps_its_point_then_holds() {
        let (mut host, companion, lock) = setup(Vec3::new(1.5, 0.0, 0.0));
        host.sensor.vitals.health = 20.0;
        let mut combat = CombatController::new();
        let mut pool = ResourcePool::default();
        let mut nav = Navigator::new();
        let events = EventBus::new();
        let config = CombatConfig::default();

        combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        let (first, _, _) = host.movement.last_request().unwrap();

        host.place_agent(Vec3::new(-4.0, 0.0, 0.0));
        combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        let (second, _, _) = host.movement.last_request().unwrap();
        assert_eq!(first, second);

        host.place_agent(first);
        let requests = host.movement.requests.len();
        let phase = combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);
        assert_eq!(phase, CombatPhase::Retreat);
        assert_eq!(host.movement.requests.len(), requests);
        assert!(host.movement.stops > 0);
    }

    #[test]
    fn test_broken_weapon_is_excluded() {
        let (mut host, companion, lock) = setup(Vec3::new(1.5, 0.0, 0.0));
        host.inventory = host.inventory.with_item(4, ItemClass::MeleeWeapon, 50.0);
        host.inventory.items[1].1 = 1.0;
        let mut combat = CombatController::new();
        let mut pool = ResourcePool::default();
        let mut nav = Navigator::new();
        let events = EventBus::new();
        let config = CombatConfig::default();

        combat.act(&companion, &lock, &mut pool, &mut nav, &mut host.context(0.05), &events, &config);

        assert!(combat.state().broken.contains(ItemId(2)));
        assert!(!host.inventory.equipped.contains(&ItemId(2)));
        assert!(host.inventory.equipped.contains(&ItemId(4)));
        assert!(events.drain().iter().any(|e| matches!(e, CompanionEvent::EquipmentBroken { item, .. } if *item == ItemId(2))));
    }

    #[test]
    fn test_passive_only_fights_directed() {
        let combat = CombatController::new();
        let free = TargetLock::free(ObjectId(1));
        let directed = TargetLock::directed(ObjectId(1), 10.0);
        assert!(!combat.wants_to_act(Some(&free), CombatStance::Passive));
        assert!(combat.wants_to_act(Some(&directed), CombatStance::Passive));
        assert!(combat.wants_to_act(Some(&free), CombatStance::Balanced));
        assert!(!combat.wants_to_act(None, CombatStance::Aggressive));
    }
}
