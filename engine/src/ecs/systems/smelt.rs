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

//! Smelt controller
//!
//! Tends kilns and furnaces near the companion. Each tick without a task
//! plans the next operation in priority order:
//! 1. Feed wood to kilns with input space
//! 2. Refuel furnaces below the critical fuel ratio, otherwise load ore and
//!    then top up fuel
//! 3. Collect finished output (queue or ground drops at the output side),
//!    backing off from a facility whose queue refused to hand anything over
//! 4. Deposit carried coal and metal into a container with space
//!
//! Material already carried is delivered directly; anything else is fetched
//! from a nearby container first.

use super::behavior::TickContext;
use super::navigation::Navigator;
use crate::config::{FollowConfig, SmeltConfig};
use crate::ecs::components::{trip_cap, Companion, SmeltOperation, SmeltStage, SmeltTask};
use crate::services::{
    planar_distance, FacilityClass, FacilitySlot, FacilityState, Material, ObjectId,
    WorldEntity, WorldEntityKind,
};
use glam::Vec3;
use hearthguard_common::ActionMode;
use metrics::counter;

/// What the smelt controller did this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmeltOutcome {
    Working(SmeltOperation),
    /// Every facility is satisfied or nothing can be moved
    Idle,
}

/// Where the material for a refill comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Supply {
    Carried(u32),
    Container { id: ObjectId, available: u32 },
}

impl Supply {
    fn available(&self) -> u32 {
        match self {
            Supply::Carried(count) => *count,
            Supply::Container { available, .. } => *available,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SmeltController {
    task: Option<SmeltTask>,
    /// Facility picked by the owner, overriding the scan
    directed: Option<ObjectId>,
    /// Facilities whose output queue yielded nothing, with seconds left to skip them
    stalled_outputs: Vec<(ObjectId, f32)>,
}

impl SmeltController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(&self) -> Option<&SmeltTask> {
        self.task.as_ref()
    }

    pub fn directed(&self) -> Option<ObjectId> {
        self.directed
    }

    pub fn wants_to_act(&self, companion: &Companion) -> bool {
        companion.mode == ActionMode::Smelt || self.directed.is_some()
    }

    /// Restrict tending to one facility
    pub fn direct(&mut self, facility: ObjectId) {
        self.task = None;
        self.directed = Some(facility);
    }

    pub fn reset(&mut self) {
        self.task = None;
        self.directed = None;
        self.stalled_outputs.clear();
    }

    fn output_stalled(&self, facility: ObjectId) -> bool {
        self.stalled_outputs.iter().any(|(id, _)| *id == facility)
    }

    /// Plan a trip if idle, then advance it
    ///
    /// # Returns
    /// `Working` with the operation in flight, or `Idle` when no facility
    /// needs anything that can be moved.
    pub fn act(
        &mut self,
        companion: &Companion,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        config: &SmeltConfig,
        follow: &FollowConfig,
    ) -> SmeltOutcome {
        let delta_time = ctx.delta_time;
        self.stalled_outputs.retain_mut(|(_, remaining)| {
            *remaining -= delta_time;
            *remaining > 0.0
        });

        if self.task.is_none() {
            match self.plan(nav, ctx, config) {
                Some(task) => {
                    tracing::debug!(
                        agent = %companion.agent_id,
                        "Smelt plan: {} {} x{} at {}",
                        task.operation.as_str(),
                        task.material.as_str(),
                        task.amount,
                        task.target
                    );
                    counter!("companion.smelt.trips", "operation" => task.operation.as_str()).increment(1);
                    self.task = Some(task);
                }
                None => {
                    nav.stop(ctx.movement);
                    return SmeltOutcome::Idle;
                }
            }
        }

        let Some(task) = self.task.clone() else {
            return SmeltOutcome::Idle;
        };
        match task.stage {
            SmeltStage::Fetching { container } => self.fetch(&task, container, nav, ctx, config, follow),
            SmeltStage::Delivering => self.deliver(&task, nav, ctx, config, follow),
            SmeltStage::Sweeping => self.sweep(&task, nav, ctx, config),
        }
        SmeltOutcome::Working(task.operation)
    }

    fn plan(&self, nav: &Navigator, ctx: &TickContext<'_>, config: &SmeltConfig) -> Option<SmeltTask> {
        let position = ctx.movement.position();
        let mut facilities: Vec<WorldEntity> = ctx
            .sensor
            .scan_facilities(config.facility_radius)
            .into_iter()
            .filter(|entity| self.directed.map_or(true, |directed| directed == entity.id))
            .filter(|entity| nav.allows(entity.position, false))
            .collect();
        facilities.sort_by(|a, b| {
            let rank = |entity: &WorldEntity| match entity.facility().map(|state| state.class) {
                Some(FacilityClass::Kiln) => 0,
                _ => 1,
            };
            rank(a)
                .cmp(&rank(b))
                .then(planar_distance(position, a.position).total_cmp(&planar_distance(position, b.position)))
        });

        for entity in &facilities {
            let Some(state) = entity.facility() else { continue };
            if let Some(task) = self.plan_refill(entity.id, state, nav, ctx, config) {
                return Some(task);
            }
        }

        for entity in &facilities {
            let Some(state) = entity.facility() else { continue };
            let output = state.class.output();
            let loose = !drops_of(ctx, state.output_point, output, config.output_drop_radius).is_empty();
            let queued = state.output_ready > 0 && !self.output_stalled(entity.id);
            if queued || loose {
                return Some(SmeltTask {
                    target: entity.id,
                    operation: SmeltOperation::CollectOutput,
                    stage: if queued { SmeltStage::Delivering } else { SmeltStage::Sweeping },
                    material: output,
                    slot: None,
                    point: state.output_point,
                    amount: state.output_ready,
                });
            }
        }

        self.plan_deposit(position, nav, ctx, config)
    }

    fn plan_refill(
        &self,
        facility: ObjectId,
        state: &FacilityState,
        nav: &Navigator,
        ctx: &TickContext<'_>,
        config: &SmeltConfig,
    ) -> Option<SmeltTask> {
        let needs: &[(SmeltOperation, FacilitySlot)] = match state.class {
            FacilityClass::Kiln => &[(SmeltOperation::RefillFuel, FacilitySlot::Input)],
            FacilityClass::Furnace => {
                let fuel = state.fuel?;
                if fuel.ratio() < config.fuel_critical_ratio {
                    &[(SmeltOperation::RefillFuel, FacilitySlot::Fuel)]
                } else {
                    &[
                        (SmeltOperation::RefillOre, FacilitySlot::Input),
                        (SmeltOperation::RefillFuel, FacilitySlot::Fuel),
                    ]
                }
            }
        };

        needs.iter().find_map(|&(operation, slot)| {
            let level = state.slot(slot)?;
            if level.space() == 0 {
                return None;
            }
            let material = level.material;
            let supply = supply_for(material, nav, ctx, config)?;
            let amount = trip_cap(material, config).min(level.space()).min(supply.available());
            let stage = match supply {
                Supply::Carried(_) => SmeltStage::Delivering,
                Supply::Container { id, .. } => SmeltStage::Fetching { container: id },
            };
            Some(SmeltTask {
                target: facility,
                operation,
                stage,
                material,
                slot: Some(slot),
                point: state.point(slot),
                amount,
            })
        })
    }

    fn plan_deposit(
        &self,
        position: Vec3,
        nav: &Navigator,
        ctx: &TickContext<'_>,
        config: &SmeltConfig,
    ) -> Option<SmeltTask> {
        let material = [Material::Metal, Material::Coal]
            .into_iter()
            .find(|material| ctx.inventory.count(*material) > 0)?;
        let container = ctx
            .sensor
            .scan_containers(position, config.container_radius)
            .into_iter()
            .filter(|entity| entity.container().is_some_and(|state| state.has_space()))
            .filter(|entity| nav.allows(entity.position, false))
            .min_by(|a, b| {
                planar_distance(position, a.position).total_cmp(&planar_distance(position, b.position))
            })?;
        Some(SmeltTask {
            target: container.id,
            operation: SmeltOperation::DepositOutput,
            stage: SmeltStage::Delivering,
            material,
            slot: None,
            point: container.position,
            amount: ctx.inventory.count(material),
        })
    }

    fn fetch(
        &mut self,
        task: &SmeltTask,
        container: ObjectId,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        config: &SmeltConfig,
        follow: &FollowConfig,
    ) {
        let Some(entity) = ctx.sensor.entity(container) else {
            self.task = None;
            return;
        };
        if planar_distance(ctx.movement.position(), entity.position) > config.interact_range {
            if !nav.waypoint(ctx.movement, entity.position, config.interact_range * 0.8, follow).is_accepted() {
                self.task = None;
            }
            return;
        }
        nav.stop(ctx.movement);
        let taken = ctx.actions.withdraw(container, task.material, task.amount);
        if taken == 0 {
            tracing::debug!("Container {} had no {} to give", container, task.material.as_str());
            self.task = None;
            return;
        }
        if let Some(current) = self.task.as_mut() {
            current.amount = taken;
            current.stage = SmeltStage::Delivering;
        }
    }

    fn deliver(
        &mut self,
        task: &SmeltTask,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        config: &SmeltConfig,
        follow: &FollowConfig,
    ) {
        if planar_distance(ctx.movement.position(), task.point) > config.interact_range {
            if !nav.waypoint(ctx.movement, task.point, config.interact_range * 0.8, follow).is_accepted() {
                self.task = None;
            }
            return;
        }
        nav.stop(ctx.movement);

        match task.operation {
            SmeltOperation::RefillFuel | SmeltOperation::RefillOre => {
                let Some(slot) = task.slot else {
                    self.task = None;
                    return;
                };
                let amount = task.amount.min(ctx.inventory.count(task.material));
                let fed = ctx.actions.feed(task.target, slot, amount);
                tracing::debug!("Fed {} {} into {}", fed, task.material.as_str(), task.target);
                self.task = None;
            }
            SmeltOperation::CollectOutput => {
                let collected = ctx.actions.collect_output(task.target);
                tracing::debug!("Collected {} {} from {}", collected, task.material.as_str(), task.target);
                if collected == 0 && task.amount > 0 {
                    tracing::debug!("Output of {} refused, skipping it for {:.1}s", task.target, config.collect_backoff);
                    self.stalled_outputs.push((task.target, config.collect_backoff));
                }
                if let Some(current) = self.task.as_mut() {
                    current.stage = SmeltStage::Sweeping;
                }
            }
            SmeltOperation::DepositOutput => {
                let stored = ctx.actions.deposit(task.target, task.material, ctx.inventory.count(task.material));
                tracing::debug!("Stored {} {} in {}", stored, task.material.as_str(), task.target);
                self.task = None;
            }
        }
    }

    fn sweep(&mut self, task: &SmeltTask, nav: &mut Navigator, ctx: &mut TickContext<'_>, config: &SmeltConfig) {
        let position = ctx.movement.position();
        let nearest = drops_of(ctx, task.point, task.material, config.output_drop_radius)
            .into_iter()
            .min_by(|a, b| {
                planar_distance(position, a.position).total_cmp(&planar_distance(position, b.position))
            });
        let Some(drop) = nearest else {
            self.task = None;
            return;
        };
        if planar_distance(position, drop.position) <= config.interact_range {
            if ctx.actions.pick_up(drop.id) == 0 {
                self.task = None;
            }
        } else if !nav
            .move_to(ctx.movement, drop.position, config.interact_range * 0.8, false, true)
            .is_accepted()
        {
            self.task = None;
        }
    }
}

/// Carried material first, then the nearest container holding some
fn supply_for(material: Material, nav: &Navigator, ctx: &TickContext<'_>, config: &SmeltConfig) -> Option<Supply> {
    let carried = ctx.inventory.count(material);
    if carried > 0 {
        return Some(Supply::Carried(carried));
    }
    let position = ctx.movement.position();
    ctx.sensor
        .scan_containers(position, config.container_radius)
        .into_iter()
        .filter(|entity| nav.allows(entity.position, false))
        .filter_map(|entity| {
            let available = entity.container()?.count(material);
            (available > 0).then_some((entity, available))
        })
        .min_by(|a, b| {
            planar_distance(position, a.0.position).total_cmp(&planar_distance(position, b.0.position))
        })
        .map(|(entity, available)| Supply::Container {
            id: entity.id,
            available,
        })
}

fn drops_of(ctx: &TickContext<'_>, center: Vec3, material: Material, radius: f32) -> Vec<WorldEntity> {
    ctx.sensor
        .scan_drops(center, radius)
        .into_iter()
        .filter(|entity| matches!(entity.kind, WorldEntityKind::ItemDrop { material: found, .. } if found == material))
        .collect()
}
