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

//! Follow controller
//!
//! Keeps the companion near its owner using hysteresis zones:
//! - Inner: stand still
//! - Comfort: hold position if the owner is idle, otherwise trail an anchor
//! - CatchUp: trail a tighter anchor
//! - Sprint: chase the owner directly once far enough behind
//!
//! Gaps beyond the teleport distance relocate the companion behind the owner.
//! While catching up, a stuck tracker escalates from a lateral nudge to a
//! teleport when the agent stops making progress.

use super::behavior::TickContext;
use super::navigation::Navigator;
use crate::config::FollowConfig;
use crate::ecs::components::{
    determine_follow_zone, Companion, FollowZone, ResourcePool, StuckAction, StuckStage, StuckTracker,
};
use crate::ecs::events::{CompanionEvent, EventBus, TeleportReason};
use crate::services::{planar, planar_distance, OwnerState, WorldSensor};
use glam::Vec3;
use hearthguard_common::ActionMode;
use metrics::counter;

const NUDGE_STOP: f32 = 0.2;

/// What the follow controller did this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    /// Owner is not in the world
    NoOwner,
    Holding,
    Moving,
    Nudged,
    Teleported(TeleportReason),
}

#[derive(Debug, Clone, Default)]
pub struct FollowController {
    zone: FollowZone,
    stuck: StuckTracker,
    last_gap: Option<f32>,
    nudge: Option<Vec3>,
}

impl FollowController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zone(&self) -> FollowZone {
        self.zone
    }

    /// Follow runs in Follow mode, unless StayHome replaces it with patrol
    pub fn wants_to_act(&self, companion: &Companion, sensor: &dyn WorldSensor) -> bool {
        companion.mode == ActionMode::Follow && !companion.toggles.stay_home && sensor.owner().is_some()
    }

    /// Follow toggle on during a task and the owner is beyond the owner leash
    pub fn owner_leash_exceeded(
        &self,
        companion: &Companion,
        position: Vec3,
        sensor: &dyn WorldSensor,
        config: &FollowConfig,
    ) -> bool {
        if !companion.toggles.follow || !companion.mode.is_task() {
            return false;
        }
        sensor
            .owner()
            .is_some_and(|owner| planar_distance(position, owner.position) > config.owner_leash)
    }

    /// Forget gap history and stuck time
    pub fn reset(&mut self) {
        self.stuck.reset();
        self.last_gap = None;
        self.nudge = None;
    }

    /// Keep up with the owner for one tick
    ///
    /// # Arguments
    /// * `pool` - Stamina spent on running
    /// * `nav` - Movement front-end
    /// * `ctx` - Collaborators for this tick
    /// * `events` - Bus for teleport notices
    ///
    /// # Returns
    /// What the controller did; `NoOwner` stops the agent in place.
    pub fn act(
        &mut self,
        companion: &Companion,
        pool: &mut ResourcePool,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        events: &EventBus,
        config: &FollowConfig,
    ) -> FollowOutcome {
        let Some(owner) = ctx.sensor.owner() else {
            nav.stop(ctx.movement);
            self.reset();
            return FollowOutcome::NoOwner;
        };

        let position = ctx.movement.position();
        let gap = planar_distance(position, owner.position);

        if gap > config.teleport_distance {
            self.teleport(companion, &owner, nav, ctx, events, TeleportReason::Distance, config);
            return FollowOutcome::Teleported(TeleportReason::Distance);
        }

        let previous = self.zone;
        self.zone = determine_follow_zone(self.zone, gap, config);
        if self.zone != previous {
            tracing::debug!(
                agent = %companion.agent_id,
                "Follow zone {} -> {} at gap {:.2}",
                previous.as_str(),
                self.zone.as_str(),
                gap
            );
        }
        let growing = self.last_gap.is_some_and(|last| gap > last + 1e-3);
        self.last_gap = Some(gap);

        if matches!(self.zone, FollowZone::CatchUp | FollowZone::Sprint) && gap > config.stuck_min_gap {
            match self.stuck.observe(position, owner.position, ctx.delta_time, config) {
                StuckAction::Nudge => {
                    let point = nudge_point(position, owner.position, companion.follow_side(), config);
                    tracing::debug!(agent = %companion.agent_id, "No progress toward owner, nudging to {:?}", point);
                    counter!("companion.follow.nudges").increment(1);
                    nav.move_to(ctx.movement, point, NUDGE_STOP, false, false);
                    self.nudge = Some(point);
                    return FollowOutcome::Nudged;
                }
                StuckAction::Teleport => {
                    self.teleport(companion, &owner, nav, ctx, events, TeleportReason::Stuck, config);
                    return FollowOutcome::Teleported(TeleportReason::Stuck);
                }
                StuckAction::Continue => {}
            }
            // Finish the sidestep before resuming pursuit
            match self.nudge {
                Some(point)
                    if self.stuck.stage() == StuckStage::Nudge
                        && planar_distance(position, point) > NUDGE_STOP + 0.05 =>
                {
                    nav.move_to(ctx.movement, point, NUDGE_STOP, false, false);
                    return FollowOutcome::Nudged;
                }
                _ => self.nudge = None,
            }
        } else {
            self.stuck.reset();
            self.nudge = None;
        }

        match self.zone {
            FollowZone::Inner => {
                nav.stop(ctx.movement);
                FollowOutcome::Holding
            }
            FollowZone::Comfort if owner.planar_speed() < config.hold_speed => {
                if gap <= config.hold_distance {
                    nav.stop(ctx.movement);
                    FollowOutcome::Holding
                } else {
                    nav.move_to(ctx.movement, owner.position, config.hold_distance, false, false);
                    FollowOutcome::Moving
                }
            }
            zone => {
                let target = if zone == FollowZone::Sprint && gap > config.direct_pursuit_distance {
                    owner.position
                } else {
                    follow_anchor(&owner, companion.follow_side(), zone.anchor_scale(config), config)
                };
                let wants_run = owner.running || growing || zone == FollowZone::Sprint;
                let run = wants_run
                    && !ctx.inventory.encumbered()
                    && pool.try_spend(config.run_cost_per_second * ctx.delta_time);
                nav.move_to(ctx.movement, target, config.waypoint_stop_radius, run, false);
                FollowOutcome::Moving
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn teleport(
        &mut self,
        companion: &Companion,
        owner: &OwnerState,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        events: &EventBus,
        reason: TeleportReason,
        config: &FollowConfig,
    ) {
        let point = safe_point_behind(owner, ctx.sensor, config.teleport_behind);
        tracing::info!(
            agent = %companion.agent_id,
            "Teleporting behind owner ({:?}) to {:?}",
            reason,
            point
        );
        nav.teleport(ctx.movement, point);
        counter!("companion.follow.teleports", "reason" => teleport_label(reason)).increment(1);
        events.publish(CompanionEvent::Teleported {
            agent: companion.agent_id,
            reason,
        });
        self.zone = FollowZone::Comfort;
        self.reset();
    }
}

fn teleport_label(reason: TeleportReason) -> &'static str {
    match reason {
        TeleportReason::Distance => "distance",
        TeleportReason::Stuck => "stuck",
    }
}

/// Owner's facing on the ground plane
fn owner_heading(owner: &OwnerState) -> Vec3 {
    planar(owner.forward).try_normalize().unwrap_or(Vec3::Z)
}

/// Trailing point behind and beside the owner
pub fn follow_anchor(owner: &OwnerState, side: f32, scale: f32, config: &FollowConfig) -> Vec3 {
    let forward = owner_heading(owner);
    let right = Vec3::new(forward.z, 0.0, -forward.x);
    owner.position - forward * config.anchor_back * scale + right * config.anchor_side * scale * side
}

/// Point behind the owner on the ground, for teleports
pub fn safe_point_behind(owner: &OwnerState, sensor: &dyn WorldSensor, distance: f32) -> Vec3 {
    let behind = owner.position - owner_heading(owner) * distance;
    let height = sensor.ground_height(behind.x, behind.z).unwrap_or(owner.position.y);
    Vec3::new(behind.x, height, behind.z)
}

fn nudge_point(position: Vec3, owner: Vec3, side: f32, config: &FollowConfig) -> Vec3 {
    let toward = planar(owner - position).normalize_or_zero();
    let lateral = Vec3::new(-toward.z, 0.0, toward.x);
    position + lateral * config.nudge_distance * side
}
