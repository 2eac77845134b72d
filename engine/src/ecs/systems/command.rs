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

//! Command dispatcher
//!
//! Turns owner input into directives and runs the one-shot directed tasks
//! (walk over, then interact). Aim input is resolved against what the owner
//! is looking at, preferring the highest ranked object near the hit point.

use super::behavior::TickContext;
use super::navigation::Navigator;
use crate::config::{CommandConfig, FollowConfig};
use crate::services::{
    planar_distance, AimHit, Interaction, Material, ObjectId, WorldEntity, WorldEntityKind,
    WorldSensor,
};
use glam::Vec3;
use std::collections::VecDeque;

/// Raw owner input queued for the next tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandInput {
    /// Short press: act on whatever the owner is aiming at
    Aim,
    /// Long press: come back and follow
    Recall,
    /// An already resolved directive
    Directive(Directive),
}

/// A resolved owner order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Directive {
    Attack(ObjectId),
    MoveTo(Vec3),
    GatherAt(ObjectId),
    SmeltAt(ObjectId),
    RepairAt(ObjectId),
    Board(ObjectId),
    Sleep(ObjectId),
    Sit(ObjectId),
    AttachCart(ObjectId),
    DetachCart(ObjectId),
    DepositAt(ObjectId),
    OpenDoor(ObjectId),
    CancelAll,
}

impl Directive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Directive::Attack(_) => "Attack",
            Directive::MoveTo(_) => "MoveTo",
            Directive::GatherAt(_) => "GatherAt",
            Directive::SmeltAt(_) => "SmeltAt",
            Directive::RepairAt(_) => "RepairAt",
            Directive::Board(_) => "Board",
            Directive::Sleep(_) => "Sleep",
            Directive::Sit(_) => "Sit",
            Directive::AttachCart(_) => "AttachCart",
            Directive::DetachCart(_) => "DetachCart",
            Directive::DepositAt(_) => "DepositAt",
            Directive::OpenDoor(_) => "OpenDoor",
            Directive::CancelAll => "CancelAll",
        }
    }

    /// Interaction performed on arrival, for one-shot directives
    pub fn interaction(&self) -> Option<(ObjectId, Interaction)> {
        match *self {
            Directive::RepairAt(id) => Some((id, Interaction::Repair)),
            Directive::Board(id) => Some((id, Interaction::Board)),
            Directive::Sleep(id) => Some((id, Interaction::Sleep)),
            Directive::Sit(id) => Some((id, Interaction::Sit)),
            Directive::AttachCart(id) => Some((id, Interaction::AttachCart)),
            Directive::DetachCart(id) => Some((id, Interaction::DetachCart)),
            Directive::OpenDoor(id) => Some((id, Interaction::OpenDoor)),
            _ => None,
        }
    }
}

/// What happens once a directed task reaches its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectedAction {
    Interact(Interaction),
    Deposit,
    /// Plain move order, stay at the point
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectedPhase {
    Walking,
    Holding,
}

/// A one-shot directed task in flight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectedTask {
    pub target: Option<ObjectId>,
    pub point: Vec3,
    pub action: DirectedAction,
    pub phase: DirectedPhase,
}

impl DirectedTask {
    /// Name of the order this task carries out
    pub fn label(&self) -> &'static str {
        match self.action {
            DirectedAction::Interact(interaction) => interaction.as_str(),
            DirectedAction::Deposit => "DepositAt",
            DirectedAction::Hold => "MoveTo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectedOutcome {
    Walking,
    Completed,
    Holding,
    /// The target vanished or could not be reached
    Failed,
}

/// Materials handed over on a deposit directive
const DEPOSITABLE: [Material; 6] = [
    Material::Wood,
    Material::Stone,
    Material::Ore,
    Material::Coal,
    Material::Metal,
    Material::Forage,
];

#[derive(Debug, Clone, Default)]
pub struct CommandDispatcher {
    pending: VecDeque<CommandInput>,
    task: Option<DirectedTask>,
    attached_cart: Option<ObjectId>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, input: CommandInput) {
        self.pending.push_back(input);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_pending(&mut self) -> Vec<CommandInput> {
        self.pending.drain(..).collect()
    }

    pub fn task(&self) -> Option<&DirectedTask> {
        self.task.as_ref()
    }

    pub fn attached_cart(&self) -> Option<ObjectId> {
        self.attached_cart
    }

    pub fn wants_to_act(&self) -> bool {
        self.task.is_some()
    }

    /// Drop the directed task in flight
    pub fn cancel(&mut self) {
        self.task = None;
    }

    /// Resolve aim input against the sensor
    pub fn resolve_aim(&self, sensor: &dyn WorldSensor, config: &CommandConfig) -> Directive {
        resolve_directive(sensor.raycast_under_aim(), sensor, self.attached_cart, config)
    }

    /// Start a walk-then-act task for a one-shot directive
    ///
    /// # Arguments
    /// * `directive` - Resolved owner order
    /// * `sensor` - World view used to locate the target
    /// * `nav` - Navigator carrying the leash in force
    ///
    /// # Returns
    /// False for directives that are not handled as directed tasks, for
    /// targets that are gone, and for targets outside the leash.
    pub fn begin(&mut self, directive: Directive, sensor: &dyn WorldSensor, nav: &Navigator) -> bool {
        let (target, action) = match directive {
            Directive::MoveTo(point) => {
                if !nav.allows(point, false) {
                    tracing::debug!("Move target {:?} lies outside the leash", point);
                    return false;
                }
                self.task = Some(DirectedTask {
                    target: None,
                    point,
                    action: DirectedAction::Hold,
                    phase: DirectedPhase::Walking,
                });
                return true;
            }
            Directive::DepositAt(id) => (id, DirectedAction::Deposit),
            other => match other.interaction() {
                Some((id, interaction)) => (id, DirectedAction::Interact(interaction)),
                None => return false,
            },
        };
        let Some(entity) = sensor.entity(target) else {
            tracing::debug!("Directed target {} is gone", target);
            return false;
        };
        if !nav.allows(entity.position, false) {
            tracing::debug!("Directed target {} lies outside the leash", target);
            return false;
        }
        self.task = Some(DirectedTask {
            target: Some(target),
            point: entity.position,
            action,
            phase: DirectedPhase::Walking,
        });
        true
    }

    /// Walk toward the directed target and act on arrival
    ///
    /// # Returns
    /// * `Walking` - Still on the way
    /// * `Holding` - Arrived and staying put (move orders, sitting, sleeping)
    /// * `Completed` - One-shot interaction done, task cleared
    /// * `Failed` - Target gone, unreachable, refused or outside the leash
    pub fn act(
        &mut self,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        config: &CommandConfig,
        follow: &FollowConfig,
    ) -> DirectedOutcome {
        let Some(task) = self.task else {
            return DirectedOutcome::Failed;
        };
        if task.phase == DirectedPhase::Holding {
            return DirectedOutcome::Holding;
        }

        let point = match task.target {
            Some(target) => match ctx.sensor.entity(target) {
                Some(entity) => entity.position,
                None => {
                    self.task = None;
                    return DirectedOutcome::Failed;
                }
            },
            None => task.point,
        };
        if !nav.allows(point, false) {
            tracing::debug!("Directed target at {:?} left the leash", point);
            self.task = None;
            return DirectedOutcome::Failed;
        }

        if planar_distance(ctx.movement.position(), point) > config.interact_range {
            if nav.waypoint(ctx.movement, point, config.interact_range * 0.8, follow).is_accepted() {
                return DirectedOutcome::Walking;
            }
            tracing::debug!("Cannot reach directed target at {:?}", point);
            self.task = None;
            return DirectedOutcome::Failed;
        }

        nav.stop(ctx.movement);
        match (task.action, task.target) {
            (DirectedAction::Hold, _) => self.hold(),
            (DirectedAction::Interact(interaction), Some(target)) => {
                if !ctx.actions.interact(target, interaction) {
                    tracing::warn!("{} on {} was refused", interaction.as_str(), target);
                    self.task = None;
                    return DirectedOutcome::Failed;
                }
                match interaction {
                    Interaction::AttachCart => self.attached_cart = Some(target),
                    Interaction::DetachCart => self.attached_cart = None,
                    _ => {}
                }
                if interaction.holds_position() {
                    self.hold()
                } else {
                    self.task = None;
                    DirectedOutcome::Completed
                }
            }
            (DirectedAction::Deposit, Some(target)) => {
                for material in DEPOSITABLE {
                    let carried = ctx.inventory.count(material);
                    if carried > 0 {
                        ctx.actions.deposit(target, material, carried);
                    }
                }
                self.task = None;
                DirectedOutcome::Completed
            }
            _ => {
                self.task = None;
                DirectedOutcome::Failed
            }
        }
    }

    fn hold(&mut self) -> DirectedOutcome {
        if let Some(task) = self.task.as_mut() {
            task.phase = DirectedPhase::Holding;
        }
        DirectedOutcome::Holding
    }
}

/// Rank of an aimed-at object, lower wins
fn aim_rank(kind: &WorldEntityKind) -> Option<u8> {
    match kind {
        WorldEntityKind::Hostile => Some(0),
        WorldEntityKind::Cart => Some(1),
        WorldEntityKind::Door => Some(2),
        WorldEntityKind::Ship => Some(3),
        WorldEntityKind::Bed => Some(4),
        WorldEntityKind::Chair => Some(5),
        WorldEntityKind::RepairStation => Some(6),
        WorldEntityKind::Facility(_) => Some(7),
        WorldEntityKind::Container(_) => Some(8),
        WorldEntityKind::Harvestable(_) => Some(9),
        WorldEntityKind::ItemDrop { .. } => None,
    }
}

fn directive_for(entity: &WorldEntity, attached_cart: Option<ObjectId>) -> Option<Directive> {
    let id = entity.id;
    Some(match entity.kind {
        WorldEntityKind::Hostile => Directive::Attack(id),
        WorldEntityKind::Cart if attached_cart == Some(id) => Directive::DetachCart(id),
        WorldEntityKind::Cart => Directive::AttachCart(id),
        WorldEntityKind::Door => Directive::OpenDoor(id),
        WorldEntityKind::Ship => Directive::Board(id),
        WorldEntityKind::Bed => Directive::Sleep(id),
        WorldEntityKind::Chair => Directive::Sit(id),
        WorldEntityKind::RepairStation => Directive::RepairAt(id),
        WorldEntityKind::Facility(_) => Directive::SmeltAt(id),
        WorldEntityKind::Container(_) => Directive::DepositAt(id),
        WorldEntityKind::Harvestable(_) => Directive::GatherAt(id),
        WorldEntityKind::ItemDrop { .. } => return None,
    })
}

/// Pick the directive for an aim hit
///
/// No hit at all means cancel-all; a hit with nothing usable nearby is a
/// move order to the hit point.
pub fn resolve_directive(
    hit: Option<AimHit>,
    sensor: &dyn WorldSensor,
    attached_cart: Option<ObjectId>,
    config: &CommandConfig,
) -> Directive {
    let Some(hit) = hit else {
        return Directive::CancelAll;
    };
    let mut candidates = sensor.entities_near(hit.point, config.aim_snap_radius);
    if let Some(entity) = hit.entity {
        candidates.push(entity);
    }
    candidates
        .iter()
        .filter_map(|entity| aim_rank(&entity.kind).map(|rank| (rank, entity)))
        .min_by(|(rank_a, a), (rank_b, b)| {
            rank_a.cmp(rank_b).then(
                planar_distance(hit.point, a.position).total_cmp(&planar_distance(hit.point, b.position)),
            )
        })
        .and_then(|(_, entity)| directive_for(entity, attached_cart))
        .unwrap_or(Directive::MoveTo(hit.point))
}
