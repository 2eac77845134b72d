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

//! Companion brain
//!
//! The brain owns every controller and runs exactly one of them per tick.
//! Tick order:
//! 1. Pool bonus from vitals
//! 2. Pending owner input, each directive preempting what runs
//! 3. Leash from the home governor
//! 4. Target arbitration
//! 5. Priority: combat, directed task, deposit trip, owner leash, harvest,
//!    smelt, patrol, follow, idle
//! 6. Pool regeneration

use super::combat::CombatController;
use super::command::{CommandDispatcher, CommandInput, DirectedOutcome, Directive};
use super::follow::{FollowController, FollowOutcome};
use super::harvest::{is_overweight, HarvestController, HarvestOutcome};
use super::home::{DepositOutcome, HomeGovernor};
use super::navigation::Navigator;
use super::smelt::{SmeltController, SmeltOutcome};
use super::targeting::TargetArbitrator;
use crate::config::BehaviorConfig;
use crate::ecs::components::{
    BehaviorError, BehaviorResult, CombatState, Companion, FollowZone, ResourcePool, TargetLock,
};
use crate::ecs::events::{CompanionEvent, EventBus};
use crate::services::{
    ActionService, InventoryStore, MovementService, UiFocus, WorldSensor,
};
use glam::Vec3;
use hearthguard_common::{ActionMode, BehaviorToggles, CombatStance, CompanionProfile};
use metrics::counter;
use std::sync::Arc;

/// Collaborators lent to the brain for one tick
pub struct TickContext<'a> {
    /// Simulated seconds since the previous tick
    pub delta_time: f32,
    pub movement: &'a mut dyn MovementService,
    pub sensor: &'a dyn WorldSensor,
    pub inventory: &'a mut dyn InventoryStore,
    pub actions: &'a mut dyn ActionService,
    pub ui: &'a dyn UiFocus,
}

/// Which controller drove the agent this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActiveController {
    Combat,
    Directed,
    Harvest,
    Smelt,
    Deposit,
    Follow,
    Patrol,
    #[default]
    Idle,
}

impl ActiveController {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveController::Combat => "combat",
            ActiveController::Directed => "directed",
            ActiveController::Harvest => "harvest",
            ActiveController::Smelt => "smelt",
            ActiveController::Deposit => "deposit",
            ActiveController::Follow => "follow",
            ActiveController::Patrol => "patrol",
            ActiveController::Idle => "idle",
        }
    }
}

/// A per-agent decision loop driven by the host
pub trait BehaviorController {
    /// Decide and act for one simulation tick
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> ActiveController;

    /// Queue owner input, applied at the start of the next tick
    fn issue(&mut self, input: CommandInput);
}

pub struct CompanionBrain {
    companion: Companion,
    config: Arc<BehaviorConfig>,
    events: EventBus,
    pool: ResourcePool,
    nav: Navigator,
    follow: FollowController,
    targeting: TargetArbitrator,
    combat: CombatController,
    harvest: HarvestController,
    smelt: SmeltController,
    home: HomeGovernor,
    commands: CommandDispatcher,
    active: ActiveController,
    last_position: Vec3,
    dirty: bool,
}

impl CompanionBrain {
    pub fn new(companion: Companion, config: Arc<BehaviorConfig>, events: EventBus) -> Self {
        let bits = companion.agent_id.as_u128();
        let seed = (bits as u64) ^ ((bits >> 64) as u64);
        Self {
            pool: ResourcePool::new(&config.resource),
            companion,
            config,
            events,
            nav: Navigator::new(),
            follow: FollowController::new(),
            targeting: TargetArbitrator::new(),
            combat: CombatController::new(),
            harvest: HarvestController::new(),
            smelt: SmeltController::new(),
            home: HomeGovernor::new(seed),
            commands: CommandDispatcher::new(),
            active: ActiveController::Idle,
            last_position: Vec3::ZERO,
            dirty: false,
        }
    }

    pub fn from_profile(profile: &CompanionProfile, config: Arc<BehaviorConfig>, events: EventBus) -> Self {
        Self::new(Companion::from_profile(profile), config, events)
    }

    pub fn companion(&self) -> &Companion {
        &self.companion
    }

    pub fn profile(&self) -> CompanionProfile {
        self.companion.to_profile()
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ResourcePool {
        &mut self.pool
    }

    pub fn active(&self) -> ActiveController {
        self.active
    }

    pub fn lock(&self) -> Option<&TargetLock> {
        self.targeting.lock()
    }

    pub fn combat_state(&self) -> &CombatState {
        self.combat.state()
    }

    pub fn follow_zone(&self) -> FollowZone {
        self.follow.zone()
    }

    pub fn harvest(&self) -> &HarvestController {
        &self.harvest
    }

    pub fn smelt(&self) -> &SmeltController {
        &self.smelt
    }

    pub fn home(&self) -> &HomeGovernor {
        &self.home
    }

    pub fn commands(&self) -> &CommandDispatcher {
        &self.commands
    }

    pub fn navigator(&self) -> &Navigator {
        &self.nav
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Whether persisted state changed since the last call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Change the action mode from the UI
    ///
    /// Gather modes are refused while the agent is overweight.
    pub fn set_mode(&mut self, mode: ActionMode, inventory: &dyn InventoryStore) -> BehaviorResult<()> {
        if mode.is_gather() && is_overweight(inventory, &self.config.harvest) {
            return Err(BehaviorError::Overweight {
                carried: inventory.carried_weight(),
                capacity: inventory.capacity(),
            });
        }
        self.apply_mode(mode);
        Ok(())
    }

    /// Replace the toggles; StayHome needs a home anchor
    pub fn set_toggles(&mut self, toggles: BehaviorToggles) -> BehaviorResult<()> {
        if toggles.stay_home && self.companion.home_anchor.is_none() {
            return Err(BehaviorError::MissingAnchor("StayHome"));
        }
        if toggles.stay_home != self.companion.toggles.stay_home {
            self.home.reset_patrol();
            self.home.cancel_deposit();
        }
        self.companion.toggles = toggles;
        self.dirty = true;
        Ok(())
    }

    pub fn set_home_anchor(&mut self, anchor: Option<Vec3>) {
        self.companion.home_anchor = anchor;
        if anchor.is_none() && self.companion.toggles.stay_home {
            tracing::info!(agent = %self.companion.agent_id, "Home anchor cleared, leaving StayHome");
            self.companion.toggles.stay_home = false;
        }
        self.home.reset_patrol();
        self.dirty = true;
    }

    pub fn set_stance(&mut self, stance: CombatStance) {
        self.companion.stance = stance;
        self.dirty = true;
    }

    /// Queue owner input, refusing it when the companion is not commandable
    ///
    /// # Returns
    /// * `Ok(())` - Input applies at the start of the next tick
    /// * `Err(BehaviorError::NotCommandable)` - Commandable toggle is off
    pub fn try_issue(&mut self, input: CommandInput) -> BehaviorResult<()> {
        if !self.companion.toggles.commandable {
            return Err(BehaviorError::NotCommandable);
        }
        self.commands.queue(input);
        Ok(())
    }

    fn apply_mode(&mut self, mode: ActionMode) -> bool {
        let Some(previous) = self.companion.switch_mode(mode, self.last_position) else {
            return false;
        };
        if previous.is_gather() || mode.is_gather() {
            self.harvest.reset();
        }
        if previous == ActionMode::Smelt {
            self.smelt.reset();
        }
        self.follow.reset();
        self.home.reset_patrol();

        let agent = self.companion.agent_id;
        tracing::info!(agent = %agent, "Mode {} -> {}", previous.as_str(), mode.as_str());
        self.events.publish(CompanionEvent::ModeChanged { agent, from: previous, to: mode });
        if mode.is_task() {
            self.events.publish(CompanionEvent::TaskStarted { agent, mode });
        }
        self.dirty = true;
        true
    }

    /// Stop everything in flight so a new order starts clean
    fn preempt(&mut self, ctx: &mut TickContext<'_>) {
        self.commands.cancel();
        self.home.cancel_deposit();
        self.smelt.reset();
        self.harvest.interrupt();
        self.targeting.release_directed();
        self.combat.stand_down(ctx);
        self.nav.stop(ctx.movement);
    }

    /// Back to the resting mode with no lock; repeated calls change nothing
    fn cancel_all(&mut self) {
        self.targeting.clear();
        let mode = self.companion.resting_mode();
        self.apply_mode(mode);
    }

    fn dispatch(&mut self, input: CommandInput, ctx: &mut TickContext<'_>) {
        match input {
            CommandInput::Aim => {
                let directive = self.commands.resolve_aim(ctx.sensor, &self.config.command);
                self.apply_directive(directive, ctx);
            }
            CommandInput::Recall => {
                let agent = self.companion.agent_id;
                tracing::info!(agent = %agent, "Recalled by owner");
                counter!("companion.directives", "kind" => "Recall").increment(1);
                self.preempt(ctx);
                self.apply_mode(ActionMode::Follow);
                if self.companion.toggles.stay_home {
                    self.companion.toggles.stay_home = false;
                    self.dirty = true;
                }
                self.events.publish(CompanionEvent::Recalled { agent });
            }
            CommandInput::Directive(directive) => self.apply_directive(directive, ctx),
        }
    }

    fn apply_directive(&mut self, directive: Directive, ctx: &mut TickContext<'_>) {
        let agent = self.companion.agent_id;
        tracing::debug!(agent = %agent, "Directive {}", directive.as_str());
        counter!("companion.directives", "kind" => directive.as_str()).increment(1);
        self.preempt(ctx);

        let accepted = match directive {
            Directive::CancelAll => {
                self.cancel_all();
                true
            }
            Directive::Attack(target) => {
                if ctx.sensor.hostile(target).is_some_and(|hostile| hostile.alive) {
                    self.targeting.lock_directed(target, &self.config.targeting);
                    true
                } else {
                    false
                }
            }
            Directive::GatherAt(target) => match ctx.sensor.entity(target) {
                Some(entity) => match entity.harvest_source() {
                    Some(source) => {
                        let mode = ActionMode::for_harvest(source.kind());
                        match self.set_mode(mode, &*ctx.inventory) {
                            Ok(()) => self.harvest.inject(&entity, &self.nav, &self.config.harvest),
                            Err(BehaviorError::Overweight { carried, capacity }) => {
                                self.events.publish(CompanionEvent::Overweight { agent, carried, capacity });
                                return;
                            }
                            Err(err) => {
                                tracing::debug!(agent = %agent, "Gather order refused: {}", err);
                                return;
                            }
                        }
                    }
                    None => false,
                },
                None => false,
            },
            Directive::SmeltAt(facility) => {
                if ctx.sensor.entity(facility).is_some_and(|entity| entity.facility().is_some()) {
                    self.smelt.direct(facility);
                    true
                } else {
                    false
                }
            }
            other => self.commands.begin(other, ctx.sensor, &self.nav),
        };

        if accepted {
            self.events.publish(CompanionEvent::DirectiveAccepted {
                agent,
                directive: directive.as_str().to_string(),
            });
        } else {
            self.reject(directive.as_str());
        }
    }

    /// Tell the owner an order cannot be carried out and fall back to rest
    fn reject(&mut self, directive: &str) {
        let agent = self.companion.agent_id;
        tracing::debug!(agent = %agent, "No valid target for {}, cancelling all", directive);
        self.events.publish(CompanionEvent::DirectiveRejected {
            agent,
            directive: directive.to_string(),
        });
        self.cancel_all();
    }

    fn arbitrate(&mut self, lock: Option<TargetLock>, ctx: &mut TickContext<'_>) -> ActiveController {
        let config = Arc::clone(&self.config);
        let stance = self.companion.stance;

        if let Some(lock) = lock.filter(|lock| self.combat.wants_to_act(Some(lock), stance)) {
            self.combat.act(
                &self.companion,
                &lock,
                &mut self.pool,
                &mut self.nav,
                ctx,
                &self.events,
                &config.combat,
            );
            return ActiveController::Combat;
        }

        if let Some(label) = self.commands.task().map(|task| task.label()) {
            if self.commands.act(&mut self.nav, ctx, &config.command, &config.follow) == DirectedOutcome::Failed {
                self.reject(label);
            }
            return ActiveController::Directed;
        }

        if self.home.is_depositing() {
            match self
                .home
                .deposit_step(&self.companion, &mut self.nav, ctx, &config.home, &config.follow)
            {
                DepositOutcome::Traveling => {}
                DepositOutcome::Deposited(_) | DepositOutcome::Abandoned => {
                    // Storage took nothing useful, another trip would repeat the same result
                    if is_overweight(&*ctx.inventory, &config.harvest) {
                        return self.revert_overweight(ctx);
                    }
                }
            }
            return ActiveController::Deposit;
        }

        let position = ctx.movement.position();
        if self
            .follow
            .owner_leash_exceeded(&self.companion, position, ctx.sensor, &config.follow)
        {
            return self.run_follow(ctx);
        }

        if self.harvest.wants_to_act(&self.companion) {
            match self.harvest.act(
                &self.companion,
                &mut self.pool,
                &mut self.nav,
                ctx,
                self.combat.broken_gear_mut(),
                &self.events,
                &config.harvest,
                &config.follow,
            ) {
                HarvestOutcome::Working(_) => return ActiveController::Harvest,
                HarvestOutcome::Overweight { .. } => return self.handle_overweight(ctx),
                HarvestOutcome::Idle => {}
            }
        }

        if self.smelt.wants_to_act(&self.companion) {
            match self
                .smelt
                .act(&self.companion, &mut self.nav, ctx, &config.smelt, &config.follow)
            {
                SmeltOutcome::Working(_) => return ActiveController::Smelt,
                SmeltOutcome::Idle => {
                    if self.smelt.directed().is_some() {
                        tracing::debug!(agent = %self.companion.agent_id, "Directed facility needs nothing");
                        self.smelt.reset();
                    }
                }
            }
        }

        if self.companion.patrol_center().is_some() {
            self.home.patrol(&self.companion, &mut self.nav, ctx, &config.home);
            return ActiveController::Patrol;
        }

        if self.follow.wants_to_act(&self.companion, ctx.sensor) {
            return self.run_follow(ctx);
        }

        self.nav.stop(ctx.movement);
        ActiveController::Idle
    }

    /// Run the follow controller, reporting Idle when the owner is gone
    fn run_follow(&mut self, ctx: &mut TickContext<'_>) -> ActiveController {
        let config = Arc::clone(&self.config);
        match self
            .follow
            .act(&self.companion, &mut self.pool, &mut self.nav, ctx, &self.events, &config.follow)
        {
            FollowOutcome::NoOwner => ActiveController::Idle,
            FollowOutcome::Holding
            | FollowOutcome::Moving
            | FollowOutcome::Nudged
            | FollowOutcome::Teleported(_) => ActiveController::Follow,
        }
    }

    /// Full while gathering: deposit at home if possible, otherwise follow
    fn handle_overweight(&mut self, ctx: &mut TickContext<'_>) -> ActiveController {
        counter!("companion.harvest.overweight").increment(1);
        if self
            .home
            .begin_deposit(&self.companion, &self.nav, ctx, &self.events, &self.config.home)
        {
            return ActiveController::Deposit;
        }
        self.revert_overweight(ctx)
    }

    /// Notify the owner and fall back to following
    ///
    /// # Returns
    /// `Follow` when the owner is present, `Idle` otherwise.
    fn revert_overweight(&mut self, ctx: &mut TickContext<'_>) -> ActiveController {
        let agent = self.companion.agent_id;
        let carried = ctx.inventory.carried_weight();
        let capacity = ctx.inventory.capacity();
        tracing::info!(agent = %agent, "Overweight at {:.1}/{:.1}, returning to follow", carried, capacity);
        self.home.cancel_deposit();
        self.events.publish(CompanionEvent::Overweight { agent, carried, capacity });
        self.apply_mode(ActionMode::Follow);
        if self.follow.wants_to_act(&self.companion, ctx.sensor) {
            return self.run_follow(ctx);
        }
        self.nav.stop(ctx.movement);
        ActiveController::Idle
    }
}

impl BehaviorController for CompanionBrain {
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> ActiveController {
        let delta_time = ctx.delta_time;
        let vitals = ctx.sensor.vitals();
        self.last_position = ctx.movement.position();
        self.pool.set_bonus(vitals.stamina_bonus);

        self.nav.set_leash(self.home.leash(&self.companion, &self.config.home));
        for input in self.commands.take_pending() {
            self.dispatch(input, ctx);
        }

        self.nav.set_leash(self.home.leash(&self.companion, &self.config.home));

        let in_task = self.companion.mode.is_task() || self.commands.wants_to_act() || self.smelt.directed().is_some();
        let lock = self.targeting.evaluate(
            &self.companion,
            self.last_position,
            in_task,
            delta_time,
            ctx.sensor,
            ctx.ui,
            &self.config.targeting,
        );

        let active = self.arbitrate(lock, ctx);
        if active != ActiveController::Combat {
            self.combat.stand_down(ctx);
        }
        self.pool.regenerate(delta_time, vitals.resting);

        if active != self.active {
            tracing::debug!(
                agent = %self.companion.agent_id,
                "Active controller {} -> {}",
                self.active.as_str(),
                active.as_str()
            );
        }
        counter!("companion.ticks", "controller" => active.as_str()).increment(1);
        self.active = active;
        active
    }

    fn issue(&mut self, input: CommandInput) {
        if let Err(err) = self.try_issue(input) {
            tracing::debug!(agent = %self.companion.agent_id, "Ignoring input: {}", err);
        }
    }
}

impl std::fmt::Debug for CompanionBrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanionBrain")
            .field("agent", &self.companion.agent_id)
            .field("mode", &self.companion.mode)
            .field("active", &self.active)
            .field("lock", &self.targeting.lock())
            .finish()
    }
}
