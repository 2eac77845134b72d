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

//! Home and leash governor
//!
//! Owns everything tied to the home anchor: the leash handed to the
//! navigator, patrolling (wandering or holding) around the anchor, and
//! deposit trips to storage inside the leash when the companion is full.

use super::behavior::TickContext;
use super::navigation::{Leash, Navigator};
use crate::config::{FollowConfig, HomeConfig};
use crate::ecs::components::Companion;
use crate::ecs::events::{CompanionEvent, EventBus};
use crate::services::{planar_distance, Material, ObjectId};
use glam::Vec3;
use metrics::counter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Materials unloaded on a deposit trip
const DEPOSITED: [Material; 4] = [Material::Wood, Material::Stone, Material::Ore, Material::Forage];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatrolOutcome {
    /// No anchor to patrol around
    NoCenter,
    Holding,
    Wandering,
    Pausing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositOutcome {
    Traveling,
    Deposited(u32),
    /// Container vanished or could not be reached
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DepositTrip {
    container: ObjectId,
    position: Vec3,
}

#[derive(Debug, Clone)]
pub struct HomeGovernor {
    rng: StdRng,
    wander_target: Option<Vec3>,
    pause: f32,
    deposit: Option<DepositTrip>,
}

impl HomeGovernor {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            wander_target: None,
            pause: 0.0,
            deposit: None,
        }
    }

    /// Leash in force while StayHome is on and an anchor exists
    pub fn leash(&self, companion: &Companion, config: &HomeConfig) -> Option<Leash> {
        if !companion.toggles.stay_home {
            return None;
        }
        companion
            .home_anchor
            .map(|anchor| Leash::new(anchor, config.leash_radius, config.drop_grace))
    }

    pub fn is_depositing(&self) -> bool {
        self.deposit.is_some()
    }

    pub fn cancel_deposit(&mut self) {
        self.deposit = None;
    }

    pub fn reset_patrol(&mut self) {
        self.wander_target = None;
        self.pause = 0.0;
    }

    /// Pick the nearest container with space inside the leash
    ///
    /// Returns false when StayHome is off or nothing qualifies.
    pub fn begin_deposit(
        &mut self,
        companion: &Companion,
        nav: &Navigator,
        ctx: &TickContext<'_>,
        events: &EventBus,
        config: &HomeConfig,
    ) -> bool {
        let Some(leash) = self.leash(companion, config) else {
            return false;
        };
        let position = ctx.movement.position();
        let nearest = ctx
            .sensor
            .scan_containers(leash.anchor, config.leash_radius)
            .into_iter()
            .filter(|entity| entity.container().is_some_and(|state| state.has_space()))
            .filter(|entity| nav.allows(entity.position, false))
            .min_by(|a, b| {
                planar_distance(position, a.position).total_cmp(&planar_distance(position, b.position))
            });
        let Some(container) = nearest else {
            tracing::debug!(agent = %companion.agent_id, "No storage with space inside the leash");
            return false;
        };

        tracing::info!(agent = %companion.agent_id, "Full, heading to storage {}", container.id);
        counter!("companion.home.deposit_trips").increment(1);
        events.publish(CompanionEvent::DepositStarted {
            agent: companion.agent_id,
            container: container.id,
        });
        self.deposit = Some(DepositTrip {
            container: container.id,
            position: container.position,
        });
        true
    }

    /// Advance the deposit trip in progress
    ///
    /// # Returns
    /// * `Traveling` - Still walking to the container
    /// * `Deposited(n)` - Unloaded `n` items; the trip is over
    /// * `Abandoned` - Container gone or unreachable; the trip is over
    pub fn deposit_step(
        &mut self,
        companion: &Companion,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        config: &HomeConfig,
        follow: &FollowConfig,
    ) -> DepositOutcome {
        let Some(trip) = self.deposit else {
            return DepositOutcome::Abandoned;
        };
        let Some(container) = ctx.sensor.entity(trip.container) else {
            self.deposit = None;
            return DepositOutcome::Abandoned;
        };

        if planar_distance(ctx.movement.position(), container.position) > config.deposit_range {
            if !nav
                .waypoint(ctx.movement, container.position, config.deposit_range * 0.8, follow)
                .is_accepted()
            {
                tracing::debug!(agent = %companion.agent_id, "Cannot reach storage {}", trip.container);
                self.deposit = None;
                return DepositOutcome::Abandoned;
            }
            return DepositOutcome::Traveling;
        }

        nav.stop(ctx.movement);
        let mut stored = 0;
        for material in DEPOSITED {
            let carried = ctx.inventory.count(material);
            if carried > 0 {
                stored += ctx.actions.deposit(trip.container, material, carried);
            }
        }
        tracing::info!(agent = %companion.agent_id, "Stored {} items in {}", stored, trip.container);
        self.deposit = None;
        DepositOutcome::Deposited(stored)
    }

    /// Wander or hold around the patrol centre
    pub fn patrol(
        &mut self,
        companion: &Companion,
        nav: &mut Navigator,
        ctx: &mut TickContext<'_>,
        config: &HomeConfig,
    ) -> PatrolOutcome {
        let Some(center) = companion.patrol_center() else {
            nav.stop(ctx.movement);
            return PatrolOutcome::NoCenter;
        };
        let position = ctx.movement.position();

        if !companion.toggles.wander {
            self.wander_target = None;
            if planar_distance(position, center) > config.hold_radius {
                nav.move_to(ctx.movement, center, config.hold_radius * 0.5, false, false);
            } else {
                nav.stop(ctx.movement);
            }
            return PatrolOutcome::Holding;
        }

        if let Some(target) = self.wander_target {
            if planar_distance(position, target) <= config.hold_radius {
                self.wander_target = None;
                self.pause = config.wander_pause;
                nav.stop(ctx.movement);
                return PatrolOutcome::Pausing;
            }
            if !nav.move_to(ctx.movement, target, config.hold_radius * 0.5, false, false).is_accepted() {
                self.wander_target = None;
            }
            return PatrolOutcome::Wandering;
        }

        if self.pause > 0.0 {
            self.pause -= ctx.delta_time;
            return PatrolOutcome::Pausing;
        }

        let radius = match nav.leash() {
            Some(leash) => config.wander_radius.min(leash.radius),
            None => config.wander_radius,
        };
        let target = self.wander_point(center, radius, ctx);
        self.wander_target = Some(target);
        nav.move_to(ctx.movement, target, config.hold_radius * 0.5, false, false);
        PatrolOutcome::Wandering
    }

    fn wander_point(&mut self, center: Vec3, radius: f32, ctx: &TickContext<'_>) -> Vec3 {
        let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
        let distance = radius * self.rng.random_range(0.0f32..1.0).sqrt();
        let x = center.x + angle.cos() * distance;
        let z = center.z + angle.sin() * distance;
        let y = ctx.sensor.ground_height(x, z).unwrap_or(center.y);
        Vec3::new(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::test_utils::StubHost;
    use crate::services::{ContainerState, WorldEntity, WorldEntityKind};
    use hearthguard_common::ActionMode;
    use uuid::Uuid;

    fn homebody(anchor: Vec3) -> Companion {
        let mut companion = Companion::new(Uuid::new_v4(), Uuid::new_v4(), "Brin");
        companion.home_anchor = Some(anchor);
        companion.toggles.stay_home = true;
        companion
    }

    fn chest(id: u64, at: Vec3, free_slots: u32) -> WorldEntity {
        WorldEntity::new(
            ObjectId(id),
            at,
            WorldEntityKind::Container(ContainerState { free_slots, contents: Vec::new() }),
        )
    }

    #[test]
    fn test_leash_requires_stay_home_and_anchor() {
        let config = HomeConfig::default();
        let home = HomeGovernor::new(1);
        let mut companion = homebody(Vec3::ZERO);
        let leash = home.leash(&companion, &config).unwrap();
        assert_eq!(leash.radius, 50.0);
        assert_eq!(leash.grace, 6.0);

        companion.toggles.stay_home = false;
        assert!(home.leash(&companion, &config).is_none());
        companion.toggles.stay_home = true;
        companion.home_anchor = None;
        assert!(home.leash(&companion, &config).is_none());
    }

    #[test]
    fn test_wander_points_stay_in_radius() {
        let config = HomeConfig::default();
        let companion = homebody(Vec3::new(100.0, 0.0, 100.0));
        let mut home = HomeGovernor::new(42);
        let mut nav = Navigator::new();
        nav.set_leash(home.leash(&companion, &config));
        let mut host = StubHost::new(Vec3::new(100.0, 0.0, 100.0));

        for _ in 0..50 {
            home.reset_patrol();
            let mut ctx = host.context(0.05);
            assert_eq!(home.patrol(&companion, &mut nav, &mut ctx, &config), PatrolOutcome::Wandering);
            let (point, _, run) = host.movement.last_request().unwrap();
            assert!(planar_distance(point, Vec3::new(100.0, 0.0, 100.0)) <= config.wander_radius + 1e-3);
            assert!(!run);
        }
    }

    #[test]
    fn test_arrival_pauses_before_next_leg() {
        let config = HomeConfig::default();
        let companion = homebody(Vec3::ZERO);
        let mut home = HomeGovernor::new(7);
        let mut nav = Navigator::new();
        let mut host = StubHost::new(Vec3::ZERO);

        let mut ctx = host.context(0.05);
        home.patrol(&companion, &mut nav, &mut ctx, &config);
        let (target, _, _) = host.movement.last_request().unwrap();
        host.place_agent(target);

        let mut ctx = host.context(0.05);
        assert_eq!(home.patrol(&companion, &mut nav, &mut ctx, &config), PatrolOutcome::Pausing);
        let requests = host.movement.requests.len();
        let mut ctx = host.context(1.0);
        assert_eq!(home.patrol(&companion, &mut nav, &mut ctx, &config), PatrolOutcome::Pausing);
        assert_eq!(host.movement.requests.len(), requests);
    }

    #[test]
    fn test_hold_without_wander() {
        let config = HomeConfig::default();
        let mut companion = homebody(Vec3::ZERO);
        companion.toggles.wander = false;
        let mut home = HomeGovernor::new(7);
        let mut nav = Navigator::new();
        let mut host = StubHost::new(Vec3::new(5.0, 0.0, 0.0));

        let mut ctx = host.context(0.05);
        assert_eq!(home.patrol(&companion, &mut nav, &mut ctx, &config), PatrolOutcome::Holding);
        assert_eq!(host.movement.last_request().map(|r| r.0), Some(Vec3::ZERO));
    }

    #[test]
    fn test_stay_patrol_uses_entry_point() {
        let config = HomeConfig::default();
        let mut companion = Companion::new(Uuid::new_v4(), Uuid::new_v4(), "Brin");
        companion.toggles.wander = false;
        companion.switch_mode(ActionMode::StayPatrol, Vec3::new(3.0, 0.0, 3.0));
        let mut home = HomeGovernor::new(7);
        let mut nav = Navigator::new();
        let mut host = StubHost::new(Vec3::new(9.0, 0.0, 3.0));

        let mut ctx = host.context(0.05);
        home.patrol(&companion, &mut nav, &mut ctx, &config);
        assert_eq!(host.movement.last_request().map(|r| r.0), Some(Vec3::new(3.0, 0.0, 3.0)));
    }

    #[test]
    fn test_deposit_trip_to_nearest_container_in_leash() {
        let config = HomeConfig::default();
        let follow = FollowConfig::default();
        let companion = homebody(Vec3::ZERO);
        let mut home = HomeGovernor::new(7);
        let mut nav = Navigator::new();
        nav.set_leash(home.leash(&companion, &config));
        let events = EventBus::new();
        let mut host = StubHost::new(Vec3::new(10.0, 0.0, 0.0));
        host.sensor.entities.push(chest(1, Vec3::new(5.0, 0.0, 0.0), 0));
        host.sensor.entities.push(chest(2, Vec3::new(-5.0, 0.0, 0.0), 2));
        host.sensor.entities.push(chest(3, Vec3::new(70.0, 0.0, 0.0), 2));
        host.inventory.materials.insert(Material::Wood, 30);
        host.inventory.materials.insert(Material::Metal, 3);

        {
            let ctx = host.context(0.05);
            assert!(home.begin_deposit(&companion, &nav, &ctx, &events, &config));
        }
        assert!(home.is_depositing());
        assert!(matches!(
            events.drain().as_slice(),
            [CompanionEvent::DepositStarted { container: ObjectId(2), .. }]
        ));

        let mut ctx = host.context(0.05);
        assert_eq!(home.deposit_step(&companion, &mut nav, &mut ctx, &config, &follow), DepositOutcome::Traveling);
        host.place_agent(Vec3::new(-4.0, 0.0, 0.0));
        let mut ctx = host.context(0.05);
        assert_eq!(home.deposit_step(&companion, &mut nav, &mut ctx, &config, &follow), DepositOutcome::Deposited(30));
        assert_eq!(host.actions.deposits, vec![(ObjectId(2), Material::Wood, 30)]);
        assert!(!home.is_depositing());
    }

    #[test]
    fn test_no_deposit_without_stay_home() {
        let config = HomeConfig::default();
        let mut companion = homebody(Vec3::ZERO);
        companion.toggles.stay_home = false;
        let mut home = HomeGovernor::new(7);
        let events = EventBus::new();
        let mut host = StubHost::new(Vec3::ZERO);
        host.sensor.entities.push(chest(2, Vec3::new(2.0, 0.0, 0.0), 2));

        let ctx = host.context(0.05);
        assert!(!home.begin_deposit(&companion, &Navigator::new(), &ctx, &events, &config));
    }
}
