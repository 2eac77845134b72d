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

//! Demo scenario used by the binary and the benchmarks

use super::{Sandbox, SandboxResult};
use crate::config::BehaviorConfig;
use crate::ecs::components::{Facility, FixtureKind, HostileCreature, Storage};
use crate::services::{planar_distance, FacilityClass, HarvestSource, ItemClass, Material, ToolKind};
use glam::Vec3;
use hearthguard_common::{ActionMode, CompanionProfile};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Looping walk for the owner avatar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerRoute {
    pub waypoints: Vec<Vec3>,
    pub speed: f32,
    pub next: usize,
}

impl OwnerRoute {
    const ARRIVE_RADIUS: f32 = 0.5;

    pub fn new(waypoints: Vec<Vec3>, speed: f32) -> Self {
        Self {
            waypoints,
            speed,
            next: 0,
        }
    }

    /// Velocity toward the current waypoint, advancing past reached ones
    pub fn steer(&mut self, position: Vec3) -> Vec3 {
        if self.waypoints.is_empty() {
            return Vec3::ZERO;
        }
        let mut target = self.waypoints[self.next % self.waypoints.len()];
        if planar_distance(position, target) <= Self::ARRIVE_RADIUS {
            self.next = (self.next + 1) % self.waypoints.len();
            target = self.waypoints[self.next];
        }
        let direction = Vec3::new(target.x - position.x, 0.0, target.z - position.z).normalize_or_zero();
        direction * self.speed
    }
}

const NAMES: [&str; 6] = ["Astrid", "Bjorn", "Eir", "Halvar", "Sigrun", "Torvald"];
const MODES: [ActionMode; 4] = [
    ActionMode::Follow,
    ActionMode::GatherWood,
    ActionMode::Smelt,
    ActionMode::GatherStone,
];

/// Builder for a populated sandbox
#[derive(Debug, Clone)]
pub struct Scenario {
    seed: u64,
    companions: u32,
    owner_id: Uuid,
    profiles: Vec<CompanionProfile>,
}

impl Scenario {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            companions: 2,
            owner_id: Uuid::new_v4(),
            profiles: Vec::new(),
        }
    }

    /// Total companions to spawn, counting restored profiles
    pub fn companions(mut self, count: u32) -> Self {
        self.companions = count;
        self
    }

    /// Restore saved companions before generating new ones
    pub fn restore(mut self, profiles: Vec<CompanionProfile>) -> Self {
        if let Some(first) = profiles.first() {
            self.owner_id = first.owner_id;
        }
        self.profiles = profiles;
        self
    }

    pub fn build(self, config: Arc<BehaviorConfig>) -> SandboxResult<Sandbox> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut sandbox = Sandbox::new(config);

        sandbox.spawn_owner(Vec3::ZERO);
        sandbox.set_owner_route(OwnerRoute::new(
            vec![
                Vec3::new(12.0, 0.0, 0.0),
                Vec3::new(12.0, 0.0, 12.0),
                Vec3::new(-12.0, 0.0, 12.0),
                Vec3::new(-12.0, 0.0, -12.0),
            ],
            2.5,
        ));

        let workshop = Vec3::new(8.0, 0.0, -8.0);
        sandbox.spawn_empty_facility(workshop, FacilityClass::Kiln);
        let mut furnace = Facility::new(FacilityClass::Furnace);
        furnace.fuel = furnace.fuel.map(|mut fuel| {
            fuel.current = 30;
            fuel
        });
        sandbox.spawn_facility(workshop + Vec3::new(4.0, 0.0, 0.0), furnace);
        sandbox.spawn_storage(
            workshop + Vec3::new(0.0, 0.0, -4.0),
            Storage::new(8).with(Material::Ore, 60).with(Material::Wood, 40),
        );
        sandbox.spawn_storage(workshop + Vec3::new(4.0, 0.0, -4.0), Storage::new(8));
        sandbox.spawn_fixture(Vec3::new(-6.0, 0.0, 4.0), FixtureKind::Cart { attached: false });
        sandbox.spawn_fixture(Vec3::new(-8.0, 0.0, 8.0), FixtureKind::Door { open: false });
        sandbox.spawn_fixture(Vec3::new(-10.0, 0.0, 8.0), FixtureKind::Bed);

        let mut scatter = |sandbox: &mut Sandbox, source: HarvestSource, count: usize, near: f32, far: f32| {
            for _ in 0..count {
                let angle = rng.random_range(0.0..std::f32::consts::TAU);
                let distance = rng.random_range(near..far);
                sandbox.spawn_harvestable(Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance), source);
            }
        };
        scatter(&mut sandbox, HarvestSource::StandingTree, 12, 10.0, 35.0);
        scatter(&mut sandbox, HarvestSource::Stump, 4, 10.0, 30.0);
        scatter(&mut sandbox, HarvestSource::FallenLog, 3, 10.0, 30.0);
        scatter(&mut sandbox, HarvestSource::Rock, 8, 8.0, 30.0);
        scatter(&mut sandbox, HarvestSource::OreVein, 4, 15.0, 35.0);
        scatter(&mut sandbox, HarvestSource::Pickable, 6, 5.0, 20.0);

        for _ in 0..3 {
            let angle = rng.random_range(0.0..std::f32::consts::TAU);
            let distance = rng.random_range(30.0..45.0);
            sandbox.spawn_hostile(
                Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance),
                HostileCreature::default(),
            );
        }

        let mut profiles = self.profiles;
        let restored = profiles.len();
        for index in restored..self.companions as usize {
            let name = NAMES[index % NAMES.len()];
            profiles.push(
                CompanionProfile::new(Uuid::new_v4(), self.owner_id, name).with_mode(MODES[index % MODES.len()]),
            );
        }

        for (index, profile) in profiles.iter().enumerate() {
            let offset = Vec3::new(-2.0 - index as f32, 0.0, -2.0);
            sandbox.spawn_companion(profile, offset)?;
            let agent = profile.agent_id;
            sandbox.give_item(agent, ItemClass::MeleeWeapon, 10.0)?;
            sandbox.give_item(agent, ItemClass::RangedWeapon { projectile_speed: 30.0 }, 6.0)?;
            sandbox.give_item(agent, ItemClass::Tool(ToolKind::Axe), 5.0)?;
            sandbox.give_item(agent, ItemClass::Tool(ToolKind::Pickaxe), 5.0)?;
            sandbox.give_item(agent, ItemClass::Shield, 4.0)?;
        }
        tracing::info!(
            restored,
            spawned = profiles.len() - restored,
            entities = sandbox.world().len(),
            "Scenario ready"
        );
        Ok(sandbox)
    }
}
