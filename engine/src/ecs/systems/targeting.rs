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

//! Target arbitration
//!
//! Decides which hostile, if any, the companion is committed to. A lock is
//! kept until it expires (directed locks only), the target becomes invalid,
//! or it is explicitly cleared. Re-scans never replace a valid lock.

use crate::config::TargetingConfig;
use crate::ecs::components::{Companion, LockKind, TargetLock};
use crate::services::{planar_distance, HostileInfo, ObjectId, UiFocus, WorldSensor};
use glam::Vec3;
use hearthguard_common::ActionMode;

#[derive(Debug, Clone, Default)]
pub struct TargetArbitrator {
    lock: Option<TargetLock>,
    /// A hostile is inside the self-defense radius during a task
    alert: bool,
}

impl TargetArbitrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> Option<&TargetLock> {
        self.lock.as_ref()
    }

    pub fn alert(&self) -> bool {
        self.alert
    }

    /// Install an owner-ordered lock, replacing anything held
    pub fn lock_directed(&mut self, target: ObjectId, config: &TargetingConfig) {
        self.lock = Some(TargetLock::directed(target, config.directed_lock_seconds));
    }

    /// Drop the lock only if it was directed
    pub fn release_directed(&mut self) {
        if self.lock.is_some_and(|lock| lock.is_directed()) {
            self.lock = None;
        }
    }

    pub fn clear(&mut self) {
        self.lock = None;
        self.alert = false;
    }

    /// Re-evaluate the lock for this tick
    ///
    /// `in_task` is true while a gather or smelt mode is active; it limits
    /// acquisition to hostiles inside the self-defense radius.
    ///
    /// # Returns
    /// The lock in force after this tick, if any.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &mut self,
        companion: &Companion,
        position: Vec3,
        in_task: bool,
        delta_time: f32,
        sensor: &dyn WorldSensor,
        ui: &dyn UiFocus,
        config: &TargetingConfig,
    ) -> Option<TargetLock> {
        if let Some(lock) = self.lock.as_mut() {
            if !lock.tick(delta_time) {
                tracing::debug!(agent = %companion.agent_id, "Directed lock on {} expired", lock.target);
                self.lock = None;
            }
        }

        if ui.panel_open(companion.agent_id) {
            if self.lock.is_some() {
                tracing::debug!(agent = %companion.agent_id, "Panel open, dropping target lock");
            }
            self.clear();
            return None;
        }

        let tethered = beyond_owner_tether(companion, position, sensor, config);
        if let Some(lock) = self.lock {
            if !self.still_valid(&lock, position, sensor, config) {
                tracing::debug!(agent = %companion.agent_id, "Target {} no longer valid", lock.target);
                self.lock = None;
            } else if tethered && !lock.is_directed() {
                tracing::info!(agent = %companion.agent_id, "Owner out of reach, breaking off from {}", lock.target);
                self.lock = None;
            }
        }

        let stance = companion.stance;
        if in_task {
            let radius = config.self_defense_radius.get(stance);
            let threats = live_hostiles(sensor, radius);
            if threats.is_empty() {
                if self.lock.is_some_and(|lock| !lock.is_directed()) {
                    self.lock = None;
                }
                self.alert = false;
                return self.lock;
            }
            self.alert = true;
            if self.lock.is_none() && stance.initiates_combat() {
                if let Some(nearest) = nearest(&threats, position) {
                    tracing::info!(agent = %companion.agent_id, "Hostile {} too close, defending", nearest.id);
                    self.lock = Some(TargetLock::self_defense(nearest.id));
                }
            }
            return self.lock;
        }

        self.alert = false;
        if self.lock.is_none() && stance.initiates_combat() && !tethered {
            let radius = config.aggro_radius.get(stance);
            if radius > 0.0 {
                let hostiles = live_hostiles(sensor, radius);
                if let Some(nearest) = nearest(&hostiles, position) {
                    tracing::debug!(agent = %companion.agent_id, "Acquired hostile {}", nearest.id);
                    self.lock = Some(TargetLock::free(nearest.id));
                }
            }
        }
        self.lock
    }

    fn still_valid(
        &self,
        lock: &TargetLock,
        position: Vec3,
        sensor: &dyn WorldSensor,
        config: &TargetingConfig,
    ) -> bool {
        match sensor.hostile(lock.target) {
            Some(hostile) if hostile.alive => {
                lock.kind == LockKind::Directed
                    || planar_distance(position, hostile.position) <= config.release_radius
            }
            _ => false,
        }
    }
}

/// Following and already too far from the owner to keep fighting
fn beyond_owner_tether(companion: &Companion, position: Vec3, sensor: &dyn WorldSensor, config: &TargetingConfig) -> bool {
    if companion.mode != ActionMode::Follow || companion.toggles.stay_home {
        return false;
    }
    sensor
        .owner()
        .is_some_and(|owner| planar_distance(position, owner.position) > config.owner_tether)
}

fn live_hostiles(sensor: &dyn WorldSensor, radius: f32) -> Vec<HostileInfo> {
    sensor
        .scan_hostiles(radius)
        .into_iter()
        .filter(|hostile| hostile.alive)
        .collect()
}

fn nearest(hostiles: &[HostileInfo], position: Vec3) -> Option<&HostileInfo> {
    hostiles.iter().min_by(|a, b| {
        planar_distance(position, a.position).total_cmp(&planar_distance(position, b.position))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::test_utils::StubSensor;
    use crate::services::{MockUiFocus, NoPanel};
    use hearthguard_common::{ActionMode, CombatStance};
    use uuid::Uuid;

    fn companion(mode: ActionMode) -> Companion {
        let mut companion = Companion::new(Uuid::new_v4(), Uuid::new_v4(), "Brin");
        companion.mode = mode;
        companion
    }

    #[test]
    fn test_free_acquisition_picks_nearest() {
        let config = TargetingConfig::default();
        let mut sensor = StubSensor::default();
        sensor.hostiles.push(StubSensor::hostile(1, Vec3::new(12.0, 0.0, 0.0)));
        sensor.hostiles.push(StubSensor::hostile(2, Vec3::new(6.0, 0.0, 0.0)));

        let mut arbitrator = TargetArbitrator::new();
        let lock = arbitrator.evaluate(&companion(ActionMode::Follow), Vec3::ZERO, false, 0.05, &sensor, &NoPanel, &config);

        assert_eq!(lock.map(|l| l.target), Some(ObjectId(2)));
        assert_eq!(lock.map(|l| l.kind), Some(LockKind::Free));
    }

    #[test]
    fn test_lock_does_not_bounce_to_closer_hostile() {
        let config = TargetingConfig::default();
        let mut sensor = StubSensor::default();
        sensor.hostiles.push(StubSensor::hostile(1, Vec3::new(12.0, 0.0, 0.0)));
        let mut arbitrator = TargetArbitrator::new();
        let follower = companion(ActionMode::Follow);
        arbitrator.evaluate(&follower, Vec3::ZERO, false, 0.05, &sensor, &NoPanel, &config);

        sensor.hostiles.push(StubSensor::hostile(2, Vec3::new(2.0, 0.0, 0.0)));
        let lock = arbitrator.evaluate(&follower, Vec3::ZERO, false, 0.05, &sensor, &NoPanel, &config);
        assert_eq!(lock.map(|l| l.target), Some(ObjectId(1)));
    }

    #[test]
    fn test_task_suppresses_distant_hostiles() {
        let config = TargetingConfig::default();
        let mut sensor = StubSensor::default();
        sensor.hostiles.push(StubSensor::hostile(1, Vec3::new(14.0, 0.0, 0.0)));

        let mut arbitrator = TargetArbitrator::new();
        let gatherer = companion(ActionMode::GatherWood);
        let lock = arbitrator.evaluate(&gatherer, Vec3::ZERO, true, 0.05, &sensor, &NoPanel, &config);
        assert!(lock.is_none());
        assert!(!arbitrator.alert());

        sensor.hostiles[0].position = Vec3::new(6.0, 0.0, 0.0);
        let lock = arbitrator.evaluate(&gatherer, Vec3::ZERO, true, 0.05, &sensor, &NoPanel, &config);
        assert_eq!(lock.map(|l| l.kind), Some(LockKind::SelfDefense));
        assert!(arbitrator.alert());
    }

    #[test]
    fn test_directed_lock_survives_task_suppression() {
        let config = TargetingConfig::default();
        let mut sensor = StubSensor::default();
        sensor.hostiles.push(StubSensor::hostile(7, Vec3::new(30.0, 0.0, 0.0)));

        let mut arbitrator = TargetArbitrator::new();
        arbitrator.lock_directed(ObjectId(7), &config);
        let lock = arbitrator.evaluate(&companion(ActionMode::GatherOre), Vec3::ZERO, true, 0.05, &sensor, &NoPanel, &config);
        assert_eq!(lock.map(|l| l.target), Some(ObjectId(7)));
    }

    #[test]
    fn test_panel_open_clears_directed_lock() {
        let config = TargetingConfig::default();
        let mut sensor = StubSensor::default();
        sensor.hostiles.push(StubSensor::hostile(7, Vec3::new(3.0, 0.0, 0.0)));
        let follower = companion(ActionMode::Follow);

        let agent_id = follower.agent_id;
        let mut ui = MockUiFocus::new();
        ui.expect_panel_open()
            .withf(move |agent| *agent == agent_id)
            .return_const(true);

        let mut arbitrator = TargetArbitrator::new();
        arbitrator.lock_directed(ObjectId(7), &config);
        let lock = arbitrator.evaluate(&follower, Vec3::ZERO, false, 0.05, &sensor, &ui, &config);
        assert!(lock.is_none());
        assert!(arbitrator.lock().is_none());
    }

    #[test]
    fn test_passive_never_acquires() {
        let config = TargetingConfig::default();
        let mut sensor = StubSensor::default();
        sensor.hostiles.push(StubSensor::hostile(1, Vec3::new(1.0, 0.0, 0.0)));
        let mut passive = companion(ActionMode::Follow);
        passive.stance = CombatStance::Passive;

        let mut arbitrator = TargetArbitrator::new();
        assert!(arbitrator.evaluate(&passive, Vec3::ZERO, false, 0.05, &sensor, &NoPanel, &config).is_none());
        passive.mode = ActionMode::GatherStone;
        assert!(arbitrator.evaluate(&passive, Vec3::ZERO, true, 0.05, &sensor, &NoPanel, &config).is_none());
    }

    #[test]
    fn test_dead_target_releases_lock() {
        let config = TargetingConfig::default();
        let mut sensor = StubSensor::default();
        sensor.hostiles.push(StubSensor::hostile(1, Vec3::new(5.0, 0.0, 0.0)));
        let follower = companion(ActionMode::Follow);
        let mut arbitrator = TargetArbitrator::new();
        arbitrator.evaluate(&follower, Vec3::ZERO, false, 0.05, &sensor, &NoPanel, &config);

        sensor.hostiles[0].alive = false;
        assert!(arbitrator.evaluate(&follower, Vec3::ZERO, false, 0.05, &sensor, &NoPanel, &config).is_none());
    }

    #[test]
    fn test_follower_breaks_off_when_owner_out_of_reach() {
        let config = TargetingConfig::default();
        let mut sensor = StubSensor::with_owner(Vec3::ZERO);
        sensor.hostiles.push(StubSensor::hostile(1, Vec3::new(36.0, 0.0, 0.0)));
        let follower = companion(ActionMode::Follow);
        let mut arbitrator = TargetArbitrator::new();

        let chasing = Vec3::new(30.0, 0.0, 0.0);
        sensor.agent = chasing;
        let lock = arbitrator.evaluate(&follower, chasing, false, 0.05, &sensor, &NoPanel, &config);
        assert_eq!(lock.map(|l| l.kind), Some(LockKind::Free));

        sensor.hostiles[0].position = Vec3::new(50.0, 0.0, 0.0);
        let strayed = Vec3::new(44.0, 0.0, 0.0);
        sensor.agent = strayed;
        assert!(arbitrator.evaluate(&follower, strayed, false, 0.05, &sensor, &NoPanel, &config).is_none());
        assert!(arbitrator.lock().is_none());

        arbitrator.lock_directed(ObjectId(1), &config);
        let lock = arbitrator.evaluate(&follower, strayed, false, 0.05, &sensor, &NoPanel, &config);
        assert_eq!(lock.map(|l| l.kind), Some(LockKind::Directed));
    }
}
