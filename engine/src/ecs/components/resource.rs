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

//! Stamina pool gating sprint, attack, block and dodge

use crate::config::ResourceConfig;
use serde::{Deserialize, Serialize};

/// Stamina economy for one companion
///
/// Every costed action checks [`ResourcePool::can_afford`] before committing
/// and calls [`ResourcePool::drain`] when it executes. Regeneration pauses for
/// `regen_delay` seconds after any drain and runs at `rest_multiplier` speed
/// while the agent rests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePool {
    current: f32,
    base_max: f32,
    bonus: f32,
    regen_per_second: f32,
    rest_multiplier: f32,
    regen_delay: f32,
    since_drain: f32,
}

impl ResourcePool {
    /// Create a full pool
    pub fn new(config: &ResourceConfig) -> Self {
        Self {
            current: config.base_max,
            base_max: config.base_max,
            bonus: 0.0,
            regen_per_second: config.regen_per_second,
            rest_multiplier: config.rest_multiplier,
            regen_delay: config.regen_delay,
            since_drain: config.regen_delay,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        (self.base_max + self.bonus).max(0.0)
    }

    /// Fraction of the pool remaining, 0.0 to 1.0
    pub fn ratio(&self) -> f32 {
        let max = self.max();
        if max <= 0.0 { 0.0 } else { self.current / max }
    }

    /// Update the externally supplied bonus, clamping the current value
    pub fn set_bonus(&mut self, bonus: f32) {
        self.bonus = bonus;
        self.current = self.current.min(self.max());
    }

    pub fn can_afford(&self, amount: f32) -> bool {
        self.current >= amount
    }

    /// Remove stamina, clamping at zero
    pub fn drain(&mut self, amount: f32) {
        if amount <= 0.0 {
            return;
        }
        self.current = (self.current - amount).max(0.0);
        self.since_drain = 0.0;
    }

    /// Drain only if affordable, reporting whether the action may proceed
    pub fn try_spend(&mut self, amount: f32) -> bool {
        if self.can_afford(amount) {
            self.drain(amount);
            true
        } else {
            false
        }
    }

    /// Passive regeneration for one tick
    pub fn regenerate(&mut self, delta_time: f32, resting: bool) {
        self.since_drain += delta_time;
        if self.since_drain < self.regen_delay {
            return;
        }
        let multiplier = if resting { self.rest_multiplier } else { 1.0 };
        self.current = (self.current + self.regen_per_second * multiplier * delta_time).min(self.max());
    }

    /// Set the pool to an exact value, used by hosts restoring state
    pub fn set_current(&mut self, value: f32) {
        self.current = value.clamp(0.0, self.max());
    }
}

impl Default for ResourcePool {
    fn default() -> Self {
        Self::new(&ResourceConfig::default())
    }
}
