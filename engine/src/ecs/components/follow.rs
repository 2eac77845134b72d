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

//! Follow zones and stuck detection

use crate::config::FollowConfig;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Distance band relative to the owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FollowZone {
    #[default]
    Inner,
    Comfort,
    CatchUp,
    Sprint,
}

impl FollowZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowZone::Inner => "Inner",
            FollowZone::Comfort => "Comfort",
            FollowZone::CatchUp => "CatchUp",
            FollowZone::Sprint => "Sprint",
        }
    }

    /// Multiplier applied to the trailing anchor offsets in this zone
    pub fn anchor_scale(&self, config: &FollowConfig) -> f32 {
        match self {
            FollowZone::CatchUp => config.catch_up_anchor_scale,
            FollowZone::Sprint => config.sprint_anchor_scale,
            _ => 1.0,
        }
    }
}

/// Next zone for a gap, moving at most one band per call
///
/// Each band has separate entry and exit thresholds, so a constant distance
/// never flips the zone back and forth.
pub fn determine_follow_zone(current: FollowZone, distance: f32, config: &FollowConfig) -> FollowZone {
    match current {
        FollowZone::Inner if distance > config.inner_exit => FollowZone::Comfort,
        FollowZone::Comfort if distance < config.comfort_to_inner => FollowZone::Inner,
        FollowZone::Comfort if distance > config.comfort_exit => FollowZone::CatchUp,
        FollowZone::CatchUp if distance < config.catch_up_to_comfort => FollowZone::Comfort,
        FollowZone::CatchUp if distance > config.catch_up_exit => FollowZone::Sprint,
        FollowZone::Sprint if distance < config.sprint_to_catch_up => FollowZone::CatchUp,
        zone => zone,
    }
}

/// How far stuck escalation has gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StuckStage {
    #[default]
    None,
    Nudge,
    Teleport,
}

/// What the follow controller should do about being stuck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckAction {
    Continue,
    Nudge,
    Teleport,
}

/// Tracks time spent pursuing the owner without closing in
///
/// Progress is the agent's displacement projected onto the direction of the
/// owner, so sideways motion from a nudge does not count.
#[derive(Debug, Clone, Default)]
pub struct StuckTracker {
    elapsed: f32,
    stage: StuckStage,
    last_position: Option<Vec3>,
}

impl StuckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> StuckStage {
        self.stage
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Forget all accumulated stuck time
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.stage = StuckStage::None;
        self.last_position = None;
    }

    /// Record one tick of pursuit and decide whether to escalate
    ///
    /// # Arguments
    /// * `position` - Agent position this tick
    /// * `owner` - Owner position this tick
    /// * `delta_time` - Seconds since the previous observation
    /// * `config` - Follow tuning
    ///
    /// # Returns
    /// `Nudge` once pursuit has stalled for `stuck_nudge_after`, then
    /// `Teleport` if it stays stalled for `stuck_teleport_after` more.
    pub fn observe(&mut self, position: Vec3, owner: Vec3, delta_time: f32, config: &FollowConfig) -> StuckAction {
        let closing = self.last_position.map(|last| {
            let toward = crate::services::planar(owner - last).normalize_or_zero();
            crate::services::planar(position - last).dot(toward)
        });
        self.last_position = Some(position);

        if delta_time <= 0.0 {
            return StuckAction::Continue;
        }
        if closing.is_none_or(|closing| closing / delta_time >= config.stuck_progress) {
            self.elapsed = 0.0;
            self.stage = StuckStage::None;
            return StuckAction::Continue;
        }

        self.elapsed += delta_time;
        match self.stage {
            StuckStage::None if self.elapsed >= config.stuck_nudge_after => {
                self.stage = StuckStage::Nudge;
                self.elapsed = 0.0;
                StuckAction::Nudge
            }
            StuckStage::Nudge if self.elapsed >= config.stuck_teleport_after => {
                self.reset();
                StuckAction::Teleport
            }
            _ => StuckAction::Continue,
        }
    }
}
