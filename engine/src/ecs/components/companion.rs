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

//! Live companion state

use glam::Vec3;
use hearthguard_common::{ActionMode, BehaviorToggles, CombatStance, CompanionProfile};
use thiserror::Error;
use uuid::Uuid;

/// Reasons a mode or toggle change is refused
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BehaviorError {
    #[error("Carrying {carried:.1} of {capacity:.1}, too heavy to start gathering")]
    Overweight { carried: f32, capacity: f32 },

    #[error("{0} requires a home anchor")]
    MissingAnchor(&'static str),

    #[error("Companion is not accepting commands")]
    NotCommandable,
}

pub type BehaviorResult<T> = Result<T, BehaviorError>;

/// The companion as the behavior core sees it
///
/// Carries everything from [`CompanionProfile`] plus runtime-only memory:
/// the last non-task mode (restored by cancel-all) and the point where
/// `StayPatrol` was entered when no home anchor exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Companion {
    pub agent_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub mode: ActionMode,
    pub toggles: BehaviorToggles,
    pub home_anchor: Option<Vec3>,
    pub stance: CombatStance,
    pub last_non_task_mode: ActionMode,
    pub patrol_anchor: Option<Vec3>,
}

impl Companion {
    pub fn new(agent_id: Uuid, owner_id: Uuid, name: impl Into<String>) -> Self {
        Self::from_profile(&CompanionProfile::new(agent_id, owner_id, name))
    }

    pub fn from_profile(profile: &CompanionProfile) -> Self {
        let last_non_task_mode = if profile.mode.is_task() {
            ActionMode::Follow
        } else {
            profile.mode
        };
        Self {
            agent_id: profile.agent_id,
            owner_id: profile.owner_id,
            name: profile.name.clone(),
            mode: profile.mode,
            toggles: profile.toggles,
            home_anchor: profile.home_anchor.map(Vec3::from_array),
            stance: profile.stance,
            last_non_task_mode,
            patrol_anchor: None,
        }
    }

    /// Snapshot the persisted subset
    pub fn to_profile(&self) -> CompanionProfile {
        let mut profile = CompanionProfile::new(self.agent_id, self.owner_id, self.name.clone())
            .with_mode(self.mode)
            .with_stance(self.stance);
        profile.toggles = self.toggles;
        profile.home_anchor = self.home_anchor.map(|anchor| anchor.to_array());
        profile
    }

    /// Switch modes, remembering the previous non-task mode
    ///
    /// Returns the previous mode when something changed.
    pub fn switch_mode(&mut self, mode: ActionMode, position: Vec3) -> Option<ActionMode> {
        if self.mode == mode {
            return None;
        }
        let previous = self.mode;
        if !previous.is_task() {
            self.last_non_task_mode = previous;
        }
        if mode == ActionMode::StayPatrol {
            self.patrol_anchor = Some(position);
        }
        self.mode = mode;
        Some(previous)
    }

    /// Mode restored by cancel-all
    pub fn resting_mode(&self) -> ActionMode {
        if self.mode.is_task() {
            self.last_non_task_mode
        } else {
            self.mode
        }
    }

    /// Centre of the area patrolled in StayHome or StayPatrol
    pub fn patrol_center(&self) -> Option<Vec3> {
        if self.toggles.stay_home {
            return self.home_anchor;
        }
        if self.mode == ActionMode::StayPatrol {
            return self.home_anchor.or(self.patrol_anchor);
        }
        None
    }

    /// Side of the owner to trail on, +1 right or -1 left
    pub fn follow_side(&self) -> f32 {
        if self.agent_id.as_u128() & 1 == 0 { 1.0 } else { -1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_round_trip_keeps_anchor() {
        let profile = CompanionProfile::new(Uuid::new_v4(), Uuid::new_v4(), "Brin")
            .with_mode(ActionMode::GatherOre)
            .with_home_anchor([4.0, 0.0, -2.0]);
        let companion = Companion::from_profile(&profile);

        assert_eq!(companion.home_anchor, Some(Vec3::new(4.0, 0.0, -2.0)));
        assert_eq!(companion.last_non_task_mode, ActionMode::Follow);

        let back = companion.to_profile();
        assert_eq!(back.mode, ActionMode::GatherOre);
        assert_eq!(back.home_anchor, Some([4.0, 0.0, -2.0]));
    }

    #[test]
    fn test_switch_mode_remembers_non_task_mode() {
        let mut companion = Companion::new(Uuid::new_v4(), Uuid::new_v4(), "Brin");
        companion.switch_mode(ActionMode::StayPatrol, Vec3::new(1.0, 0.0, 1.0));
        companion.switch_mode(ActionMode::GatherWood, Vec3::ZERO);
        companion.switch_mode(ActionMode::Smelt, Vec3::ZERO);

        assert_eq!(companion.last_non_task_mode, ActionMode::StayPatrol);
        assert_eq!(companion.resting_mode(), ActionMode::StayPatrol);
        assert_eq!(companion.patrol_center(), Some(Vec3::new(1.0, 0.0, 1.0)));
    }

    #[test]
    fn test_switch_to_same_mode_is_noop() {
        let mut companion = Companion::new(Uuid::new_v4(), Uuid::new_v4(), "Brin");
        assert_eq!(companion.switch_mode(ActionMode::Follow, Vec3::ZERO), None);
    }

    #[test]
    fn test_follow_side_from_identity_parity() {
        let even = Companion::new(Uuid::from_u128(2), Uuid::nil(), "Even");
        let odd = Companion::new(Uuid::from_u128(3), Uuid::nil(), "Odd");
        assert_eq!(even.follow_side(), 1.0);
        assert_eq!(odd.follow_side(), -1.0);
    }

    #[test]
    fn test_stay_home_patrols_anchor() {
        let mut companion = Companion::new(Uuid::new_v4(), Uuid::new_v4(), "Brin");
        assert_eq!(companion.patrol_center(), None);
        companion.home_anchor = Some(Vec3::new(10.0, 0.0, 10.0));
        companion.toggles.stay_home = true;
        assert_eq!(companion.patrol_center(), Some(Vec3::new(10.0, 0.0, 10.0)));
    }
}
