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

//! Leash-aware movement requests
//!
//! Every controller moves the agent through a [`Navigator`], which checks
//! each destination against the active [`Leash`] before it reaches the
//! host's pathfinder.

use crate::config::FollowConfig;
use crate::services::{planar_distance, MoveResult, MovementService};
use glam::Vec3;

/// Maximum roaming distance around an anchor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leash {
    pub anchor: Vec3,
    pub radius: f32,
    /// Extra slack while collecting drops near the edge
    pub grace: f32,
}

impl Leash {
    pub fn new(anchor: Vec3, radius: f32, grace: f32) -> Self {
        Self { anchor, radius, grace }
    }

    pub fn limit(&self, with_grace: bool) -> f32 {
        if with_grace {
            self.radius + self.grace
        } else {
            self.radius
        }
    }

    pub fn contains(&self, point: Vec3, with_grace: bool) -> bool {
        planar_distance(self.anchor, point) <= self.limit(with_grace)
    }

    /// The point itself when allowed, otherwise the anchor
    pub fn constrain(&self, point: Vec3, with_grace: bool) -> Vec3 {
        if self.contains(point, with_grace) {
            point
        } else {
            self.anchor
        }
    }
}

/// Movement front-end shared by all controllers
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    leash: Option<Leash>,
    destination: Option<Vec3>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leash(&self) -> Option<Leash> {
        self.leash
    }

    pub fn set_leash(&mut self, leash: Option<Leash>) {
        self.leash = leash;
    }

    /// Last destination handed to the pathfinder
    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    /// Whether a destination survives the leash unchanged
    pub fn allows(&self, point: Vec3, with_grace: bool) -> bool {
        self.leash.map_or(true, |leash| leash.contains(point, with_grace))
    }

    /// Request movement, redirecting to the anchor when the leash refuses
    pub fn move_to(
        &mut self,
        movement: &mut dyn MovementService,
        point: Vec3,
        stop_distance: f32,
        run: bool,
        with_grace: bool,
    ) -> MoveResult {
        let destination = match self.leash {
            Some(leash) => {
                let constrained = leash.constrain(point, with_grace);
                if constrained != point {
                    tracing::debug!(
                        "Destination {:?} outside leash of {:.1}, returning to anchor",
                        point,
                        leash.limit(with_grace)
                    );
                }
                constrained
            }
            None => point,
        };
        self.destination = Some(destination);
        let result = movement.request_move_to(destination, stop_distance, run);
        if !result.is_accepted() {
            tracing::debug!("Pathfinder refused move to {:?}", destination);
        }
        result
    }

    /// Walk or run to a waypoint depending on how far away it is
    pub fn waypoint(
        &mut self,
        movement: &mut dyn MovementService,
        point: Vec3,
        stop_distance: f32,
        config: &FollowConfig,
    ) -> MoveResult {
        let run = planar_distance(movement.position(), point) > config.waypoint_run_distance;
        self.move_to(movement, point, stop_distance.max(config.waypoint_stop_radius), run, false)
    }

    pub fn stop(&mut self, movement: &mut dyn MovementService) {
        self.destination = None;
        movement.stop();
    }

    pub fn teleport(&mut self, movement: &mut dyn MovementService, point: Vec3) {
        self.destination = None;
        movement.teleport_to(point);
    }
}
