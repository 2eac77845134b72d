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

//! Spatial components for bodies moving through the sandbox

use crate::services::{planar, planar_distance};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// World position of a body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position(pub Vec3);

/// Unit facing on the ground plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Facing(pub Vec3);

impl Default for Facing {
    fn default() -> Self {
        Self(Vec3::Z)
    }
}

/// Velocity measured over the last step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity(pub Vec3);

/// Outstanding walk request accepted by the sandbox pathfinder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveOrder {
    pub target: Vec3,
    pub stop_distance: f32,
    pub run: bool,
}

/// Straight-line mover used by companions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub order: Option<MoveOrder>,
    pub walk_speed: f32,
    pub run_speed: f32,
}

impl Default for Mover {
    fn default() -> Self {
        Self {
            order: None,
            walk_speed: 3.5,
            run_speed: 7.0,
        }
    }
}

impl Mover {
    /// Advance `position` toward the current order, clearing it on arrival
    ///
    /// Returns the displacement applied this step.
    pub fn step(&mut self, position: &mut Vec3, delta_time: f32) -> Vec3 {
        let Some(order) = self.order else {
            return Vec3::ZERO;
        };
        let distance = planar_distance(*position, order.target);
        if distance <= order.stop_distance + f32::EPSILON {
            self.order = None;
            return Vec3::ZERO;
        }
        let speed = if order.run { self.run_speed } else { self.walk_speed };
        let travel = (speed * delta_time).min(distance - order.stop_distance);
        let direction = planar(order.target - *position).normalize_or_zero();
        let displacement = direction * travel;
        *position += displacement;
        if travel >= distance - order.stop_distance {
            self.order = None;
        }
        displacement
    }
}

/// Accepts move orders but never makes progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pinned;

/// Circular region the pathfinder cannot route into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub radius: f32,
}

impl Obstacle {
    pub fn blocks(&self, center: Vec3, point: Vec3) -> bool {
        planar_distance(center, point) < self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mover_stops_at_stop_distance() {
        let mut mover = Mover {
            order: Some(MoveOrder {
                target: Vec3::new(10.0, 0.0, 0.0),
                stop_distance: 2.0,
                run: false,
            }),
            ..Mover::default()
        };
        let mut position = Vec3::ZERO;

        for _ in 0..10 {
            mover.step(&mut position, 1.0);
        }

        assert!((position.x - 8.0).abs() < 1e-4);
        assert!(mover.order.is_none());
    }

    #[test]
    fn test_mover_run_is_faster() {
        let order = Some(MoveOrder {
            target: Vec3::new(100.0, 0.0, 0.0),
            stop_distance: 0.0,
            run: true,
        });
        let mut mover = Mover { order, ..Mover::default() };
        let mut position = Vec3::ZERO;

        let moved = mover.step(&mut position, 1.0);

        assert_eq!(moved.length(), mover.run_speed);
    }

    #[test]
    fn test_obstacle_blocks_inside_radius() {
        let obstacle = Obstacle { radius: 3.0 };
        assert!(obstacle.blocks(Vec3::ZERO, Vec3::new(1.0, 5.0, 1.0)));
        assert!(!obstacle.blocks(Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)));
    }
}
