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

//! Scripted world step run after every brain has ticked

use super::scenario::OwnerRoute;
use crate::ecs::components::{
    Facility, Facing, HostileCreature, Mover, OwnerAvatar, Pinned, Position, Projectile, Velocity, Vitals,
};
use crate::ecs::{EcsEntity, GameWorld};
use crate::services::{planar, planar_distance};
use glam::Vec3;

/// Stagger applied to a hostile whose swing was blocked
const BLOCK_STAGGER: f32 = 1.5;

pub(super) fn step_world(world: &mut GameWorld, delta_time: f32) {
    if delta_time <= 0.0 {
        return;
    }
    walk_owner(world, delta_time);
    walk_movers(world, delta_time);
    run_hostiles(world, delta_time);
    recover_vitals(world, delta_time);
    fly_projectiles(world, delta_time);
    run_facilities(world, delta_time);
}

fn face(facing: &mut Facing, displacement: Vec3) {
    let direction = planar(displacement).normalize_or_zero();
    if direction != Vec3::ZERO {
        facing.0 = direction;
    }
}

fn walk_owner(world: &mut GameWorld, delta_time: f32) {
    for (position, velocity, facing, route, _) in world.query_mut::<(
        &mut Position,
        &mut Velocity,
        &mut Facing,
        Option<&mut OwnerRoute>,
        &OwnerAvatar,
    )>() {
        if let Some(route) = route {
            velocity.0 = route.steer(position.0);
        }
        position.0 += velocity.0 * delta_time;
        face(facing, velocity.0);
    }
}

fn walk_movers(world: &mut GameWorld, delta_time: f32) {
    for (position, mover, velocity, facing, pinned) in
        world.query_mut::<(&mut Position, &mut Mover, &mut Velocity, &mut Facing, Option<&Pinned>)>()
    {
        if pinned.is_some() {
            velocity.0 = Vec3::ZERO;
            continue;
        }
        let displacement = mover.step(&mut position.0, delta_time);
        velocity.0 = displacement / delta_time;
        face(facing, displacement);
    }
}

fn run_hostiles(world: &mut GameWorld, delta_time: f32) {
    let agents: Vec<(EcsEntity, Vec3)> = world
        .query::<(hecs::Entity, &Position, &Vitals)>()
        .iter()
        .filter(|(_, _, vitals)| vitals.health > 0.0)
        .map(|(entity, position, _)| (entity, position.0))
        .collect();

    let mut swings = Vec::new();
    for (hostile, position, velocity, creature) in
        world.query_mut::<(hecs::Entity, &mut Position, &mut Velocity, &mut HostileCreature)>()
    {
        velocity.0 = Vec3::ZERO;
        if !creature.alive() {
            continue;
        }
        creature.cooldown = (creature.cooldown - delta_time).max(0.0);
        if creature.stagger > 0.0 {
            creature.stagger = (creature.stagger - delta_time).max(0.0);
            creature.windup = 0.0;
            continue;
        }

        let prey = agents
            .iter()
            .map(|(agent, at)| (*agent, *at, planar_distance(position.0, *at)))
            .filter(|(_, _, distance)| *distance <= creature.aggro_radius)
            .min_by(|a, b| a.2.total_cmp(&b.2));
        let Some((agent, at, distance)) = prey else {
            creature.windup = 0.0;
            continue;
        };

        if distance > creature.reach {
            creature.windup = 0.0;
            let travel = (creature.speed * delta_time).min(distance - creature.reach * 0.9);
            let displacement = planar(at - position.0).normalize_or_zero() * travel.max(0.0);
            position.0 += displacement;
            velocity.0 = displacement / delta_time;
        } else if creature.windup > 0.0 {
            creature.windup -= delta_time;
            if creature.windup <= 0.0 {
                creature.windup = 0.0;
                creature.cooldown = creature.attack_interval;
                swings.push((hostile, agent, creature.damage));
            }
        } else if creature.cooldown <= 0.0 {
            creature.windup = creature.windup_time.max(delta_time);
        }
    }

    for (hostile, agent, damage) in swings {
        let blocked = match world.get::<&mut Vitals>(agent) {
            Ok(mut vitals) => {
                vitals.hits_taken += 1;
                if !vitals.blocking {
                    vitals.health = (vitals.health - damage).max(0.0);
                }
                vitals.blocking
            }
            Err(_) => continue,
        };
        if !blocked {
            continue;
        }
        if let Ok(mut creature) = world.get::<&mut HostileCreature>(hostile) {
            creature.stagger = BLOCK_STAGGER;
        }
    }
}

fn recover_vitals(world: &mut GameWorld, delta_time: f32) {
    for vitals in world.query_mut::<&mut Vitals>() {
        if vitals.health > 0.0 {
            vitals.health = (vitals.health + vitals.regen_per_second * delta_time).min(vitals.max_health);
        }
    }
}

fn fly_projectiles(world: &mut GameWorld, delta_time: f32) {
    let mut spent = Vec::new();
    for (entity, position, projectile) in world.query_mut::<(hecs::Entity, &mut Position, &mut Projectile)>() {
        position.0 += projectile.velocity * delta_time;
        projectile.ttl -= delta_time;
        if projectile.ttl <= 0.0 {
            spent.push(entity);
        }
    }
    for entity in spent {
        let _ = world.despawn(entity);
    }
}

fn run_facilities(world: &mut GameWorld, delta_time: f32) {
    for facility in world.query_mut::<&mut Facility>() {
        let finished = facility.process(delta_time);
        if finished > 0 {
            tracing::trace!(class = ?facility.class, finished, "Facility cycle complete");
        }
    }
}
